//! Uniform result of every dispatched call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ErrorCode};

/// Diagnostic details attached to failures for callers in debug mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugInfo {
    /// Raw failure message, before any masking.
    pub message: String,
    /// Captured trace lines, innermost first.
    pub trace: Vec<String>,
}

impl DebugInfo {
    /// Creates a debug block.
    #[must_use]
    pub fn new(message: impl Into<String>, trace: Vec<String>) -> Self {
        Self {
            message: message.into(),
            trace,
        }
    }
}

/// Outcome of a dispatched call: either data or an error triple.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEnvelope {
    /// The call succeeded.
    Success {
        /// Value returned by the service.
        data: Value,
    },
    /// The call failed.
    Failure {
        /// Failure code.
        code: ErrorCode,
        /// Caller-facing message.
        message: String,
        /// Diagnostics, present only for callers in debug mode.
        debug: Option<DebugInfo>,
    },
}

impl ResponseEnvelope {
    /// Builds a success envelope.
    #[must_use]
    pub const fn success(data: Value) -> Self {
        Self::Success { data }
    }

    /// Builds a failure envelope.
    #[must_use]
    pub fn failure(code: ErrorCode, message: impl Into<String>, debug: Option<DebugInfo>) -> Self {
        Self::Failure {
            code,
            message: message.into(),
            debug,
        }
    }

    /// Returns `true` for success envelopes.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the success payload.
    #[must_use]
    pub const fn data(&self) -> Option<&Value> {
        match self {
            Self::Success { data } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    /// Consumes the envelope, returning the payload or the failure as an
    /// [`ApiError`].
    pub fn into_result(self) -> Result<Value, ApiError> {
        match self {
            Self::Success { data } => Ok(data),
            Self::Failure { code, message, .. } => Err(ApiError::new(code, message)),
        }
    }

    /// Returns the failure code.
    #[must_use]
    pub const fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { code, .. } => Some(*code),
        }
    }

    /// Returns the failure message.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { message, .. } => Some(message),
        }
    }

    /// Returns the failure diagnostics, if any were attached.
    #[must_use]
    pub const fn debug(&self) -> Option<&DebugInfo> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { debug, .. } => debug.as_ref(),
        }
    }
}

impl From<ApiError> for ResponseEnvelope {
    fn from(error: ApiError) -> Self {
        Self::failure(error.code(), error.message(), None)
    }
}
