//! Error types raised by services and the dispatcher.
//!
//! Services fail in one of two ways. Structured API failures carry one of the
//! well-known [`ErrorCode`]s and a caller-facing message that is returned as
//! is. Every other failure is an [`InternalError`]: its message is hidden from
//! callers behind [`INTERNAL_ERROR_MESSAGE`] and only surfaces in the debug
//! block of a response when the caller has debug mode enabled.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Caller-facing message used for every failure that is not a structured API
/// failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal API error.";

/// Numeric error codes reported in response envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The call was malformed or referred to an unknown API or method.
    InvalidParameters,
    /// An unexpected failure occurred while serving the call.
    Internal,
    /// The caller is authenticated but lacks permission.
    Permissions,
    /// The caller supplied no usable credentials.
    NotAuthorized,
    /// The requested method does not exist.
    NoMethod,
}

impl ErrorCode {
    /// Returns the wire value of this code.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::InvalidParameters => 100,
            Self::Internal => 111,
            Self::Permissions => 120,
            Self::NotAuthorized => 200,
            Self::NoMethod => 300,
        }
    }

    /// Resolves a wire value back into a code.
    #[must_use]
    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            100 => Some(Self::InvalidParameters),
            111 => Some(Self::Internal),
            120 => Some(Self::Permissions),
            200 => Some(Self::NotAuthorized),
            300 => Some(Self::NoMethod),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.as_i32())
    }
}

/// A structured failure whose code and message are shown to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    code: ErrorCode,
    message: String,
}

impl ApiError {
    /// Creates a failure with an explicit code.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates an [`ErrorCode::InvalidParameters`] failure.
    #[must_use]
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParameters, message)
    }

    /// Creates an [`ErrorCode::Permissions`] failure.
    #[must_use]
    pub fn permissions(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Permissions, message)
    }

    /// Creates an [`ErrorCode::NotAuthorized`] failure.
    #[must_use]
    pub fn not_authorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotAuthorized, message)
    }

    /// Creates an [`ErrorCode::NoMethod`] failure.
    #[must_use]
    pub fn no_method(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NoMethod, message)
    }

    /// Returns the failure code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the caller-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// An unexpected failure, reported to callers only as
/// [`INTERNAL_ERROR_MESSAGE`].
///
/// `trace` collects whatever context was available when the failure was
/// captured: the chain of error sources, a panic location, or both.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct InternalError {
    message: String,
    trace: Vec<String>,
}

impl InternalError {
    /// Creates an internal failure with an empty trace.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: Vec::new(),
        }
    }

    /// Captures an arbitrary error, recording its source chain as the trace.
    #[must_use]
    pub fn from_error(error: &(dyn StdError + 'static)) -> Self {
        let mut trace = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            trace.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        Self {
            message: error.to_string(),
            trace,
        }
    }

    /// Appends a line to the trace.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.trace.push(frame.into());
        self
    }

    /// Returns the raw failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the captured trace lines.
    #[must_use]
    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    pub(crate) fn into_parts(self) -> (String, Vec<String>) {
        (self.message, self.trace)
    }
}

/// Failure returned from a service method.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// A structured failure with a caller-facing code.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// An unexpected failure.
    #[error("internal failure: {0}")]
    Internal(#[from] InternalError),
}

impl ServiceError {
    /// Shorthand for a structured failure.
    #[must_use]
    pub fn api(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Api(ApiError::new(code, message))
    }

    /// Shorthand for an internal failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(InternalError::new(message))
    }

    /// Wraps any error as an internal failure.
    #[must_use]
    pub fn from_error<E>(error: E) -> Self
    where
        E: StdError + 'static,
    {
        Self::Internal(InternalError::from_error(&error))
    }

    /// Returns the code reported to the caller.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Api(error) => error.code(),
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Returns the message reported to the caller.
    #[must_use]
    pub fn caller_message(&self) -> &str {
        match self {
            Self::Api(error) => error.message(),
            Self::Internal(_) => INTERNAL_ERROR_MESSAGE,
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(error: serde_json::Error) -> Self {
        Self::from_error(error)
    }
}
