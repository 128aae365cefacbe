//! JSON-RPC response objects and error-code mapping.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::{DebugInfo, ResponseEnvelope};
use crate::error::ErrorCode;

/// Protocol version written into every response.
pub const JSONRPC_VERSION: &str = "2.0";

/// The `error` member of a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// JSON-RPC error code.
    pub code: i32,
    /// Short description of the error class.
    pub message: String,
    /// Caller-facing detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Diagnostics for callers in debug mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

impl JsonRpcError {
    /// The body is not valid JSON.
    pub const PARSE_ERROR: i32 = -32700;
    /// The body is not a valid request.
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// The call was rejected before running.
    pub const INVALID_PARAMS: i32 = -32602;
    /// The call failed while running.
    pub const APPLICATION_ERROR: i32 = -32500;

    fn new(code: i32, message: &str, data: impl Into<String>, debug: Option<DebugInfo>) -> Self {
        Self {
            code,
            message: message.to_owned(),
            data: Some(data.into()),
            debug,
        }
    }

    /// Error for bodies that are not valid JSON.
    #[must_use]
    pub fn parse_error() -> Self {
        Self::new(
            Self::PARSE_ERROR,
            "Parse error.",
            "Invalid JSON. An error occurred on the server while parsing the JSON text.",
            None,
        )
    }

    /// Error for malformed request objects.
    #[must_use]
    pub fn invalid_request(data: impl Into<String>) -> Self {
        Self::new(Self::INVALID_REQUEST, "Invalid request.", data, None)
    }

    /// Maps a failed call onto the wire error classes.
    #[must_use]
    pub fn from_failure(code: ErrorCode, message: &str, debug: Option<DebugInfo>) -> Self {
        let (wire_code, wire_message) = match code {
            ErrorCode::NoMethod => (Self::METHOD_NOT_FOUND, "Method not found."),
            ErrorCode::InvalidParameters | ErrorCode::NotAuthorized => {
                (Self::INVALID_PARAMS, "Invalid params.")
            }
            ErrorCode::Permissions | ErrorCode::Internal => {
                (Self::APPLICATION_ERROR, "Application error.")
            }
        };
        Self::new(wire_code, wire_message, message, debug)
    }
}

/// A response object: `result` or `error`, never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcResponse {
    /// Always [`JSONRPC_VERSION`].
    pub jsonrpc: &'static str,
    /// Data returned by a successful call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Identifier of the request being answered.
    pub id: Value,
}

impl JsonRpcResponse {
    /// Builds a success response.
    #[must_use]
    pub const fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Builds a failure response.
    #[must_use]
    pub const fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Converts a dispatcher envelope into a response.
    #[must_use]
    pub fn from_envelope(id: Value, envelope: ResponseEnvelope) -> Self {
        match envelope {
            ResponseEnvelope::Success { data } => Self::success(id, data),
            ResponseEnvelope::Failure {
                code,
                message,
                debug,
            } => Self::error(id, JsonRpcError::from_failure(code, &message, debug)),
        }
    }
}

/// What to write back for one request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JsonRpcReply {
    /// Answer to a single request.
    Single(JsonRpcResponse),
    /// Answers to the non-notification members of a batch.
    Batch(Vec<JsonRpcResponse>),
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case(ErrorCode::NoMethod, -32601, "Method not found.")]
    #[case(ErrorCode::InvalidParameters, -32602, "Invalid params.")]
    #[case(ErrorCode::NotAuthorized, -32602, "Invalid params.")]
    #[case(ErrorCode::Permissions, -32500, "Application error.")]
    #[case(ErrorCode::Internal, -32500, "Application error.")]
    fn maps_failure_codes(#[case] code: ErrorCode, #[case] wire: i32, #[case] message: &str) {
        let error = JsonRpcError::from_failure(code, "detail", None);
        assert_eq!(error.code, wire);
        assert_eq!(error.message, message);
        assert_eq!(error.data.as_deref(), Some("detail"));
    }

    #[test]
    fn success_responses_omit_error() {
        let response = JsonRpcResponse::success(json!(1), json!("5.0"));
        let encoded = serde_json::to_value(&response).expect("serialise");
        assert_eq!(encoded, json!({"jsonrpc": "2.0", "result": "5.0", "id": 1}));
    }

    #[test]
    fn null_results_are_still_written() {
        let response = JsonRpcResponse::success(json!(1), Value::Null);
        let encoded = serde_json::to_value(&response).expect("serialise");
        assert_eq!(encoded, json!({"jsonrpc": "2.0", "result": null, "id": 1}));
    }

    #[test]
    fn failure_responses_omit_result_and_absent_debug() {
        let envelope = ResponseEnvelope::failure(ErrorCode::NotAuthorized, "Not authorized.", None);
        let response = JsonRpcResponse::from_envelope(json!("a"), envelope);
        let encoded = serde_json::to_value(&response).expect("serialise");
        assert_eq!(
            encoded,
            json!({
                "jsonrpc": "2.0",
                "error": {"code": -32602, "message": "Invalid params.", "data": "Not authorized."},
                "id": "a"
            })
        );
    }
}
