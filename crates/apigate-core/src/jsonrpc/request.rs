//! Parsing of JSON-RPC request bodies.

use serde_json::Value;

use super::response::JsonRpcError;
use crate::service::Params;

/// A decoded request body: one call or a batch of calls.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// A single request object, or any non-array JSON value.
    Single(Value),
    /// A non-empty array of request values.
    Batch(Vec<Value>),
}

impl RequestBody {
    /// Decodes raw bytes.
    ///
    /// # Errors
    ///
    /// Returns a parse error for invalid JSON and an invalid-request error
    /// for an empty batch.
    pub fn parse(bytes: &[u8]) -> Result<Self, JsonRpcError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|_| JsonRpcError::parse_error())?;
        match value {
            Value::Array(members) if members.is_empty() => Err(JsonRpcError::invalid_request(
                "Invalid parameter \"/\": cannot be empty.",
            )),
            Value::Array(members) => Ok(Self::Batch(members)),
            other => Ok(Self::Single(other)),
        }
    }
}

/// A structurally valid call extracted from a request object.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcCall {
    /// Request identifier; `None` marks a notification.
    pub id: Option<Value>,
    /// Namespace part of `method`.
    pub api: String,
    /// Action part of `method`.
    pub method: String,
    /// Named parameters.
    pub params: Params,
    /// Session token.
    pub auth: Option<String>,
}

/// A request member that could not be turned into a call.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidRequest {
    /// Identifier to echo, `null` when the request carried none.
    pub id: Value,
    /// Description of the offending field.
    pub reason: String,
}

impl InvalidRequest {
    fn new(id: Value, reason: impl Into<String>) -> Self {
        Self {
            id,
            reason: reason.into(),
        }
    }
}

impl JsonRpcCall {
    /// Validates one request value.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRequest`] naming the first malformed field.
    pub fn from_value(value: Value) -> Result<Self, InvalidRequest> {
        let Value::Object(mut object) = value else {
            return Err(InvalidRequest::new(
                Value::Null,
                "Invalid parameter \"/\": an array or object is expected.",
            ));
        };

        let id = object.remove("id");
        let echo = id.clone().unwrap_or(Value::Null);

        match object.get("jsonrpc") {
            Some(Value::String(version)) if version == "2.0" => {}
            _ => {
                return Err(InvalidRequest::new(
                    echo,
                    "Invalid parameter \"/jsonrpc\": value must be \"2.0\".",
                ));
            }
        }

        let Some(Value::String(full_method)) = object.get("method") else {
            return Err(InvalidRequest::new(
                echo,
                "Invalid parameter \"/method\": a character string is expected.",
            ));
        };
        let Some((api, method)) = full_method
            .split_once('.')
            .filter(|(api, method)| !api.is_empty() && !method.is_empty())
        else {
            return Err(InvalidRequest::new(
                echo,
                "Invalid parameter \"/method\": a value of the form \"<api>.<method>\" is expected.",
            ));
        };
        let (api, method) = (api.to_owned(), method.to_owned());

        let params = match object.remove("params") {
            None | Some(Value::Null) => Params::new(),
            Some(Value::Object(params)) => params,
            Some(_) => {
                return Err(InvalidRequest::new(
                    echo,
                    "Invalid parameter \"/params\": an object is expected.",
                ));
            }
        };

        let auth = match object.remove("auth") {
            None | Some(Value::Null) => None,
            Some(Value::String(token)) => Some(token),
            Some(_) => {
                return Err(InvalidRequest::new(
                    echo,
                    "Invalid parameter \"/auth\": a character string is expected.",
                ));
            }
        };

        Ok(Self {
            id,
            api,
            method,
            params,
            auth,
        })
    }
}
