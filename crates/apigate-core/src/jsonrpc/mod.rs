//! JSON-RPC 2.0 adapter in front of the [`Dispatcher`].
//!
//! The adapter decodes a request body, runs every call it contains through
//! the dispatcher, and encodes the envelopes as JSON-RPC responses. All calls
//! in one body, batch members included, share one [`RequestContext`].
//! Requests without an `id` are notifications: they run, but produce no
//! response.

mod request;
mod response;

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

pub use self::request::{InvalidRequest, JsonRpcCall, RequestBody};
pub use self::response::{JSONRPC_VERSION, JsonRpcError, JsonRpcReply, JsonRpcResponse};
use crate::dispatcher::{Dispatcher, RequestContext};

/// Tracing target for wire-level events.
const JSONRPC_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::jsonrpc");

/// Serves JSON-RPC request bodies.
#[derive(Debug, Clone)]
pub struct JsonRpcEndpoint {
    dispatcher: Arc<Dispatcher>,
}

impl JsonRpcEndpoint {
    /// Creates an endpoint dispatching through `dispatcher`.
    #[must_use]
    pub const fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// The dispatcher behind this endpoint.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handles one raw body.
    ///
    /// Returns `None` when nothing should be written back, which happens when
    /// the body held only notifications.
    #[must_use]
    pub fn handle(&self, request: &RequestContext, body: &[u8]) -> Option<JsonRpcReply> {
        match RequestBody::parse(body) {
            Ok(body) => self.handle_body(request, body),
            Err(error) => {
                debug!(target: JSONRPC_TARGET, code = error.code, "rejected request body");
                Some(JsonRpcReply::Single(JsonRpcResponse::error(
                    Value::Null,
                    error,
                )))
            }
        }
    }

    /// Handles an already decoded body.
    #[must_use]
    pub fn handle_body(&self, request: &RequestContext, body: RequestBody) -> Option<JsonRpcReply> {
        match body {
            RequestBody::Single(value) => self
                .handle_value(request, value)
                .map(JsonRpcReply::Single),
            RequestBody::Batch(members) => {
                let responses: Vec<_> = members
                    .into_iter()
                    .filter_map(|member| self.handle_value(request, member))
                    .collect();
                (!responses.is_empty()).then_some(JsonRpcReply::Batch(responses))
            }
        }
    }

    fn handle_value(&self, request: &RequestContext, value: Value) -> Option<JsonRpcResponse> {
        let call = match JsonRpcCall::from_value(value) {
            Ok(call) => call,
            Err(InvalidRequest { id, reason }) => {
                debug!(target: JSONRPC_TARGET, %reason, "rejected request member");
                return Some(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_request(reason),
                ));
            }
        };

        let envelope = self.dispatcher.call_method(
            request,
            &call.api,
            &call.method,
            call.params,
            call.auth.as_deref(),
        );
        call.id
            .map(|id| JsonRpcResponse::from_envelope(id, envelope))
    }
}
