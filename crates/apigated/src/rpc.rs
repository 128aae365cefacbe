//! Newline-delimited JSON-RPC over accepted connections.
//!
//! Each line a client sends is one request body: a single call or a batch.
//! Each body runs in its own [`RequestContext`] over a fresh store session
//! and gets at most one response line back. A line longer than the
//! configured limit is discarded and answered with an invalid-request error,
//! after which the connection is closed.

use std::io::{self, BufRead, BufReader, Read, Write};

use apigate_core::jsonrpc::{JsonRpcError, JsonRpcReply, JsonRpcResponse};
use apigate_core::{JsonRpcEndpoint, RequestContext};
use apigate_services::MemoryStore;
use serde_json::Value;
use tracing::{debug, warn};

use crate::transport::{ConnectionHandler, ConnectionStream};

const RPC_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::rpc");

/// Serves JSON-RPC request lines against the shared store.
#[derive(Debug, Clone)]
pub(crate) struct RpcConnectionHandler {
    endpoint: JsonRpcEndpoint,
    store: MemoryStore,
    max_request_bytes: usize,
}

#[derive(Debug, PartialEq, Eq)]
enum Line {
    Body(Vec<u8>),
    Oversized,
    Closed,
}

impl RpcConnectionHandler {
    pub(crate) fn new(
        endpoint: JsonRpcEndpoint,
        store: MemoryStore,
        max_request_bytes: usize,
    ) -> Self {
        Self {
            endpoint,
            store,
            max_request_bytes,
        }
    }

    fn serve(&self, stream: ConnectionStream) -> io::Result<()> {
        let client_address = stream.peer_address();
        let mut reader = BufReader::new(stream);
        loop {
            match read_line(&mut reader, self.max_request_bytes)? {
                Line::Closed => return Ok(()),
                Line::Oversized => {
                    // consume the remainder of the line before closing
                    reader.skip_until(b'\n')?;
                    warn!(
                        target: RPC_TARGET,
                        limit = self.max_request_bytes,
                        "request exceeds maximum size, closing connection"
                    );
                    let error = JsonRpcError::invalid_request(format!(
                        "Request exceeds the maximum size of {} bytes.",
                        self.max_request_bytes
                    ));
                    let reply = JsonRpcReply::Single(JsonRpcResponse::error(Value::Null, error));
                    return write_reply(reader.get_mut(), &reply);
                }
                Line::Body(body) => {
                    if body.trim_ascii().is_empty() {
                        continue;
                    }
                    let request = RequestContext::new(self.store.session())
                        .with_client_address(client_address);
                    if let Some(reply) = self.endpoint.handle(&request, &body) {
                        write_reply(reader.get_mut(), &reply)?;
                    }
                }
            }
        }
    }
}

impl ConnectionHandler for RpcConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        match self.serve(stream) {
            Ok(()) => debug!(target: RPC_TARGET, "connection closed"),
            Err(error) => warn!(
                target: RPC_TARGET,
                error = %error,
                "connection handler error"
            ),
        }
    }
}

/// Reads one line, without its terminator, of at most `limit` bytes.
fn read_line(reader: &mut impl BufRead, limit: usize) -> io::Result<Line> {
    let mut line = Vec::new();
    let budget = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let read = reader.by_ref().take(budget).read_until(b'\n', &mut line)?;
    if read == 0 {
        return Ok(Line::Closed);
    }
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.len() > limit {
        return Ok(Line::Oversized);
    }
    Ok(Line::Body(line))
}

fn write_reply(stream: &mut impl Write, reply: &JsonRpcReply) -> io::Result<()> {
    let mut encoded = serde_json::to_vec(reply)?;
    encoded.push(b'\n');
    stream.write_all(&encoded)?;
    stream.flush()
}
