//! Test suites for call dispatch.

mod jsonrpc_behaviour;
pub(crate) mod support;
