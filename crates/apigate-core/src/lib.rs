//! Call routing core for the apigate JSON-RPC gateway.
//!
//! A call names a service namespace and a method (`host.get`), carries named
//! parameters, and optionally a session token. The [`Dispatcher`] validates
//! the call against the [`ServiceRegistry`], authenticates the caller,
//! enforces per-method access rules, brackets the call in a request-scoped
//! transaction, and folds every outcome into a [`ResponseEnvelope`]. The
//! [`jsonrpc`] module adapts envelopes to the JSON-RPC 2.0 wire format.

pub mod auth;
pub mod capture;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod jsonrpc;
pub mod registry;
pub mod service;
pub mod transaction;
pub mod validator;

pub use auth::{AccessRule, Authenticator, Identity, UserType, requires_authentication};
pub use dispatcher::{Dispatcher, RequestContext};
pub use envelope::{DebugInfo, ResponseEnvelope};
pub use error::{ApiError, ErrorCode, INTERNAL_ERROR_MESSAGE, InternalError, ServiceError};
pub use jsonrpc::JsonRpcEndpoint;
pub use registry::{RegistryError, ServiceRegistry, ServiceRegistryBuilder};
pub use service::{CallContext, Params, Service, parse_params, to_data};
pub use transaction::{NoopBackend, OwnedTransaction, TransactionBackend, TransactionCoordinator};
pub use validator::MethodValidator;

#[cfg(test)]
mod tests;
