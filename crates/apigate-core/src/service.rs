//! The contract implemented by every API namespace.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::auth::{AccessRule, Identity};
use crate::dispatcher::{Dispatcher, RequestContext};
use crate::envelope::ResponseEnvelope;
use crate::error::{ApiError, ServiceError};
use crate::transaction::TransactionBackend;

/// Named parameters of a call.
pub type Params = Map<String, Value>;

/// A named group of callable methods, such as `user` or `host`.
///
/// Services are shared across connections, so implementations keep per-call
/// state in the [`CallContext`] rather than in `self`.
pub trait Service: Send + Sync {
    /// Lower-case names of the methods this service exposes.
    fn methods(&self) -> &[&'static str];

    /// Minimum privileges required to call `method`.
    ///
    /// Only consulted for methods that require authentication.
    fn access_rule(&self, _method: &str) -> AccessRule {
        AccessRule::default()
    }

    /// Executes `method`, which is one of [`Service::methods`].
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`] describing why the call failed.
    fn call(&self, ctx: &CallContext<'_>, method: &str, params: Params)
    -> Result<Value, ServiceError>;
}

/// Everything a service method may consult while running.
pub struct CallContext<'a> {
    dispatcher: &'a Dispatcher,
    request: &'a RequestContext,
    identity: Option<&'a Identity>,
}

impl<'a> CallContext<'a> {
    pub(crate) const fn new(
        dispatcher: &'a Dispatcher,
        request: &'a RequestContext,
        identity: Option<&'a Identity>,
    ) -> Self {
        Self {
            dispatcher,
            request,
            identity,
        }
    }

    pub(crate) const fn dispatcher(&self) -> &'a Dispatcher {
        self.dispatcher
    }

    /// Caller identity, absent for methods that skip authentication.
    #[must_use]
    pub const fn identity(&self) -> Option<&'a Identity> {
        self.identity
    }

    /// Request-scoped state shared by every call within one request.
    #[must_use]
    pub const fn request(&self) -> &'a RequestContext {
        self.request
    }

    /// The caller identity, or a not-authorised failure.
    ///
    /// # Errors
    ///
    /// Fails when the method was called without authentication.
    pub fn require_identity(&self) -> Result<&'a Identity, ServiceError> {
        self.identity
            .ok_or_else(|| ApiError::not_authorized("Not authorized.").into())
    }

    /// Returns the request's storage backend as its concrete type.
    ///
    /// # Errors
    ///
    /// Fails with an internal error when the backend is of another type.
    pub fn backend<B: TransactionBackend>(&self) -> Result<&'a B, ServiceError> {
        self.request.transactions().backend::<B>().ok_or_else(|| {
            ServiceError::internal(format!(
                "request storage is not a {}",
                std::any::type_name::<B>()
            ))
        })
    }

    /// Dispatches a nested call within the same request.
    ///
    /// Nested calls share the request's transaction: they never open or close
    /// one of their own while an outer call holds it.
    pub fn invoke(
        &self,
        api: &str,
        method: &str,
        params: Params,
        auth: Option<&str>,
    ) -> ResponseEnvelope {
        self.dispatcher
            .call_method(self.request, api, method, params, auth)
    }
}

/// Deserialises call parameters into a typed request.
///
/// # Errors
///
/// Returns an invalid-parameters failure describing the first mismatch.
pub fn parse_params<T: DeserializeOwned>(params: Params) -> Result<T, ServiceError> {
    serde_json::from_value(Value::Object(params)).map_err(|error| {
        ApiError::invalid_parameters(format!("Invalid parameter \"/\": {error}.")).into()
    })
}

/// Serialises a service result.
///
/// # Errors
///
/// Returns an internal failure when the value cannot be represented as JSON.
pub fn to_data<T: Serialize>(value: &T) -> Result<Value, ServiceError> {
    Ok(serde_json::to_value(value)?)
}
