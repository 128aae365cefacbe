//! Executes one `namespace.method` call from validation to response.
//!
//! A call passes through validation, authentication, permission checks, and
//! transaction handling before the service runs. Every outcome, including a
//! panic inside the service, is reported as a [`ResponseEnvelope`]; the
//! dispatcher never returns an error to its caller.

use std::cell::RefCell;
use std::net::IpAddr;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::{Authenticator, Identity, requires_authentication};
use crate::capture::CaptureScope;
use crate::envelope::{DebugInfo, ResponseEnvelope};
use crate::error::{ApiError, ErrorCode, INTERNAL_ERROR_MESSAGE, ServiceError};
use crate::registry::ServiceRegistry;
use crate::service::{CallContext, Params};
use crate::transaction::{OwnedTransaction, TransactionBackend, TransactionCoordinator};
use crate::validator::MethodValidator;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Parameter stripped from every call before it reaches a service.
const NO_PERMISSIONS_PARAM: &str = "nopermissions";

/// State shared by every call made while serving one request.
///
/// A request context is confined to the thread serving the request.
#[derive(Debug)]
pub struct RequestContext {
    transactions: TransactionCoordinator,
    client_address: Option<IpAddr>,
    frames: RefCell<Vec<String>>,
}

impl RequestContext {
    /// Creates a context whose calls run against `backend`.
    #[must_use]
    pub fn new(backend: impl TransactionBackend) -> Self {
        Self {
            transactions: TransactionCoordinator::new(backend),
            client_address: None,
            frames: RefCell::new(Vec::new()),
        }
    }

    /// Records the address of the remote client.
    #[must_use]
    pub fn with_client_address(mut self, address: Option<IpAddr>) -> Self {
        self.client_address = address;
        self
    }

    /// The request's transaction coordinator.
    #[must_use]
    pub const fn transactions(&self) -> &TransactionCoordinator {
        &self.transactions
    }

    /// Address of the remote client, when the transport has one.
    #[must_use]
    pub const fn client_address(&self) -> Option<IpAddr> {
        self.client_address
    }

    /// Calls currently in progress, innermost first.
    #[must_use]
    pub fn active_calls(&self) -> Vec<String> {
        self.frames.borrow().iter().rev().cloned().collect()
    }

    fn enter_call(&self, api: &str, method: &str) -> CallFrame<'_> {
        self.frames.borrow_mut().push(format!("{api}.{method}"));
        CallFrame { request: self }
    }
}

struct CallFrame<'a> {
    request: &'a RequestContext,
}

impl Drop for CallFrame<'_> {
    fn drop(&mut self) {
        self.request.frames.borrow_mut().pop();
    }
}

/// Names of the call being dispatched, as given and lower-cased.
struct Call<'a> {
    api: &'a str,
    method: &'a str,
    api_key: String,
    method_key: String,
}

impl Call<'_> {
    fn keeps_failed_effects(&self) -> bool {
        self.api_key == "user" && self.method_key == "login"
    }
}

/// State accumulated while a call runs.
#[derive(Default)]
struct Execution<'r> {
    identity: Option<Identity>,
    transaction: Option<OwnedTransaction<'r>>,
}

/// Routes calls to registered services.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ServiceRegistry>,
    authenticator: Authenticator,
}

impl Dispatcher {
    /// Creates a dispatcher over `registry`.
    #[must_use]
    pub fn new(registry: ServiceRegistry) -> Self {
        Self::from_shared(Arc::new(registry))
    }

    /// Creates a dispatcher over an already shared registry.
    #[must_use]
    pub fn from_shared(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            authenticator: Authenticator::new(),
        }
    }

    /// The registry this dispatcher routes to.
    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Executes `api.method` with `params` on behalf of the holder of `auth`.
    ///
    /// Calls made while another call of the same request is running join its
    /// transaction; the outermost call alone commits or rolls back.
    #[must_use]
    pub fn call_method(
        &self,
        request: &RequestContext,
        api: &str,
        method: &str,
        params: Params,
        auth: Option<&str>,
    ) -> ResponseEnvelope {
        let call = Call {
            api,
            method,
            api_key: api.to_ascii_lowercase(),
            method_key: method.to_ascii_lowercase(),
        };
        debug!(target: DISPATCH_TARGET, api, method, "dispatching call");

        if let Err(error) = self.validate(&call, auth) {
            debug!(
                target: DISPATCH_TARGET,
                api,
                method,
                reason = error.message(),
                "call rejected"
            );
            return error.into();
        }

        let scope = CaptureScope::enter();
        let _frame = request.enter_call(api, method);
        let mut execution = Execution::default();
        let outcome = self.execute(&scope, request, &call, params, auth, &mut execution);

        match outcome {
            Ok(data) => match execution.transaction.take().map(OwnedTransaction::commit) {
                Some(Err(error)) => {
                    self.failure(error, &call, execution.identity.as_ref(), request)
                }
                _ => ResponseEnvelope::success(data),
            },
            Err(error) => {
                if let Some(transaction) = execution.transaction.take() {
                    let commit = call.keeps_failed_effects();
                    if let Err(end_error) = transaction.end(commit) {
                        warn!(
                            target: DISPATCH_TARGET,
                            api,
                            method,
                            error = %end_error,
                            "failed to end transaction after a failed call"
                        );
                    }
                }
                self.failure(error, &call, execution.identity.as_ref(), request)
            }
        }
    }

    fn validate(&self, call: &Call<'_>, auth: Option<&str>) -> Result<(), ApiError> {
        if !self.registry.has_service(&call.api_key) {
            return Err(ApiError::invalid_parameters(format!(
                "Incorrect API \"{}\".",
                call.api
            )));
        }
        if !MethodValidator::new(&self.registry).is_valid_method(&call.api_key, &call.method_key) {
            return Err(ApiError::invalid_parameters(format!(
                "Incorrect method \"{}.{}\".",
                call.api, call.method
            )));
        }
        if auth.is_some() && !requires_authentication(&call.api_key, &call.method_key) {
            return Err(ApiError::invalid_parameters(format!(
                "The \"{}.{}\" method must be called without the \"auth\" parameter.",
                call.api, call.method
            )));
        }
        Ok(())
    }

    fn execute<'r>(
        &self,
        scope: &CaptureScope,
        request: &'r RequestContext,
        call: &Call<'_>,
        mut params: Params,
        auth: Option<&str>,
        execution: &mut Execution<'r>,
    ) -> Result<Value, ServiceError> {
        let service = self.registry.get_service(&call.api_key)?;

        if requires_authentication(&call.api_key, &call.method_key) {
            let ctx = CallContext::new(self, request, None);
            let identity = scope.call(|| self.authenticator.authenticate(&ctx, auth))?;
            let identity = execution.identity.insert(identity);
            if !service.access_rule(&call.method_key).allows(identity) {
                return Err(ApiError::permissions(format!(
                    "No permissions to call \"{}.{}\".",
                    call.api, call.method
                ))
                .into());
            }
        }

        params.remove(NO_PERMISSIONS_PARAM);
        execution.transaction = request.transactions().begin_owned()?;

        let ctx = CallContext::new(self, request, execution.identity.as_ref());
        scope.call(|| service.call(&ctx, &call.method_key, params))
    }

    fn failure(
        &self,
        error: ServiceError,
        call: &Call<'_>,
        identity: Option<&Identity>,
        request: &RequestContext,
    ) -> ResponseEnvelope {
        let debug_mode = identity.is_some_and(|identity| identity.debug_mode);
        match error {
            ServiceError::Api(error) => {
                info!(
                    target: DISPATCH_TARGET,
                    api = call.api,
                    method = call.method,
                    code = error.code().as_i32(),
                    reason = error.message(),
                    "call failed"
                );
                let debug = debug_mode
                    .then(|| DebugInfo::new(error.message(), request.active_calls()));
                ResponseEnvelope::failure(error.code(), error.message(), debug)
            }
            ServiceError::Internal(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    api = call.api,
                    method = call.method,
                    error = %error,
                    "call failed unexpectedly"
                );
                let debug = debug_mode.then(|| {
                    let (message, mut trace) = error.into_parts();
                    trace.extend(request.active_calls());
                    DebugInfo::new(message, trace)
                });
                ResponseEnvelope::failure(ErrorCode::Internal, INTERNAL_ERROR_MESSAGE, debug)
            }
        }
    }
}
