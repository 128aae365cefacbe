//! Services and storage doubles shared by the dispatcher test suites.

use std::sync::{Arc, Mutex, PoisonError};

use mockall::mock;
use serde_json::{Value, json};

use crate::auth::{AccessRule, UserType};
use crate::dispatcher::{Dispatcher, RequestContext};
use crate::envelope::ResponseEnvelope;
use crate::error::{ApiError, InternalError, ServiceError};
use crate::registry::ServiceRegistry;
use crate::service::{CallContext, Params, Service};
use crate::transaction::TransactionBackend;

pub(crate) const ADMIN_TOKEN: &str = "admin-token";
pub(crate) const DEBUG_TOKEN: &str = "debug-token";
pub(crate) const GUEST_TOKEN: &str = "guest-token";
pub(crate) const LOGIN_FAILURE: &str =
    "Incorrect user name or password or account is temporarily blocked.";

/// Ordered record of everything the doubles observed.
#[derive(Debug, Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub(crate) fn record(&self, event: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.into());
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|seen| *seen == event).count()
    }

    pub(crate) fn mentions(&self, prefix: &str) -> bool {
        self.events().iter().any(|seen| seen.starts_with(prefix))
    }
}

mock! {
    pub(crate) Backend {}
    impl TransactionBackend for Backend {
        fn begin(&self) -> Result<(), ServiceError>;
        fn commit(&self) -> Result<(), ServiceError>;
        fn rollback(&self) -> Result<(), ServiceError>;
    }
}

/// Transaction backend that only journals its calls.
pub(crate) struct RecordingBackend {
    journal: Journal,
}

impl TransactionBackend for RecordingBackend {
    fn begin(&self) -> Result<(), ServiceError> {
        self.journal.record("begin");
        Ok(())
    }

    fn commit(&self) -> Result<(), ServiceError> {
        self.journal.record("commit");
        Ok(())
    }

    fn rollback(&self) -> Result<(), ServiceError> {
        self.journal.record("rollback");
        Ok(())
    }
}

struct ApiInfo;

impl Service for ApiInfo {
    fn methods(&self) -> &[&'static str] {
        &["version"]
    }

    fn call(&self, _: &CallContext<'_>, _: &str, _: Params) -> Result<Value, ServiceError> {
        Ok(json!("5.0"))
    }
}

struct Users {
    journal: Journal,
}

impl Users {
    fn identity(token: &str) -> Option<Value> {
        let (userid, username, user_type, debug_mode) = match token {
            ADMIN_TOKEN => ("1", "Admin", "super_admin", false),
            DEBUG_TOKEN => ("2", "Debugger", "super_admin", true),
            GUEST_TOKEN => ("3", "guest", "user", false),
            _ => return None,
        };
        Some(json!({
            "userid": userid,
            "username": username,
            "type": user_type,
            "debug_mode": debug_mode,
            "sessionid": token
        }))
    }
}

impl Service for Users {
    fn methods(&self) -> &[&'static str] {
        &["login", "checkauthentication", "logout"]
    }

    fn call(
        &self,
        _: &CallContext<'_>,
        method: &str,
        params: Params,
    ) -> Result<Value, ServiceError> {
        match method {
            "login" => {
                if params.get("password") == Some(&json!("zabbix")) {
                    Ok(json!(ADMIN_TOKEN))
                } else {
                    self.journal.record("login attempt failed");
                    Err(ApiError::permissions(LOGIN_FAILURE).into())
                }
            }
            "checkauthentication" => {
                self.journal.record("checkauthentication");
                params
                    .get("sessionid")
                    .and_then(Value::as_str)
                    .and_then(Self::identity)
                    .ok_or_else(|| {
                        ApiError::invalid_parameters("Session terminated, re-login, please.")
                            .into()
                    })
            }
            _ => Ok(json!(true)),
        }
    }
}

struct Hosts {
    journal: Journal,
}

impl Service for Hosts {
    fn methods(&self) -> &[&'static str] {
        &["get", "create", "reject", "fail", "crash", "nested", "purge"]
    }

    fn access_rule(&self, method: &str) -> AccessRule {
        match method {
            "purge" => AccessRule::at_least(UserType::SuperAdmin),
            _ => AccessRule::ANY_USER,
        }
    }

    fn call(
        &self,
        ctx: &CallContext<'_>,
        method: &str,
        params: Params,
    ) -> Result<Value, ServiceError> {
        self.journal
            .record(format!("host.{method} {}", Value::Object(params.clone())));
        match method {
            "get" => Ok(json!([{"hostid": "1", "host": "web01"}])),
            "create" => Ok(json!({"hostids": ["2"]})),
            "reject" => Err(ApiError::invalid_parameters("No such host").into()),
            "fail" => Err(InternalError::new("disk full").into()),
            "crash" => panic!("host table missing"),
            "nested" => {
                let token = ctx
                    .identity()
                    .and_then(|identity| identity.sessionid.as_deref());
                self.journal.record(format!(
                    "outer sees open transaction: {}",
                    ctx.request().transactions().is_open()
                ));
                let inner = ctx.invoke("host", "create", Params::new(), token);
                self.journal.record(format!(
                    "inner returned, transaction still open: {}",
                    ctx.request().transactions().is_open()
                ));
                if params.get("fail_after") == Some(&json!(true)) {
                    return Err(ApiError::invalid_parameters("Nested call aborted.").into());
                }
                inner.into_result().map_err(ServiceError::from)
            }
            _ => Ok(json!({"purged": true})),
        }
    }
}

/// A dispatcher wired to the doubles above, plus the journal they share.
pub(crate) struct Harness {
    pub(crate) journal: Journal,
    pub(crate) dispatcher: Arc<Dispatcher>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let journal = Journal::default();
        let registry = ServiceRegistry::builder()
            .register("apiinfo", ApiInfo)
            .register(
                "user",
                Users {
                    journal: journal.clone(),
                },
            )
            .register(
                "host",
                Hosts {
                    journal: journal.clone(),
                },
            )
            .build();
        Self {
            journal,
            dispatcher: Arc::new(Dispatcher::new(registry)),
        }
    }

    pub(crate) fn request(&self) -> RequestContext {
        RequestContext::new(RecordingBackend {
            journal: self.journal.clone(),
        })
    }

    pub(crate) fn call(
        &self,
        api: &str,
        method: &str,
        params: Value,
        auth: Option<&str>,
    ) -> ResponseEnvelope {
        let request = self.request();
        self.dispatcher
            .call_method(&request, api, method, object(params), auth)
    }
}

pub(crate) fn object(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        Value::Null => Params::new(),
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub(crate) fn strip_quotes(value: &str) -> &str {
    value.trim_matches('"')
}
