//! A dispatcher wired to the real services over a fresh store.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use apigate_core::{Dispatcher, Params, RequestContext, ResponseEnvelope, UserType};
use serde_json::Value;

use crate::clock::ManualClock;
use crate::seed::UserSeed;
use crate::store::{MemoryStore, UserRecord};
use crate::user::LoginPolicy;
use crate::service_registry;

pub(crate) const START: u64 = 1_700_000_000;
pub(crate) const CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7));

pub(crate) struct Gateway {
    pub(crate) store: MemoryStore,
    pub(crate) clock: Arc<ManualClock>,
    pub(crate) dispatcher: Dispatcher,
}

impl Gateway {
    pub(crate) fn new(policy: LoginPolicy) -> Self {
        let store = MemoryStore::new();
        store
            .seed_users([
                UserSeed::default_admin(),
                seed("operator", "ops", UserType::Admin, false),
                seed("guest", "guest", UserType::User, false),
                seed("tracer", "tracer", UserType::Admin, true),
            ])
            .expect("seed accounts");
        let clock = Arc::new(ManualClock::new(START));
        let dispatcher = Dispatcher::new(service_registry("7.0.0", policy, clock.clone()));
        Self {
            store,
            clock,
            dispatcher,
        }
    }

    /// Dispatches one call in its own request, as the transport does.
    pub(crate) fn call(
        &self,
        api: &str,
        method: &str,
        params: Value,
        auth: Option<&str>,
    ) -> ResponseEnvelope {
        let request = RequestContext::new(self.store.session()).with_client_address(Some(CLIENT));
        self.dispatcher
            .call_method(&request, api, method, object(params), auth)
    }

    pub(crate) fn login(&self, username: &str, password: &str) -> ResponseEnvelope {
        self.call(
            "user",
            "login",
            serde_json::json!({"username": username, "password": password}),
            None,
        )
    }

    /// Logs in and returns the session id.
    pub(crate) fn session(&self, username: &str, password: &str) -> String {
        let envelope = self.login(username, password);
        match envelope.data() {
            Some(Value::String(sessionid)) => sessionid.clone(),
            _ => panic!("login as {username} failed: {envelope:?}"),
        }
    }

    pub(crate) fn user(&self, username: &str) -> UserRecord {
        self.store.with_state(|state| {
            state
                .user_by_name(username)
                .cloned()
                .unwrap_or_else(|| panic!("no user {username}"))
        })
    }
}

fn seed(username: &str, password: &str, user_type: UserType, debug_mode: bool) -> UserSeed {
    UserSeed {
        username: username.to_owned(),
        password: password.to_owned(),
        user_type,
        name: None,
        debug_mode,
        enabled: true,
        autologout: 0,
    }
}

pub(crate) fn object(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub(crate) fn strip_quotes(value: &str) -> &str {
    value.trim_matches('"')
}
