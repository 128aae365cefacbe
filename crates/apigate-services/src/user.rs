//! The `user` namespace: logins, sessions and account lookups.

use std::sync::Arc;

use apigate_core::{
    AccessRule, ApiError, CallContext, Params, Service, ServiceError, UserType, parse_params,
    to_data,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::store::{
    SessionRecord, SessionStatus, StoreSession, StoreState, UserRecord, id_as_string,
    new_session_id,
};
use crate::{NO_OBJECT_MESSAGE, parse_ids};

const USER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::user");

/// Message for every rejected login, whatever the reason.
pub const LOGIN_FAILED_MESSAGE: &str =
    "Incorrect user name or password or account is temporarily blocked.";

/// Message for unusable sessions.
pub const SESSION_TERMINATED_MESSAGE: &str = "Session terminated, re-login, please.";

/// Message for disabled accounts.
pub const NO_SYSTEM_ACCESS_MESSAGE: &str = "No permissions for system access.";

/// Failed-login limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginPolicy {
    /// Failed logins tolerated before the account is blocked; `0` never
    /// blocks.
    pub attempts: u32,
    /// Length of the block, in seconds.
    pub block_secs: u64,
}

impl Default for LoginPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            block_secs: 30,
        }
    }
}

impl LoginPolicy {
    fn blocks(&self, user: &UserRecord, now: u64) -> bool {
        self.attempts > 0
            && user.attempt_failed >= self.attempts
            && now.saturating_sub(user.attempt_clock) < self.block_secs
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoginRequest {
    #[serde(alias = "user")]
    username: String,
    password: String,
    #[serde(default, rename = "userData")]
    user_data: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CheckAuthenticationRequest {
    sessionid: String,
    #[serde(default = "extend_by_default")]
    extend: bool,
}

const fn extend_by_default() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GetRequest {
    #[serde(default)]
    userids: Option<Vec<String>>,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnblockRequest {
    userids: Vec<String>,
}

/// A user as returned to callers; never carries password material.
#[derive(Debug, Clone, Serialize)]
struct UserView {
    #[serde(serialize_with = "id_as_string")]
    userid: u64,
    username: String,
    name: String,
    #[serde(rename = "type")]
    user_type: UserType,
    debug_mode: bool,
    autologout: u64,
    attempt_failed: u32,
    attempt_clock: u64,
    attempt_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sessionid: Option<String>,
}

impl UserView {
    fn new(user: &UserRecord, sessionid: Option<&str>) -> Self {
        Self {
            userid: user.userid,
            username: user.username.clone(),
            name: user.name.clone(),
            user_type: user.user_type,
            debug_mode: user.debug_mode,
            autologout: user.autologout,
            attempt_failed: user.attempt_failed,
            attempt_clock: user.attempt_clock,
            attempt_ip: user.attempt_ip.clone(),
            sessionid: sessionid.map(str::to_owned),
        }
    }
}

fn login_failed() -> ServiceError {
    ApiError::permissions(LOGIN_FAILED_MESSAGE).into()
}

fn session_terminated() -> ServiceError {
    ApiError::invalid_parameters(SESSION_TERMINATED_MESSAGE).into()
}

/// Accounts and sessions.
pub struct UserService {
    policy: LoginPolicy,
    clock: Arc<dyn Clock>,
}

impl UserService {
    /// Creates the service.
    #[must_use]
    pub const fn new(policy: LoginPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock }
    }

    fn login(&self, ctx: &CallContext<'_>, params: Params) -> Result<Value, ServiceError> {
        let request: LoginRequest = parse_params(params)?;
        let store = ctx.backend::<StoreSession>()?;
        let now = self.clock.now();
        let client = ctx
            .request()
            .client_address()
            .map(|address| address.to_string())
            .unwrap_or_default();

        let (view, sessionid) =
            store.with_state(|state| self.open_session(state, &request, now, &client))?;
        info!(target: USER_TARGET, username = %request.username, "user logged in");

        if request.user_data {
            to_data(&view)
        } else {
            Ok(Value::String(sessionid))
        }
    }

    fn open_session(
        &self,
        state: &mut StoreState,
        request: &LoginRequest,
        now: u64,
        client: &str,
    ) -> Result<(UserView, String), ServiceError> {
        let Some(userid) = state
            .user_by_name(&request.username)
            .map(|user| user.userid)
        else {
            debug!(target: USER_TARGET, username = %request.username, "unknown user");
            return Err(login_failed());
        };
        let Some(user) = state.users.get_mut(&userid) else {
            return Err(login_failed());
        };

        if self.policy.blocks(user, now) {
            info!(target: USER_TARGET, username = %user.username, "login refused, account blocked");
            return Err(login_failed());
        }
        if !user.password.verify(&request.password) {
            user.attempt_failed = user.attempt_failed.saturating_add(1);
            user.attempt_clock = now;
            client.clone_into(&mut user.attempt_ip);
            info!(
                target: USER_TARGET,
                username = %user.username,
                attempts = user.attempt_failed,
                "login failed"
            );
            return Err(login_failed());
        }
        if !user.enabled {
            return Err(ApiError::invalid_parameters(NO_SYSTEM_ACCESS_MESSAGE).into());
        }

        user.attempt_failed = 0;
        let sessionid = new_session_id();
        let view = UserView::new(user, Some(&sessionid));
        state.sessions.insert(
            sessionid.clone(),
            SessionRecord {
                userid,
                lastaccess: now,
                status: SessionStatus::Active,
            },
        );
        Ok((view, sessionid))
    }

    fn check_authentication(
        &self,
        ctx: &CallContext<'_>,
        params: Params,
    ) -> Result<Value, ServiceError> {
        let request: CheckAuthenticationRequest = parse_params(params)?;
        let store = ctx.backend::<StoreSession>()?;
        let now = self.clock.now();

        let view = store.with_state(|state| -> Result<UserView, ServiceError> {
            let session = state
                .sessions
                .get_mut(&request.sessionid)
                .filter(|session| session.status == SessionStatus::Active)
                .ok_or_else(session_terminated)?;
            let user = state
                .users
                .get(&session.userid)
                .filter(|user| user.enabled)
                .ok_or_else(session_terminated)?;

            // the refusal rolls back, so expiry is judged from lastaccess every time
            if user.autologout > 0 && now.saturating_sub(session.lastaccess) >= user.autologout {
                debug!(target: USER_TARGET, userid = user.userid, "session expired");
                return Err(session_terminated());
            }
            if request.extend {
                session.lastaccess = now;
            }
            Ok(UserView::new(user, Some(&request.sessionid)))
        })?;
        to_data(&view)
    }

    fn logout(ctx: &CallContext<'_>, params: Params) -> Result<Value, ServiceError> {
        if !params.is_empty() {
            return Err(ApiError::invalid_parameters(
                "Invalid parameter \"/\": unexpected parameter.",
            )
            .into());
        }
        let identity = ctx.require_identity()?;
        let sessionid = identity.sessionid.as_deref().ok_or_else(session_terminated)?;
        let store = ctx.backend::<StoreSession>()?;
        store.with_state(|state| -> Result<(), ServiceError> {
            let session = state
                .sessions
                .get_mut(sessionid)
                .ok_or_else(session_terminated)?;
            session.status = SessionStatus::Passive;
            Ok(())
        })?;
        info!(target: USER_TARGET, userid = %identity.userid, "user logged out");
        Ok(Value::Bool(true))
    }

    fn get(ctx: &CallContext<'_>, params: Params) -> Result<Value, ServiceError> {
        let request: GetRequest = parse_params(params)?;
        let identity = ctx.require_identity()?;
        let wanted = request.userids.as_deref().map(parse_ids).transpose()?;
        let own_only = identity.user_type < UserType::Admin;
        let store = ctx.backend::<StoreSession>()?;

        let views: Vec<UserView> = store.with_state(|state| {
            state
                .users
                .values()
                .filter(|user| !own_only || user.userid.to_string() == identity.userid)
                .filter(|user| wanted.as_ref().is_none_or(|ids| ids.contains(&user.userid)))
                .filter(|user| {
                    request
                        .username
                        .as_ref()
                        .is_none_or(|username| *username == user.username)
                })
                .map(|user| UserView::new(user, None))
                .collect()
        });
        to_data(&views)
    }

    fn unblock(ctx: &CallContext<'_>, params: Params) -> Result<Value, ServiceError> {
        let request: UnblockRequest = parse_params(params)?;
        let ids = parse_ids(&request.userids)?;
        let store = ctx.backend::<StoreSession>()?;
        store.with_state(|state| -> Result<(), ServiceError> {
            if !ids.iter().all(|id| state.users.contains_key(id)) {
                return Err(ApiError::permissions(NO_OBJECT_MESSAGE).into());
            }
            for user in state
                .users
                .values_mut()
                .filter(|user| ids.contains(&user.userid))
            {
                user.attempt_failed = 0;
                user.attempt_clock = 0;
                user.attempt_ip.clear();
            }
            Ok(())
        })?;
        Ok(json!({ "userids": request.userids }))
    }
}

impl Service for UserService {
    fn methods(&self) -> &[&'static str] {
        &["login", "checkauthentication", "logout", "get", "unblock"]
    }

    fn access_rule(&self, method: &str) -> AccessRule {
        match method {
            "unblock" => AccessRule::at_least(UserType::SuperAdmin),
            _ => AccessRule::ANY_USER,
        }
    }

    fn call(
        &self,
        ctx: &CallContext<'_>,
        method: &str,
        params: Params,
    ) -> Result<Value, ServiceError> {
        match method {
            "login" => self.login(ctx, params),
            "checkauthentication" => self.check_authentication(ctx, params),
            "logout" => Self::logout(ctx, params),
            "get" => Self::get(ctx, params),
            "unblock" => Self::unblock(ctx, params),
            other => Err(ApiError::no_method(format!("Incorrect method \"user.{other}\".")).into()),
        }
    }
}
