//! Caller authentication and method access rules.
//!
//! Authentication is delegated to the `user` service's
//! `checkauthentication` method, so the session store lives with the rest of
//! the user data rather than inside the dispatcher.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::dispatcher::DISPATCH_TARGET;
use crate::error::{ApiError, ServiceError};
use crate::service::{CallContext, Params};

/// Namespace of the service that owns sessions.
pub const USER_SERVICE: &str = "user";

/// Method used to resolve a session token into an [`Identity`].
pub const CHECK_AUTHENTICATION_METHOD: &str = "checkauthentication";

/// Methods callable without a session token, as `(namespace, method)`.
///
/// These methods reject a token if one is supplied.
pub const UNAUTHENTICATED_METHODS: [(&str, &str); 3] = [
    ("user", "login"),
    ("user", CHECK_AUTHENTICATION_METHOD),
    ("apiinfo", "version"),
];

/// Returns `true` unless the method is on the unauthenticated allow-list.
///
/// Both names are compared case-insensitively.
#[must_use]
pub fn requires_authentication(namespace: &str, method: &str) -> bool {
    !UNAUTHENTICATED_METHODS.iter().any(|(allowed_ns, allowed_method)| {
        namespace.eq_ignore_ascii_case(allowed_ns) && method.eq_ignore_ascii_case(allowed_method)
    })
}

/// Privilege level of an account, ordered from least to most privileged.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    /// Regular user.
    #[default]
    User,
    /// Administrator.
    Admin,
    /// Super administrator.
    SuperAdmin,
}

/// Who is making a call, as resolved from a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Account identifier.
    pub userid: String,
    /// Login name.
    pub username: String,
    /// Privilege level.
    #[serde(rename = "type", default)]
    pub user_type: UserType,
    /// Whether failures should include debug details.
    #[serde(default)]
    pub debug_mode: bool,
    /// Session the identity was resolved from.
    #[serde(default)]
    pub sessionid: Option<String>,
}

/// Minimum privileges required to call a method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessRule {
    min_user_type: UserType,
}

impl AccessRule {
    /// Allows any authenticated caller.
    pub const ANY_USER: Self = Self::at_least(UserType::User);

    /// Requires at least `user_type`.
    #[must_use]
    pub const fn at_least(user_type: UserType) -> Self {
        Self {
            min_user_type: user_type,
        }
    }

    /// Returns `true` when `identity` satisfies the rule.
    #[must_use]
    pub fn allows(&self, identity: &Identity) -> bool {
        identity.user_type >= self.min_user_type
    }
}

/// Resolves session tokens into identities.
#[derive(Debug, Default, Clone, Copy)]
pub struct Authenticator;

impl Authenticator {
    /// Creates an authenticator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Resolves `token` into the caller's [`Identity`].
    ///
    /// # Errors
    ///
    /// Returns a not-authorised failure when the token is absent or empty,
    /// and otherwise whatever failure the session check reports.
    pub fn authenticate(
        &self,
        ctx: &CallContext<'_>,
        token: Option<&str>,
    ) -> Result<Identity, ServiceError> {
        let Some(token) = token.filter(|token| !token.is_empty()) else {
            return Err(ApiError::not_authorized("Not authorized.").into());
        };

        let service = ctx.dispatcher().registry().get_service(USER_SERVICE)?;
        let mut params = Params::new();
        params.insert("sessionid".to_owned(), Value::String(token.to_owned()));
        let user = service.call(ctx, CHECK_AUTHENTICATION_METHOD, params)?;
        let identity: Identity = serde_json::from_value(user)?;

        debug!(
            target: DISPATCH_TARGET,
            userid = %identity.userid,
            "session authenticated"
        );
        Ok(identity)
    }
}
