//! Initial accounts loaded into the store at start-up.

use std::fs;
use std::io;

use apigate_core::UserType;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;

use crate::store::{MemoryStore, PasswordHash, StoreState, UserRecord};

/// Login name of the account created when no seed file is configured.
pub const DEFAULT_ADMIN_USERNAME: &str = "Admin";

/// Password of the default account.
pub const DEFAULT_ADMIN_PASSWORD: &str = "zabbix";

/// One account as written in a seed file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserSeed {
    /// Login name.
    pub username: String,
    /// Clear-text password, hashed on load.
    pub password: String,
    /// Privilege level.
    #[serde(rename = "type", default)]
    pub user_type: UserType,
    /// Display name; defaults to the login name.
    #[serde(default)]
    pub name: Option<String>,
    /// Whether failures include debug details.
    #[serde(default)]
    pub debug_mode: bool,
    /// Whether the account may log in.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Idle seconds before sessions expire; `0` keeps them alive.
    #[serde(default)]
    pub autologout: u64,
}

const fn enabled_by_default() -> bool {
    true
}

impl UserSeed {
    /// The super administrator created when nothing else is configured.
    #[must_use]
    pub fn default_admin() -> Self {
        Self {
            username: DEFAULT_ADMIN_USERNAME.to_owned(),
            password: DEFAULT_ADMIN_PASSWORD.to_owned(),
            user_type: UserType::SuperAdmin,
            name: Some("Zabbix Administrator".to_owned()),
            debug_mode: false,
            enabled: true,
            autologout: 0,
        }
    }
}

/// Errors raised while loading or applying seed accounts.
#[derive(Debug, Error)]
pub enum SeedError {
    /// The seed file could not be read.
    #[error("failed to read user seed file '{path}': {source}")]
    Read {
        /// File that failed to open.
        path: Utf8PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: io::Error,
    },
    /// The seed file is not a JSON array of accounts.
    #[error("failed to parse user seed file '{path}': {source}")]
    Parse {
        /// File that failed to parse.
        path: Utf8PathBuf,
        /// Underlying decoder error.
        #[source]
        source: serde_json::Error,
    },
    /// An account has an empty login name.
    #[error("seed account has an empty username")]
    EmptyUsername,
    /// Two accounts share a login name.
    #[error("seed account '{username}' is defined more than once")]
    Duplicate {
        /// Login name seen twice.
        username: String,
    },
}

/// Reads seed accounts from a JSON file holding an array of accounts.
///
/// # Errors
///
/// Returns [`SeedError`] when the file cannot be read or decoded.
pub fn load_users(path: &Utf8Path) -> Result<Vec<UserSeed>, SeedError> {
    let contents = fs::read_to_string(path).map_err(|source| SeedError::Read {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| SeedError::Parse {
        path: path.to_owned(),
        source,
    })
}

impl MemoryStore {
    /// Adds seed accounts to the store.
    ///
    /// Nothing is stored when any account is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`SeedError`] for empty or duplicate login names, including
    /// names already present in the store.
    pub fn seed_users(
        &self,
        seeds: impl IntoIterator<Item = UserSeed>,
    ) -> Result<usize, SeedError> {
        self.with_state(|state| {
            let mut staged = StoreState::clone(state);
            let mut added = 0;
            for seed in seeds {
                if seed.username.is_empty() {
                    return Err(SeedError::EmptyUsername);
                }
                if staged.user_by_name(&seed.username).is_some() {
                    return Err(SeedError::Duplicate {
                        username: seed.username,
                    });
                }
                let userid = staged.allocate_userid();
                staged.users.insert(userid, UserRecord::from_seed(userid, seed));
                added += 1;
            }
            *state = staged;
            Ok(added)
        })
    }
}

impl UserRecord {
    fn from_seed(userid: u64, seed: UserSeed) -> Self {
        Self {
            userid,
            name: seed.name.unwrap_or_else(|| seed.username.clone()),
            username: seed.username,
            user_type: seed.user_type,
            password: PasswordHash::new(&seed.password),
            debug_mode: seed.debug_mode,
            enabled: seed.enabled,
            autologout: seed.autologout,
            attempt_failed: 0,
            attempt_clock: 0,
            attempt_ip: String::new(),
        }
    }
}
