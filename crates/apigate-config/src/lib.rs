//! Shared configuration for the API gateway daemon.
//!
//! Configuration is layered by [`ortho_config`]: command-line flags override
//! `APIGATE_*` environment variables, which override the configuration file
//! (`--config-path` or `APIGATE_CONFIG_PATH`), which overrides the built-in
//! defaults exposed from [`defaults`].

mod defaults;
mod logging;
mod socket;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_LOGIN_ATTEMPTS, DEFAULT_LOGIN_BLOCK_SECS,
    DEFAULT_MAX_REQUEST_BYTES, DEFAULT_TCP_PORT, default_log_filter, default_log_filter_string,
    default_log_format, default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "APIGATE")]
pub struct Config {
    /// Socket the daemon accepts JSON-RPC connections on.
    #[ortho_config(default = defaults::default_socket_endpoint())]
    pub listen_socket: SocketEndpoint,
    /// `tracing` filter expression.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
    /// Upper bound for a single newline-delimited request body.
    #[ortho_config(default = DEFAULT_MAX_REQUEST_BYTES)]
    pub max_request_bytes: usize,
    /// Failed logins tolerated before an account is temporarily blocked.
    #[ortho_config(default = DEFAULT_LOGIN_ATTEMPTS)]
    pub login_attempts: u32,
    /// Length of the temporary block, in seconds.
    #[ortho_config(default = DEFAULT_LOGIN_BLOCK_SECS)]
    pub login_block_secs: u64,
    /// Optional JSON file listing the users to seed the store with.
    pub users_file: Option<Utf8PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_socket: default_socket_endpoint(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            login_attempts: DEFAULT_LOGIN_ATTEMPTS,
            login_block_secs: DEFAULT_LOGIN_BLOCK_SECS,
            users_file: None,
        }
    }
}

impl Config {
    /// Socket endpoint the daemon listens on.
    #[must_use]
    pub fn listen_socket(&self) -> &SocketEndpoint {
        &self.listen_socket
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Maximum accepted request size in bytes.
    #[must_use]
    pub fn max_request_bytes(&self) -> usize {
        self.max_request_bytes
    }

    /// Failed logins tolerated before blocking.
    #[must_use]
    pub fn login_attempts(&self) -> u32 {
        self.login_attempts
    }

    /// Block window after too many failed logins, in seconds.
    #[must_use]
    pub fn login_block_secs(&self) -> u64 {
        self.login_block_secs
    }

    /// Seed file for the user store, if configured.
    #[must_use]
    pub fn users_file(&self) -> Option<&Utf8PathBuf> {
        self.users_file.as_ref()
    }
}
