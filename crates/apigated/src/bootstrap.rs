//! Daemon bootstrap orchestration.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use apigate_config::{Config, SocketPreparationError};
use apigate_core::{Dispatcher, JsonRpcEndpoint};
use apigate_services::{
    LoginPolicy, MemoryStore, SeedError, SystemClock, UserSeed, load_users, service_registry,
};

use crate::health::HealthReporter;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Version reported by `apiinfo.version`.
pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that hands out an already resolved configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Socket preparation failed.
    #[error("failed to prepare listen socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
    /// The user store could not be seeded.
    #[error("failed to seed the user store: {source}")]
    Seed {
        /// Underlying seed error.
        #[source]
        source: SeedError,
    },
}

/// Result of a successful bootstrap invocation.
pub struct Daemon {
    config: Config,
    store: MemoryStore,
    endpoint: JsonRpcEndpoint,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The store every request session is opened on.
    #[must_use]
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// The JSON-RPC endpoint serving requests.
    #[must_use]
    pub fn endpoint(&self) -> &JsonRpcEndpoint {
        &self.endpoint
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// The reporter lifecycle events are sent to.
    #[must_use]
    pub fn reporter(&self) -> &Arc<dyn HealthReporter> {
        &self.reporter
    }
}

/// Bootstraps the daemon using the supplied collaborators.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();
    match prepare(loader, reporter.as_ref()) {
        Ok((config, store, telemetry)) => {
            let policy = LoginPolicy {
                attempts: config.login_attempts(),
                block_secs: config.login_block_secs(),
            };
            let registry = service_registry(API_VERSION, policy, Arc::new(SystemClock));
            let endpoint = JsonRpcEndpoint::new(Arc::new(Dispatcher::new(registry)));
            reporter.bootstrap_succeeded(&config);
            Ok(Daemon {
                config,
                store,
                endpoint,
                telemetry,
                reporter,
            })
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

fn prepare(
    loader: &dyn ConfigLoader,
    reporter: &dyn HealthReporter,
) -> Result<(Config, MemoryStore, TelemetryHandle), BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    config
        .listen_socket()
        .prepare_filesystem()
        .map_err(|source| BootstrapError::Socket { source })?;

    let (source, seeds) = match config.users_file() {
        Some(path) => (
            path.as_str(),
            load_users(path).map_err(|source| BootstrapError::Seed { source })?,
        ),
        None => ("default", vec![UserSeed::default_admin()]),
    };
    let store = MemoryStore::new();
    let accounts = store
        .seed_users(seeds)
        .map_err(|source| BootstrapError::Seed { source })?;
    reporter.store_seeded(source, accounts);

    Ok((config, store, telemetry))
}
