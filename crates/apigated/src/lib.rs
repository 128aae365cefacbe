//! The apigate daemon.
//!
//! The daemon loads its configuration, installs structured telemetry, seeds
//! the in-memory store, and serves newline-delimited JSON-RPC 2.0 requests on
//! the configured TCP or Unix socket until it receives a termination signal.
//!
//! Every request line is handled in its own request context: one store
//! session, one transaction per top-level call, and the client's address for
//! login bookkeeping. Health reporting hooks emit structured telemetry at each
//! bootstrap stage so operators can diagnose start-up failures quickly.

mod bootstrap;
mod health;
mod process;
mod rpc;
mod telemetry;
mod transport;

pub use bootstrap::{
    API_VERSION, BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
