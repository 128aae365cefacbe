//! Supervises daemon launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::info;

use crate::StructuredHealthReporter;
use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::HealthReporter;
use crate::rpc::RpcConnectionHandler;
use crate::transport::SocketListener;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Runs the daemon using the production collaborators.
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with(
        &SystemConfigLoader,
        Arc::new(StructuredHealthReporter::new()),
        &SystemShutdownSignal,
    )
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_daemon_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    let daemon = bootstrap_with(loader, reporter)?;
    info!(
        target: PROCESS_TARGET,
        version = crate::API_VERSION,
        "starting daemon runtime"
    );

    let endpoint = daemon.config().listen_socket().clone();
    let listener = SocketListener::bind(&endpoint)?;
    let handler = Arc::new(RpcConnectionHandler::new(
        daemon.endpoint().clone(),
        daemon.store().clone(),
        daemon.config().max_request_bytes(),
    ));
    let listener_handle = listener.start(handler)?;
    daemon.reporter().listener_ready(&endpoint);

    shutdown.wait()?;
    listener_handle.shutdown();
    listener_handle.join()?;
    info!(
        target: PROCESS_TARGET,
        "shutdown sequence completed"
    );
    Ok(())
}
