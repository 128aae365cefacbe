//! Collaborator doubles shared by the daemon test suites.

use std::ffi::OsString;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};

use apigate_config::{Config, SocketEndpoint};
use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use crate::bootstrap::{BootstrapError, ConfigLoader};
use crate::health::HealthReporter;
use crate::process::{ShutdownError, ShutdownSignal};

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HealthEvent {
    BootstrapStarting,
    StoreSeeded { source: String, accounts: usize },
    BootstrapSucceeded,
    BootstrapFailed(String),
    ListenerReady(String),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub(crate) struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    pub(crate) fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn store_seeded(&self, source: &str, accounts: usize) {
        self.record(HealthEvent::StoreSeeded {
            source: source.to_owned(),
            accounts,
        });
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn listener_ready(&self, endpoint: &SocketEndpoint) {
        self.record(HealthEvent::ListenerReady(endpoint.to_string()));
    }
}

/// Loader that places the listen socket and any seed file in a temporary
/// directory.
pub(crate) struct TestConfigLoader {
    dir: TempDir,
    users: Option<String>,
}

impl TestConfigLoader {
    pub(crate) fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temporary directory"),
            users: None,
        }
    }

    /// Seeds the store from a users file holding `contents`.
    pub(crate) fn with_users_file(mut self, contents: &str) -> Self {
        self.users = Some(contents.to_owned());
        self
    }

    pub(crate) fn socket_path(&self) -> String {
        self.path("apigated.sock")
    }

    fn path(&self, name: &str) -> String {
        self.dir
            .path()
            .join(name)
            .to_str()
            .expect("temporary path was not valid UTF-8")
            .to_owned()
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let users_file = self.users.as_ref().map(|contents| {
            let path = self.path("users.json");
            std::fs::write(&path, contents).expect("write users file");
            Utf8PathBuf::from(path)
        });
        Ok(Config {
            listen_socket: SocketEndpoint::unix(self.socket_path()),
            users_file,
            ..Config::default()
        })
    }
}

/// Loader that fails by passing an invalid socket flag.
pub(crate) struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter(vec![
            OsString::from("apigated"),
            OsString::from("--listen-socket"),
            OsString::from("invalid://socket"),
        ])
    }
}

/// Shutdown signal triggered from the test thread.
pub(crate) struct ManualShutdown {
    receiver: Mutex<Receiver<()>>,
}

impl ManualShutdown {
    pub(crate) fn new() -> (Sender<()>, Self) {
        let (sender, receiver) = channel();
        (
            sender,
            Self {
                receiver: Mutex::new(receiver),
            },
        )
    }
}

impl ShutdownSignal for ManualShutdown {
    fn wait(&self) -> Result<(), ShutdownError> {
        let receiver = self.receiver.lock().expect("shutdown receiver poisoned");
        // a dropped sender also releases the daemon
        let _ = receiver.recv();
        Ok(())
    }
}
