//! Errors raised while binding or running the request listener.

use std::io;
#[cfg(unix)]
use std::path::PathBuf;

use apigate_config::SocketEndpoint;
use thiserror::Error;

/// Failures of the request listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The TCP host name could not be resolved.
    #[error("cannot resolve {endpoint}: {source}")]
    Resolve {
        /// Endpoint being bound.
        endpoint: SocketEndpoint,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// The TCP host name resolved to no addresses.
    #[error("{endpoint} resolves to no addresses")]
    Unresolved {
        /// Endpoint being bound.
        endpoint: SocketEndpoint,
    },
    /// The socket could not be bound.
    #[error("cannot bind {endpoint}: {source}")]
    Bind {
        /// Endpoint being bound.
        endpoint: SocketEndpoint,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// The listener could not be switched to non-blocking accepts.
    #[error("cannot make the listener non-blocking: {source}")]
    NonBlocking {
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// Unix sockets are not available on this platform.
    #[cfg(not(unix))]
    #[error("{endpoint} needs unix socket support")]
    UnsupportedUnix {
        /// Endpoint being bound.
        endpoint: SocketEndpoint,
    },
    /// Another process is serving on the socket path.
    #[cfg(unix)]
    #[error("another gateway is listening on {}", path.display())]
    SocketInUse {
        /// Socket path.
        path: PathBuf,
    },
    /// Something other than a socket occupies the socket path.
    #[cfg(unix)]
    #[error("{} exists and is not a socket", path.display())]
    NotASocket {
        /// Occupied path.
        path: PathBuf,
    },
    /// Connecting to an existing socket failed in an unexpected way.
    #[cfg(unix)]
    #[error("cannot probe existing socket {}: {source}", path.display())]
    ProbeSocket {
        /// Socket path.
        path: PathBuf,
        /// Connection error.
        #[source]
        source: io::Error,
    },
    /// A stale socket file could not be removed.
    #[cfg(unix)]
    #[error("cannot remove stale socket {}: {source}", path.display())]
    RemoveStaleSocket {
        /// Socket path.
        path: PathBuf,
        /// Filesystem error.
        #[source]
        source: io::Error,
    },
    /// The accept thread could not be started.
    #[error("cannot start the accept thread: {source}")]
    Spawn {
        /// Thread builder error.
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked.
    #[error("the accept thread panicked")]
    AcceptPanicked,
}
