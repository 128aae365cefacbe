//! Test suites for the apigate daemon.

mod bootstrap_behaviour;
#[cfg(unix)]
mod process;
mod support;
