//! A JSON-RPC style dispatcher daemon.
//!
//! Clients send request objects, or batches of them, over a newline-delimited
//! TCP connection or as HTTP `POST` bodies, encoded as JSON or MessagePack.
//! Each payload travels through a bounded [`queue`] to a fixed [`worker`]
//! pool, which decodes it, resolves the caller's claims from an optional
//! bearer JWT, looks the method up in a hot-reloadable [`registry`] and
//! writes the reply back to the originating connection.
//!
//! The moving parts are wired together by the process supervisor:
//!
//! 1. [`bootstrap_with`] loads and validates the configuration, installs
//!    telemetry and builds the initial method table.
//! 2. The runtime binds the front end, starts the workers and accepts
//!    connections until a control signal arrives.
//! 3. `SIGHUP` rebuilds the method table and swaps it in atomically; a failed
//!    rebuild keeps the previous table.
//! 4. `SIGTERM`, `SIGINT` or `SIGQUIT` stop admission, give dequeued work a
//!    grace period and then close every connection.
//!
//! Health reporting hooks emit structured telemetry at each stage so
//! operators can follow the lifecycle from the logs alone.

pub mod auth;
mod bootstrap;
pub mod codec;
pub mod dispatch;
mod health;
mod process;
pub mod queue;
pub mod registry;
pub mod telemetry;
mod transport;
pub mod worker;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
    default_providers,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{
    ControlSignal, ControlSignals, LaunchError, ShutdownError, SystemControlSignals, run_daemon,
};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::ListenerError;

#[cfg(test)]
mod tests;
