//! Operator control signals.

use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// What the operator asked the daemon to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Rebuild the method registry.
    Reload,
    /// Run the graceful shutdown sequence.
    Shutdown,
}

/// Abstraction over control notification mechanisms.
pub trait ControlSignals: Send {
    /// Blocks until the next control signal arrives.
    fn next(&mut self) -> Result<ControlSignal, ShutdownError>;
}

/// Errors reported by control signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Control listener backed by process signals.
///
/// `SIGHUP` requests a reload; `SIGTERM`, `SIGINT` and `SIGQUIT` request
/// shutdown.
pub struct SystemControlSignals {
    signals: Signals,
}

impl SystemControlSignals {
    /// Installs the handlers. Call before serving so an early `SIGHUP` does
    /// not terminate the process.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError::Install`] when registration fails.
    pub fn install() -> Result<Self, ShutdownError> {
        let signals = Signals::new([SIGHUP, SIGTERM, SIGINT, SIGQUIT])
            .map_err(|source| ShutdownError::Install { source })?;
        Ok(Self { signals })
    }
}

impl std::fmt::Debug for SystemControlSignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemControlSignals").finish_non_exhaustive()
    }
}

impl ControlSignals for SystemControlSignals {
    fn next(&mut self) -> Result<ControlSignal, ShutdownError> {
        let Some(signal) = self.signals.forever().next() else {
            return Ok(ControlSignal::Shutdown);
        };
        let control = classify(signal);
        info!(
            target: PROCESS_TARGET,
            signal,
            control = ?control,
            "control signal received"
        );
        Ok(control)
    }
}

fn classify(signal: i32) -> ControlSignal {
    if signal == SIGHUP {
        ControlSignal::Reload
    } else {
        ControlSignal::Shutdown
    }
}
