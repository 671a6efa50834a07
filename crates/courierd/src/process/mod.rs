//! Process lifecycle: launch, control signals and teardown.

mod errors;
pub(crate) mod launch;
mod runtime;
pub(crate) mod shutdown;

pub use errors::LaunchError;
pub use launch::run_daemon;
pub use shutdown::{ControlSignal, ControlSignals, ShutdownError, SystemControlSignals};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
