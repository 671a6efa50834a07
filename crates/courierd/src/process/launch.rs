//! Supervises daemon launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::info;

use crate::StructuredHealthReporter;
use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::HealthReporter;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::runtime::Runtime;
use super::shutdown::{ControlSignal, ControlSignals, SystemControlSignals};

/// Process-level collaborators needed to control daemon lifecycle.
pub(crate) struct ProcessControl<S> {
    pub(crate) signals: S,
}

/// Service dependencies required to construct the daemon runtime.
pub(crate) struct ServiceDeps<L> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
}

/// Collaborators required to launch the daemon runtime.
pub(crate) struct LaunchPlan<L, S> {
    pub(crate) process: ProcessControl<S>,
    pub(crate) services: ServiceDeps<L>,
}

/// Runs the daemon using the production collaborators.
///
/// Blocks until a shutdown signal has been handled.
///
/// # Errors
///
/// Returns [`LaunchError`] when signal handlers cannot be installed,
/// bootstrap fails or a listener cannot be started.
pub fn run_daemon() -> Result<(), LaunchError> {
    let signals = SystemControlSignals::install()?;
    let plan = LaunchPlan {
        process: ProcessControl { signals },
        services: ServiceDeps {
            loader: SystemConfigLoader,
            reporter: Arc::new(StructuredHealthReporter::new()),
        },
    };
    run_daemon_with(plan)
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_daemon_with<L, S>(plan: LaunchPlan<L, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ControlSignals,
{
    let LaunchPlan { process, services } = plan;
    let ProcessControl { mut signals } = process;
    let ServiceDeps { loader, reporter } = services;

    let daemon = bootstrap_with(&loader, reporter)?;
    let runtime = Runtime::start(&daemon)?;
    info!(
        target: PROCESS_TARGET,
        protocol = %daemon.config().protocol(),
        address = ?runtime.local_addr(),
        "daemon ready"
    );

    let outcome = supervise(&runtime, &mut signals);
    runtime.shutdown();
    info!(
        target: PROCESS_TARGET,
        "shutdown sequence completed"
    );
    outcome
}

fn supervise<S: ControlSignals>(runtime: &Runtime, signals: &mut S) -> Result<(), LaunchError> {
    loop {
        match signals.next()? {
            ControlSignal::Reload => runtime.reload(),
            ControlSignal::Shutdown => return Ok(()),
        }
    }
}
