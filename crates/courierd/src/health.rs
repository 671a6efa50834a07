//! Structured health reporting for daemon lifecycle events.

use std::net::SocketAddr;
use std::sync::Arc;

use courier_config::Config;

use crate::bootstrap::BootstrapError;
use crate::registry::ProviderError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the initial method table is built.
    fn registry_loaded(&self, methods: usize);

    /// Invoked when a listener starts accepting.
    fn listening(&self, listener: &str, address: SocketAddr);

    /// Invoked after a reload swapped in a new method table.
    fn registry_reloaded(&self, methods: usize);

    /// Invoked when a reload was abandoned and the old table kept.
    fn registry_reload_failed(&self, error: &ProviderError);

    /// Invoked when the shutdown sequence begins.
    fn shutdown_started(&self);

    /// Invoked when the shutdown sequence ends.
    ///
    /// `drained` is false when workers were still busy after the grace period.
    fn shutdown_completed(&self, drained: bool);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn registry_loaded(&self, methods: usize) {
        (**self).registry_loaded(methods);
    }

    fn listening(&self, listener: &str, address: SocketAddr) {
        (**self).listening(listener, address);
    }

    fn registry_reloaded(&self, methods: usize) {
        (**self).registry_reloaded(methods);
    }

    fn registry_reload_failed(&self, error: &ProviderError) {
        (**self).registry_reload_failed(error);
    }

    fn shutdown_started(&self) {
        (**self).shutdown_started();
    }

    fn shutdown_completed(&self, drained: bool) {
        (**self).shutdown_completed(drained);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            protocol = %config.protocol(),
            format = %config.format(),
            address = %config.listen_address(),
            workers = config.max_workers(),
            queue = config.max_requests(),
            auth = !config.auth_secret().is_empty(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn registry_loaded(&self, methods: usize) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "registry_loaded",
            methods,
            "method registry loaded"
        );
    }

    fn listening(&self, listener: &str, address: SocketAddr) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listening",
            listener,
            address = %address,
            "listener accepting connections"
        );
    }

    fn registry_reloaded(&self, methods: usize) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "registry_reloaded",
            methods,
            "method registry reloaded"
        );
    }

    fn registry_reload_failed(&self, error: &ProviderError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "registry_reload_failed",
            error = %error,
            "method registry reload failed, keeping current methods"
        );
    }

    fn shutdown_started(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_started",
            "daemon shutdown started"
        );
    }

    fn shutdown_completed(&self, drained: bool) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_completed",
            drained,
            "daemon shutdown completed"
        );
    }
}
