//! Test double for [`HealthReporter`] that records structured events for assertions.
//!
//! The recorder captures the lifecycle telemetry emitted during bootstrap,
//! reloads and shutdown so behaviour tests can validate observable events and
//! discover the ephemeral ports listeners bound to.

use std::net::SocketAddr;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use courier_config::Config;

use crate::bootstrap::BootstrapError;
use crate::health::HealthReporter;
use crate::registry::ProviderError;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    RegistryLoaded(usize),
    Listening { listener: String, address: SocketAddr },
    RegistryReloaded(usize),
    RegistryReloadFailed(String),
    ShutdownStarted,
    ShutdownCompleted { drained: bool },
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    pub fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }

    /// Polls until an event satisfies `predicate`, returning a copy of it.
    pub fn wait_for<F>(&self, timeout: Duration, predicate: F) -> Option<HealthEvent>
    where
        F: Fn(&HealthEvent) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(event) = self.events().into_iter().find(|event| predicate(event)) {
                return Some(event);
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Address reported for `listener`, waiting for it to come up.
    pub fn address_of(&self, listener: &str, timeout: Duration) -> Option<SocketAddr> {
        match self.wait_for(timeout, |event| {
            matches!(event, HealthEvent::Listening { listener: name, .. } if name == listener)
        })? {
            HealthEvent::Listening { address, .. } => Some(address),
            _ => None,
        }
    }

    /// Number of events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&HealthEvent) -> bool) -> usize {
        self.events().iter().filter(|event| predicate(event)).count()
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn registry_loaded(&self, methods: usize) {
        self.record(HealthEvent::RegistryLoaded(methods));
    }

    fn listening(&self, listener: &str, address: SocketAddr) {
        self.record(HealthEvent::Listening {
            listener: listener.to_owned(),
            address,
        });
    }

    fn registry_reloaded(&self, methods: usize) {
        self.record(HealthEvent::RegistryReloaded(methods));
    }

    fn registry_reload_failed(&self, error: &ProviderError) {
        self.record(HealthEvent::RegistryReloadFailed(error.to_string()));
    }

    fn shutdown_started(&self) {
        self.record(HealthEvent::ShutdownStarted);
    }

    fn shutdown_completed(&self, drained: bool) {
        self.record(HealthEvent::ShutdownCompleted { drained });
    }
}
