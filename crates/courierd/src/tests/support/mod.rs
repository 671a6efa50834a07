//! Test harness utilities shared by the daemon suites.

mod client;
mod config_loader;
mod process_world;
mod reporter;
mod signals;
mod world;

pub use client::{HttpReply, LineClient, http_request};
pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use process_world::{DaemonWorld, StepResult, WAIT_TIMEOUT};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use world::{TestWorld, world};
