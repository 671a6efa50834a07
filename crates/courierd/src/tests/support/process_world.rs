//! Daemon test world: runs the full launch sequence on a background thread.

use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use camino::Utf8PathBuf;
use tempfile::TempDir;

use crate::health::HealthReporter;
use crate::process::ControlSignal;
use crate::process::LaunchError;
use crate::process::launch::{LaunchPlan, ProcessControl, ServiceDeps, run_daemon_with};

use super::config_loader::TestConfigLoader;
use super::reporter::{HealthEvent, RecordingHealthReporter};
use super::signals::{SignalScript, scripted_signals};

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

pub type StepResult = Result<(), String>;

/// Scenario world owning one daemon run.
pub struct DaemonWorld {
    loader: TestConfigLoader,
    pub reporter: Arc<RecordingHealthReporter>,
    script: Option<SignalScript>,
    handle: Option<thread::JoinHandle<Result<(), LaunchError>>>,
    result: Option<Result<(), LaunchError>>,
    methods: Option<TempDir>,
}

impl Default for DaemonWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl DaemonWorld {
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: TestConfigLoader::new(),
            reporter: Arc::new(RecordingHealthReporter::default()),
            script: None,
            handle: None,
            result: None,
            methods: None,
        }
    }

    /// Applies `edit` to the loader used by the next start.
    pub fn configure(&mut self, edit: impl FnOnce(TestConfigLoader) -> TestConfigLoader) {
        self.loader = edit(self.loader.clone());
    }

    /// Creates the methods directory on first use and points the loader at it.
    pub fn methods_dir(&mut self) -> Result<Utf8PathBuf, String> {
        if self.methods.is_none() {
            let dir = TempDir::new().map_err(|error| error.to_string())?;
            let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
                .map_err(|path| format!("non UTF-8 temp dir: {}", path.display()))?;
            self.loader = self.loader.clone().with_methods_dir(root);
            self.methods = Some(dir);
        }
        let dir = self
            .methods
            .as_ref()
            .ok_or_else(|| "methods directory missing".to_owned())?;
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .map_err(|path| format!("non UTF-8 temp dir: {}", path.display()))
    }

    /// Installs an executable shell handler at `entry` below the methods root.
    pub fn install_script(&mut self, entry: &str, body: &str) -> StepResult {
        let path = self.methods_dir()?.join(entry);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| error.to_string())?;
        }
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).map_err(|error| error.to_string())?;
        make_executable(path.as_std_path())
    }

    /// Deletes the methods root so the next reload cannot enumerate it.
    pub fn remove_methods_dir(&mut self) -> StepResult {
        let root = self.methods_dir()?;
        fs::remove_dir_all(&root).map_err(|error| error.to_string())
    }

    /// Launches the daemon on a background thread.
    pub fn start(&mut self) -> StepResult {
        if self.handle.is_some() {
            return Err("daemon already running".to_owned());
        }
        let (script, signals) = scripted_signals();
        let loader = self.loader.clone();
        let reporter = self.reporter.clone() as Arc<dyn HealthReporter>;
        self.handle = Some(thread::spawn(move || {
            run_daemon_with(LaunchPlan {
                process: ProcessControl { signals },
                services: ServiceDeps { loader, reporter },
            })
        }));
        self.script = Some(script);
        Ok(())
    }

    /// Launches the daemon and waits for `listener` to come up.
    pub fn start_and_wait(&mut self, listener: &str) -> Result<SocketAddr, String> {
        self.start()?;
        self.address(listener)
    }

    /// Address reported for `listener`.
    pub fn address(&self, listener: &str) -> Result<SocketAddr, String> {
        self.reporter
            .address_of(listener, WAIT_TIMEOUT)
            .ok_or_else(|| {
                format!(
                    "listener '{listener}' never came up: {:?}",
                    self.reporter.events()
                )
            })
    }

    /// Sends a reload and waits for its outcome to be reported.
    pub fn reload(&self) -> Result<HealthEvent, String> {
        let is_outcome = |event: &HealthEvent| {
            matches!(
                event,
                HealthEvent::RegistryReloaded(_) | HealthEvent::RegistryReloadFailed(_)
            )
        };
        let before = self.reporter.count(is_outcome);
        self.signal(ControlSignal::Reload)?;
        let expected = before + 1;
        self.reporter
            .wait_for(WAIT_TIMEOUT, |_| self.reporter.count(is_outcome) >= expected)
            .ok_or_else(|| "reload outcome never reported".to_owned())?;
        self.reporter
            .events()
            .into_iter()
            .filter(|event| is_outcome(event))
            .nth(before)
            .ok_or_else(|| "reload outcome missing".to_owned())
    }

    pub fn signal(&self, signal: ControlSignal) -> StepResult {
        let script = self
            .script
            .as_ref()
            .ok_or_else(|| "daemon not started".to_owned())?;
        script.send(signal)
    }

    /// Requests shutdown and waits for the launch thread to return.
    pub fn stop(&mut self) -> StepResult {
        if self.handle.is_none() {
            return Ok(());
        }
        self.signal(ControlSignal::Shutdown)?;
        self.join()
    }

    /// Waits for the launch thread without sending anything.
    pub fn join(&mut self) -> StepResult {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| "daemon not started".to_owned())?;
        let result = handle
            .join()
            .map_err(|_| "daemon thread panicked".to_owned())?;
        self.result = Some(result);
        self.script = None;
        Ok(())
    }

    /// Outcome of the finished run.
    #[must_use]
    pub fn result(&self) -> Option<&Result<(), LaunchError>> {
        self.result.as_ref()
    }
}

impl Drop for DaemonWorld {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if let Some(script) = self.script.take() {
            drop(script.send(ControlSignal::Shutdown));
        }
        drop(handle.join());
    }
}

#[cfg(unix)]
fn make_executable(path: &std::path::Path) -> StepResult {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|error| error.to_string())
}

#[cfg(not(unix))]
fn make_executable(_path: &std::path::Path) -> StepResult {
    Ok(())
}
