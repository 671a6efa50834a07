//! Test configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};

use courier_config::{Config, Protocol, WireFormat};

use crate::bootstrap::ConfigLoader;

/// Loader serving an ephemeral-port configuration that tests can adjust.
#[derive(Debug, Clone)]
pub struct TestConfigLoader {
    config: Config,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config {
                host: "127.0.0.1".to_owned(),
                port: 0,
                max_workers: 2,
                max_requests: 8,
                idle_timeout_secs: 5,
                shutdown_grace_secs: 2,
                http_shutdown_timeout_secs: 1,
                log_filter: "warn".to_owned(),
                ..Config::default()
            },
        }
    }

    #[must_use]
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.config.protocol = protocol;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: WireFormat) -> Self {
        self.config.format = format;
        self
    }

    #[must_use]
    pub fn with_methods_dir(mut self, dir: Utf8PathBuf) -> Self {
        self.config.methods_dir = Some(dir);
        self
    }

    #[must_use]
    pub fn with_auth_secret(mut self, secret: &str) -> Self {
        self.config.auth_secret = secret.to_owned();
        self
    }

    /// Enables the health listener on an ephemeral port.
    #[must_use]
    pub fn with_health_probe(mut self) -> Self {
        self.config.health_port = Some(0);
        self
    }

    /// Copy of the configuration this loader serves.
    #[must_use]
    pub fn config(&self) -> Config {
        self.config.clone()
    }

    #[must_use]
    pub fn with_config(mut self, edit: impl FnOnce(&mut Config)) -> Self {
        edit(&mut self.config);
        self
    }
}

impl Default for TestConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Loader that intentionally fails by passing invalid CLI arguments.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("courierd"),
            OsString::from("--port"),
            OsString::from("not-a-port"),
        ];
        Config::load_from_iter(args)
    }
}
