//! Layered configuration for the courier RPC dispatcher.
//!
//! Values resolve in increasing precedence from built-in defaults, an
//! optional TOML file (`--config-path` or `COURIER_CONFIG_PATH`), `COURIER_*`
//! environment variables and finally command-line flags. The configuration is
//! loaded exactly once at startup; nothing here is re-read on reload.

mod defaults;
mod formats;

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_BATCH_FANOUT, DEFAULT_HOST, DEFAULT_HTTP_SHUTDOWN_TIMEOUT_SECS,
    DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_LOG_FILTER, DEFAULT_MAX_REQUESTS, DEFAULT_MAX_WORKERS,
    DEFAULT_PORT, DEFAULT_SHUTDOWN_GRACE_SECS, default_host, default_log_filter,
    default_log_filter_string, default_log_format,
};
pub use formats::{LogFormat, Protocol, SelectorParseError, WireFormat};

/// Resolved process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "COURIER")]
pub struct Config {
    /// Front end serving the primary interface.
    #[ortho_config(default = Protocol::Tcp)]
    pub protocol: Protocol,
    /// Payload encoding shared by both front ends.
    #[ortho_config(default = WireFormat::Json)]
    pub format: WireFormat,
    /// Host the primary listener binds to.
    #[ortho_config(default = default_host())]
    pub host: String,
    /// Port the primary listener binds to.
    #[ortho_config(default = DEFAULT_PORT)]
    pub port: u16,
    /// Number of workers draining the request queue.
    #[ortho_config(default = DEFAULT_MAX_WORKERS)]
    pub max_workers: usize,
    /// Capacity of the request queue; zero hands envelopes over directly.
    #[ortho_config(default = DEFAULT_MAX_REQUESTS)]
    pub max_requests: usize,
    /// Shared HMAC secret used to verify bearer tokens.
    #[ortho_config(default = String::new())]
    pub auth_secret: String,
    /// Root directory scanned for executable method handlers.
    pub methods_dir: Option<Utf8PathBuf>,
    /// Ceiling on concurrently running sub-requests within one batch.
    #[ortho_config(default = DEFAULT_BATCH_FANOUT)]
    pub batch_fanout: usize,
    /// Port for the auxiliary health listener, disabled when absent.
    pub health_port: Option<u16>,
    /// Rolling read deadline applied to every TCP line read.
    #[ortho_config(default = DEFAULT_IDLE_TIMEOUT_SECS)]
    pub idle_timeout_secs: u64,
    /// Grace window granted to dequeued work once shutdown begins.
    #[ortho_config(default = DEFAULT_SHUTDOWN_GRACE_SECS)]
    pub shutdown_grace_secs: u64,
    /// Bound on the graceful close of HTTP listeners.
    #[ortho_config(default = DEFAULT_HTTP_SHUTDOWN_TIMEOUT_SECS)]
    pub http_shutdown_timeout_secs: u64,
    /// Tracing filter expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log line format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            protocol: Protocol::default(),
            format: WireFormat::default(),
            host: default_host(),
            port: DEFAULT_PORT,
            max_workers: DEFAULT_MAX_WORKERS,
            max_requests: DEFAULT_MAX_REQUESTS,
            auth_secret: String::new(),
            methods_dir: None,
            batch_fanout: DEFAULT_BATCH_FANOUT,
            health_port: None,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
            http_shutdown_timeout_secs: DEFAULT_HTTP_SHUTDOWN_TIMEOUT_SECS,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Rejects combinations the dispatcher cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.batch_fanout == 0 {
            return Err(ConfigError::NoBatchFanout);
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.health_port.is_some_and(|port| port != 0 && port == self.port) {
            return Err(ConfigError::HealthPortClash { port: self.port });
        }
        Ok(())
    }

    /// Selected primary front end.
    #[must_use]
    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Selected wire format.
    #[must_use]
    pub const fn format(&self) -> WireFormat {
        self.format
    }

    /// Host the primary listener binds to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port the primary listener binds to.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` rendering of the primary listener address.
    #[must_use]
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Number of queue workers.
    #[must_use]
    pub const fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Request queue capacity.
    #[must_use]
    pub const fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Shared token verification secret.
    #[must_use]
    pub fn auth_secret(&self) -> &str {
        &self.auth_secret
    }

    /// Directory scanned for executable handlers, if configured.
    #[must_use]
    pub fn methods_dir(&self) -> Option<&Utf8PathBuf> {
        self.methods_dir.as_ref()
    }

    /// Per-batch concurrency ceiling.
    #[must_use]
    pub const fn batch_fanout(&self) -> usize {
        self.batch_fanout
    }

    /// Auxiliary health listener port.
    #[must_use]
    pub const fn health_port(&self) -> Option<u16> {
        self.health_port
    }

    /// Rolling TCP read deadline.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Grace window for dequeued work during shutdown.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Bound on the graceful close of HTTP listeners.
    #[must_use]
    pub const fn http_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.http_shutdown_timeout_secs)
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log line format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

/// Invalid configuration combinations detected after loading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The worker pool would be empty.
    #[error("max_workers must be at least 1")]
    NoWorkers,
    /// Batches could never make progress.
    #[error("batch_fanout must be at least 1")]
    NoBatchFanout,
    /// The bind host is blank.
    #[error("host must not be empty")]
    EmptyHost,
    /// The health listener would collide with the primary listener.
    #[error("health_port {port} clashes with the primary listener port")]
    HealthPortClash {
        /// Port configured for both listeners.
        port: u16,
    },
}
