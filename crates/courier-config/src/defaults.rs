use crate::formats::LogFormat;

/// Default bind host for the primary listener.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port for the primary listener.
pub const DEFAULT_PORT: u16 = 9780;

/// Default number of long-lived workers draining the request queue.
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Default request queue capacity.
pub const DEFAULT_MAX_REQUESTS: usize = 64;

/// Default ceiling on concurrently running sub-requests within one batch.
pub const DEFAULT_BATCH_FANOUT: usize = 64;

/// Default rolling read deadline for idle TCP connections.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Default grace window granted to dequeued work during shutdown.
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

/// Default bound on the graceful close of HTTP listeners.
pub const DEFAULT_HTTP_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Owned default host used by the configuration loader.
pub fn default_host() -> String {
    DEFAULT_HOST.to_owned()
}
