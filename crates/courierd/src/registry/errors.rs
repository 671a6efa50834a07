//! Errors raised while enumerating providers or running handlers.
//!
//! I/O errors are wrapped in `Arc` to keep the enums cheap to clone and small
//! enough for the `result_large_err` lint.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Failures while listing or loading handler entries.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The provider root could not be walked.
    #[error("failed to enumerate handlers under '{}': {source}", path.display())]
    Enumerate {
        /// Directory being walked.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// No handler is registered for the entry.
    #[error("no handler exported for entry '{}'", entry.display())]
    MissingEntry {
        /// Entry that was requested.
        entry: PathBuf,
    },
    /// The entry exists but cannot be invoked as a handler.
    #[error("entry '{}' has the wrong signature: {reason}", entry.display())]
    WrongSignature {
        /// Offending entry.
        entry: PathBuf,
        /// Why the entry was rejected.
        reason: String,
    },
    /// The entry path cannot be turned into a method name.
    #[error("entry '{}' does not map to a method name", entry.display())]
    Unnamed {
        /// Offending entry.
        entry: PathBuf,
    },
}

/// Failures reported by a handler invocation.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// The supplied params are unusable for this method.
    #[error("invalid params: {0}")]
    InvalidParams(String),
    /// The handler program could not be started or talked to.
    #[error("handler '{name}' I/O failure: {source}")]
    Io {
        /// Qualified method name.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The handler program exited unsuccessfully.
    #[error("handler '{name}' exited with status {status}: {stderr}")]
    NonZeroExit {
        /// Qualified method name.
        name: String,
        /// Exit code, `-1` when terminated by a signal.
        status: i32,
        /// Trimmed standard error output.
        stderr: String,
    },
    /// The handler produced output outside the line protocol.
    #[error("handler '{name}' wrote invalid output: {message}")]
    InvalidOutput {
        /// Qualified method name.
        name: String,
        /// Description of the violation.
        message: String,
    },
    /// Any other handler-defined failure.
    #[error("{0}")]
    Failed(String),
}
