//! Out-of-process handlers discovered under a methods directory.
//!
//! Every regular file below the root is an entry; loading it requires the
//! file to be executable. A call spawns the program, writes one JSON line
//! `{"params":…,"claims":…}` to its stdin and reads one JSON line back from
//! stdout as the result.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::thread;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::auth::AuthClaims;

use super::REGISTRY_TARGET;
use super::errors::{HandlerError, ProviderError};
use super::provider::{HandlerProvider, MethodHandler, Params, qualified_name};

/// Provider rooted at a directory of executables.
#[derive(Debug, Clone)]
pub struct ExecutableProvider {
    root: PathBuf,
}

impl ExecutableProvider {
    /// Builds a provider for `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn walk(&self, dir: &Path, entries: &mut Vec<PathBuf>) -> Result<(), ProviderError> {
        let enumerate = |source: io::Error| ProviderError::Enumerate {
            path: dir.to_path_buf(),
            source: Arc::new(source),
        };
        for item in fs::read_dir(dir).map_err(enumerate)? {
            let item = item.map_err(enumerate)?;
            let path = item.path();
            let file_type = item.file_type().map_err(enumerate)?;
            if file_type.is_dir() {
                self.walk(&path, entries)?;
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                entries.push(relative.to_path_buf());
            }
        }
        Ok(())
    }
}

impl HandlerProvider for ExecutableProvider {
    fn label(&self) -> &str {
        "executable"
    }

    fn list(&self) -> Result<Vec<PathBuf>, ProviderError> {
        let mut entries = Vec::new();
        self.walk(&self.root, &mut entries)?;
        entries.sort();
        Ok(entries)
    }

    fn load(&self, entry: &Path) -> Result<Arc<dyn MethodHandler>, ProviderError> {
        let program = self.root.join(entry);
        let metadata = fs::metadata(&program).map_err(|_| ProviderError::MissingEntry {
            entry: entry.to_path_buf(),
        })?;
        if !metadata.is_file() {
            return Err(ProviderError::WrongSignature {
                entry: entry.to_path_buf(),
                reason: "not a regular file".to_owned(),
            });
        }
        if !is_executable(&metadata) {
            return Err(ProviderError::WrongSignature {
                entry: entry.to_path_buf(),
                reason: "file is not executable".to_owned(),
            });
        }
        let name = qualified_name(entry).ok_or_else(|| ProviderError::Unnamed {
            entry: entry.to_path_buf(),
        })?;
        Ok(Arc::new(ExecutableHandler { name, program }))
    }
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    true
}

#[derive(Serialize)]
struct HandlerInput<'a> {
    params: &'a Params,
    claims: &'a AuthClaims,
}

/// One executable entry bound to its method name.
#[derive(Debug)]
struct ExecutableHandler {
    name: String,
    program: PathBuf,
}

impl ExecutableHandler {
    fn io_error(&self, source: io::Error) -> HandlerError {
        HandlerError::Io {
            name: self.name.clone(),
            source: Arc::new(source),
        }
    }

    fn invalid_output(&self, message: impl Into<String>) -> HandlerError {
        HandlerError::InvalidOutput {
            name: self.name.clone(),
            message: message.into(),
        }
    }

    fn write_input(
        &self,
        mut stdin: ChildStdin,
        input: &HandlerInput<'_>,
    ) -> Result<(), HandlerError> {
        let mut line = serde_json::to_vec(input)
            .map_err(|error| HandlerError::Failed(format!("failed to encode input: {error}")))?;
        line.push(b'\n');
        // A handler may exit without reading its input; its exit status decides.
        let written = match stdin.write_all(&line).and_then(|()| stdin.flush()) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(()),
            Err(error) => Err(self.io_error(error)),
        };
        // Closing stdin delivers EOF to the handler.
        drop(stdin);
        written
    }
}

impl MethodHandler for ExecutableHandler {
    fn call(&self, params: &Params, claims: &AuthClaims) -> Result<Value, HandlerError> {
        debug!(
            target: REGISTRY_TARGET,
            method = %self.name,
            program = %self.program.display(),
            "spawning handler process"
        );
        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| self.io_error(error))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.io_error(io::Error::other("failed to capture stdin")))?;
        let input = HandlerInput { params, claims };

        // stdin is fed from its own thread while both output pipes are
        // drained together, so no pipe can fill up and stall the child.
        let (written, output) = thread::scope(|scope| {
            let writer = scope.spawn(|| self.write_input(stdin, &input));
            let output = child.wait_with_output();
            let written = writer.join().unwrap_or_else(|_| {
                Err(HandlerError::Failed("stdin writer panicked".to_owned()))
            });
            (written, output)
        });
        let output = output.map_err(|error| self.io_error(error))?;
        written?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout.lines().next().unwrap_or_default();

        if !output.status.success() {
            return Err(HandlerError::NonZeroExit {
                name: self.name.clone(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        if line.trim().is_empty() {
            return Err(self.invalid_output("handler produced no output on stdout"));
        }
        serde_json::from_str(line.trim()).map_err(|error| self.invalid_output(error.to_string()))
    }
}
