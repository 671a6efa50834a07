//! Provider and handler seams for the method registry.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::auth::AuthClaims;

use super::errors::{HandlerError, ProviderError};

/// Named parameters carried by every request.
pub type Params = Map<String, Value>;

/// A callable method implementation.
pub trait MethodHandler: Send + Sync {
    /// Runs the method for one request.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the method cannot produce a result.
    fn call(&self, params: &Params, claims: &AuthClaims) -> Result<Value, HandlerError>;
}

impl<F> MethodHandler for F
where
    F: Fn(&Params, &AuthClaims) -> Result<Value, HandlerError> + Send + Sync,
{
    fn call(&self, params: &Params, claims: &AuthClaims) -> Result<Value, HandlerError> {
        self(params, claims)
    }
}

/// Source of method handlers, enumerated on every registry build.
pub trait HandlerProvider: Send + Sync {
    /// Short label used in logs.
    fn label(&self) -> &str;

    /// Lists entry paths relative to the provider root.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Enumerate`] when the provider cannot be read.
    fn list(&self) -> Result<Vec<PathBuf>, ProviderError>;

    /// Loads the handler exported by one listed entry.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the entry is absent or not invocable.
    fn load(&self, entry: &Path) -> Result<Arc<dyn MethodHandler>, ProviderError>;
}

/// Derives the dotted method name for an entry path.
///
/// The final extension is dropped and path separators become dots, so
/// `math/add.sh` is served as `math.add`. Entries with non-UTF-8 or
/// non-relative components have no name.
#[must_use]
pub fn qualified_name(entry: &Path) -> Option<String> {
    let stem = entry.with_extension("");
    let mut parts = Vec::new();
    for component in stem.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() || parts.iter().any(|part| part.is_empty()) {
        return None;
    }
    Some(parts.join("."))
}
