//! Method registry with atomic hot reload.
//!
//! The live mapping is an immutable [`MethodTable`] behind an [`ArcSwap`].
//! Readers take a snapshot and keep using it for the whole payload; a reload
//! builds a complete replacement off to the side and swaps the pointer, so no
//! reader can ever observe a half-built table.

mod builtin;
mod errors;
mod executable;
mod provider;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, warn};

pub use self::builtin::BuiltinProvider;
pub use self::errors::{HandlerError, ProviderError};
pub use self::executable::ExecutableProvider;
pub use self::provider::{HandlerProvider, MethodHandler, Params, qualified_name};

pub(crate) const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// A resolved method.
#[derive(Clone)]
pub struct Method {
    name: String,
    handler: Arc<dyn MethodHandler>,
}

impl Method {
    /// Binds `handler` to `name`.
    pub fn new(name: impl Into<String>, handler: Arc<dyn MethodHandler>) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }

    /// Qualified dotted name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The callable behind this method.
    #[must_use]
    pub fn handler(&self) -> &dyn MethodHandler {
        self.handler.as_ref()
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method").field("name", &self.name).finish()
    }
}

/// Immutable name to method mapping.
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    methods: HashMap<String, Method>,
}

impl MethodTable {
    /// Looks up a method by qualified name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    /// Number of registered methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether no methods are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Inserts unless the name is already taken; returns whether it was added.
    fn insert_first(&mut self, method: Method) -> bool {
        if self.methods.contains_key(method.name()) {
            return false;
        }
        self.methods.insert(method.name.clone(), method);
        true
    }
}

/// Builds a table from `providers`, loading every listed entry.
///
/// Bad entries are logged and skipped. The first provider to claim a name
/// keeps it.
///
/// # Errors
///
/// Returns the first enumeration failure when `strict` is set; otherwise a
/// provider that cannot be enumerated contributes nothing.
fn build_table(
    providers: &[Arc<dyn HandlerProvider>],
    strict: bool,
) -> Result<MethodTable, ProviderError> {
    let mut table = MethodTable::default();
    for provider in providers {
        let entries = match provider.list() {
            Ok(entries) => entries,
            Err(error) if strict => return Err(error),
            Err(error) => {
                warn!(
                    target: REGISTRY_TARGET,
                    provider = provider.label(),
                    error = %error,
                    "handler provider could not be enumerated"
                );
                continue;
            }
        };
        for entry in entries {
            let Some(name) = qualified_name(&entry) else {
                warn!(
                    target: REGISTRY_TARGET,
                    provider = provider.label(),
                    entry = %entry.display(),
                    "skipping entry without a method name"
                );
                continue;
            };
            match provider.load(&entry) {
                Ok(handler) => {
                    if table.insert_first(Method::new(name.clone(), handler)) {
                        debug!(
                            target: REGISTRY_TARGET,
                            provider = provider.label(),
                            method = %name,
                            "registered method"
                        );
                    } else {
                        warn!(
                            target: REGISTRY_TARGET,
                            provider = provider.label(),
                            method = %name,
                            "duplicate method name skipped"
                        );
                    }
                }
                Err(error) => warn!(
                    target: REGISTRY_TARGET,
                    provider = provider.label(),
                    entry = %entry.display(),
                    error = %error,
                    "skipping handler entry"
                ),
            }
        }
    }
    Ok(table)
}

/// Process-wide, atomically swappable method registry.
#[derive(Clone)]
pub struct MethodRegistry {
    current: Arc<ArcSwap<MethodTable>>,
    providers: Arc<[Arc<dyn HandlerProvider>]>,
}

impl MethodRegistry {
    /// Builds the initial table from `providers`.
    ///
    /// Startup never fails: providers that cannot be enumerated are logged
    /// and contribute no methods.
    #[must_use]
    pub fn load(providers: Vec<Arc<dyn HandlerProvider>>) -> Self {
        let providers: Arc<[Arc<dyn HandlerProvider>]> = providers.into();
        let table = build_table(&providers, false).unwrap_or_default();
        Self {
            current: Arc::new(ArcSwap::from_pointee(table)),
            providers,
        }
    }

    /// Wraps a prebuilt table with no providers behind it.
    #[must_use]
    pub fn from_table(table: MethodTable) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(table)),
            providers: Arc::from(Vec::new()),
        }
    }

    /// The mapping currently being served.
    #[must_use]
    pub fn snapshot(&self) -> Arc<MethodTable> {
        self.current.load_full()
    }

    /// Rebuilds the mapping and swaps it in, returning the new method count.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when any provider cannot be enumerated; the
    /// current mapping stays in place.
    pub fn reload(&self) -> Result<usize, ProviderError> {
        let table = build_table(&self.providers, true)?;
        let count = table.len();
        self.current.store(Arc::new(table));
        Ok(count)
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.snapshot().len())
            .field("providers", &self.providers.len())
            .finish()
    }
}

/// Builder used by tests and embedders to assemble a table by hand.
#[derive(Debug, Default)]
pub struct MethodTableBuilder {
    table: MethodTable,
}

impl MethodTableBuilder {
    /// Starts an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`; earlier registrations win.
    #[must_use]
    pub fn with<H>(mut self, name: &str, handler: H) -> Self
    where
        H: MethodHandler + 'static,
    {
        self.table.insert_first(Method::new(name, Arc::new(handler)));
        self
    }

    /// Finishes the table.
    #[must_use]
    pub fn build(self) -> MethodTable {
        self.table
    }
}
