//! Compiled-in handler table.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use crate::auth::AuthClaims;

use super::errors::{HandlerError, ProviderError};
use super::provider::{HandlerProvider, MethodHandler, Params};

type BuiltinFn = fn(&Params, &AuthClaims) -> Result<Value, HandlerError>;

const BUILTINS: &[(&str, BuiltinFn)] = &[
    ("math/add", math_add),
    ("system/ping", system_ping),
    ("system/time", system_time),
    ("auth/whoami", auth_whoami),
];

/// Provider serving the handlers linked into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinProvider;

impl BuiltinProvider {
    /// Builds the provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HandlerProvider for BuiltinProvider {
    fn label(&self) -> &str {
        "builtin"
    }

    fn list(&self) -> Result<Vec<PathBuf>, ProviderError> {
        Ok(BUILTINS.iter().map(|(entry, _)| PathBuf::from(entry)).collect())
    }

    fn load(&self, entry: &Path) -> Result<Arc<dyn MethodHandler>, ProviderError> {
        BUILTINS
            .iter()
            .find(|(candidate, _)| Path::new(candidate) == entry)
            .map(|(_, handler)| Arc::new(*handler) as Arc<dyn MethodHandler>)
            .ok_or_else(|| ProviderError::MissingEntry {
                entry: entry.to_path_buf(),
            })
    }
}

fn integer_param(params: &Params, key: &str) -> Result<i64, HandlerError> {
    params
        .get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| HandlerError::InvalidParams(format!("'{key}' must be an integer")))
}

fn math_add(params: &Params, _claims: &AuthClaims) -> Result<Value, HandlerError> {
    let a = integer_param(params, "a")?;
    let b = integer_param(params, "b")?;
    a.checked_add(b)
        .map(Value::from)
        .ok_or_else(|| HandlerError::InvalidParams("sum overflows a 64-bit integer".to_owned()))
}

fn system_ping(_params: &Params, _claims: &AuthClaims) -> Result<Value, HandlerError> {
    Ok(Value::from("pong"))
}

fn system_time(_params: &Params, _claims: &AuthClaims) -> Result<Value, HandlerError> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|error| HandlerError::Failed(error.to_string()))?;
    Ok(Value::from(elapsed.as_secs()))
}

fn auth_whoami(_params: &Params, claims: &AuthClaims) -> Result<Value, HandlerError> {
    Ok(Value::Object(claims.as_map().clone()))
}
