//! Response objects and reply encoding.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::errors::RpcError;

/// Outcome of one call; `result` and `error` are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Successful return value, which may itself be `null`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub result: Option<Value>,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    /// Id copied from the request, `null` when it was never parsed.
    pub id: Option<i64>,
}

impl RpcResponse {
    /// Builds a success response.
    #[must_use]
    pub fn success(id: Option<i64>, result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Builds a failure response.
    #[must_use]
    pub fn failure(id: Option<i64>, error: RpcError) -> Self {
        Self {
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Whether this answers a notification and must be dropped.
    #[must_use]
    pub const fn is_for_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Keeps an explicit `null` result distinct from an absent one.
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// What goes back to the caller for one payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    /// A bare response object.
    Single(RpcResponse),
    /// Ordered responses for a batch, notifications removed.
    Batch(Vec<RpcResponse>),
}
