//! Request shape classification and typed parsing.
//!
//! A payload is first decoded into a generic tree to decide whether it is a
//! batch or a single call and to check the required members, then converted
//! into typed [`RpcRequest`] values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::Codec;
use crate::registry::Params;

use super::errors::RpcError;

/// One call as carried on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Per-call bearer token, overriding the transport-level one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Dotted method name.
    pub method: String,
    /// Named parameters.
    pub params: Params,
    /// Correlation id; absent or null marks a notification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

impl RpcRequest {
    /// Whether the caller expects no reply.
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Token used for this call: its own when non-empty, else `inherited`.
    #[must_use]
    pub fn effective_token<'a>(&'a self, inherited: Option<&'a str>) -> Option<&'a str> {
        self.token
            .as_deref()
            .filter(|token| !token.is_empty())
            .or(inherited)
    }
}

/// A classified payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A top-level object.
    Single(RpcRequest),
    /// A top-level array of independent calls.
    Batch(Vec<RpcRequest>),
}

/// Decodes and classifies `bytes`.
///
/// # Errors
///
/// Returns `-32700` when the bytes are malformed for the codec and `-32600`
/// when the decoded value has the wrong shape or lacks `method`/`params`.
pub fn parse_payload(codec: Codec, bytes: &[u8]) -> Result<Payload, RpcError> {
    let tree: Value = codec.decode(bytes).map_err(|_| RpcError::parse_error())?;
    let well_formed = match &tree {
        Value::Array(items) => !items.is_empty() && items.iter().all(has_required_members),
        Value::Object(_) => has_required_members(&tree),
        _ => false,
    };
    if !well_formed {
        return Err(RpcError::invalid_request());
    }
    let payload = if tree.is_array() {
        serde_json::from_value(tree).map(Payload::Batch)
    } else {
        serde_json::from_value(tree).map(Payload::Single)
    };
    payload.map_err(|_| RpcError::invalid_request())
}

fn has_required_members(item: &Value) -> bool {
    item.as_object()
        .is_some_and(|object| object.contains_key("method") && object.contains_key("params"))
}
