//! Method resolution and invocation for decoded payloads.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, warn};

use crate::auth::AuthResolver;
use crate::codec::Codec;
use crate::registry::{MethodRegistry, MethodTable};

use super::batch::fan_out;
use super::errors::RpcError;
use super::request::{Payload, RpcRequest, parse_payload};
use super::response::{Reply, RpcResponse};

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Turns raw payloads into encoded replies.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: MethodRegistry,
    auth: AuthResolver,
    codec: Codec,
    batch_fanout: usize,
}

impl Dispatcher {
    /// Assembles a dispatcher from its collaborators.
    #[must_use]
    pub fn new(
        registry: MethodRegistry,
        auth: AuthResolver,
        codec: Codec,
        batch_fanout: usize,
    ) -> Self {
        Self {
            registry,
            auth,
            codec,
            batch_fanout,
        }
    }

    /// Codec used for payloads and replies.
    #[must_use]
    pub const fn codec(&self) -> Codec {
        self.codec
    }

    /// Registry consulted for every payload.
    #[must_use]
    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    /// Decodes, validates and executes one payload.
    ///
    /// Returns `None` when nothing must be sent back, which is the case for a
    /// single notification. `token` is the transport-level bearer token.
    #[must_use]
    pub fn dispatch(&self, payload: &[u8], token: Option<&str>) -> Option<Reply> {
        let table = self.registry.snapshot();
        match parse_payload(self.codec, payload) {
            Err(error) => {
                debug!(
                    target: DISPATCH_TARGET,
                    code = error.code,
                    "rejecting payload"
                );
                Some(Reply::Single(RpcResponse::failure(None, error)))
            }
            Ok(Payload::Single(request)) => {
                let response = self.respond(&table, &request, token);
                (!request.is_notification()).then_some(Reply::Single(response))
            }
            Ok(Payload::Batch(requests)) => {
                debug!(
                    target: DISPATCH_TARGET,
                    size = requests.len(),
                    "dispatching batch"
                );
                let responses = fan_out(&requests, self.batch_fanout, |request| {
                    self.respond(&table, request, token)
                });
                Some(Reply::Batch(
                    responses
                        .into_iter()
                        .filter(|response| !response.is_for_notification())
                        .collect(),
                ))
            }
        }
    }

    /// Like [`Dispatcher::dispatch`] but returns encoded bytes.
    #[must_use]
    pub fn handle_payload(&self, payload: &[u8], token: Option<&str>) -> Option<Vec<u8>> {
        let reply = self.dispatch(payload, token)?;
        match self.codec.encode(&reply) {
            Ok(bytes) => Some(bytes),
            Err(encode_error) => {
                error!(
                    target: DISPATCH_TARGET,
                    error = %encode_error,
                    "failed to encode reply"
                );
                let fallback = RpcResponse::failure(None, RpcError::internal_error());
                self.codec.encode(&fallback).ok()
            }
        }
    }

    fn respond(
        &self,
        table: &MethodTable,
        request: &RpcRequest,
        inherited: Option<&str>,
    ) -> RpcResponse {
        let Some(method) = table.get(&request.method) else {
            debug!(
                target: DISPATCH_TARGET,
                method = %request.method,
                "method not found"
            );
            return RpcResponse::failure(request.id, RpcError::method_not_found());
        };
        let claims = self.auth.resolve(request.effective_token(inherited));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            method.handler().call(&request.params, &claims)
        }));
        match outcome {
            Ok(Ok(result)) => RpcResponse::success(request.id, result),
            Ok(Err(handler_error)) => {
                warn!(
                    target: DISPATCH_TARGET,
                    method = %request.method,
                    error = %handler_error,
                    "handler failed"
                );
                RpcResponse::failure(request.id, RpcError::from(&handler_error))
            }
            Err(payload) => {
                error!(
                    target: DISPATCH_TARGET,
                    method = %request.method,
                    panic = %panic_message(payload.as_ref()),
                    "handler panicked"
                );
                RpcResponse::failure(request.id, RpcError::internal_error())
            }
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
