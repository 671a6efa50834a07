//! Payload validation, method dispatch and batch fan-out.
//!
//! A payload travels through [`Dispatcher::handle_payload`]:
//!
//! 1. decode with the configured codec (failure: `-32700`, null id);
//! 2. classify as single object or batch array and check that every call
//!    carries `method` and `params` (failure: `-32600`, null id);
//! 3. resolve each call against one registry snapshot (miss: `-32601`);
//! 4. run the handler with the caller's claims, catching faults (`-32603`);
//! 5. drop responses to notifications and encode what is left.
//!
//! A single call runs on the calling worker. A batch fans out onto scoped
//! threads, bounded by the configured fan-out, with index-addressed result
//! slots so that output order always equals request order.

mod batch;
mod errors;
mod request;
mod response;
mod router;

pub use self::errors::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, RpcError,
};
pub use self::request::{Payload, RpcRequest, parse_payload};
pub use self::response::{Reply, RpcResponse};
pub use self::router::Dispatcher;
pub(crate) use self::router::panic_message;
