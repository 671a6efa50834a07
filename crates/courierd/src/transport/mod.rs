//! Socket front ends feeding the request queue.
//!
//! Every front end is a [`SocketListener`] running a polling accept loop on
//! its own thread. Accepted connections are served on per-connection threads
//! by a [`ConnectionHandler`] and tracked so shutdown can drain or sever them.

mod errors;
mod handler;
mod http;
mod line;
mod listener;
mod probe;
#[cfg(test)]
mod test_utils;
mod tracker;

pub use self::errors::ListenerError;
pub(crate) use self::handler::ConnectionHandler;
pub(crate) use self::http::HttpConnectionHandler;
pub(crate) use self::line::LineConnectionHandler;
pub(crate) use self::listener::{ListenerHandle, SocketListener};
pub(crate) use self::probe::HealthProbeHandler;
#[cfg(test)]
pub(crate) use self::test_utils::CountingHandler;
pub(crate) use self::tracker::ConnectionTracker;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
