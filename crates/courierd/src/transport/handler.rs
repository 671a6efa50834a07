//! Connection handling abstraction shared by every front end.

use std::net::TcpStream;

/// Handles accepted socket connections.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Serves a single connection until it closes. Implementations should
    /// avoid panicking; each connection runs on its own thread.
    fn handle(&self, stream: TcpStream);
}
