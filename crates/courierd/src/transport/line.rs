//! Newline-delimited front end.
//!
//! Every line on a connection is one payload. Replies are written back on the
//! same connection, newline terminated, in the order workers finish them.

use std::io::{self, BufRead, BufReader, Read};
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use courier_config::WireFormat;

use crate::queue::{ReplyHandle, RequestEnvelope, RequestQueue};

use super::{ConnectionHandler, LISTENER_TARGET};

/// Longest accepted line, excluding the terminator.
pub(crate) const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Reads payload lines and queues them for the workers.
#[derive(Debug, Clone)]
pub(crate) struct LineConnectionHandler {
    queue: RequestQueue,
    format: WireFormat,
    idle_timeout: Duration,
}

impl LineConnectionHandler {
    pub(crate) fn new(queue: RequestQueue, format: WireFormat, idle_timeout: Duration) -> Self {
        Self {
            queue,
            format,
            idle_timeout,
        }
    }

    fn serve(&self, stream: TcpStream, peer: Option<SocketAddr>) -> io::Result<()> {
        if !self.idle_timeout.is_zero() {
            stream.set_read_timeout(Some(self.idle_timeout))?;
        }
        let writer = Arc::new(Mutex::new(stream.try_clone()?));
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();
        loop {
            line.clear();
            let read = reader
                .by_ref()
                .take(MAX_LINE_BYTES as u64 + 1)
                .read_until(b'\n', &mut line)?;
            if read == 0 {
                debug!(target: LISTENER_TARGET, ?peer, "client closed connection");
                return Ok(());
            }
            let terminated = line.last() == Some(&b'\n');
            if !terminated && read > MAX_LINE_BYTES {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "line exceeds maximum size",
                ));
            }
            let Some(payload) = frame_payload(&line, self.format) else {
                continue;
            };
            let envelope = RequestEnvelope::new(
                payload.to_vec(),
                None,
                ReplyHandle::Line(Arc::clone(&writer)),
            );
            if self.queue.enqueue(envelope).is_err() {
                debug!(
                    target: LISTENER_TARGET,
                    ?peer,
                    "queue closed, dropping connection"
                );
                return Ok(());
            }
        }
    }
}

impl ConnectionHandler for LineConnectionHandler {
    fn handle(&self, stream: TcpStream) {
        let peer = stream.peer_addr().ok();
        debug!(target: LISTENER_TARGET, ?peer, "line client connected");
        match self.serve(stream, peer) {
            Ok(()) => {}
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                debug!(target: LISTENER_TARGET, ?peer, "idle connection timed out");
            }
            Err(error) => warn!(
                target: LISTENER_TARGET,
                ?peer,
                error = %error,
                "line connection failed"
            ),
        }
    }
}

/// Strips the line terminator and drops blank lines.
///
/// JSON lines also lose a trailing carriage return and are skipped when they
/// hold only whitespace. MessagePack lines keep every byte but the newline.
fn frame_payload(line: &[u8], format: WireFormat) -> Option<&[u8]> {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = match format {
        WireFormat::Json => {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.iter().all(u8::is_ascii_whitespace) {
                return None;
            }
            line
        }
        WireFormat::Msgpack => line,
    };
    (!line.is_empty()).then_some(line)
}
