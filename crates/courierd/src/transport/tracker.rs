//! Bookkeeping for open client connections.
//!
//! Every accepted stream is registered through a clone of its socket so
//! shutdown can wait for connections to finish and then sever the rest.

use std::collections::HashMap;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;

use super::LISTENER_TARGET;

#[derive(Debug, Default)]
struct TrackerState {
    next_id: AtomicU64,
    open: Mutex<HashMap<u64, Option<TcpStream>>>,
    idle: Condvar,
}

/// Shared registry of live connections for one front end.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConnectionTracker {
    state: Arc<TrackerState>,
}

impl ConnectionTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records `stream` until the returned guard is dropped.
    pub(crate) fn register(&self, stream: &TcpStream) -> ConnectionGuard {
        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = match stream.try_clone() {
            Ok(handle) => Some(handle),
            Err(error) => {
                debug!(
                    target: LISTENER_TARGET,
                    error = %error,
                    "connection cannot be force-closed"
                );
                None
            }
        };
        self.lock().insert(id, handle);
        ConnectionGuard {
            id,
            tracker: self.clone(),
        }
    }

    /// Connections currently open.
    pub(crate) fn active(&self) -> usize {
        self.lock().len()
    }

    /// Blocks until no connection is open or `timeout` passes.
    ///
    /// Returns `true` when every connection closed in time.
    pub(crate) fn wait_idle(&self, timeout: Duration) -> bool {
        let open = self.lock();
        let (open, _) = self
            .state
            .idle
            .wait_timeout_while(open, timeout, |open| !open.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        open.is_empty()
    }

    /// Shuts down every open socket in both directions, returning how many
    /// were severed.
    pub(crate) fn force_close(&self) -> usize {
        let open = self.lock();
        let mut severed = 0;
        for stream in open.values().flatten() {
            if stream.shutdown(Shutdown::Both).is_ok() {
                severed += 1;
            }
        }
        severed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Option<TcpStream>>> {
        self.state.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, id: u64) {
        let mut open = self.lock();
        open.remove(&id);
        if open.is_empty() {
            self.state.idle.notify_all();
        }
    }
}

/// Keeps a connection registered while it is being served.
#[derive(Debug)]
pub(crate) struct ConnectionGuard {
    id: u64,
    tracker: ConnectionTracker,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.tracker.release(self.id);
    }
}
