//! Bounded hand-off between front ends and the worker pool.
//!
//! Front ends block in [`RequestQueue::enqueue`] while the queue is full, so
//! a slow pool pushes back on the sockets instead of growing memory. Closing
//! the queue stops admission; envelopes already queued are still drained.

use std::io::{self, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError};
use thiserror::Error;

/// How often a blocked producer rechecks whether the queue was closed.
const ENQUEUE_POLL: Duration = Duration::from_millis(50);

/// Errors returned by [`RequestQueue::enqueue`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The daemon is shutting down and admits no new work.
    #[error("request queue is closed")]
    Closed,
}

/// Errors raised while handing a reply back to its front end.
#[derive(Debug, Error)]
pub enum ReplyError {
    /// Writing to the client connection failed.
    #[error("failed to write reply: {0}")]
    Write(#[from] io::Error),
    /// The waiting front end went away before the reply arrived.
    #[error("reply receiver has gone away")]
    Disconnected,
}

/// Where a reply goes once a worker has produced it.
#[derive(Debug, Clone)]
pub enum ReplyHandle {
    /// Write the reply followed by a newline onto a shared line connection.
    Line(Arc<Mutex<TcpStream>>),
    /// Hand the reply to a waiting front end; the send doubles as completion.
    Channel(Sender<Option<Vec<u8>>>),
}

impl ReplyHandle {
    /// Builds a channel handle and the receiver its front end waits on.
    #[must_use]
    pub fn channel() -> (Self, Receiver<Option<Vec<u8>>>) {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        (Self::Channel(sender), receiver)
    }
}

/// One unit of work travelling through the queue.
#[derive(Debug)]
pub struct RequestEnvelope {
    payload: Vec<u8>,
    token: Option<String>,
    reply: ReplyHandle,
}

impl RequestEnvelope {
    /// Packs a raw payload with its transport token and reply route.
    #[must_use]
    pub fn new(payload: Vec<u8>, token: Option<String>, reply: ReplyHandle) -> Self {
        Self {
            payload,
            token,
            reply,
        }
    }

    /// Raw encoded payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Transport-level bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Delivers `reply` and signals completion.
    ///
    /// A `None` reply writes nothing to a line connection but still
    /// completes a channel handle.
    ///
    /// # Errors
    ///
    /// Returns [`ReplyError`] when the connection write fails or the waiting
    /// front end has gone.
    pub fn complete(self, reply: Option<Vec<u8>>) -> Result<(), ReplyError> {
        match self.reply {
            ReplyHandle::Line(stream) => {
                let Some(mut bytes) = reply else {
                    return Ok(());
                };
                bytes.push(b'\n');
                let mut stream = stream.lock().unwrap_or_else(PoisonError::into_inner);
                stream.write_all(&bytes)?;
                stream.flush()?;
                Ok(())
            }
            ReplyHandle::Channel(sender) => sender
                .send(reply)
                .map_err(|_| ReplyError::Disconnected),
        }
    }
}

/// Builds a queue holding at most `capacity` envelopes.
///
/// A capacity of zero makes every enqueue a rendezvous with a worker.
#[must_use]
pub fn request_queue(capacity: usize) -> (RequestQueue, QueueReceiver) {
    let (sender, receiver) = crossbeam_channel::bounded(capacity);
    let gate = Arc::new(AdmissionGate::default());
    (
        RequestQueue {
            sender,
            gate: Arc::clone(&gate),
        },
        QueueReceiver { receiver, gate },
    )
}

/// Shared close flag plus a count of producers currently inside `enqueue`.
///
/// A producer registers before it checks the flag, so once the consumer sees
/// the queue closed with nobody registered, no further send can land.
#[derive(Debug, Default)]
struct AdmissionGate {
    closed: AtomicBool,
    in_flight: AtomicUsize,
}

impl AdmissionGate {
    fn enter(&self) -> InFlight<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlight(&self.in_flight)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Closed with no producer left that could still send.
    fn is_settled(&self) -> bool {
        self.is_closed() && self.in_flight.load(Ordering::SeqCst) == 0
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Producer side shared by every front end.
#[derive(Debug, Clone)]
pub struct RequestQueue {
    sender: Sender<RequestEnvelope>,
    gate: Arc<AdmissionGate>,
}

impl RequestQueue {
    /// Queues `envelope`, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] once the queue has been closed or every
    /// worker has gone.
    pub fn enqueue(&self, envelope: RequestEnvelope) -> Result<(), QueueError> {
        let _in_flight = self.gate.enter();
        let mut envelope = envelope;
        loop {
            if self.is_closed() {
                return Err(QueueError::Closed);
            }
            match self.sender.send_timeout(envelope, ENQUEUE_POLL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(returned)) => envelope = returned,
                Err(SendTimeoutError::Disconnected(_)) => return Err(QueueError::Closed),
            }
        }
    }

    /// Stops admitting new envelopes.
    pub fn close(&self) {
        self.gate.closed.store(true, Ordering::SeqCst);
    }

    /// Whether [`RequestQueue::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.gate.is_closed()
    }

    /// Envelopes currently waiting for a worker.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.sender.len()
    }
}

/// Outcome of one poll on the consumer side.
#[derive(Debug)]
pub enum Next {
    /// Work to process.
    Envelope(RequestEnvelope),
    /// Nothing arrived within the poll interval.
    Idle,
    /// The queue is closed and empty; the caller should stop.
    Drained,
}

/// Consumer side cloned into every worker.
#[derive(Debug, Clone)]
pub struct QueueReceiver {
    receiver: Receiver<RequestEnvelope>,
    gate: Arc<AdmissionGate>,
}

impl QueueReceiver {
    /// Waits up to `poll` for the next envelope.
    ///
    /// Reports [`Next::Drained`] only once the queue is closed, no producer
    /// is still mid-enqueue and the channel is empty.
    #[must_use]
    pub fn next(&self, poll: Duration) -> Next {
        match self.receiver.recv_timeout(poll) {
            Ok(envelope) => Next::Envelope(envelope),
            Err(RecvTimeoutError::Timeout) if self.gate.is_settled() => {
                match self.receiver.try_recv() {
                    Ok(envelope) => Next::Envelope(envelope),
                    Err(TryRecvError::Empty | TryRecvError::Disconnected) => Next::Drained,
                }
            }
            Err(RecvTimeoutError::Timeout) => Next::Idle,
            Err(RecvTimeoutError::Disconnected) => Next::Drained,
        }
    }
}
