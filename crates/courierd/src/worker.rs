//! Fixed-size pool of request workers.
//!
//! Each worker pulls envelopes until the queue is closed and empty. A panic
//! while processing one envelope is caught and logged; the worker then moves
//! on to the next envelope.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, error, info, warn};

use crate::dispatch::{Dispatcher, panic_message};
use crate::queue::{Next, QueueReceiver, RequestEnvelope};

pub(crate) const WORKER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::worker");

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Turns one envelope into a delivered reply.
pub trait EnvelopeProcessor: Send + Sync + 'static {
    /// Processes `envelope` and completes it.
    fn process(&self, envelope: RequestEnvelope);
}

impl EnvelopeProcessor for Dispatcher {
    fn process(&self, envelope: RequestEnvelope) {
        let reply = self.handle_payload(envelope.payload(), envelope.token());
        if let Err(error) = envelope.complete(reply) {
            warn!(
                target: WORKER_TARGET,
                error = %error,
                "failed to deliver reply"
            );
        }
    }
}

/// Handle to the running workers.
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<thread::JoinHandle<()>>,
    exited: Receiver<()>,
}

impl WorkerPool {
    /// Starts `count` workers consuming from `receiver`.
    ///
    /// # Errors
    ///
    /// Returns the OS error when a worker thread cannot be spawned.
    pub fn spawn<P>(count: usize, receiver: &QueueReceiver, processor: &Arc<P>) -> io::Result<Self>
    where
        P: EnvelopeProcessor,
    {
        // Workers only hold the sender; the channel disconnects once all exit.
        let (alive, exited) = crossbeam_channel::bounded::<()>(0);
        let mut handles = Vec::with_capacity(count);
        for index in 0..count {
            let receiver = receiver.clone();
            let processor = Arc::clone(processor);
            let alive = alive.clone();
            let handle = thread::Builder::new()
                .name(format!("courier-worker-{index}"))
                .spawn(move || {
                    run_worker(index, &receiver, processor.as_ref());
                    drop(alive);
                })?;
            handles.push(handle);
        }
        info!(target: WORKER_TARGET, workers = count, "worker pool started");
        Ok(Self { handles, exited })
    }

    /// Number of workers started.
    #[must_use]
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Waits up to `grace` for every worker to finish.
    ///
    /// Returns `true` when all workers exited in time. Workers still running
    /// after the grace period are abandoned.
    pub fn drain(self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        loop {
            match self.exited.recv_deadline(deadline) {
                Ok(()) => {}
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        target: WORKER_TARGET,
                        grace_ms = grace.as_millis(),
                        "workers still busy after grace period"
                    );
                    return false;
                }
            }
        }
        for handle in self.handles {
            if handle.join().is_err() {
                warn!(target: WORKER_TARGET, "worker thread panicked while exiting");
            }
        }
        true
    }
}

fn run_worker<P>(index: usize, receiver: &QueueReceiver, processor: &P)
where
    P: EnvelopeProcessor + ?Sized,
{
    debug!(target: WORKER_TARGET, worker = index, "worker started");
    loop {
        match receiver.next(POLL_INTERVAL) {
            Next::Envelope(envelope) => {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| processor.process(envelope)));
                if let Err(payload) = outcome {
                    error!(
                        target: WORKER_TARGET,
                        worker = index,
                        panic = %panic_message(payload.as_ref()),
                        "request processing panicked"
                    );
                }
            }
            Next::Idle => {}
            Next::Drained => break,
        }
    }
    debug!(target: WORKER_TARGET, worker = index, "worker stopped");
}
