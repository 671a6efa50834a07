//! Control signal source driven by the test instead of the OS.

use crossbeam_channel::{Receiver, Sender};

use crate::process::{ControlSignal, ControlSignals, ShutdownError};

/// Receiving half handed to the daemon under test.
pub struct ScriptedSignals {
    receiver: Receiver<ControlSignal>,
}

/// Sending half kept by the scenario.
#[derive(Clone)]
pub struct SignalScript {
    sender: Sender<ControlSignal>,
}

/// Builds a connected script/source pair.
#[must_use]
pub fn scripted_signals() -> (SignalScript, ScriptedSignals) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    (SignalScript { sender }, ScriptedSignals { receiver })
}

impl SignalScript {
    /// Delivers `signal`; fails once the daemon has stopped listening.
    pub fn send(&self, signal: ControlSignal) -> Result<(), String> {
        self.sender
            .send(signal)
            .map_err(|_| "daemon stopped listening for signals".to_owned())
    }
}

impl ControlSignals for ScriptedSignals {
    fn next(&mut self) -> Result<ControlSignal, ShutdownError> {
        // A dropped script behaves like the terminal going away.
        Ok(self.receiver.recv().unwrap_or(ControlSignal::Shutdown))
    }
}
