//! Transport command relay.
//!
//! A thin fire-and-forget channel between user-facing controls and the
//! session control loop. The relay holds no playback state; sends after
//! the session has ended are silently dropped.

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::defaults::SEEK_STEP_SECS;

#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    PauseToggle,
    Stop,
    /// Relative seek in seconds, negative for backwards.
    Seek(f64),
    SetSpeed(f64),
}

/// Create the relay. The receiver side belongs to the session control
/// loop; the handle can be cloned freely across control surfaces.
pub fn transport_channel() -> (TransportHandle, Receiver<TransportCommand>) {
    let (tx, rx) = unbounded();
    (TransportHandle { tx }, rx)
}

#[derive(Clone)]
pub struct TransportHandle {
    tx: Sender<TransportCommand>,
}

impl TransportHandle {
    /// Best-effort delivery; dropped if the session is gone.
    pub fn send(&self, command: TransportCommand) {
        let _ = self.tx.send(command);
    }

    pub fn pause_toggle(&self) {
        self.send(TransportCommand::PauseToggle);
    }

    pub fn stop(&self) {
        self.send(TransportCommand::Stop);
    }

    pub fn seek(&self, delta_seconds: f64) {
        self.send(TransportCommand::Seek(delta_seconds));
    }

    pub fn seek_forward(&self) {
        self.seek(SEEK_STEP_SECS);
    }

    pub fn seek_back(&self) {
        self.seek(-SEEK_STEP_SECS);
    }

    pub fn set_speed(&self, multiplier: f64) {
        self.send(TransportCommand::SetSpeed(multiplier));
    }
}
