//! The single inbound queue the session controller drains.
//!
//! The transport and the authorization window both post onto the same queue,
//! so events reach the controller strictly in arrival order.

use crate::protocol::AuthCallback;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Frame(String),
    Closed { reason: Option<String> },
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    Transport(TransportEvent),
    AuthCallback(AuthCallback),
}

#[derive(Clone, Debug)]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn post(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            debug!("session event dropped, controller is gone");
        }
    }

    pub fn transport(&self, event: TransportEvent) {
        self.post(SessionEvent::Transport(event));
    }

    pub fn auth_callback(&self, callback: AuthCallback) {
        self.post(SessionEvent::AuthCallback(callback));
    }
}
