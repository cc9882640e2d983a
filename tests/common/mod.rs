//! In-memory stand-ins for the channel and the authorization window.
#![allow(dead_code)]

use gardeo_assistant::AssistantResult;
use gardeo_assistant::auth_window::{AuthWindow, WindowGeometry, WindowLauncher, WindowStatus};
use gardeo_assistant::config::SessionTimings;
use gardeo_assistant::events::{EventQueue, SessionEvent};
use gardeo_assistant::protocol::OutboundFrame;
use gardeo_assistant::session::AssistantSession;
use gardeo_assistant::transport::{Channel, Connector};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

#[derive(Clone, Default)]
pub struct FakeConnector {
    pub connects: Arc<Mutex<Vec<Url>>>,
    pub sent: Arc<Mutex<Vec<OutboundFrame>>>,
}

impl FakeConnector {
    pub fn connect_count(&self) -> usize {
        self.connects.lock().unwrap().len()
    }

    pub fn sent(&self) -> Vec<OutboundFrame> {
        self.sent.lock().unwrap().clone()
    }
}

impl Connector for FakeConnector {
    fn connect(&mut self, url: &Url, _events: EventQueue) -> Box<dyn Channel> {
        self.connects.lock().unwrap().push(url.clone());
        Box::new(FakeChannel {
            sent: self.sent.clone(),
        })
    }
}

struct FakeChannel {
    sent: Arc<Mutex<Vec<OutboundFrame>>>,
}

impl Channel for FakeChannel {
    fn send(&self, frame: &OutboundFrame) -> AssistantResult<()> {
        self.sent.lock().unwrap().push(frame.clone());
        Ok(())
    }

    fn close(&mut self) {}
}

#[derive(Clone, Default)]
pub struct FakeLauncher {
    pub blocked: Arc<AtomicBool>,
    pub opened: Arc<Mutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
    pub detached: Arc<AtomicBool>,
    pub dropped: Arc<AtomicUsize>,
}

impl FakeLauncher {
    pub fn block(&self) {
        self.blocked.store(true, Ordering::SeqCst);
    }

    pub fn close_window(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn detach_window(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }

    pub fn dropped_count(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }
}

impl WindowLauncher for FakeLauncher {
    fn open(
        &mut self,
        url: &str,
        _name: &str,
        _geometry: WindowGeometry,
    ) -> Option<Box<dyn AuthWindow>> {
        if self.blocked.load(Ordering::SeqCst) {
            return None;
        }
        self.opened.lock().unwrap().push(url.to_string());
        Some(Box::new(FakeWindow {
            closed: self.closed.clone(),
            detached: self.detached.clone(),
            dropped: self.dropped.clone(),
        }))
    }
}

struct FakeWindow {
    closed: Arc<AtomicBool>,
    detached: Arc<AtomicBool>,
    dropped: Arc<AtomicUsize>,
}

impl AuthWindow for FakeWindow {
    fn status(&mut self) -> WindowStatus {
        if self.detached.load(Ordering::SeqCst) {
            WindowStatus::Detached
        } else if self.closed.load(Ordering::SeqCst) {
            WindowStatus::Closed
        } else {
            WindowStatus::Open
        }
    }
}

impl Drop for FakeWindow {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

pub const POLL: Duration = Duration::from_millis(1000);
pub const GRACE: Duration = Duration::from_millis(500);

pub fn endpoint() -> Url {
    Url::parse("ws://localhost:8000/chat").unwrap()
}

pub struct Harness {
    pub session: AssistantSession,
    pub connector: FakeConnector,
    pub launcher: FakeLauncher,
    pub inbox: mpsc::UnboundedReceiver<SessionEvent>,
}

pub fn harness() -> Harness {
    let connector = FakeConnector::default();
    let launcher = FakeLauncher::default();
    let (events, inbox) = EventQueue::new();
    let session = AssistantSession::new(
        endpoint(),
        SessionTimings {
            poll_interval: POLL,
            grace_interval: GRACE,
        },
        Box::new(connector.clone()),
        Box::new(launcher.clone()),
        events,
    );
    Harness {
        session,
        connector,
        launcher,
        inbox,
    }
}
