//! Async driver for [`AssistantSession`].
//!
//! One task owns the controller. It drains the session event queue, applies
//! user commands, fires the window poll/grace timer and publishes a snapshot
//! after every step.

use crate::auth_window::{BrowserLauncher, WindowLauncher};
use crate::config::AssistantConfig;
use crate::error::AssistantResult;
use crate::events::{EventQueue, SessionEvent};
use crate::protocol::AuthCallback;
use crate::session::{AssistantSession, SessionSnapshot};
use crate::transport::{Connector, WsConnector};
use crate::types::ConsentDecision;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Clone, Debug, PartialEq)]
enum Command {
    SendMessage(String),
    RespondToConsent(ConsentDecision),
    BeginAuthorization,
    Stop,
}

/// Handle to a running session. Dropping it (or calling [`SessionHandle::stop`])
/// tears the session down.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: EventQueue,
    snapshots: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Builds the WebSocket/browser backed session described by `config` and
    /// starts it. Must be called from within a tokio runtime.
    pub fn open(config: &AssistantConfig) -> AssistantResult<Self> {
        let launcher = BrowserLauncher::new(&config.browser_command)?;
        Ok(Self::open_with(
            config,
            Box::new(WsConnector),
            Box::new(launcher),
        ))
    }

    pub fn open_with(
        config: &AssistantConfig,
        connector: Box<dyn Connector>,
        launcher: Box<dyn WindowLauncher>,
    ) -> Self {
        let (events, inbox) = EventQueue::new();
        let session = AssistantSession::new(
            config.endpoint.clone(),
            config.timings,
            connector,
            launcher,
            events.clone(),
        );
        Self::spawn(session, events, inbox)
    }

    pub fn spawn(
        mut session: AssistantSession,
        events: EventQueue,
        inbox: mpsc::UnboundedReceiver<SessionEvent>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        session.start();
        let (snapshot_tx, snapshots) = watch::channel(session.snapshot());
        let task = tokio::spawn(drive(session, command_rx, inbox, snapshot_tx));
        Self {
            commands,
            events,
            snapshots,
            task,
        }
    }

    pub fn send_message(&self, text: impl Into<String>) {
        self.command(Command::SendMessage(text.into()));
    }

    pub fn respond_to_consent(&self, decision: ConsentDecision) {
        self.command(Command::RespondToConsent(decision));
    }

    pub fn begin_authorization(&self) {
        self.command(Command::BeginAuthorization);
    }

    /// Delivers a cross-context signal. Returns false if it is not a valid
    /// `auth_callback`.
    pub fn post_signal(&self, raw: &str) -> bool {
        match AuthCallback::parse(raw) {
            Some(callback) => {
                self.events.auth_callback(callback);
                true
            }
            None => {
                debug!("ignoring signal that is not an auth_callback");
                false
            }
        }
    }

    pub fn post_auth_callback(&self, callback: AuthCallback) {
        self.events.auth_callback(callback);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    pub async fn stop(self) {
        self.command(Command::Stop);
        if let Err(err) = self.task.await {
            debug!("session task ended abnormally: {}", err);
        }
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("session task is gone, command dropped");
        }
    }
}

async fn drive(
    mut session: AssistantSession,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut inbox: mpsc::UnboundedReceiver<SessionEvent>,
    snapshots: watch::Sender<SessionSnapshot>,
) {
    loop {
        let deadline = session.next_deadline();
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::SendMessage(text)) => {
                    session.send_user_message(&text);
                }
                Some(Command::RespondToConsent(decision)) => {
                    session.respond_to_consent(decision);
                }
                Some(Command::BeginAuthorization) => {
                    session.begin_authorization(Instant::now());
                }
                Some(Command::Stop) | None => break,
            },
            Some(event) = inbox.recv() => session.handle_event(event),
            _ = sleep_until(deadline) => session.on_timer(Instant::now()),
        }
        snapshots.send_replace(session.snapshot());
    }

    session.stop();
    snapshots.send_replace(session.snapshot());
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
