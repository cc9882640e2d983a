//! Assistant session controller.
//!
//! Owns one logical conversation: the channel, the session identity, the
//! transcript and the two single-slot pending prompts (consent and
//! authorization). All methods are synchronous reactions to one discrete
//! event; the async driver lives in [`crate::runtime`].
//!
//! The closed-window poll and the `auth_callback` signal race to clear the
//! same authorization slot. Both go through `clear_pending_authorization`,
//! which only clears the slot while it still holds the state it was called
//! for, so whichever arrives second is a no-op. A window that cannot be
//! watched ends the poll without abandoning the request.
//!
//! Every known inbound frame clears the typing indicator. Frames of an unknown
//! type, and JSON that is not a valid frame, leave it as it is.

use crate::auth_window::{
    AUTH_WINDOW_GEOMETRY, AUTH_WINDOW_NAME, AuthWindow, WindowLauncher, WindowStatus,
};
use crate::config::{SessionTimings, session_endpoint};
use crate::events::{EventQueue, SessionEvent, TransportEvent};
use crate::protocol::{self, AuthCallback, Inbound, InboundFrame, OutboundFrame};
use crate::transport::{Channel, Connector};
use crate::types::{
    AuthorizationRequest, ChatMessage, ConnectionState, ConsentDecision, ConsentRequest, Role,
    SessionId,
};
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

pub const POPUP_BLOCKED_TEXT: &str = "Popup was blocked. Please allow popups for this site.";
pub const AUTH_WINDOW_OPENED_TEXT: &str =
    "Authorization window opened. Please complete the login process.";
pub const AUTH_COMPLETED_TEXT: &str =
    "Authorization completed successfully. Processing your booking...";
pub const AUTH_ABANDONED_TEXT: &str =
    "Authorization window was closed. The booking was not completed.";

/// Channel lifecycle. `Closed` is terminal for a controller instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelPhase {
    Idle,
    Connecting,
    Open,
    Closed,
}

enum AuthWatch {
    Polling {
        state: String,
        window: Box<dyn AuthWindow>,
        next_poll: Instant,
    },
    Grace {
        state: String,
        deadline: Instant,
    },
}

/// Everything the UI renders, cloned out of the controller.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: Option<SessionId>,
    pub connection: ConnectionState,
    pub messages: Vec<ChatMessage>,
    pub typing: bool,
    pub pending_consent: Option<ConsentRequest>,
    pub pending_authorization: Option<AuthorizationRequest>,
}

pub struct AssistantSession {
    endpoint: Url,
    timings: SessionTimings,
    connector: Box<dyn Connector>,
    launcher: Box<dyn WindowLauncher>,
    events: EventQueue,
    session_id: Option<SessionId>,
    phase: ChannelPhase,
    channel: Option<Box<dyn Channel>>,
    messages: Vec<ChatMessage>,
    typing: bool,
    pending_consent: Option<ConsentRequest>,
    pending_authorization: Option<AuthorizationRequest>,
    authorization_completed: bool,
    auth_watch: Option<AuthWatch>,
    stopped: bool,
}

impl AssistantSession {
    pub fn new(
        endpoint: Url,
        timings: SessionTimings,
        connector: Box<dyn Connector>,
        launcher: Box<dyn WindowLauncher>,
        events: EventQueue,
    ) -> Self {
        Self {
            endpoint,
            timings,
            connector,
            launcher,
            events,
            session_id: None,
            phase: ChannelPhase::Idle,
            channel: None,
            messages: Vec::new(),
            typing: false,
            pending_consent: None,
            pending_authorization: None,
            authorization_completed: false,
            auth_watch: None,
            stopped: false,
        }
    }

    // ---------------
    // Lifecycle
    // ---------------

    /// Opens the channel the first time the widget is shown. Later calls,
    /// including after a transport close, do nothing.
    pub fn start(&mut self) -> bool {
        if self.stopped || self.phase != ChannelPhase::Idle {
            debug!("start ignored in phase {:?}", self.phase);
            return false;
        }
        let session_id = self.session_id.get_or_insert_with(SessionId::generate).clone();
        let url = session_endpoint(&self.endpoint, &session_id);

        info!("starting assistant session {}", session_id);
        self.channel = Some(self.connector.connect(&url, self.events.clone()));
        self.phase = ChannelPhase::Connecting;
        true
    }

    /// Tears the session down: closes the channel, cancels the window poll and
    /// makes every later event a no-op.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        info!("stopping assistant session");
        self.stopped = true;
        self.auth_watch = None;
        self.typing = false;
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        if self.stopped {
            debug!("event after stop ignored: {:?}", event);
            return;
        }
        match event {
            SessionEvent::Transport(TransportEvent::Opened) => self.on_opened(),
            SessionEvent::Transport(TransportEvent::Frame(raw)) => self.on_frame(&raw),
            SessionEvent::Transport(TransportEvent::Closed { reason }) => self.on_closed(reason),
            SessionEvent::AuthCallback(callback) => self.on_auth_callback(callback),
        }
    }

    fn on_opened(&mut self) {
        if self.phase != ChannelPhase::Connecting {
            debug!("open notification in phase {:?} ignored", self.phase);
            return;
        }
        self.phase = ChannelPhase::Open;
    }

    fn on_closed(&mut self, reason: Option<String>) {
        if let Some(reason) = reason {
            debug!("transport closed: {}", reason);
        }
        self.phase = ChannelPhase::Closed;
        self.typing = false;
        self.channel = None;
    }

    // ---------------
    // Inbound frames
    // ---------------

    fn on_frame(&mut self, raw: &str) {
        match protocol::classify(raw) {
            Inbound::PlainText(text) => self.push_assistant(None, text),
            Inbound::Frame(InboundFrame::Message {
                content,
                message_id,
            }) => self.push_assistant(message_id, content),
            Inbound::Frame(InboundFrame::ConsentRequest {
                message_id,
                content,
                consent_options,
            }) => {
                self.typing = false;
                if let Some(previous) = &self.pending_consent {
                    debug!("consent request {} replaced by {}", previous.id, message_id);
                }
                self.pending_consent = Some(ConsentRequest {
                    id: message_id,
                    content,
                    options: consent_options.unwrap_or_default(),
                });
            }
            Inbound::Frame(InboundFrame::AuthRequest {
                state,
                auth_url,
                context,
            }) => {
                self.typing = false;
                self.pending_authorization = Some(AuthorizationRequest {
                    state,
                    auth_url,
                    context,
                });
            }
            Inbound::Frame(InboundFrame::Unknown) | Inbound::Unrecognized => {
                debug!("ignoring inbound frame: {}", raw);
            }
        }
    }

    fn push_assistant(&mut self, id: Option<String>, content: String) {
        self.typing = false;
        let message = match id {
            Some(id) => ChatMessage::with_id(id, Role::Assistant, content),
            None => ChatMessage::new(Role::Assistant, content),
        };
        self.messages.push(message);
    }

    fn push_system(&mut self, content: &str) {
        self.messages.push(ChatMessage::new(Role::System, content));
    }

    // ---------------
    // User actions
    // ---------------

    /// Appends the user's message and sends it. Ignored when the text is blank
    /// or the channel is not open.
    pub fn send_user_message(&mut self, text: &str) -> bool {
        if text.trim().is_empty() || self.phase != ChannelPhase::Open || self.stopped {
            return false;
        }
        let Some(session_id) = self.session_id.clone() else {
            return false;
        };

        self.messages.push(ChatMessage::new(Role::User, text));
        self.typing = true;
        self.send(OutboundFrame::UserMessage {
            content: text.to_string(),
            session_id: session_id.to_string(),
        });
        true
    }

    /// Answers the pending consent prompt. The prompt is cleared even when the
    /// channel is down.
    pub fn respond_to_consent(&mut self, decision: ConsentDecision) -> bool {
        if self.stopped {
            return false;
        }
        let Some(request) = self.pending_consent.take() else {
            return false;
        };

        self.messages
            .push(ChatMessage::new(Role::User, request.label_for(decision)));
        if self.phase == ChannelPhase::Open
            && let Some(session_id) = &self.session_id
        {
            let frame = OutboundFrame::ConsentResponse {
                decision,
                message_id: request.id.clone(),
                session_id: session_id.to_string(),
            };
            self.send(frame);
        } else {
            debug!("consent {} answered while channel is not open", request.id);
        }
        true
    }

    /// Opens the authorization window for the pending request and starts
    /// watching for it to close. Returns false when there is nothing pending
    /// or the window was blocked; a blocked request stays pending.
    pub fn begin_authorization(&mut self, now: Instant) -> bool {
        if self.stopped {
            return false;
        }
        let Some(request) = &self.pending_authorization else {
            return false;
        };
        let state = request.state.clone();
        let window = self
            .launcher
            .open(&request.auth_url, AUTH_WINDOW_NAME, AUTH_WINDOW_GEOMETRY);

        let Some(window) = window else {
            warn!("authorization window blocked for state {}", state);
            self.push_system(POPUP_BLOCKED_TEXT);
            return false;
        };

        self.authorization_completed = false;
        self.push_system(AUTH_WINDOW_OPENED_TEXT);
        self.auth_watch = Some(AuthWatch::Polling {
            state,
            window,
            next_poll: now + self.timings.poll_interval,
        });
        true
    }

    fn send(&self, frame: OutboundFrame) {
        let Some(channel) = &self.channel else {
            return;
        };
        if let Err(err) = channel.send(&frame) {
            warn!("failed to send frame: {}", err);
        }
    }

    // ---------------
    // Authorization completion
    // ---------------

    fn on_auth_callback(&mut self, callback: AuthCallback) {
        match &self.pending_authorization {
            Some(pending) if pending.state == callback.state => {}
            Some(pending) => {
                warn!(
                    "auth callback for state {} does not match pending {}",
                    callback.state, pending.state
                );
                return;
            }
            None => {
                debug!("auth callback for state {} with nothing pending", callback.state);
                return;
            }
        }

        self.authorization_completed = true;
        self.clear_pending_authorization(&callback.state);
        self.push_system(AUTH_COMPLETED_TEXT);
    }

    /// Clears the authorization slot if it still holds `state`.
    fn clear_pending_authorization(&mut self, state: &str) -> Option<AuthorizationRequest> {
        match &self.pending_authorization {
            Some(pending) if pending.state == state => self.pending_authorization.take(),
            _ => None,
        }
    }

    /// Advances the closed-window poll and the grace check.
    pub fn on_timer(&mut self, now: Instant) {
        if self.stopped {
            return;
        }
        match self.auth_watch.take() {
            Some(AuthWatch::Polling {
                state,
                mut window,
                next_poll,
            }) => {
                if now < next_poll {
                    self.auth_watch = Some(AuthWatch::Polling {
                        state,
                        window,
                        next_poll,
                    });
                } else {
                    match window.status() {
                        WindowStatus::Open => {
                            self.auth_watch = Some(AuthWatch::Polling {
                                state,
                                window,
                                next_poll: now + self.timings.poll_interval,
                            });
                        }
                        WindowStatus::Closed => {
                            debug!("authorization window for {} closed", state);
                            self.auth_watch = Some(AuthWatch::Grace {
                                state,
                                deadline: now + self.timings.grace_interval,
                            });
                        }
                        WindowStatus::Detached => {
                            info!(
                                "authorization window for {} cannot be watched, waiting for the callback",
                                state
                            );
                        }
                    }
                }
            }
            Some(AuthWatch::Grace { state, deadline }) => {
                if now < deadline {
                    self.auth_watch = Some(AuthWatch::Grace { state, deadline });
                } else if !self.authorization_completed
                    && self.clear_pending_authorization(&state).is_some()
                {
                    info!("authorization {} abandoned", state);
                    self.push_system(AUTH_ABANDONED_TEXT);
                }
            }
            None => {}
        }
    }

    /// When the driver should next call [`Self::on_timer`].
    pub fn next_deadline(&self) -> Option<Instant> {
        match &self.auth_watch {
            Some(AuthWatch::Polling { next_poll, .. }) => Some(*next_poll),
            Some(AuthWatch::Grace { deadline, .. }) => Some(*deadline),
            None => None,
        }
    }

    // ---------------
    // Accessors
    // ---------------

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn phase(&self) -> ChannelPhase {
        self.phase
    }

    pub fn connection_state(&self) -> ConnectionState {
        match self.phase {
            _ if self.stopped => ConnectionState::Disconnected,
            ChannelPhase::Connecting => ConnectionState::Connecting,
            ChannelPhase::Open => ConnectionState::Connected,
            ChannelPhase::Idle | ChannelPhase::Closed => ConnectionState::Disconnected,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn pending_consent(&self) -> Option<&ConsentRequest> {
        self.pending_consent.as_ref()
    }

    pub fn pending_authorization(&self) -> Option<&AuthorizationRequest> {
        self.pending_authorization.as_ref()
    }

    pub fn authorization_completed(&self) -> bool {
        self.authorization_completed
    }

    pub fn is_watching_window(&self) -> bool {
        self.auth_watch.is_some()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            connection: self.connection_state(),
            messages: self.messages.clone(),
            typing: self.typing,
            pending_consent: self.pending_consent.clone(),
            pending_authorization: self.pending_authorization.clone(),
        }
    }
}
