//! Frames exchanged with the assistant channel, plus the cross-context
//! `auth_callback` signal posted by the authorization window.

use crate::types::{ConsentDecision, ConsentOptions};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    UserMessage {
        content: String,
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    ConsentResponse {
        decision: ConsentDecision,
        #[serde(rename = "messageId")]
        message_id: String,
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

impl OutboundFrame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    Message {
        content: String,
        #[serde(rename = "messageId", default)]
        message_id: Option<String>,
    },
    ConsentRequest {
        #[serde(rename = "messageId")]
        message_id: String,
        content: String,
        #[serde(rename = "consentOptions", default)]
        consent_options: Option<ConsentOptions>,
    },
    AuthRequest {
        state: String,
        auth_url: String,
        #[serde(default)]
        context: Option<Map<String, Value>>,
    },
    #[serde(other)]
    Unknown,
}

/// Result of classifying one raw payload from the channel.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    Frame(InboundFrame),
    /// Payload was not JSON; shown as an assistant message.
    PlainText(String),
    /// Valid JSON that is not a frame we understand.
    Unrecognized,
}

pub fn classify(raw: &str) -> Inbound {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => return Inbound::PlainText(raw.to_string()),
    };
    match serde_json::from_value::<InboundFrame>(value) {
        Ok(frame) => Inbound::Frame(frame),
        Err(err) => {
            debug!("inbound JSON is not a known frame: {}", err);
            Inbound::Unrecognized
        }
    }
}

/// `{type: "auth_callback", state, token?}` posted back by the authorization window.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AuthCallback {
    pub state: String,
    /// Opaque token payload; carried through but not interpreted here.
    #[serde(default)]
    pub token: Option<Value>,
}

impl AuthCallback {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            token: None,
        }
    }

    /// Accepts only signals whose `type` is `auth_callback` and whose `state` is non-empty.
    pub fn from_signal(value: &Value) -> Option<Self> {
        if value.get("type").and_then(Value::as_str) != Some("auth_callback") {
            return None;
        }
        let callback: AuthCallback = serde_json::from_value(value.clone()).ok()?;
        if callback.state.is_empty() {
            return None;
        }
        Some(callback)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        Self::from_signal(&value)
    }
}
