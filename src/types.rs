use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use uuid::Uuid;

const MESSAGE_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[hour repr:24 padding:zero]:[minute padding:zero]");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One transcript entry. Never mutated after creation.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: OffsetDateTime,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), role, content)
    }

    pub fn with_id(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// 24-hour `HH:MM` in local time when the local offset is known, UTC otherwise.
    pub fn display_time(&self) -> String {
        format_message_time(self.timestamp, UtcOffset::current_local_offset().ok())
    }
}

fn format_message_time(timestamp: OffsetDateTime, offset: Option<UtcOffset>) -> String {
    let mut datetime = timestamp;
    if let Some(offset) = offset {
        datetime = datetime.to_offset(offset);
    }
    datetime.format(MESSAGE_TIME_FORMAT).unwrap_or_default()
}

/// Client-generated session token, stable for the lifetime of one controller.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let token: String = Uuid::new_v4().simple().to_string().chars().take(13).collect();
        Self(format!("session_{token}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentDecision {
    Accept,
    Reject,
}

/// Button labels for a consent prompt. Missing labels fall back to the defaults.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConsentOptions {
    pub accept: String,
    pub reject: String,
}

impl Default for ConsentOptions {
    fn default() -> Self {
        Self {
            accept: "Accept".to_string(),
            reject: "Reject".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsentRequest {
    pub id: String,
    pub content: String,
    pub options: ConsentOptions,
}

impl ConsentRequest {
    pub fn label_for(&self, decision: ConsentDecision) -> &str {
        match decision {
            ConsentDecision::Accept => &self.options.accept,
            ConsentDecision::Reject => &self.options.reject,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AuthorizationRequest {
    pub state: String,
    pub auth_url: String,
    pub context: Option<Map<String, Value>>,
}

impl AuthorizationRequest {
    /// Booking details shown before the user authorizes, one `Label: value` line per
    /// context entry.
    pub fn context_summary(&self) -> Vec<String> {
        let Some(context) = &self.context else {
            return Vec::new();
        };
        context
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                format!("{}: {}", humanize_key(key), value)
            })
            .collect()
    }
}

fn humanize_key(key: &str) -> String {
    key.replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => format!("{}{}", first.to_uppercase(), chars.as_str()),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn indicator_label(self) -> &'static str {
        match self {
            ConnectionState::Connected => "AI Assistant Online",
            ConnectionState::Connecting | ConnectionState::Disconnected => "Connecting...",
        }
    }

    pub fn can_send(self) -> bool {
        self == ConnectionState::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::{datetime, offset};

    #[test]
    fn test_message_time_uses_local_offset() {
        let at = datetime!(2025-03-14 08:05 UTC);
        assert_eq!(format_message_time(at, Some(offset!(+5:30))), "13:35");
        assert_eq!(format_message_time(at, None), "08:05");
    }

    #[test]
    fn test_new_messages_are_stamped_in_utc() {
        let message = ChatMessage::new(Role::User, "hello");
        assert_eq!(message.timestamp.offset(), UtcOffset::UTC);
        assert_eq!(message.display_time().len(), 5);
    }

    #[test]
    fn test_session_id_shape() {
        let id = SessionId::generate();
        let token = id.as_str().strip_prefix("session_").unwrap();
        assert_eq!(token.len(), 13);
        assert!(token.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_ne!(id, SessionId::generate());
    }

    #[test]
    fn test_consent_options_fill_missing_labels() {
        let options: ConsentOptions = serde_json::from_value(json!({"accept": "Yes, book it"})).unwrap();
        assert_eq!(options.accept, "Yes, book it");
        assert_eq!(options.reject, "Reject");
    }

    #[test]
    fn test_context_summary_humanizes_keys() {
        let request = AuthorizationRequest {
            state: "s1".into(),
            auth_url: "https://id.example/authorize".into(),
            context: json!({"hotel_name": "Gardeo Colombo", "guests": 2})
                .as_object()
                .cloned(),
        };
        let summary = request.context_summary();
        assert!(summary.contains(&"Hotel Name: Gardeo Colombo".to_string()));
        assert!(summary.contains(&"Guests: 2".to_string()));
    }

    #[test]
    fn test_display_time_is_24_hour() {
        let at = datetime!(2025-03-01 17:05 UTC);
        assert_eq!(format_message_time(at, None), "17:05");
        assert_eq!(format_message_time(at, Some(offset!(-8))), "09:05");
    }

    #[test]
    fn test_indicator_label() {
        assert_eq!(ConnectionState::Connected.indicator_label(), "AI Assistant Online");
        assert_eq!(ConnectionState::Connecting.indicator_label(), "Connecting...");
        assert!(!ConnectionState::Disconnected.can_send());
    }
}
