use crate::error::{AssistantError, AssistantResult};
use crate::types::SessionId;
use std::env;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8000/chat";
pub const DEFAULT_POLL_MS: u64 = 1000;
pub const DEFAULT_GRACE_MS: u64 = 500;
pub const DEFAULT_BROWSER: &str = "firefox --new-window";

/// Runtime configuration for one assistant session.
#[derive(Clone, Debug, PartialEq)]
pub struct AssistantConfig {
    /// Channel endpoint; the session id is appended as `session_id`.
    pub endpoint: Url,
    pub timings: SessionTimings,
    /// Command line that hosts the authorization window.
    pub browser_command: String,
}

/// Closed-window poll cadence and the grace period that lets a late
/// `auth_callback` win over the abandonment check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionTimings {
    pub poll_interval: Duration,
    pub grace_interval: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
            grace_interval: Duration::from_millis(DEFAULT_GRACE_MS),
        }
    }
}

impl AssistantConfig {
    pub fn from_env() -> AssistantResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AssistantResult<Self> {
        let endpoint = lookup("ASSISTANT_WS_URL").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let endpoint = Url::parse(&endpoint)?;
        // The transport is built without TLS support.
        if endpoint.scheme() != "ws" {
            return Err(AssistantError::Config {
                key: "ASSISTANT_WS_URL",
                reason: format!("expected a ws:// URL, got {}", endpoint.scheme()),
            });
        }

        let timings = SessionTimings {
            poll_interval: millis(&lookup, "ASSISTANT_AUTH_POLL_MS", DEFAULT_POLL_MS)?,
            grace_interval: millis(&lookup, "ASSISTANT_AUTH_GRACE_MS", DEFAULT_GRACE_MS)?,
        };
        if timings.poll_interval.is_zero() {
            return Err(AssistantError::Config {
                key: "ASSISTANT_AUTH_POLL_MS",
                reason: "must be greater than zero".to_string(),
            });
        }

        let browser_command =
            lookup("ASSISTANT_AUTH_BROWSER").unwrap_or_else(|| DEFAULT_BROWSER.to_string());

        Ok(Self {
            endpoint,
            timings,
            browser_command,
        })
    }

    pub fn session_endpoint(&self, session_id: &SessionId) -> Url {
        session_endpoint(&self.endpoint, session_id)
    }
}

/// Channel URL for one session: the base endpoint with `session_id` appended.
pub fn session_endpoint(base: &Url, session_id: &SessionId) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut()
        .append_pair("session_id", session_id.as_str());
    url
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> AssistantResult<Duration> {
    match lookup(key) {
        None => Ok(Duration::from_millis(default)),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|err| AssistantError::Config {
                key,
                reason: format!("{raw:?} is not a millisecond count ({err})"),
            }),
    }
}

/// Loads `.env` if present; real environment variables take precedence.
pub fn load_dotenv() {
    if let Err(err) = dotenvy::dotenv() {
        debug!("no .env loaded: {}", err);
    }
}
