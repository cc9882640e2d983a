/// Errors at the fallible edges of the assistant client: configuration,
/// frame encoding, channel writes and launching the authorization window.
///
/// The session controller itself never returns these to its caller; it turns
/// them into connection state or system messages.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("Invalid configuration for {key}: {reason}")]
    Config { key: &'static str, reason: String },

    #[error("Invalid endpoint URL: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("Frame encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Channel is closed")]
    ChannelClosed,

    #[error("Failed to launch authorization window: {0}")]
    Launch(#[from] std::io::Error),
}

pub type AssistantResult<T> = Result<T, AssistantError>;
