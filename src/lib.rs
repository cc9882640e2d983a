//! Client for the Gardeo hotel booking assistant.
//!
//! The [`session::AssistantSession`] controller owns one conversation with the
//! remote assistant: the channel lifecycle, inbound frame classification, and
//! the consent and external-authorization sub-flows. [`runtime::SessionHandle`]
//! drives it on a tokio task.
//!
//! ```rust,no_run
//! use gardeo_assistant::config::AssistantConfig;
//! use gardeo_assistant::runtime::SessionHandle;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = AssistantConfig::from_env()?;
//! let session = SessionHandle::open(&config)?;
//! session.send_message("Any rooms in Kandy this weekend?");
//! # Ok(())
//! # }
//! ```
pub mod auth_window;
pub mod config;
pub mod error;
pub mod events;
pub mod markdown;
pub mod protocol;
pub mod runtime;
pub mod session;
pub mod transport;
pub mod types;

pub use error::{AssistantError, AssistantResult};
pub use session::{AssistantSession, SessionSnapshot};
pub use types::{ChatMessage, ConnectionState, ConsentDecision, Role};
