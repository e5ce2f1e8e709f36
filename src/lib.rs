//! # GroupLLM
//!
//! GroupLLM orchestrates group conversations between a human user and several AI agents,
//! each backed by its own independently configured chat-completion backend.
//!
//! The crate provides layered pieces for:
//!
//! * **Fair speaker scheduling**: a coordinator model suggests who should answer, and
//!   [`fairness`] guarantees that an agent silent for too many user turns is always
//!   scheduled, whatever the coordinator says
//! * **Isolated context**: [`context::ContextBuilder`] replays the shared log from each
//!   agent's point of view, so an agent never mistakes someone else's line for its own
//! * **Crosstalk filtering**: [`sanitize`] strips echoed self tags and cuts replies where
//!   a model starts writing lines for other members
//! * **Natural cadence**: replies are split into [`fragment`]s and interleaved
//!   position by position, optionally followed by agent-to-agent [`continuation`] rounds
//! * **Resilience**: per-agent retries with linear backoff; a failing backend costs one
//!   voice for one round, never the conversation
//!
//! Sessions are plain values owned by the host. [`GroupChat`] keeps no per-session
//! state, so one instance can drive many sessions concurrently.
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use groupllm::clients::openai::OpenAICompatibleClient;
//! use groupllm::profile::{AgentProfile, BackendConfig};
//! use groupllm::sink::JsonlConversationSink;
//! use groupllm::{GroupChat, GroupChatConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     groupllm::init_logger();
//!
//!     let key = std::env::var("OPEN_AI_SECRET")?;
//!     let fast = BackendConfig::new("https://api.openai.com", key.as_str(), "gpt-4.1-nano");
//!     let smart = BackendConfig::new("https://api.openai.com", key.as_str(), "gpt-4.1");
//!
//!     let config = GroupChatConfig::default();
//!     let mut session = config.new_session("book-club");
//!     session.add_member(
//!         AgentProfile::new("mira", "Mira")
//!             .with_backend(smart.clone())
//!             .with_persona("A literature professor who loves footnotes."),
//!     )?;
//!     session.add_member(
//!         AgentProfile::new("tom", "Tom")
//!             .with_backend(fast.clone())
//!             .with_persona("A teenager who only reads comics."),
//!     )?;
//!
//!     let chat = GroupChat::new(Arc::new(OpenAICompatibleClient::new()), config)
//!         .with_coordinator(fast)
//!         .with_sink(Arc::new(JsonlConversationSink::new("./chats")));
//!
//!     let outcome = chat.handle_user_turn(&mut session, "What should we read next?").await?;
//!     for fragment in outcome.fragments() {
//!         println!("{}: {}", session.display_name(&fragment.agent_id), fragment.payload());
//!     }
//!     println!("Tokens used: {}", outcome.total_tokens());
//!     Ok(())
//! }
//! ```

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Applications embedding GroupLLM can opt in to `RUST_LOG` driven diagnostics without
/// choosing a logging backend upfront.
///
/// ```rust
/// groupllm::init_logger();
/// groupllm::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `groupllm` module.
pub mod groupllm;

// Re-exporting key items for easier external access.
pub use groupllm::client_wrapper;
pub use groupllm::client_wrapper::{ClientError, ClientWrapper, Message, Role, TokenUsage};
pub use groupllm::clients;
pub use groupllm::config;
pub use groupllm::config::GroupChatConfig;
pub use groupllm::context;
pub use groupllm::continuation;
pub use groupllm::continuation::ContinuationPolicy;
pub use groupllm::error;
pub use groupllm::error::GroupChatError;
pub use groupllm::event;
pub use groupllm::event::{EventHandler, GroupChatEvent};
pub use groupllm::fairness;
pub use groupllm::fragment;
pub use groupllm::fragment::{Fragment, FragmentContent, FragmentKind};
pub use groupllm::group_chat;
pub use groupllm::invoker;
pub use groupllm::invoker::{AgentResponse, RetryPolicy};
pub use groupllm::profile;
pub use groupllm::profile::{AgentProfile, BackendConfig, LoreEntry};
pub use groupllm::round;
pub use groupllm::sanitize;
pub use groupllm::scheduler;
pub use groupllm::scheduler::SpeakerPlan;
pub use groupllm::session;
pub use groupllm::session::{ConversationEntry, Session};
pub use groupllm::sink;
pub use groupllm::{GroupChat, TurnOutcome};
