//! Group chat event system.
//!
//! Provides a callback-based observability and rendering hook for the orchestrator.
//! Implement [`EventHandler`] to receive real-time notifications about:
//!
//! - **Turn lifecycle**: user turn start/end, token totals
//! - **Scheduling**: the computed speaking plan, silent agents, coordinator fallbacks
//! - **Rounds**: round boundaries for the initial round and continuation iterations
//! - **Agents**: selection, retried attempts, responses, abstentions, abandonment
//! - **Rendering**: every fragment in display order, paced by the configured delay
//!
//! Logging through the `log` facade happens regardless of whether a handler is set;
//! events are for hosts that want structured data (UI updates, telemetry).
//!
//! # Example
//!
//! ```rust,no_run
//! use groupllm::event::{EventHandler, GroupChatEvent};
//! use async_trait::async_trait;
//!
//! struct Printer;
//!
//! #[async_trait]
//! impl EventHandler for Printer {
//!     async fn on_event(&self, event: &GroupChatEvent) {
//!         if let GroupChatEvent::FragmentEmitted { fragment, .. } = event {
//!             println!("[{}] {}", fragment.agent_id, fragment.payload());
//!         }
//!     }
//! }
//! ```

use crate::groupllm::client_wrapper::TokenUsage;
use crate::groupllm::fragment::Fragment;
use async_trait::async_trait;

/// Whether a round answers the user or continues agent-to-agent banter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundKind {
    /// The round triggered directly by a user turn.
    Initial,
    /// A continuation iteration (1-based).
    Continuation(usize),
}

/// Events emitted while a turn is processed.
///
/// Every variant carries `session_id` so one handler can serve many sessions.
#[derive(Debug, Clone)]
pub enum GroupChatEvent {
    /// A user turn was accepted and the round is about to be planned.
    TurnStarted {
        session_id: String,
        /// First ~120 characters of the user message.
        message_preview: String,
    },

    /// The speaking plan for the initial round is fixed.
    PlanComputed {
        session_id: String,
        /// Agent ids in speaking order.
        plan: Vec<String>,
        /// Agents force-included because of the silence window.
        silent_agents: Vec<String>,
        /// `true` when the coordinator's answer was used, `false` for the fallback order.
        coordinated: bool,
    },

    /// The coordinator call failed, timed out, or named nobody usable.
    CoordinatorFallback { session_id: String, reason: String },

    RoundStarted {
        session_id: String,
        kind: RoundKind,
        speakers: Vec<String>,
    },

    /// An agent is about to be invoked. `position` is its 0-based slot in the round.
    AgentSelected {
        session_id: String,
        agent_id: String,
        agent_name: String,
        position: usize,
    },

    /// A single backend attempt failed; another attempt follows after `retry_in_ms`.
    AttemptFailed {
        session_id: String,
        agent_id: String,
        attempt: u32,
        retry_in_ms: u64,
        error: String,
    },

    /// An agent replied with at least one fragment.
    AgentResponded {
        session_id: String,
        agent_id: String,
        agent_name: String,
        fragment_count: usize,
        tokens_used: Option<TokenUsage>,
    },

    /// An agent replied, but nothing survived sanitization.
    AgentAbstained { session_id: String, agent_id: String },

    /// An agent exhausted its retry budget and is skipped for this round.
    AgentFailed {
        session_id: String,
        agent_id: String,
        agent_name: String,
        attempts: u32,
        error: String,
    },

    /// One fragment, in final display order, ready for rendering.
    FragmentEmitted {
        session_id: String,
        kind: RoundKind,
        fragment: Fragment,
    },

    RoundCompleted {
        session_id: String,
        kind: RoundKind,
        fragment_count: usize,
    },

    /// A continuation iteration did not run.
    ContinuationSkipped {
        session_id: String,
        iteration: usize,
        reason: String,
    },

    TurnCompleted {
        session_id: String,
        rounds: usize,
        fragment_count: usize,
        total_tokens: usize,
    },
}

/// Trait for receiving group chat events.
///
/// The method has a default no-op implementation. The `Send + Sync` bound allows one
/// handler to be shared by concurrently running sessions via `Arc<dyn EventHandler>`.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_event(&self, _event: &GroupChatEvent) {}
}

/// First `max_chars` characters of `text`, with an ellipsis when truncated.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
