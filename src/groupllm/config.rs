//! Configuration for the group chat orchestrator.
//!
//! Provides the [`GroupChatConfig`] struct. Hosts construct it manually (or start from
//! [`Default`] and adjust with the `with_*` builders); no file parsing dependencies
//! are required.
//!
//! # Example
//!
//! ```rust
//! use groupllm::config::GroupChatConfig;
//! use groupllm::invoker::RetryPolicy;
//! use std::time::Duration;
//!
//! let config = GroupChatConfig::default()
//!     .with_retry(RetryPolicy::new(3, Duration::from_millis(250)))
//!     .with_display_delay(Duration::from_millis(600));
//!
//! assert_eq!(config.max_roster_size, 3);
//! assert_eq!(config.silence_window, 4);
//! assert_eq!(config.retry.max_attempts, 3);
//! ```

use crate::groupllm::continuation::ContinuationPolicy;
use crate::groupllm::invoker::RetryPolicy;
use crate::groupllm::session::Session;
use std::time::Duration;

/// Settings shared by every turn driven through a [`GroupChat`](crate::GroupChat).
#[derive(Clone, Debug)]
pub struct GroupChatConfig {
    /// Maximum number of members per session. Applied by hosts when they create
    /// sessions via [`GroupChatConfig::new_session`].
    pub max_roster_size: usize,
    /// Number of user turns the fairness tracker looks back over.
    pub silence_window: usize,
    /// Per-agent retry budget and backoff.
    pub retry: RetryPolicy,
    /// Deadline for the coordinator call. Expiry is treated like an unusable answer.
    pub coordinator_timeout: Duration,
    /// Agent-to-agent follow-up rounds after the initial round.
    pub continuation: ContinuationPolicy,
    /// Pause between consecutive fragments handed to the renderer.
    pub display_delay: Duration,
    /// Most recent log entries replayed into each agent's prompt.
    pub history_limit: usize,
    /// Most recent log entries scanned for keyed lore activation.
    pub lore_scan_depth: usize,
}

impl Default for GroupChatConfig {
    fn default() -> Self {
        Self {
            max_roster_size: 3,
            silence_window: 4,
            retry: RetryPolicy::default(),
            coordinator_timeout: Duration::from_secs(30),
            continuation: ContinuationPolicy::default(),
            display_delay: Duration::ZERO,
            history_limit: 40,
            lore_scan_depth: 4,
        }
    }
}

impl GroupChatConfig {
    pub fn with_max_roster_size(mut self, max: usize) -> Self {
        self.max_roster_size = max;
        self
    }

    pub fn with_silence_window(mut self, window: usize) -> Self {
        self.silence_window = window;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_coordinator_timeout(mut self, timeout: Duration) -> Self {
        self.coordinator_timeout = timeout;
        self
    }

    pub fn with_continuation(mut self, continuation: ContinuationPolicy) -> Self {
        self.continuation = continuation;
        self
    }

    pub fn with_display_delay(mut self, delay: Duration) -> Self {
        self.display_delay = delay;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_lore_scan_depth(mut self, depth: usize) -> Self {
        self.lore_scan_depth = depth;
        self
    }

    /// Create an empty session capped at [`GroupChatConfig::max_roster_size`].
    pub fn new_session(&self, id: impl Into<String>) -> Session {
        Session::new(id, self.max_roster_size)
    }
}
