//! Calling one agent's backend with retries, then sanitizing and fragmenting the reply.
//!
//! An invocation never fails: once the retry budget is spent the agent simply abstains
//! for the round, which is reported through logs and events rather than an error.

use crate::groupllm::client_wrapper::{ClientWrapper, Message, TokenUsage};
use crate::groupllm::event::{EventHandler, GroupChatEvent};
use crate::groupllm::fragment::{self, Fragment};
use crate::groupllm::profile::AgentProfile;
use crate::groupllm::sanitize::sanitize;
use std::sync::Arc;
use std::time::Duration;

/// Attempt budget and linear backoff for agent calls.
///
/// After failed attempt `n` the invoker waits `n × base_delay` before trying again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// A policy that tries once and never sleeps.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Pause after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// What one agent contributed to a round.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub agent_id: String,
    /// Reply text as returned by the backend, before sanitization. Empty on failure.
    pub raw: String,
    /// Ordered fragments after sanitization. Empty when the agent failed or abstained.
    pub fragments: Vec<Fragment>,
    pub tokens_used: Option<TokenUsage>,
    /// Number of backend calls made.
    pub attempts: u32,
    /// Last transport error when every attempt failed.
    pub error: Option<String>,
}

impl AgentResponse {
    /// A response carrying nothing.
    pub fn empty(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            raw: String::new(),
            fragments: Vec::new(),
            tokens_used: None,
            attempts: 0,
            error: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Sends prompts to agent backends through a shared [`ClientWrapper`].
#[derive(Clone)]
pub struct AgentInvoker {
    client: Arc<dyn ClientWrapper>,
    retry: RetryPolicy,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl AgentInvoker {
    pub fn new(client: Arc<dyn ClientWrapper>, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            event_handler: None,
        }
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    async fn emit(&self, event: GroupChatEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_event(&event).await;
        }
    }

    /// Call `agent`'s backend with `prompt`, retrying per the policy, then sanitize the
    /// reply against the names in `roster` and split it into fragments.
    pub async fn invoke(
        &self,
        session_id: &str,
        agent: &AgentProfile,
        roster: &[AgentProfile],
        prompt: &[Message],
    ) -> AgentResponse {
        let mut response = AgentResponse::empty(agent.id.clone());

        let backend = match agent.backend.as_ref().filter(|b| b.is_complete()) {
            Some(backend) => backend,
            None => {
                log::error!("Agent '{}' has no usable backend; skipping", agent.id);
                response.error = Some(format!("Agent '{}' has no usable backend", agent.id));
                return response;
            }
        };

        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            response.attempts = attempt;
            match self.client.send_message_with_usage(backend, prompt).await {
                Ok((reply, usage)) => {
                    response.raw = reply.content.to_string();
                    response.tokens_used = usage;
                    break;
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt == max_attempts {
                        response.error = Some(last_error.clone());
                        break;
                    }
                    let delay = self.retry.delay_for(attempt);
                    log::warn!(
                        "Attempt {}/{} for agent '{}' failed: {}. Retrying in {}ms",
                        attempt,
                        max_attempts,
                        agent.id,
                        last_error,
                        delay.as_millis()
                    );
                    self.emit(GroupChatEvent::AttemptFailed {
                        session_id: session_id.to_string(),
                        agent_id: agent.id.clone(),
                        attempt,
                        retry_in_ms: delay.as_millis() as u64,
                        error: last_error.clone(),
                    })
                    .await;
                    tokio::time::sleep(delay).await;
                }
            }
        }

        if response.failed() {
            log::error!(
                "Agent '{}' failed after {} attempts: {}",
                agent.id,
                response.attempts,
                last_error
            );
            self.emit(GroupChatEvent::AgentFailed {
                session_id: session_id.to_string(),
                agent_id: agent.id.clone(),
                agent_name: agent.name.clone(),
                attempts: response.attempts,
                error: last_error,
            })
            .await;
            return response;
        }

        let other_names: Vec<&str> = roster
            .iter()
            .filter(|p| p.id != agent.id)
            .map(|p| p.name.as_str())
            .collect();
        let cleaned = sanitize(&response.raw, &agent.name, &other_names);
        response.fragments = fragment::split(&agent.id, &cleaned);

        if response.fragments.is_empty() {
            log::debug!("Agent '{}' produced nothing after sanitization", agent.id);
            self.emit(GroupChatEvent::AgentAbstained {
                session_id: session_id.to_string(),
                agent_id: agent.id.clone(),
            })
            .await;
        } else {
            self.emit(GroupChatEvent::AgentResponded {
                session_id: session_id.to_string(),
                agent_id: agent.id.clone(),
                agent_name: agent.name.clone(),
                fragment_count: response.fragments.len(),
                tokens_used: response.tokens_used.clone(),
            })
            .await;
        }

        response
    }
}
