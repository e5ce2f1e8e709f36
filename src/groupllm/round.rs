//! Running one round: every planned agent speaks once, in order, then the replies are
//! interleaved and appended to the log.
//!
//! Agents are invoked strictly one after another. Each prompt includes the fragments
//! produced by the earlier speakers of the same round, so the accumulator is threaded
//! explicitly through the loop.

use crate::groupllm::context::{ContextBuilder, RoundPrompt};
use crate::groupllm::error::GroupChatError;
use crate::groupllm::event::{EventHandler, GroupChatEvent, RoundKind};
use crate::groupllm::fragment::Fragment;
use crate::groupllm::invoker::{AgentInvoker, AgentResponse};
use crate::groupllm::scheduler::SpeakerPlan;
use crate::groupllm::session::{ConversationEntry, Session};
use std::sync::Arc;
use std::time::Duration;

/// Everything one round produced.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub kind: RoundKind,
    /// One response per planned agent, in speaking order, including empty ones.
    pub responses: Vec<AgentResponse>,
    /// Fragments in display order, as appended to the log.
    pub fragments: Vec<Fragment>,
}

impl RoundOutcome {
    /// Ids of the agents that contributed at least one fragment.
    pub fn speakers(&self) -> Vec<&str> {
        self.responses
            .iter()
            .filter(|r| !r.is_empty())
            .map(|r| r.agent_id.as_str())
            .collect()
    }

    pub fn total_tokens(&self) -> usize {
        self.responses
            .iter()
            .filter_map(|r| r.tokens_used.as_ref())
            .map(|u| u.total_tokens)
            .sum()
    }
}

/// Merge responses position by position: every agent's first fragment in speaking
/// order, then every agent's second fragment, and so on.
///
/// ```rust
/// use groupllm::fragment::Fragment;
/// use groupllm::invoker::AgentResponse;
/// use groupllm::round::interleave;
///
/// let mut a = AgentResponse::empty("a");
/// a.fragments = vec![Fragment::text("a", "a1"), Fragment::text("a", "a2")];
/// let mut b = AgentResponse::empty("b");
/// b.fragments = vec![Fragment::text("b", "b1")];
///
/// let merged: Vec<String> = interleave(&[a, b])
///     .iter()
///     .map(|f| f.payload().to_string())
///     .collect();
/// assert_eq!(merged, vec!["a1", "b1", "a2"]);
/// ```
pub fn interleave(responses: &[AgentResponse]) -> Vec<Fragment> {
    let longest = responses
        .iter()
        .map(|r| r.fragments.len())
        .max()
        .unwrap_or(0);
    (0..longest)
        .flat_map(|i| responses.iter().filter_map(move |r| r.fragments.get(i)))
        .cloned()
        .collect()
}

/// Runs rounds against a session.
#[derive(Clone)]
pub struct RoundExecutor {
    invoker: AgentInvoker,
    context: ContextBuilder,
    display_delay: Duration,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl RoundExecutor {
    pub fn new(invoker: AgentInvoker, context: ContextBuilder, display_delay: Duration) -> Self {
        Self {
            invoker,
            context,
            display_delay,
            event_handler: None,
        }
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.invoker = self.invoker.with_event_handler(handler.clone());
        self.event_handler = Some(handler);
        self
    }

    async fn emit(&self, event: GroupChatEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_event(&event).await;
        }
    }

    /// Run one round of `plan` answering `prompt`.
    ///
    /// Agents see `session.log()[..history_len]` as history, which lets the caller
    /// append the user's message before the round without it being replayed twice.
    ///
    /// # Errors
    ///
    /// Fails before any agent is called if a plan member is not in the roster or has no
    /// complete backend.
    pub async fn run_round(
        &self,
        session: &mut Session,
        history_len: usize,
        plan: &SpeakerPlan,
        prompt: &RoundPrompt,
        kind: RoundKind,
    ) -> Result<RoundOutcome, GroupChatError> {
        for agent_id in plan.iter() {
            let member = session
                .member(agent_id)
                .ok_or_else(|| GroupChatError::UnknownAgent(agent_id.to_string()))?;
            if !member.is_eligible() {
                return Err(GroupChatError::IneligibleAgent {
                    agent_id: agent_id.to_string(),
                });
            }
        }

        let session_id = session.id().to_string();
        self.emit(GroupChatEvent::RoundStarted {
            session_id: session_id.clone(),
            kind,
            speakers: plan.as_slice().to_vec(),
        })
        .await;

        let history_len = history_len.min(session.log().len());
        let mut round_so_far: Vec<AgentResponse> = Vec::with_capacity(plan.len());
        for (position, agent_id) in plan.iter().enumerate() {
            let agent = match session.member(agent_id) {
                Some(agent) => agent,
                None => continue,
            };
            self.emit(GroupChatEvent::AgentSelected {
                session_id: session_id.clone(),
                agent_id: agent.id.clone(),
                agent_name: agent.name.clone(),
                position,
            })
            .await;

            let messages = self.context.build(
                agent,
                session,
                &session.log()[..history_len],
                prompt,
                &round_so_far,
            );
            let response = self
                .invoker
                .invoke(&session_id, agent, session.roster(), &messages)
                .await;
            round_so_far.push(response);
        }

        let fragments = interleave(&round_so_far);
        for (i, fragment) in fragments.iter().enumerate() {
            if i > 0 && !self.display_delay.is_zero() {
                tokio::time::sleep(self.display_delay).await;
            }
            session.append(ConversationEntry::from_fragment(fragment));
            self.emit(GroupChatEvent::FragmentEmitted {
                session_id: session_id.clone(),
                kind,
                fragment: fragment.clone(),
            })
            .await;
        }

        self.emit(GroupChatEvent::RoundCompleted {
            session_id,
            kind,
            fragment_count: fragments.len(),
        })
        .await;

        Ok(RoundOutcome {
            kind,
            responses: round_so_far,
            fragments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(agent: &str, payloads: &[&str]) -> AgentResponse {
        let mut r = AgentResponse::empty(agent);
        r.fragments = payloads.iter().map(|p| Fragment::text(agent, *p)).collect();
        r
    }

    fn payloads(fragments: &[Fragment]) -> Vec<&str> {
        fragments.iter().map(|f| f.payload()).collect()
    }

    #[test]
    fn test_interleave_uneven_lengths() {
        let merged = interleave(&[
            response("a", &["a1", "a2", "a3"]),
            response("b", &[]),
            response("c", &["c1"]),
        ]);
        assert_eq!(payloads(&merged), vec!["a1", "c1", "a2", "a3"]);
    }

    #[test]
    fn test_interleave_empty() {
        assert!(interleave(&[]).is_empty());
        assert!(interleave(&[response("a", &[])]).is_empty());
    }

    #[test]
    fn test_speakers_skip_empty_responses() {
        let outcome = RoundOutcome {
            kind: RoundKind::Initial,
            responses: vec![response("a", &["x"]), response("b", &[])],
            fragments: vec![],
        };
        assert_eq!(outcome.speakers(), vec!["a"]);
        assert_eq!(outcome.total_tokens(), 0);
    }
}
