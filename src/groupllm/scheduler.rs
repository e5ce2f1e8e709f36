//! Deciding who speaks in a round, and in what order.
//!
//! When a coordinator backend is configured it is asked, in free text, which members
//! should answer the user. Its answer is mapped back to agent ids; anything unusable
//! (an error, a timeout, a refusal, unknown names) falls back to a deterministic order.
//! Either way, agents flagged by the fairness tracker are always part of the plan.

use crate::groupllm::client_wrapper::{ClientWrapper, Message};
use crate::groupllm::event::{EventHandler, GroupChatEvent};
use crate::groupllm::profile::{AgentProfile, BackendConfig};
use std::sync::Arc;
use std::time::Duration;

/// Ordered, duplicate-free list of agent ids selected to speak.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeakerPlan {
    order: Vec<String>,
}

impl SpeakerPlan {
    /// Build a plan from ids, keeping only the first occurrence of each.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut plan = Self::default();
        for id in ids {
            plan.push(id.into());
        }
        plan
    }

    fn push(&mut self, id: String) {
        if !self.contains(&id) {
            self.order.push(id);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.order.iter().any(|id| id == agent_id)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.order
    }

    pub fn first(&self) -> Option<&str> {
        self.order.first().map(String::as_str)
    }

    /// Put every id of `required` that is missing at the front, keeping the order of
    /// `required` among them and the existing order after them.
    pub fn enforce(&mut self, required: &[String]) {
        let missing: Vec<String> = required
            .iter()
            .filter(|id| !self.contains(id))
            .cloned()
            .collect();
        if missing.is_empty() {
            return;
        }
        let mut order = Self::from_ids(missing);
        for id in self.order.drain(..) {
            order.push(id);
        }
        *self = order;
    }
}

/// Result of planning one round.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan: SpeakerPlan,
    /// `true` when the coordinator's answer was used.
    pub coordinated: bool,
}

/// Computes the [`SpeakerPlan`] for a round.
#[derive(Clone)]
pub struct Scheduler {
    client: Arc<dyn ClientWrapper>,
    coordinator: Option<BackendConfig>,
    timeout: Duration,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl Scheduler {
    /// A scheduler that always uses the deterministic order until a coordinator is set.
    pub fn new(client: Arc<dyn ClientWrapper>, timeout: Duration) -> Self {
        Self {
            client,
            coordinator: None,
            timeout,
            event_handler: None,
        }
    }

    pub fn with_coordinator(mut self, backend: BackendConfig) -> Self {
        self.coordinator = Some(backend);
        self
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    async fn emit(&self, event: GroupChatEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_event(&event).await;
        }
    }

    /// Plan who answers `user_message`. `silent` lists agents that must be included.
    ///
    /// The returned plan is non-empty whenever `roster` is.
    pub async fn plan(
        &self,
        session_id: &str,
        roster: &[AgentProfile],
        user_message: &str,
        silent: &[String],
    ) -> PlanOutcome {
        let coordinated = match self.coordinator.as_ref().filter(|b| b.is_complete()) {
            Some(backend) => self.ask_coordinator(session_id, backend, roster, user_message).await,
            None => None,
        };

        let (mut plan, used_coordinator) = match coordinated {
            Some(plan) => (plan, true),
            None => (fallback_plan(roster, silent), false),
        };
        plan.enforce(silent);

        log::debug!(
            "Speaking plan for session '{}': {:?} (coordinated: {})",
            session_id,
            plan.as_slice(),
            used_coordinator
        );
        PlanOutcome {
            plan,
            coordinated: used_coordinator,
        }
    }

    async fn ask_coordinator(
        &self,
        session_id: &str,
        backend: &BackendConfig,
        roster: &[AgentProfile],
        user_message: &str,
    ) -> Option<SpeakerPlan> {
        let prompt = [Message::user(coordinator_prompt(roster, user_message))];
        let call = self.client.send_message(backend, &prompt);

        let reason = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(reply)) => {
                let plan = parse_coordinator_reply(&reply.content, roster);
                if !plan.is_empty() {
                    return Some(plan);
                }
                format!("no member named in reply {:?}", reply.content)
            }
            Ok(Err(e)) => format!("coordinator call failed: {}", e),
            Err(_) => format!("coordinator timed out after {}ms", self.timeout.as_millis()),
        };

        log::warn!("Falling back to default speaking order: {}", reason);
        self.emit(GroupChatEvent::CoordinatorFallback {
            session_id: session_id.to_string(),
            reason,
        })
        .await;
        None
    }
}

/// The single user message sent to the coordinator.
pub fn coordinator_prompt(roster: &[AgentProfile], user_message: &str) -> String {
    let names: Vec<&str> = roster.iter().map(|p| p.name.as_str()).collect();
    format!(
        "You coordinate a group chat between a user and these members: {}.\n\
         The user just wrote:\n\"{}\"\n\n\
         Decide which members should answer and in what order. \
         Reply with member names only, separated by commas, nothing else.",
        names.join(", "),
        user_message
    )
}

/// Map a free-text coordinator answer to a plan.
///
/// Items are split on commas, semicolons and newlines (including the CJK comma forms),
/// stripped of list markers, quotes and brackets, then matched exactly against agent ids
/// first and display names second. Unmatched items are dropped.
pub fn parse_coordinator_reply(reply: &str, roster: &[AgentProfile]) -> SpeakerPlan {
    let ids = reply
        .split(|c: char| matches!(c, ',' | ';' | '\n' | '、' | '，' | '；'))
        .map(clean_item)
        .filter(|item| !item.is_empty())
        .filter_map(|item| {
            roster
                .iter()
                .find(|p| p.id == item)
                .or_else(|| roster.iter().find(|p| p.name == item))
                .map(|p| p.id.clone())
        });
    SpeakerPlan::from_ids(ids)
}

fn clean_item(item: &str) -> &str {
    let item = item.trim();
    // "1. Alice", "2) Bob"
    let item = match item.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) if pos > 0 && item[pos..].starts_with(|c: char| c == '.' || c == ')') => {
            &item[pos + 1..]
        }
        _ => item,
    };
    item.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, '-' | '*' | '•' | '"' | '\'' | '`' | '[' | ']' | '.' | '「' | '」')
    })
}

/// Silent agents first, then everyone else, both in roster order.
pub fn fallback_plan(roster: &[AgentProfile], silent: &[String]) -> SpeakerPlan {
    let silent_first = roster.iter().filter(|p| silent.contains(&p.id));
    let rest = roster.iter().filter(|p| !silent.contains(&p.id));
    SpeakerPlan::from_ids(silent_first.chain(rest).map(|p| p.id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<AgentProfile> {
        vec![
            AgentProfile::new("a", "Alice"),
            AgentProfile::new("b", "Bob"),
            AgentProfile::new("c", "Carol"),
        ]
    }

    #[test]
    fn test_plan_deduplicates() {
        let plan = SpeakerPlan::from_ids(vec!["b", "a", "b", "a"]);
        assert_eq!(plan.as_slice(), &["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_enforce_inserts_missing_at_front_in_order() {
        let mut plan = SpeakerPlan::from_ids(vec!["b"]);
        plan.enforce(&["c".to_string(), "b".to_string(), "a".to_string()]);
        assert_eq!(plan.as_slice(), &["c".to_string(), "a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_parse_decorated_reply() {
        let plan = parse_coordinator_reply("1. **Carol**\n2. Alice\n- Dave", &roster());
        assert_eq!(plan.as_slice(), &["c".to_string(), "a".to_string()]);

        let plan = parse_coordinator_reply("\"Bob\"、Alice，Bob", &roster());
        assert_eq!(plan.as_slice(), &["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_parse_requires_exact_names() {
        assert!(parse_coordinator_reply("alice, bobby", &roster()).is_empty());
        assert!(parse_coordinator_reply("I cannot help with that", &roster()).is_empty());
        let plan = parse_coordinator_reply("c, Alice", &roster());
        assert_eq!(plan.as_slice(), &["c".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_fallback_puts_silent_first() {
        let plan = fallback_plan(&roster(), &["c".to_string()]);
        assert_eq!(
            plan.as_slice(),
            &["c".to_string(), "a".to_string(), "b".to_string()]
        );
    }
}
