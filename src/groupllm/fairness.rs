//! Consecutive-silence tracking over the session log.
//!
//! The tracker is a pure query: it never stores counters, it recomputes them from
//! [`Session::log`](crate::session::Session::log) whenever a turn starts.

use crate::groupllm::session::{EntryRole, Session};
use std::collections::HashSet;

/// Ids of the agents that produced no log entry in any of the last `window` user turns,
/// in roster order.
///
/// A user turn spans from a user entry to the next user entry (or the end of the log).
/// Sessions with fewer than `window` user turns never flag anyone, and a `window` of
/// zero disables the check.
///
/// # Example
///
/// ```rust
/// use groupllm::fairness::silent_agents;
/// use groupllm::profile::AgentProfile;
/// use groupllm::session::Session;
///
/// let mut session = Session::new("s", 3);
/// session.add_member(AgentProfile::new("a", "Alice")).unwrap();
/// assert!(silent_agents(&session, 4).is_empty());
/// ```
pub fn silent_agents(session: &Session, window: usize) -> Vec<String> {
    if window == 0 {
        return Vec::new();
    }

    let mut turns_seen = 0;
    let mut spoke: HashSet<&str> = HashSet::new();
    let mut since_last_user: Vec<&str> = Vec::new();

    for entry in session.log().iter().rev() {
        match entry.role {
            EntryRole::Agent => {
                if let Some(agent_id) = entry.agent_id.as_deref() {
                    since_last_user.push(agent_id);
                }
            }
            EntryRole::User => {
                spoke.extend(since_last_user.drain(..));
                turns_seen += 1;
                if turns_seen == window {
                    break;
                }
            }
        }
    }

    if turns_seen < window {
        return Vec::new();
    }

    session
        .roster()
        .iter()
        .filter(|p| !spoke.contains(p.id.as_str()))
        .map(|p| p.id.clone())
        .collect()
}

/// Number of consecutive user turns, counted backwards from the latest, in which
/// `agent_id` produced nothing. Capped at `window`.
pub fn silence_count(session: &Session, agent_id: &str, window: usize) -> usize {
    let mut count = 0;
    let mut spoke_this_turn = false;

    for entry in session.log().iter().rev() {
        if count >= window {
            break;
        }
        match entry.role {
            EntryRole::Agent => {
                if entry.is_from_agent(agent_id) {
                    spoke_this_turn = true;
                }
            }
            EntryRole::User => {
                if spoke_this_turn {
                    break;
                }
                count += 1;
            }
        }
    }
    count
}
