//! Errors surfaced to callers of the group chat.
//!
//! Only configuration problems propagate. Backend failures, coordinator failures and
//! crosstalk are absorbed by the orchestrator and degrade the round instead (fewer
//! agents speak, or the fallback speaking order is used).

use std::error::Error;
use std::fmt;

/// Errors that can occur while editing a roster or starting a round.
///
/// # Examples
///
/// ```
/// use groupllm::error::GroupChatError;
///
/// let err = GroupChatError::IneligibleAgent { agent_id: "bob".into() };
/// assert_eq!(err.to_string(), "Agent 'bob' has no fully configured backend");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupChatError {
    /// A round was requested for a session without members.
    EmptyRoster,

    /// A member lacks endpoint, credentials or model. This points at a configuration
    /// bug upstream, so the round is refused instead of silently skipping the agent.
    IneligibleAgent { agent_id: String },

    /// Adding a member would exceed the configured roster cap.
    RosterFull { max: usize },

    /// An agent with this id is already a member.
    DuplicateAgent(String),

    /// Another member already uses this display name. Names are what agents see of
    /// each other, so they must be unambiguous inside one session.
    DuplicateName(String),

    /// A speaking plan referenced an agent that is not in the roster.
    UnknownAgent(String),
}

impl fmt::Display for GroupChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupChatError::EmptyRoster => write!(f, "Session has no members"),
            GroupChatError::IneligibleAgent { agent_id } => {
                write!(f, "Agent '{}' has no fully configured backend", agent_id)
            }
            GroupChatError::RosterFull { max } => {
                write!(f, "Roster is full (at most {} members)", max)
            }
            GroupChatError::DuplicateAgent(id) => {
                write!(f, "Agent with id '{}' already exists", id)
            }
            GroupChatError::DuplicateName(name) => {
                write!(f, "Display name '{}' is already used in this session", name)
            }
            GroupChatError::UnknownAgent(id) => write!(f, "Agent not found: {}", id),
        }
    }
}

impl Error for GroupChatError {}
