//! Group sessions and their append-only conversation log.
//!
//! A [`Session`] is an explicit value owned by the caller. The orchestrator borrows it
//! mutably for the duration of a turn, which is how "only one round in flight per
//! session" is enforced; independent sessions can be driven concurrently.
//!
//! # Example
//!
//! ```rust
//! use groupllm::session::{EntryRole, Session};
//! use groupllm::profile::AgentProfile;
//!
//! let mut session = Session::new("movie-night", 3);
//! session.add_member(AgentProfile::new("alice", "Alice")).unwrap();
//! session.add_member(AgentProfile::new("bob", "Bob")).unwrap();
//!
//! assert_eq!(session.roster().len(), 2);
//! assert!(session.add_member(AgentProfile::new("bob", "Bobby")).is_err());
//! assert!(session.log().is_empty());
//! # let _ = EntryRole::User;
//! ```

use crate::groupllm::error::GroupChatError;
use crate::groupllm::fragment::{Fragment, FragmentContent, FragmentKind};
use crate::groupllm::profile::{AgentProfile, LoreEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryRole {
    User,
    Agent,
}

/// One persisted log record.
///
/// Entries are never mutated after append except through [`ConversationEntry::recall`],
/// which blanks the visible content while keeping the original for audit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub id: Uuid,
    pub role: EntryRole,
    /// Author agent, `None` for user entries.
    pub agent_id: Option<String>,
    content: String,
    pub kind: FragmentKind,
    pub timestamp: DateTime<Utc>,
    recalled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    original_content: Option<String>,
}

impl ConversationEntry {
    /// A plain-text entry authored by the human user.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: EntryRole::User,
            agent_id: None,
            content: content.into(),
            kind: FragmentKind::Text,
            timestamp: Utc::now(),
            recalled: false,
            original_content: None,
        }
    }

    /// An entry recording one emitted agent fragment.
    pub fn from_fragment(fragment: &Fragment) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: EntryRole::Agent,
            agent_id: Some(fragment.agent_id.clone()),
            content: fragment.payload().to_string(),
            kind: fragment.kind(),
            timestamp: Utc::now(),
            recalled: false,
            original_content: None,
        }
    }

    /// Visible content. Empty once recalled.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_recalled(&self) -> bool {
        self.recalled
    }

    /// The content as it was before a recall, if any.
    pub fn original_content(&self) -> Option<&str> {
        self.original_content.as_deref()
    }

    /// Blank the entry's content, keeping the original for audit. Idempotent.
    pub fn recall(&mut self) {
        if self.recalled {
            return;
        }
        self.original_content = Some(std::mem::take(&mut self.content));
        self.recalled = true;
    }

    /// The entry as a typed fragment (agent entries only).
    pub fn to_fragment(&self) -> Option<Fragment> {
        self.agent_id.as_ref().map(|agent_id| {
            Fragment::new(
                agent_id.clone(),
                FragmentContent::new(self.kind, self.content.clone()),
            )
        })
    }

    pub fn is_from_agent(&self, agent_id: &str) -> bool {
        self.agent_id.as_deref() == Some(agent_id)
    }
}

/// One group conversation.
#[derive(Clone, Debug)]
pub struct Session {
    id: String,
    roster: Vec<AgentProfile>,
    max_roster_size: usize,
    /// World knowledge visible to every member.
    world_lore: Vec<LoreEntry>,
    log: Vec<ConversationEntry>,
    last_activity: DateTime<Utc>,
}

impl Session {
    /// Create an empty session whose roster may hold at most `max_roster_size` members.
    pub fn new(id: impl Into<String>, max_roster_size: usize) -> Self {
        Self {
            id: id.into(),
            roster: Vec::new(),
            max_roster_size,
            world_lore: Vec::new(),
            log: Vec::new(),
            last_activity: Utc::now(),
        }
    }

    /// Rebuild a session from a persisted roster and log.
    ///
    /// The roster goes through the same checks as [`Session::add_member`].
    pub fn restore(
        id: impl Into<String>,
        max_roster_size: usize,
        roster: Vec<AgentProfile>,
        log: Vec<ConversationEntry>,
    ) -> Result<Self, GroupChatError> {
        let mut session = Self::new(id, max_roster_size);
        for profile in roster {
            session.add_member(profile)?;
        }
        if let Some(last) = log.last() {
            session.last_activity = last.timestamp;
        }
        session.log = log;
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Add a member at the end of the roster.
    pub fn add_member(&mut self, profile: AgentProfile) -> Result<(), GroupChatError> {
        if self.roster.iter().any(|p| p.id == profile.id) {
            return Err(GroupChatError::DuplicateAgent(profile.id));
        }
        if self.roster.iter().any(|p| p.name == profile.name) {
            return Err(GroupChatError::DuplicateName(profile.name));
        }
        if self.roster.len() >= self.max_roster_size {
            return Err(GroupChatError::RosterFull {
                max: self.max_roster_size,
            });
        }
        self.roster.push(profile);
        Ok(())
    }

    /// Remove a member. Its past log entries stay in the log.
    pub fn remove_member(&mut self, agent_id: &str) -> Option<AgentProfile> {
        let index = self.roster.iter().position(|p| p.id == agent_id)?;
        Some(self.roster.remove(index))
    }

    pub fn with_world_lore(mut self, entry: LoreEntry) -> Self {
        self.world_lore.push(entry);
        self
    }

    pub fn world_lore(&self) -> &[LoreEntry] {
        &self.world_lore
    }

    /// Members in roster order.
    pub fn roster(&self) -> &[AgentProfile] {
        &self.roster
    }

    pub fn member(&self, agent_id: &str) -> Option<&AgentProfile> {
        self.roster.iter().find(|p| p.id == agent_id)
    }

    /// Display name of an agent, falling back to its id for former members.
    pub fn display_name<'a>(&'a self, agent_id: &'a str) -> &'a str {
        self.member(agent_id)
            .map(|p| p.name.as_str())
            .unwrap_or(agent_id)
    }

    pub fn log(&self) -> &[ConversationEntry] {
        &self.log
    }

    /// Recall a logged entry. Returns `false` when no entry has that id.
    ///
    /// This is the only change a logged entry can undergo.
    pub fn recall(&mut self, entry_id: Uuid) -> bool {
        match self.log.iter_mut().find(|e| e.id == entry_id) {
            Some(entry) => {
                entry.recall();
                true
            }
            None => false,
        }
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Append one entry and bump the last-activity timestamp.
    pub(crate) fn append(&mut self, entry: ConversationEntry) {
        self.last_activity = entry.timestamp;
        self.log.push(entry);
    }
}
