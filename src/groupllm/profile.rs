//! Agent identities, their dedicated backends and the lore they carry.
//!
//! An [`AgentProfile`] is the read-only description of one group member: who it is,
//! which backend it talks to, how it behaves ([`AgentProfile::persona`]) and what it
//! knows ([`LoreEntry`]). Profiles are immutable while a round runs; hosts edit them
//! between turns.
//!
//! # Example
//!
//! ```rust
//! use groupllm::profile::{AgentProfile, BackendConfig, LoreEntry};
//!
//! let alice = AgentProfile::new("alice", "Alice")
//!     .with_backend(BackendConfig::new("https://api.openai.com", "sk-test", "gpt-4.1-mini"))
//!     .with_persona("A cheerful botanist who answers in short sentences.")
//!     .with_lore(LoreEntry::keyed(["greenhouse"], "Alice runs the city greenhouse."))
//!     .with_shared_lore(LoreEntry::constant("Everyone in the group lives in Harbor City."));
//!
//! assert!(alice.is_eligible());
//! assert!(!AgentProfile::new("bob", "Bob").is_eligible());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Endpoint, credentials and model identifier of one chat-completion backend.
///
/// `Debug` output never prints the API key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the OpenAI-compatible service, e.g. `https://api.openai.com`.
    pub endpoint: String,
    /// Secret used as bearer token.
    pub api_key: String,
    /// Model identifier sent with every request.
    pub model: String,
}

impl BackendConfig {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// True when endpoint, credentials and model are all present.
    pub fn is_complete(&self) -> bool {
        !self.endpoint.trim().is_empty()
            && !self.api_key.trim().is_empty()
            && !self.model.trim().is_empty()
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

/// One piece of knowledge injected into an agent's prompt.
///
/// Constant entries are always injected. Keyed entries are injected only when one of
/// their keys appears (case-insensitively) in the current prompt or in the most recent
/// part of the conversation log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoreEntry {
    /// Activation keys. Ignored for constant entries.
    pub keys: Vec<String>,
    /// Text inserted into the prompt when the entry is active.
    pub content: String,
    /// Always active regardless of keys.
    pub constant: bool,
}

impl LoreEntry {
    pub fn constant(content: impl Into<String>) -> Self {
        Self {
            keys: Vec::new(),
            content: content.into(),
            constant: true,
        }
    }

    pub fn keyed<I, S>(keys: I, content: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            content: content.into(),
            constant: false,
        }
    }

    /// Whether this entry should be injected given the text scanned for keys.
    ///
    /// `scan_text` is expected to be lower-cased already.
    pub fn is_active(&self, scan_text: &str) -> bool {
        if self.constant {
            return true;
        }
        self.keys
            .iter()
            .map(|k| k.trim().to_lowercase())
            .any(|k| !k.is_empty() && scan_text.contains(&k))
    }
}

/// One participating agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Stable identifier. Agents are matched by id everywhere except when parsing
    /// the coordinator's free-text answer.
    pub id: String,
    /// Display name shown to the user and to other agents.
    pub name: String,
    /// Dedicated backend. An agent without a complete backend cannot join a round.
    pub backend: Option<BackendConfig>,
    /// Persona / character description.
    pub persona: String,
    /// Knowledge only this agent sees.
    pub lore: Vec<LoreEntry>,
    /// Knowledge this agent contributes to every member of the sessions it joins.
    pub shared_lore: Vec<LoreEntry>,
}

impl AgentProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            backend: None,
            persona: String::new(),
            lore: Vec::new(),
            shared_lore: Vec::new(),
        }
    }

    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_lore(mut self, entry: LoreEntry) -> Self {
        self.lore.push(entry);
        self
    }

    pub fn with_shared_lore(mut self, entry: LoreEntry) -> Self {
        self.shared_lore.push(entry);
        self
    }

    /// True iff the agent has endpoint, credentials and model configured.
    pub fn is_eligible(&self) -> bool {
        self.backend
            .as_ref()
            .map(BackendConfig::is_complete)
            .unwrap_or(false)
    }
}
