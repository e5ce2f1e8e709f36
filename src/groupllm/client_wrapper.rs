use crate::groupllm::profile::BackendConfig;
use async_trait::async_trait;
use std::error::Error;
use std::sync::{Arc, Mutex};

/// A ClientWrapper is the single transport primitive the group chat relies on.
/// It speaks to one chat-completion style backend, addressed per call by a
/// [`BackendConfig`] (endpoint, credentials, model), and returns the assistant text.
/// It does not keep track of any conversation; sessions, rosters and history are
/// owned by the caller and passed in explicitly.
// src/groupllm/client_wrapper

/// Represents the possible roles for a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Role {
    // set by the orchestrator to steer the model's responses
    System,
    // the human user, or another member of the group replayed as "other party"
    User,
    Assistant, // lines this agent itself produced earlier in the conversation
}

impl Role {
    /// Wire name used by chat-completion APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// How many tokens were spent on prompt vs. completion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

/// Represents a generic message to be sent to an LLM.
#[derive(Clone, Debug)]
pub struct Message {
    /// The role associated with the message.
    pub role: Role,
    /// The actual content of the message. Stored as `Arc<str>` so prompts can be
    /// cloned cheaply between retry attempts.
    pub content: Arc<str>,
}

impl Message {
    pub fn new(role: Role, content: impl AsRef<str>) -> Self {
        Message {
            role,
            content: Arc::from(content.as_ref()),
        }
    }

    pub fn system(content: impl AsRef<str>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl AsRef<str>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl AsRef<str>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Error type surfaced by transports. `Send + Sync` so it can cross await points
/// inside the orchestrator's futures.
pub type ClientError = Box<dyn Error + Send + Sync>;

/// Trait defining the interface to interact with chat-completion backends.
#[async_trait]
pub trait ClientWrapper: Send + Sync {
    /// Send the prompt to the backend described by `backend` and return the reply.
    /// - `backend`: endpoint, API key and model identifier of the agent (or coordinator).
    /// - `messages`: the fully assembled prompt.
    ///
    /// Failures surface as an error value; implementations must never panic on
    /// malformed backend output.
    async fn send_message(
        &self,
        backend: &BackendConfig,
        messages: &[Message],
    ) -> Result<Message, ClientError>;

    /// Send the prompt and return the reply together with the usage of this very call.
    ///
    /// One client is shared by every agent and every session, so the usage slot can be
    /// overwritten by a concurrent call before the caller reads it. Wrappers that learn
    /// usage from the response should override this; the default pairs the reply with
    /// whatever [`ClientWrapper::get_last_usage`] reports right after the call.
    async fn send_message_with_usage(
        &self,
        backend: &BackendConfig,
        messages: &[Message],
    ) -> Result<(Message, Option<TokenUsage>), ClientError> {
        let reply = self.send_message(backend, messages).await?;
        Ok((reply, self.get_last_usage()))
    }

    /// Hook to retrieve usage from the *last* send_message() call.
    /// Default impl returns None so wrappers that don't track usage don't break.
    fn get_last_usage(&self) -> Option<TokenUsage> {
        self.usage_slot()
            .and_then(|slot| slot.lock().ok().and_then(|u| u.clone()))
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        // ClientWrapper implementations supporting TokenUsage tracking should return a
        // Mutex<Option<TokenUsage>> by overriding this method.
        None
    }
}
