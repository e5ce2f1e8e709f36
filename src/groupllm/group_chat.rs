//! The orchestrator façade: one call per user message.
//!
//! [`GroupChat`] wires the pieces together for a turn:
//!
//! ```text
//! user message
//!   -> fairness check (who has been silent too long)
//!   -> scheduler (coordinator or fallback order, silent agents forced in)
//!   -> round executor (sequential invocation, interleaving, log append)
//!   -> persistence hand-off
//!   -> continuation loop (optional follow-up rounds, each persisted)
//! ```
//!
//! A `GroupChat` holds no per-session state. Sessions are passed in by the caller, and
//! the `&mut Session` borrow keeps a single turn in flight per session while distinct
//! sessions can be driven concurrently from one shared `GroupChat`.
//!
//! # Example
//!
//! ```rust,no_run
//! use groupllm::clients::openai::OpenAICompatibleClient;
//! use groupllm::profile::{AgentProfile, BackendConfig};
//! use groupllm::{GroupChat, GroupChatConfig};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = BackendConfig::new("https://api.openai.com", "sk-...", "gpt-4.1-mini");
//! let config = GroupChatConfig::default();
//! let mut session = config.new_session("friday-plans");
//! session.add_member(AgentProfile::new("alice", "Alice").with_backend(backend.clone()))?;
//! session.add_member(AgentProfile::new("bob", "Bob").with_backend(backend.clone()))?;
//!
//! let chat = GroupChat::new(Arc::new(OpenAICompatibleClient::new()), config)
//!     .with_coordinator(backend);
//! let outcome = chat.handle_user_turn(&mut session, "Dinner tonight?").await?;
//! for fragment in outcome.fragments() {
//!     println!("{}: {}", session.display_name(&fragment.agent_id), fragment.payload());
//! }
//! # Ok(())
//! # }
//! ```

use crate::groupllm::client_wrapper::ClientWrapper;
use crate::groupllm::config::GroupChatConfig;
use crate::groupllm::context::{ContextBuilder, RoundPrompt};
use crate::groupllm::continuation::{ContinuationLoop, ContinuationStep};
use crate::groupllm::error::GroupChatError;
use crate::groupllm::event::{preview, EventHandler, GroupChatEvent, RoundKind};
use crate::groupllm::fairness;
use crate::groupllm::fragment::Fragment;
use crate::groupllm::invoker::AgentInvoker;
use crate::groupllm::profile::BackendConfig;
use crate::groupllm::round::{RoundExecutor, RoundOutcome};
use crate::groupllm::scheduler::{Scheduler, SpeakerPlan};
use crate::groupllm::session::{ConversationEntry, Session};
use crate::groupllm::sink::ConversationSink;
use std::sync::Arc;

/// Everything a user turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Speaking plan of the initial round.
    pub plan: SpeakerPlan,
    /// Agents that had been silent for the whole fairness window.
    pub silent_agents: Vec<String>,
    /// Whether the coordinator's answer was used for `plan`.
    pub coordinated: bool,
    /// The initial round followed by every continuation round that ran.
    pub rounds: Vec<RoundOutcome>,
}

impl TurnOutcome {
    /// All fragments of the turn in display order.
    pub fn fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.rounds.iter().flat_map(|r| r.fragments.iter())
    }

    pub fn fragment_count(&self) -> usize {
        self.rounds.iter().map(|r| r.fragments.len()).sum()
    }

    pub fn total_tokens(&self) -> usize {
        self.rounds.iter().map(RoundOutcome::total_tokens).sum()
    }
}

/// Drives group conversations.
pub struct GroupChat {
    config: GroupChatConfig,
    scheduler: Scheduler,
    executor: RoundExecutor,
    event_handler: Option<Arc<dyn EventHandler>>,
    sink: Option<Arc<dyn ConversationSink>>,
}

impl GroupChat {
    /// Create an orchestrator that reaches every backend through `client`.
    pub fn new(client: Arc<dyn ClientWrapper>, config: GroupChatConfig) -> Self {
        let scheduler = Scheduler::new(client.clone(), config.coordinator_timeout);
        let invoker = AgentInvoker::new(client, config.retry.clone());
        let context = ContextBuilder::new(config.history_limit, config.lore_scan_depth);
        let executor = RoundExecutor::new(invoker, context, config.display_delay);
        Self {
            config,
            scheduler,
            executor,
            event_handler: None,
            sink: None,
        }
    }

    /// Ask this backend which members should answer each user message.
    pub fn with_coordinator(mut self, backend: BackendConfig) -> Self {
        self.scheduler = self.scheduler.with_coordinator(backend);
        self
    }

    /// Register a handler; it receives events from every component of the turn.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.scheduler = self.scheduler.with_event_handler(handler.clone());
        self.executor = self.executor.with_event_handler(handler.clone());
        self.event_handler = Some(handler);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ConversationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &GroupChatConfig {
        &self.config
    }

    async fn emit(&self, event: GroupChatEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_event(&event).await;
        }
    }

    async fn persist(&self, session: &Session, from: usize) {
        let sink = match &self.sink {
            Some(sink) => sink,
            None => return,
        };
        let entries = &session.log()[from.min(session.log().len())..];
        if let Err(e) = sink.persist(session.id(), entries).await {
            log::error!(
                "Failed to persist {} entries for session '{}': {}",
                entries.len(),
                session.id(),
                e
            );
        }
    }

    /// Answer one user message.
    ///
    /// Appends the user entry and every emitted fragment to `session`'s log.
    ///
    /// # Errors
    ///
    /// * [`GroupChatError::EmptyRoster`] if the session has no members.
    /// * [`GroupChatError::IneligibleAgent`] if any member lacks a complete backend.
    ///
    /// In both cases nothing is appended and no backend is called. Backend failures are
    /// never returned; affected agents just stay quiet for the round.
    pub async fn handle_user_turn(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<TurnOutcome, GroupChatError> {
        if session.roster().is_empty() {
            return Err(GroupChatError::EmptyRoster);
        }
        if let Some(agent) = session.roster().iter().find(|p| !p.is_eligible()) {
            return Err(GroupChatError::IneligibleAgent {
                agent_id: agent.id.clone(),
            });
        }

        let session_id = session.id().to_string();
        log::info!(
            "User turn in session '{}' with {} members",
            session_id,
            session.roster().len()
        );
        self.emit(GroupChatEvent::TurnStarted {
            session_id: session_id.clone(),
            message_preview: preview(text, 120),
        })
        .await;

        let silent = fairness::silent_agents(session, self.config.silence_window);
        if !silent.is_empty() {
            log::info!("Silent agents forced into the plan: {:?}", silent);
        }

        let planned = self
            .scheduler
            .plan(&session_id, session.roster(), text, &silent)
            .await;
        self.emit(GroupChatEvent::PlanComputed {
            session_id: session_id.clone(),
            plan: planned.plan.as_slice().to_vec(),
            silent_agents: silent.clone(),
            coordinated: planned.coordinated,
        })
        .await;

        let history_len = session.log().len();
        session.append(ConversationEntry::user(text));

        let initial = self
            .executor
            .run_round(
                session,
                history_len,
                &planned.plan,
                &RoundPrompt::user(text),
                RoundKind::Initial,
            )
            .await?;
        self.persist(session, history_len).await;

        let mut rounds = vec![initial];
        let continuation = ContinuationLoop::new(&self.executor, &self.config.continuation);
        for iteration in 1..=continuation.iterations() {
            let before = session.log().len();
            let last = match rounds.last() {
                Some(last) => last,
                None => break,
            };
            match continuation
                .step(session, &planned.plan, last, iteration)
                .await?
            {
                ContinuationStep::Ran(outcome) => {
                    self.persist(session, before).await;
                    rounds.push(outcome);
                }
                ContinuationStep::Skipped => {
                    log::debug!("Continuation iteration {} skipped", iteration);
                    self.emit(GroupChatEvent::ContinuationSkipped {
                        session_id: session_id.clone(),
                        iteration,
                        reason: "pacing gate".to_string(),
                    })
                    .await;
                }
                ContinuationStep::Finished => break,
            }
        }

        let outcome = TurnOutcome {
            plan: planned.plan,
            silent_agents: silent,
            coordinated: planned.coordinated,
            rounds,
        };
        self.emit(GroupChatEvent::TurnCompleted {
            session_id,
            rounds: outcome.rounds.len(),
            fragment_count: outcome.fragment_count(),
            total_tokens: outcome.total_tokens(),
        })
        .await;
        Ok(outcome)
    }
}
