//! Per-agent prompt assembly.
//!
//! [`ContextBuilder::build`] produces the message list sent to one agent, in this order:
//!
//! 1. shared knowledge: session world lore plus every member's shared lore
//! 2. identity: the agent's name, persona and exclusive lore
//! 3. history, with the agent's own entries replayed as assistant turns and everyone
//!    else's as user turns prefixed with the speaker's display name
//! 4. the output contract
//! 5. the current prompt: the user's message, or for a follow-up round the previous
//!    round's fragments (remapped like history) and a short instruction to react
//! 6. what other members already said earlier in this round, if anything
//!
//! Step 6 is how later speakers hear earlier ones without a second round-trip. It never
//! includes the agent's own output from the current round.

use crate::groupllm::client_wrapper::Message;
use crate::groupllm::fragment::{Fragment, FRAGMENT_DELIMITER};
use crate::groupllm::invoker::AgentResponse;
use crate::groupllm::profile::{AgentProfile, LoreEntry};
use crate::groupllm::session::{ConversationEntry, EntryRole, Session};

/// Closing instruction of a follow-up round. It is never logged.
pub const REACTION_INSTRUCTION: &str = "(The group chat continues without the user.) \
React to what was just said if you have something to add. Speak only as yourself and keep it short.";

/// What the agents of a round are answering.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundPrompt {
    /// A message from the user.
    User(String),
    /// A follow-up round reacting to the previous round's fragments, in display order.
    Reaction(Vec<Fragment>),
}

impl RoundPrompt {
    pub fn user(text: impl Into<String>) -> Self {
        RoundPrompt::User(text.into())
    }

    /// Text searched for lore keywords.
    fn scan_text(&self) -> String {
        match self {
            RoundPrompt::User(text) => text.to_lowercase(),
            RoundPrompt::Reaction(fragments) => fragments
                .iter()
                .map(|f| f.payload().to_lowercase())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Builds prompts from a session's state.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    history_limit: usize,
    lore_scan_depth: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(40, 4)
    }
}

impl ContextBuilder {
    /// `history_limit`: newest entries replayed. `lore_scan_depth`: newest entries
    /// scanned, together with the prompt, for keyed lore.
    pub fn new(history_limit: usize, lore_scan_depth: usize) -> Self {
        Self {
            history_limit,
            lore_scan_depth,
        }
    }

    /// Assemble the prompt for `agent`.
    ///
    /// `history` is the part of the log that precedes `prompt`; `round_so_far` holds
    /// the responses already produced earlier in the current round, in speaking order.
    pub fn build(
        &self,
        agent: &AgentProfile,
        session: &Session,
        history: &[ConversationEntry],
        prompt: &RoundPrompt,
        round_so_far: &[AgentResponse],
    ) -> Vec<Message> {
        let scan_text = self.lore_scan_text(history, prompt);
        let mut messages = Vec::new();

        let shared: Vec<&str> = session
            .world_lore()
            .iter()
            .chain(session.roster().iter().flat_map(|p| p.shared_lore.iter()))
            .filter(|entry| entry.is_active(&scan_text))
            .map(|entry| entry.content.as_str())
            .collect();
        if !shared.is_empty() {
            messages.push(Message::system(format!(
                "Shared knowledge for everyone in this group chat:\n{}",
                bullet_list(&shared)
            )));
        }

        messages.push(Message::system(self.identity_block(agent, session, &scan_text)));

        let start = history.len().saturating_sub(self.history_limit);
        for entry in history[start..].iter().filter(|e| !e.is_recalled()) {
            messages.push(replay(entry, agent, session));
        }

        messages.push(Message::system(output_contract(agent, session)));
        match prompt {
            RoundPrompt::User(text) => messages.push(Message::user(text)),
            RoundPrompt::Reaction(last) => {
                messages.extend(last.iter().map(|f| replay_fragment(f, agent, session)));
                messages.push(Message::user(REACTION_INSTRUCTION));
            }
        }

        if let Some(block) = round_block(agent, session, round_so_far) {
            messages.push(Message::system(block));
        }

        log::debug!(
            "Built prompt for '{}' with {} messages ({} earlier responses this round)",
            agent.id,
            messages.len(),
            round_so_far.len()
        );
        messages
    }

    fn lore_scan_text(&self, history: &[ConversationEntry], prompt: &RoundPrompt) -> String {
        let start = history.len().saturating_sub(self.lore_scan_depth);
        let mut text = prompt.scan_text();
        for entry in &history[start..] {
            text.push('\n');
            text.push_str(&entry.content().to_lowercase());
        }
        text
    }

    fn identity_block(&self, agent: &AgentProfile, session: &Session, scan_text: &str) -> String {
        let others: Vec<&str> = session
            .roster()
            .iter()
            .filter(|p| p.id != agent.id)
            .map(|p| p.name.as_str())
            .collect();

        let mut block = format!("You are {}.", agent.name);
        if !others.is_empty() {
            block.push_str(&format!(
                " You are chatting in a group with the user and {}.",
                others.join(", ")
            ));
        }
        if !agent.persona.trim().is_empty() {
            block.push_str("\n\n");
            block.push_str(agent.persona.trim());
        }

        let exclusive: Vec<&str> = active(&agent.lore, scan_text);
        if !exclusive.is_empty() {
            block.push_str("\n\nThings only you know:\n");
            block.push_str(&bullet_list(&exclusive));
        }
        block
    }
}

fn active<'a>(entries: &'a [LoreEntry], scan_text: &str) -> Vec<&'a str> {
    entries
        .iter()
        .filter(|e| e.is_active(scan_text))
        .map(|e| e.content.as_str())
        .collect()
}

fn bullet_list(items: &[&str]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

fn replay(entry: &ConversationEntry, agent: &AgentProfile, session: &Session) -> Message {
    match entry.to_fragment() {
        Some(fragment) if entry.role == EntryRole::Agent => {
            replay_fragment(&fragment, agent, session)
        }
        _ => Message::user(entry.content()),
    }
}

/// The agent's own fragments come back as its turns, everyone else's as tagged lines.
fn replay_fragment(fragment: &Fragment, agent: &AgentProfile, session: &Session) -> Message {
    if fragment.agent_id == agent.id {
        Message::assistant(fragment.content.to_marked_text())
    } else {
        Message::user(format!(
            "[{}]: {}",
            session.display_name(&fragment.agent_id),
            fragment.content.to_marked_text()
        ))
    }
}

fn output_contract(agent: &AgentProfile, session: &Session) -> String {
    let others: Vec<&str> = session
        .roster()
        .iter()
        .filter(|p| p.id != agent.id)
        .map(|p| p.name.as_str())
        .collect();

    let mut rules = vec![
        format!("Speak only as {}. Never write lines for anyone else.", agent.name),
        "Do not start your reply with a name tag such as \"[Name]:\".".to_string(),
        format!(
            "Reply with one or two short chat messages. Separate messages with {}.",
            FRAGMENT_DELIMITER
        ),
        "To send a voice message wrap its transcript in [voice]...[/voice]; to send a sticker wrap its description in [sticker]...[/sticker].".to_string(),
    ];
    if !others.is_empty() {
        rules.insert(
            1,
            format!(
                "Never prefix a message with another member's name ({}).",
                others.join(", ")
            ),
        );
    }
    format!("Reply rules:\n{}", rules.join("\n"))
}

/// Other members' fragments from earlier in this round, or `None` if there are none.
fn round_block(
    agent: &AgentProfile,
    session: &Session,
    round_so_far: &[AgentResponse],
) -> Option<String> {
    let lines: Vec<String> = round_so_far
        .iter()
        .filter(|r| r.agent_id != agent.id)
        .flat_map(|r| r.fragments.iter())
        .map(|f| {
            format!(
                "[{}]: {}",
                session.display_name(&f.agent_id),
                f.content.to_marked_text()
            )
        })
        .collect();

    if lines.is_empty() {
        return None;
    }

    Some(format!(
        "Earlier in this round the others already said, in order:\n{}\n\nYour messages will be shown interleaved with these, your first after their first messages, your second after their second ones. Respond to them in that order and do not repeat what they said.",
        lines.join("\n")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groupllm::client_wrapper::Role;

    fn session() -> Session {
        let mut session = Session::new("s", 3)
            .with_world_lore(LoreEntry::constant("The group meets on Fridays."));
        session
            .add_member(
                AgentProfile::new("alice", "Alice")
                    .with_persona("A botanist.")
                    .with_lore(LoreEntry::keyed(["orchid"], "Alice's orchid is blooming."))
                    .with_shared_lore(LoreEntry::constant("Alice hosts the meetups.")),
            )
            .unwrap();
        session
            .add_member(
                AgentProfile::new("bob", "Bob")
                    .with_lore(LoreEntry::constant("Bob secretly dislikes plants.")),
            )
            .unwrap();
        session
    }

    fn texts(messages: &[Message]) -> String {
        messages
            .iter()
            .map(|m| m.content.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_history_roles_are_remapped() {
        let mut session = session();
        session.append(ConversationEntry::user("how is everyone?"));
        session.append(ConversationEntry::from_fragment(&Fragment::text("alice", "great")));
        session.append(ConversationEntry::from_fragment(&Fragment::text("bob", "fine")));

        let alice = session.member("alice").unwrap().clone();
        let history = session.log().to_vec();
        let prompt = RoundPrompt::user("next?");
        let messages = ContextBuilder::default().build(&alice, &session, &history, &prompt, &[]);

        let replayed: Vec<(Role, String)> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| (m.role.clone(), m.content.to_string()))
            .collect();
        assert_eq!(
            replayed,
            vec![
                (Role::User, "how is everyone?".to_string()),
                (Role::Assistant, "great".to_string()),
                (Role::User, "[Bob]: fine".to_string()),
                (Role::User, "next?".to_string()),
            ]
        );
    }

    #[test]
    fn test_lore_visibility() {
        let session = session();
        let alice = session.member("alice").unwrap().clone();
        let bob = session.member("bob").unwrap().clone();
        let builder = ContextBuilder::default();

        let hello = RoundPrompt::user("hello");
        let for_alice = texts(&builder.build(&alice, &session, &[], &hello, &[]));
        assert!(for_alice.contains("The group meets on Fridays."));
        assert!(for_alice.contains("Alice hosts the meetups."));
        assert!(!for_alice.contains("orchid is blooming"));
        assert!(!for_alice.contains("dislikes plants"));

        let orchid = RoundPrompt::user("How's the Orchid?");
        let for_alice = texts(&builder.build(&alice, &session, &[], &orchid, &[]));
        assert!(for_alice.contains("Alice's orchid is blooming."));

        let for_bob = texts(&builder.build(&bob, &session, &[], &hello, &[]));
        assert!(for_bob.contains("Alice hosts the meetups."));
        assert!(for_bob.contains("Bob secretly dislikes plants."));
    }

    #[test]
    fn test_round_block_excludes_own_fragments() {
        let session = session();
        let alice = session.member("alice").unwrap().clone();

        let mut own = AgentResponse::empty("alice");
        own.fragments = vec![Fragment::text("alice", "my earlier line")];
        let mut bobs = AgentResponse::empty("bob");
        bobs.fragments = vec![Fragment::text("bob", "first"), Fragment::text("bob", "second")];

        let prompt = RoundPrompt::user("hi");
        let messages = ContextBuilder::default().build(&alice, &session, &[], &prompt, &[own, bobs]);
        let last = messages.last().unwrap();
        assert_eq!(last.role, Role::System);
        assert!(last.content.contains("[Bob]: first\n[Bob]: second"));
        assert!(!texts(&messages).contains("my earlier line"));
        assert!(!texts(&messages).contains("[Alice]:"));
    }

    #[test]
    fn test_no_round_block_when_first_speaker() {
        let session = session();
        let alice = session.member("alice").unwrap().clone();
        let prompt = RoundPrompt::user("hi");
        let messages = ContextBuilder::default().build(&alice, &session, &[], &prompt, &[]);
        let last = messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(&*last.content, "hi");
    }

    #[test]
    fn test_recalled_entries_and_history_limit() {
        let mut session = session();
        for i in 0..5 {
            session.append(ConversationEntry::user(format!("message {}", i)));
        }
        let newest = session.log()[4].id;
        assert!(session.recall(newest));

        let alice = session.member("alice").unwrap().clone();
        let history = session.log().to_vec();
        let prompt = RoundPrompt::user("now");
        let messages = ContextBuilder::new(2, 4).build(&alice, &session, &history, &prompt, &[]);
        let all = texts(&messages);
        assert!(all.contains("message 3"));
        assert!(!all.contains("message 2"));
        assert!(!all.contains("message 4"));
    }

    #[test]
    fn test_reaction_replays_own_lines_as_own_turns() {
        let session = session();
        let alice = session.member("alice").unwrap().clone();
        let last = RoundPrompt::Reaction(vec![
            Fragment::text("alice", "pizza tonight"),
            Fragment::text("bob", "sure"),
        ]);

        let messages = ContextBuilder::default().build(&alice, &session, &[], &last, &[]);
        let tail: Vec<(Role, String)> = messages
            .iter()
            .rev()
            .take(3)
            .rev()
            .map(|m| (m.role.clone(), m.content.to_string()))
            .collect();
        assert_eq!(
            tail,
            vec![
                (Role::Assistant, "pizza tonight".to_string()),
                (Role::User, "[Bob]: sure".to_string()),
                (Role::User, REACTION_INSTRUCTION.to_string()),
            ]
        );
        assert!(!texts(&messages).contains("[Alice]:"));
    }

    #[test]
    fn test_reaction_fragments_activate_lore() {
        let session = session();
        let alice = session.member("alice").unwrap().clone();
        let last = RoundPrompt::Reaction(vec![Fragment::text("bob", "nice orchid")]);
        let messages = ContextBuilder::default().build(&alice, &session, &[], &last, &[]);
        assert!(texts(&messages).contains("Alice's orchid is blooming."));
    }
}
