// Integration tests for speaking-order planning
use async_trait::async_trait;
use groupllm::client_wrapper::{ClientError, ClientWrapper, Message};
use groupllm::fairness::silent_agents;
use groupllm::fragment::Fragment;
use groupllm::profile::{AgentProfile, BackendConfig};
use groupllm::scheduler::{fallback_plan, parse_coordinator_reply, Scheduler};
use groupllm::session::{ConversationEntry, Session};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Coordinator mock returning a fixed answer, an error, or never answering in time
enum Coordinator {
    Answer(&'static str),
    Error,
    Hang,
}

struct CoordinatorClient {
    behaviour: Coordinator,
    calls: AtomicUsize,
}

impl CoordinatorClient {
    fn new(behaviour: Coordinator) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ClientWrapper for CoordinatorClient {
    async fn send_message(
        &self,
        _backend: &BackendConfig,
        messages: &[Message],
    ) -> Result<Message, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(messages.len(), 1);
        match self.behaviour {
            Coordinator::Answer(text) => Ok(Message::assistant(text)),
            Coordinator::Error => Err("503 service unavailable".into()),
            Coordinator::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Message::assistant("Alice"))
            }
        }
    }
}

fn roster() -> Vec<AgentProfile> {
    vec![
        AgentProfile::new("alice", "Alice"),
        AgentProfile::new("bob", "Bob"),
        AgentProfile::new("carol", "Carol"),
    ]
}

fn coordinator_backend() -> BackendConfig {
    BackendConfig::new("http://localhost:9999", "key", "coordinator")
}

fn scheduler(client: Arc<CoordinatorClient>) -> Scheduler {
    Scheduler::new(client, Duration::from_millis(50)).with_coordinator(coordinator_backend())
}

#[tokio::test]
async fn test_silent_agents_survive_every_coordinator_outcome() {
    let silent = vec!["carol".to_string()];
    let behaviours = vec![
        Coordinator::Answer("Alice, Bob"),
        Coordinator::Answer("Bob"),
        Coordinator::Answer("nobody"),
        Coordinator::Error,
        Coordinator::Hang,
    ];

    for behaviour in behaviours {
        let outcome = scheduler(CoordinatorClient::new(behaviour))
            .plan("s", &roster(), "hi", &silent)
            .await;
        assert_eq!(outcome.plan.first(), Some("carol"));
    }
}

#[tokio::test]
async fn test_coordinator_plan_is_deduplicated() {
    let outcome = scheduler(CoordinatorClient::new(Coordinator::Answer(
        "Bob, Bob\nAlice, bob, Bob",
    )))
    .plan("s", &roster(), "hi", &[])
    .await;

    assert!(outcome.coordinated);
    assert_eq!(
        outcome.plan.as_slice(),
        &["bob".to_string(), "alice".to_string()]
    );
}

#[tokio::test]
async fn test_unusable_coordinator_output_uses_roster_order() {
    for behaviour in vec![
        Coordinator::Answer("I cannot help with that"),
        Coordinator::Answer(""),
        Coordinator::Error,
        Coordinator::Hang,
    ] {
        let outcome = scheduler(CoordinatorClient::new(behaviour))
            .plan("s", &roster(), "hi", &[])
            .await;
        assert!(!outcome.coordinated);
        assert_eq!(
            outcome.plan.as_slice(),
            &[
                "alice".to_string(),
                "bob".to_string(),
                "carol".to_string()
            ]
        );
    }
}

#[tokio::test]
async fn test_no_coordinator_means_no_call() {
    let client = CoordinatorClient::new(Coordinator::Answer("Bob"));
    let outcome = Scheduler::new(client.clone(), Duration::from_secs(1))
        .plan("s", &roster(), "hi", &["bob".to_string()])
        .await;

    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        outcome.plan.as_slice(),
        &[
            "bob".to_string(),
            "alice".to_string(),
            "carol".to_string()
        ]
    );
}

#[tokio::test]
async fn test_incomplete_coordinator_backend_is_ignored() {
    let client = CoordinatorClient::new(Coordinator::Answer("Bob"));
    let outcome = Scheduler::new(client.clone(), Duration::from_secs(1))
        .with_coordinator(BackendConfig::new("http://localhost:9999", "key", " "))
        .plan("s", &roster(), "hi", &[])
        .await;

    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    assert!(!outcome.coordinated);
    assert_eq!(outcome.plan.len(), 3);
}

#[test]
fn test_ids_win_over_names_when_both_match() {
    let roster = vec![
        AgentProfile::new("Bob", "Robert"),
        AgentProfile::new("b2", "Bob"),
    ];
    let plan = parse_coordinator_reply("Bob", &roster);
    assert_eq!(plan.as_slice(), &["Bob".to_string()]);
}

#[test]
fn test_fallback_is_never_empty_for_non_empty_roster() {
    assert_eq!(fallback_plan(&roster(), &[]).len(), 3);
    assert!(fallback_plan(&[], &[]).is_empty());
}

#[test]
fn test_silence_escalation_scenario() {
    let mut session = Session::new("s", 3);
    session.add_member(AgentProfile::new("a", "A")).unwrap();
    session.add_member(AgentProfile::new("b", "B")).unwrap();

    let mut log = Vec::new();
    for turn in 0..4 {
        log.push(ConversationEntry::user(format!("turn {}", turn)));
        log.push(ConversationEntry::from_fragment(&Fragment::text("b", "here")));
    }
    let session = Session::restore("s", 3, session.roster().to_vec(), log).unwrap();

    let silent = silent_agents(&session, 4);
    assert_eq!(silent, vec!["a".to_string()]);
    let plan = fallback_plan(session.roster(), &silent);
    assert_eq!(plan.first(), Some("a"));
}
