//! Agent-to-agent follow-up rounds after the user's round.
//!
//! Each iteration picks members who did not speak in the previous round, replays what
//! was just said from each one's point of view, and lets them react. Members who already spoke may go again in
//! early iterations, except the one who spoke last. A random gate skips iterations
//! now and then so the banter does not fire on every turn. Silence tracking is not
//! consulted here; it only concerns user turns.

use crate::groupllm::context::RoundPrompt;
use crate::groupllm::error::GroupChatError;
use crate::groupllm::event::RoundKind;
use crate::groupllm::round::{RoundExecutor, RoundOutcome};
use crate::groupllm::scheduler::SpeakerPlan;
use crate::groupllm::session::Session;
use rand::Rng;
use std::collections::HashSet;

/// How follow-up rounds are paced.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuationPolicy {
    pub enabled: bool,
    /// Upper bound on follow-up iterations per user turn.
    pub max_iterations: usize,
    /// Chance that an iteration runs. `1.0` always runs, `0.0` never does.
    pub proceed_probability: f64,
    /// Last iteration (1-based) in which members who just spoke may speak again.
    pub repeat_speaker_iterations: usize,
}

impl Default for ContinuationPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_iterations: 3,
            proceed_probability: 0.8,
            repeat_speaker_iterations: 2,
        }
    }
}

impl ContinuationPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    #[must_use]
    pub fn with_proceed_probability(mut self, probability: f64) -> Self {
        self.proceed_probability = probability;
        self
    }

    #[must_use]
    pub fn with_repeat_speaker_iterations(mut self, iterations: usize) -> Self {
        self.repeat_speaker_iterations = iterations;
        self
    }

    /// Roll the pacing gate.
    pub fn should_proceed(&self) -> bool {
        let p = self.proceed_probability;
        if p.is_nan() || p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        rand::thread_rng().gen_bool(p)
    }
}

/// What happened in one follow-up iteration.
#[derive(Debug)]
pub enum ContinuationStep {
    Ran(RoundOutcome),
    /// The pacing gate said no; later iterations may still run.
    Skipped,
    /// Nobody is left to speak, or the previous round was empty.
    Finished,
}

/// Members allowed to speak in follow-up iteration `iteration` (1-based).
///
/// Order follows `plan` first, then the rest of the roster.
pub fn candidates(
    session: &Session,
    plan: &SpeakerPlan,
    last: &RoundOutcome,
    iteration: usize,
    policy: &ContinuationPolicy,
) -> SpeakerPlan {
    let ordered = SpeakerPlan::from_ids(
        plan.iter()
            .filter(|id| session.member(id).is_some())
            .map(str::to_string)
            .chain(session.roster().iter().map(|p| p.id.clone())),
    );

    let spoke: HashSet<&str> = last.fragments.iter().map(|f| f.agent_id.as_str()).collect();
    let fresh = SpeakerPlan::from_ids(ordered.iter().filter(|id| !spoke.contains(id)));
    if !fresh.is_empty() {
        return fresh;
    }

    if iteration > policy.repeat_speaker_iterations {
        return SpeakerPlan::default();
    }
    let previous = last.fragments.last().map(|f| f.agent_id.as_str());
    SpeakerPlan::from_ids(ordered.iter().filter(|id| Some(*id) != previous))
}

/// Drives follow-up iterations for one user turn.
pub struct ContinuationLoop<'a> {
    executor: &'a RoundExecutor,
    policy: &'a ContinuationPolicy,
}

impl<'a> ContinuationLoop<'a> {
    pub fn new(executor: &'a RoundExecutor, policy: &'a ContinuationPolicy) -> Self {
        Self { executor, policy }
    }

    /// Number of iterations the caller should attempt.
    pub fn iterations(&self) -> usize {
        if self.policy.enabled {
            self.policy.max_iterations
        } else {
            0
        }
    }

    /// Run follow-up iteration `iteration` (1-based) reacting to `last`, which must be
    /// the most recent round appended to `session`.
    pub async fn step(
        &self,
        session: &mut Session,
        plan: &SpeakerPlan,
        last: &RoundOutcome,
        iteration: usize,
    ) -> Result<ContinuationStep, GroupChatError> {
        if last.fragments.is_empty() {
            return Ok(ContinuationStep::Finished);
        }

        let speakers = candidates(session, plan, last, iteration, self.policy);
        if speakers.is_empty() {
            log::debug!(
                "No follow-up speakers left in session '{}' at iteration {}",
                session.id(),
                iteration
            );
            return Ok(ContinuationStep::Finished);
        }

        if !self.policy.should_proceed() {
            return Ok(ContinuationStep::Skipped);
        }

        let prompt = RoundPrompt::Reaction(last.fragments.clone());
        // The prompt already carries `last`, so it is left out of the replayed history.
        let history_len = session.log().len().saturating_sub(last.fragments.len());
        let outcome = self
            .executor
            .run_round(
                session,
                history_len,
                &speakers,
                &prompt,
                RoundKind::Continuation(iteration),
            )
            .await?;

        if outcome.fragments.is_empty() {
            return Ok(ContinuationStep::Finished);
        }
        Ok(ContinuationStep::Ran(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groupllm::fragment::Fragment;
    use crate::groupllm::invoker::AgentResponse;
    use crate::groupllm::profile::AgentProfile;

    fn session() -> Session {
        let mut session = Session::new("s", 3);
        for (id, name) in [("a", "Alice"), ("b", "Bob"), ("c", "Carol")].iter() {
            session.add_member(AgentProfile::new(*id, *name)).unwrap();
        }
        session
    }

    fn outcome(fragments: &[(&str, &str)]) -> RoundOutcome {
        RoundOutcome {
            kind: RoundKind::Initial,
            responses: Vec::<AgentResponse>::new(),
            fragments: fragments
                .iter()
                .map(|(id, text)| Fragment::text(*id, *text))
                .collect(),
        }
    }

    fn ids(plan: &SpeakerPlan) -> Vec<&str> {
        plan.iter().collect()
    }

    #[test]
    fn test_members_who_did_not_speak_go_first() {
        let session = session();
        let plan = SpeakerPlan::from_ids(vec!["b", "a"]);
        let last = outcome(&[("b", "hi"), ("a", "hey")]);
        let policy = ContinuationPolicy::default();
        assert_eq!(ids(&candidates(&session, &plan, &last, 1, &policy)), vec!["c"]);
    }

    #[test]
    fn test_repeat_speakers_exclude_last_and_expire() {
        let session = session();
        let plan = SpeakerPlan::from_ids(vec!["c", "b", "a"]);
        let last = outcome(&[("c", "1"), ("b", "2"), ("a", "3"), ("c", "4")]);
        let policy = ContinuationPolicy::default();

        assert_eq!(ids(&candidates(&session, &plan, &last, 1, &policy)), vec!["b", "a"]);
        assert_eq!(ids(&candidates(&session, &plan, &last, 2, &policy)), vec!["b", "a"]);
        assert!(candidates(&session, &plan, &last, 3, &policy).is_empty());
    }

    #[test]
    fn test_gate_extremes() {
        let always = ContinuationPolicy::default().with_proceed_probability(1.0);
        let never = ContinuationPolicy::default().with_proceed_probability(0.0);
        for _ in 0..20 {
            assert!(always.should_proceed());
            assert!(!never.should_proceed());
        }
        assert!(!ContinuationPolicy::default()
            .with_proceed_probability(f64::NAN)
            .should_proceed());
    }
}
