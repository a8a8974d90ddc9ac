//! Agent Orchestrator
//!
//! The per-session finite-state machine driving each turn through planning,
//! tool execution, evaluation and response. States are session-scoped and
//! strictly sequential; the machine does not advance until the current
//! state's work (including concurrently-dispatched actions in `Executing`)
//! has fully settled.
//!
//! The orchestrator never raises an unhandled failure to the caller: backend
//! and tool failures are absorbed into retries, degraded plans, or
//! user-facing clarifications.

use crate::agent::evaluator::Evaluator;
use crate::agent::executor::Executor;
use crate::agent::planner::Planner;
use crate::agent::types::{AgentState, Evaluation, PlannerOutcome};
use crate::catalog::SchemeCatalog;
use crate::config::Config;
use crate::llm::{prompts, LanguageBackend};
use crate::memory::ConversationMemory;
use crate::profile::ContradictionDetector;
use crate::retrieval::SchemeRetriever;
use crate::store::ProfileStore;
use sdk::profile::{Attribute, Contradiction, Severity, UserProfile};
use sdk::scheme::{EligibilityResult, RetrievalHit};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// A surfaced high-severity contradiction awaiting the user's confirmation
#[derive(Debug, Clone)]
pub struct PendingContradiction {
    pub contradiction: Contradiction,
    pub raised_turn: u32,
}

/// One user's continuous interaction: isolated state machine, memory, profile
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub user_id: Option<String>,
    pub state: AgentState,
    pub profile: UserProfile,
    pub memory: ConversationMemory,
    pub pending: Option<PendingContradiction>,
    turn_counter: u32,
    last_activity: Instant,
}

impl Session {
    pub fn new(user_id: Option<String>, profile: UserProfile, max_turns: usize) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        Self {
            memory: ConversationMemory::new(id.clone(), max_turns),
            id,
            user_id,
            state: AgentState::Listening,
            profile,
            pending: None,
            turn_counter: 0,
            last_activity: Instant::now(),
        }
    }

    fn next_turn(&mut self) -> u32 {
        let turn = self.turn_counter;
        self.turn_counter += 1;
        turn
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Time since the last processed input
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Guarded transition; at most one state is active at any time
    fn set_state(&mut self, to: AgentState) {
        if !self.state.can_transition(to) {
            warn!(
                session = %self.id,
                from = %self.state,
                to = %to,
                "Illegal state transition requested"
            );
        }
        debug!(session = %self.id, from = %self.state, to = %to, "State transition");
        self.state = to;
    }
}

/// What one processed turn produced
#[derive(Debug)]
pub struct TurnReply {
    /// Response text, ready for delivery (and optional TTS)
    pub text: String,

    /// Ranked eligibility results behind the answer, if any
    pub matched_schemes: Vec<EligibilityResult>,

    /// Contradictions surfaced this turn
    pub contradictions: Vec<Contradiction>,

    /// Labels of tools that ran
    pub tools_used: Vec<String>,

    /// True when the reply is a question gathering more information
    pub needs_more_info: bool,
}

pub struct Orchestrator {
    planner: Planner,
    executor: Executor,
    evaluator: Evaluator,
    detector: ContradictionDetector,
    backend: Arc<dyn LanguageBackend>,
    catalog: Arc<SchemeCatalog>,
    max_iterations: usize,
    max_turns: usize,
    contradiction_ttl_turns: u32,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        backend: Arc<dyn LanguageBackend>,
        retriever: Arc<dyn SchemeRetriever>,
        catalog: Arc<SchemeCatalog>,
    ) -> Self {
        let planner = Planner::new(Arc::clone(&backend));
        let executor = Executor::new(
            Arc::clone(&catalog),
            retriever,
            Duration::from_secs(config.retrieval.timeout_secs),
            config.retrieval.top_k,
        );
        let evaluator = Evaluator::new(config.agent.score_threshold, config.agent.top_n);

        Self {
            planner,
            executor,
            evaluator,
            detector: ContradictionDetector::default(),
            backend,
            catalog,
            max_iterations: config.agent.max_iterations,
            max_turns: config.agent.max_turns,
            contradiction_ttl_turns: config.agent.contradiction_ttl_turns,
        }
    }

    /// Start a session, optionally resuming a persisted profile
    pub fn new_session(&self, user_id: Option<String>, profile: UserProfile) -> Session {
        let session = Session::new(user_id, profile, self.max_turns);
        info!(session = %session.id, "Session started");
        session
    }

    /// Process one user input through the full state machine.
    ///
    /// `LISTENING -> PLANNING` on receipt; loop-backs re-enter `PLANNING`
    /// (never `EXECUTING` directly); `RESPONDING -> LISTENING` when the reply
    /// is finalized. Resets nothing in memory or profile between turns.
    pub async fn process_turn(&self, session: &mut Session, input: &str) -> TurnReply {
        session.touch();
        let turn = session.next_turn();
        info!(session = %session.id, turn, "Processing user input");

        session.set_state(AgentState::Planning);

        let facts = self.planner.extract_facts(input, &session.profile).await;
        session.memory.push_user(turn, input, facts.clone());

        // A pending high-severity contradiction is resolved by the user
        // restating the attribute; it times out after a few turns and the
        // original value stands.
        if let Some(pending) = session.pending.clone() {
            let attribute = pending.contradiction.attribute;
            if let Some(updated) = self.detector.resolve(&session.profile, attribute, &facts, turn)
            {
                info!(session = %session.id, %attribute, "Pending contradiction resolved");
                session.profile = updated;
                session.pending = None;
            } else if turn.saturating_sub(pending.raised_turn) > self.contradiction_ttl_turns {
                info!(session = %session.id, %attribute, "Pending contradiction timed out");
                session.pending = None;
            }
        }

        let contradictions = match self.detector.merge(&session.profile, &facts, turn) {
            Ok((profile, contradictions)) => {
                session.profile = profile;
                contradictions
            }
            Err(e) => {
                // Detector bug; keep the previous profile and carry on
                error!(session = %session.id, error = %e, "Profile merge failed");
                Vec::new()
            }
        };

        // A high-severity contradiction forces an immediate clarifying
        // question; no tools run on the unresolved attribute.
        if let Some(high) = contradictions
            .iter()
            .find(|c| c.severity == Severity::High)
            .cloned()
        {
            session.pending = Some(PendingContradiction {
                contradiction: high.clone(),
                raised_turn: turn,
            });
            let text = prompts::contradiction_question(&high);
            return self.finalize(session, turn, text, vec![], contradictions, vec![], true);
        }

        // A still-unresolved hold keeps forcing the clarifying question; no
        // tools run on the disputed attribute until it resolves or times out.
        if let Some(pending) = session.pending.clone() {
            let text = prompts::contradiction_question(&pending.contradiction);
            return self.finalize(session, turn, text, vec![], contradictions, vec![], true);
        }

        let mut missing_hint: Vec<Attribute> = Vec::new();
        let mut tools_used: Vec<String> = Vec::new();
        let mut eligibility: Vec<EligibilityResult> = Vec::new();
        let mut retrieval: Vec<RetrievalHit> = Vec::new();
        let mut intent = input.to_string();

        for iteration in 0..self.max_iterations {
            debug!(session = %session.id, iteration, "Planning iteration");

            let plan = match self
                .planner
                .plan(&session.profile, &session.memory, input, &missing_hint, turn)
                .await
            {
                PlannerOutcome::Unintelligible => {
                    // Null plan: straight to responding, no tools run
                    let text = prompts::unintelligible_reply();
                    return self.finalize(session, turn, text, vec![], contradictions, tools_used, true);
                }
                PlannerOutcome::Plan(plan) => plan,
            };
            intent = plan.intent.clone();

            if let Some(attribute) = plan.clarification_attribute() {
                let text = prompts::clarification_question(attribute);
                return self.finalize(session, turn, text, eligibility, contradictions, tools_used, true);
            }

            session.set_state(AgentState::Executing);
            let report = self.executor.execute(&plan, &session.profile).await;
            tools_used.extend(report.tools_used().iter().map(|s| s.to_string()));

            // Unconditional: partial tool failure does not block evaluation
            session.set_state(AgentState::Evaluating);
            let evaluation = self.evaluator.evaluate(&report, &contradictions);

            if let Some(results) = report.eligibility {
                eligibility = results;
            }
            if let Some(hits) = report.retrieval {
                retrieval = hits;
            }

            match evaluation {
                Evaluation::Complete { reason } => {
                    debug!(session = %session.id, %reason, "Turn complete");
                    break;
                }
                Evaluation::NeedMoreInfo { missing, reason } => {
                    debug!(session = %session.id, %reason, "Looping back for more information");
                    if iteration + 1 == self.max_iterations {
                        // Loop bound reached: answer with what we have
                        break;
                    }
                    missing_hint = if missing.is_empty() {
                        session.profile.missing_attributes()
                    } else {
                        missing
                    };
                    // The discarded plan is replaced by a fresh one
                    session.set_state(AgentState::Planning);
                }
            }
        }

        let text = self
            .response_text(&intent, &session.profile, &eligibility, &retrieval)
            .await;
        self.finalize(session, turn, text, eligibility, contradictions, tools_used, false)
    }

    /// Phrase the final answer through the backend, degrading to a
    /// deterministic template on failure.
    async fn response_text(
        &self,
        intent: &str,
        profile: &UserProfile,
        eligibility: &[EligibilityResult],
        retrieval: &[RetrievalHit],
    ) -> String {
        let mut named: Vec<(&str, String)> = eligibility
            .iter()
            .filter(|r| r.clears(0.0) && r.failed_criteria.is_empty())
            .take(3)
            .filter_map(|r| {
                self.catalog
                    .get(&r.scheme_id)
                    .map(|s| (s.name.as_str(), s.description.clone()))
            })
            .collect();

        if named.is_empty() {
            named = retrieval
                .iter()
                .take(3)
                .filter_map(|h| {
                    self.catalog
                        .get(&h.scheme_id)
                        .map(|s| (s.name.as_str(), s.description.clone()))
                })
                .collect();
        }

        let summaries: Vec<String> = named
            .iter()
            .map(|(name, description)| format!("- {}: {}", name, description))
            .collect();

        let messages = prompts::response_messages(intent, profile, &summaries);
        match self.backend.generate(&messages).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Response generation failed, using fallback");
                let names: Vec<String> = named.iter().map(|(n, _)| n.to_string()).collect();
                prompts::fallback_response(&names)
            }
        }
    }

    /// Finalize the reply: `-> RESPONDING`, record the agent turn, then
    /// `-> LISTENING` for the next input of the same session.
    fn finalize(
        &self,
        session: &mut Session,
        turn: u32,
        text: String,
        matched_schemes: Vec<EligibilityResult>,
        contradictions: Vec<Contradiction>,
        tools_used: Vec<String>,
        needs_more_info: bool,
    ) -> TurnReply {
        session.set_state(AgentState::Responding);
        session.memory.push_agent(turn, &text);
        session.set_state(AgentState::Listening);

        TurnReply {
            text,
            matched_schemes,
            contradictions,
            tools_used,
            needs_more_info,
        }
    }
}

/// Sessions keyed by id, with idle-timeout archiving.
///
/// Sessions never share mutable state, so cross-session concurrency needs no
/// locking beyond exclusive access to this map.
pub struct SessionManager {
    sessions: HashMap<String, Session>,
    session_timeout: Duration,
}

impl SessionManager {
    pub fn new(session_timeout: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            session_timeout,
        }
    }

    /// Register a session, returning its id
    pub fn insert(&mut self, session: Session) -> String {
        let id = session.id.clone();
        self.sessions.insert(id.clone(), session);
        id
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ids of sessions idle past the timeout
    pub fn idle_session_ids(&self) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|(_, s)| s.idle_for() >= self.session_timeout)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Archive one session: persist its profile (when a user id is attached),
    /// clear its conversation memory, and drop it.
    pub async fn archive(&mut self, id: &str, store: &ProfileStore) -> anyhow::Result<()> {
        let mut session = self
            .sessions
            .remove(id)
            .ok_or_else(|| anyhow::anyhow!("session not found: {}", id))?;

        if let Some(user_id) = &session.user_id {
            store.save(user_id, &session.profile).await?;
        }
        session.memory.clear();
        info!(session = %id, "Session archived");
        Ok(())
    }

    /// Archive every idle session; resource reclamation, not a state-machine
    /// state.
    pub async fn archive_idle(&mut self, store: &ProfileStore) -> anyhow::Result<usize> {
        let mut archived = 0;
        for id in self.idle_session_ids() {
            self.archive(&id, store).await?;
            archived += 1;
        }
        Ok(archived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LLMError, Message};
    use crate::retrieval::KeywordRetriever;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted backend: `Some(text)` replies in order, `None` simulates a
    /// backend failure; an exhausted script also fails.
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Option<String>>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Option<&str>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(String::from))
                        .collect(),
                ),
            })
        }
    }

    #[async_trait]
    impl crate::llm::LanguageBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _messages: &[Message]) -> crate::llm::Result<String> {
            match self.replies.lock().expect("script lock").pop_front() {
                Some(Some(text)) => Ok(text),
                _ => Err(LLMError::Timeout),
            }
        }
    }

    fn orchestrator(backend: Arc<ScriptedBackend>) -> Orchestrator {
        let config = Config::default();
        let catalog = Arc::new(SchemeCatalog::load(None).unwrap());
        let retriever = Arc::new(KeywordRetriever::new(Arc::clone(&catalog)));
        Orchestrator::new(&config, backend, retriever, catalog)
    }

    #[tokio::test]
    async fn test_high_severity_contradiction_forces_clarification() {
        // Turn 1 states category=general, turn 2 contradicts with sc, turn 3
        // confirms sc.
        let backend = ScriptedBackend::new(vec![
            // turn 1: extraction, intent, response (fails -> fallback)
            Some(r#"{"category": "general", "age": 45}"#),
            Some(r#"{"intent": "find schemes", "search_query": "schemes"}"#),
            None,
            // turn 2: extraction only; the contradiction reply is templated
            Some(r#"{"category": "sc"}"#),
            // turn 3: extraction, intent, response (fails -> fallback)
            Some(r#"{"category": "sc"}"#),
            Some(r#"{"intent": "find schemes", "search_query": "schemes"}"#),
            None,
        ]);
        let orch = orchestrator(backend);
        let mut session = orch.new_session(None, UserProfile::default());

        let first = orch.process_turn(&mut session, "I am 45, general category").await;
        assert!(first.contradictions.is_empty());
        assert_eq!(session.profile.category.as_ref().unwrap().value.to_string(), "general");

        let second = orch.process_turn(&mut session, "actually I am SC").await;
        // Profile value NOT overwritten; clarification question returned;
        // no tools ran this turn
        assert_eq!(session.profile.category.as_ref().unwrap().value.to_string(), "general");
        assert_eq!(second.contradictions.len(), 1);
        assert_eq!(second.contradictions[0].severity, Severity::High);
        assert!(second.tools_used.is_empty());
        assert!(second.needs_more_info);
        assert!(second.text.contains("confirm"));
        assert!(session.pending.is_some());

        let third = orch.process_turn(&mut session, "SC is correct").await;
        // The restated value resolves the pending contradiction
        assert_eq!(session.profile.category.as_ref().unwrap().value.to_string(), "sc");
        assert!(session.pending.is_none());
        assert!(third.contradictions.is_empty());
        assert_eq!(session.state, AgentState::Listening);
    }

    #[tokio::test]
    async fn test_low_severity_proceeds_without_blocking() {
        let backend = ScriptedBackend::new(vec![
            Some(r#"{"age": 30, "state": "Bihar"}"#),
            Some(r#"{"intent": "schemes", "search_query": "schemes"}"#),
            None,
            Some(r#"{"age": 32}"#),
            Some(r#"{"intent": "schemes", "search_query": "schemes"}"#),
            None,
        ]);
        let orch = orchestrator(backend);
        let mut session = orch.new_session(None, UserProfile::default());

        orch.process_turn(&mut session, "I am 30, from Bihar").await;
        let reply = orch.process_turn(&mut session, "I am 32 actually").await;

        // New value wins, conflict recorded, turn still ran tools
        assert_eq!(session.profile.age.as_ref().unwrap().value, 32);
        assert_eq!(reply.contradictions.len(), 1);
        assert_eq!(reply.contradictions[0].severity, Severity::Low);
        assert!(!reply.tools_used.is_empty());
    }

    #[tokio::test]
    async fn test_unintelligible_input_responds_without_tools() {
        let backend = ScriptedBackend::new(vec![
            Some(r#"{}"#),
            Some(r#"{"intent": "", "unintelligible": true}"#),
        ]);
        let orch = orchestrator(backend);
        let mut session = orch.new_session(None, UserProfile::default());

        let reply = orch.process_turn(&mut session, "zzz").await;
        assert!(reply.tools_used.is_empty());
        assert!(reply.needs_more_info);
        assert_eq!(session.state, AgentState::Listening);
    }

    #[tokio::test]
    async fn test_pending_contradiction_times_out() {
        let backend = ScriptedBackend::new(vec![
            // turn 0: set gender
            Some(r#"{"gender": "male", "age": 40}"#),
            Some(r#"{"intent": "schemes", "search_query": "schemes"}"#),
            None,
            // turn 1: contradict (pending raised)
            Some(r#"{"gender": "female"}"#),
            // turns 2-3: unrelated inputs; the question is re-asked from the
            // template, extraction is the only backend call
            Some(r#"{}"#),
            Some(r#"{}"#),
            // turn 4: hold has timed out, normal processing resumes
            Some(r#"{}"#),
            Some(r#"{"intent": "schemes", "search_query": "schemes"}"#),
            None,
        ]);
        let orch = orchestrator(backend);
        let mut session = orch.new_session(None, UserProfile::default());

        orch.process_turn(&mut session, "male, 40").await;
        orch.process_turn(&mut session, "female").await;
        assert!(session.pending.is_some());

        let nagged = orch.process_turn(&mut session, "ok").await;
        // Unresolved hold keeps asking and keeps tools off
        assert!(nagged.tools_used.is_empty());
        assert!(nagged.text.contains("confirm"));
        assert!(session.pending.is_some());

        orch.process_turn(&mut session, "ok").await;
        // Past the TTL the original value stands and the hold is dropped
        let resumed = orch.process_turn(&mut session, "ok").await;
        assert!(session.pending.is_none());
        assert!(!resumed.tools_used.is_empty());
        assert_eq!(session.profile.gender.as_ref().unwrap().value.to_string(), "male");
    }

    #[test]
    fn test_session_manager_tracks_idle_sessions() {
        let mut manager = SessionManager::new(Duration::from_secs(0));
        let session = Session::new(None, UserProfile::default(), 10);
        let id = manager.insert(session);

        // Zero timeout: immediately idle
        assert_eq!(manager.idle_session_ids(), vec![id]);
        assert_eq!(manager.len(), 1);
    }
}
