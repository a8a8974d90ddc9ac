//! Agent Planner
//!
//! Turns (profile, memory, latest input) into an intent classification and an
//! ordered action plan. Natural-language understanding is delegated to the
//! language backend; plan construction itself is deterministic. Backend
//! output is validated against the boundary schemas and malformed replies get
//! one corrective retry before falling back.

use crate::agent::types::{Plan, PlannerOutcome, RawIntent};
use crate::llm::{self, prompts, LanguageBackend, Message};
use crate::memory::ConversationMemory;
use sdk::profile::{Attribute, ExtractedFacts, UserProfile};
use std::sync::Arc;
use tracing::{debug, warn};

/// Profiles with at least this many known attributes plan eligibility-first
const ELIGIBILITY_FIRST_MIN_ATTRS: usize = 2;

/// Extraction confidence assigned to a first-attempt parse
const EXTRACT_CONFIDENCE: f32 = 0.9;

/// Lower confidence for facts recovered via the corrective retry
const RETRY_CONFIDENCE: f32 = 0.7;

pub struct Planner {
    backend: Arc<dyn LanguageBackend>,
}

impl Planner {
    pub fn new(backend: Arc<dyn LanguageBackend>) -> Self {
        Self { backend }
    }

    /// Extract profile facts from one utterance.
    ///
    /// Malformed backend output gets one retry with a corrective instruction;
    /// after that the utterance is treated as carrying no new facts. Backend
    /// failures are absorbed the same way — extraction never fails the turn.
    pub async fn extract_facts(&self, input: &str, profile: &UserProfile) -> ExtractedFacts {
        let mut messages = prompts::extraction_messages(input, profile);

        for attempt in 0..2 {
            let content = match self.backend.generate(&messages).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(error = %e, "Fact extraction call failed; continuing without facts");
                    return ExtractedFacts::default();
                }
            };

            match llm::parse_structured::<ExtractedFacts>(&content) {
                Ok(mut facts) => {
                    facts.confidence = if attempt == 0 {
                        EXTRACT_CONFIDENCE
                    } else {
                        RETRY_CONFIDENCE
                    };
                    sanitize_facts(&mut facts);
                    debug!(
                        attributes = facts.mentioned_attributes().len(),
                        "Facts extracted"
                    );
                    return facts;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Malformed extraction output");
                    messages.push(Message::assistant(content));
                    messages.push(prompts::corrective_instruction());
                }
            }
        }

        ExtractedFacts::default()
    }

    /// Build the plan for this turn.
    ///
    /// On a loop-back the evaluator's missing attributes are passed in and
    /// the plan targets the most impactful one directly, without consulting
    /// the backend. Otherwise the backend classifies intent; with two or more
    /// known attributes the plan runs the eligibility engine and retrieval
    /// concurrently, with a sparse profile it runs retrieval alone.
    pub async fn plan(
        &self,
        profile: &UserProfile,
        memory: &ConversationMemory,
        input: &str,
        missing_hint: &[Attribute],
        turn: u32,
    ) -> PlannerOutcome {
        if let Some(attribute) = missing_hint.first() {
            debug!(%attribute, "Refined plan targets missing attribute");
            return PlannerOutcome::Plan(Plan::clarification(input, *attribute, turn));
        }

        let raw = self.classify_intent(input, profile, memory).await;

        let (intent, query) = match raw {
            Some(raw) if raw.unintelligible => {
                debug!("Input classified as unintelligible");
                return PlannerOutcome::Unintelligible;
            }
            Some(raw) => {
                let query = raw.search_query.unwrap_or_else(|| input.to_string());
                (raw.intent, query)
            }
            // Backend unusable: fall back to a default plan on the raw input
            None => (input.to_string(), input.to_string()),
        };

        let plan = if profile.known_count() >= ELIGIBILITY_FIRST_MIN_ATTRS {
            Plan::eligibility_first(intent, query, turn)
        } else {
            Plan::retrieval_only(intent, query, turn)
        };

        debug!(plan_id = %plan.id, actions = plan.actions.len(), "Plan created");
        PlannerOutcome::Plan(plan)
    }

    /// Intent classification with boundary validation and one corrective
    /// retry. `None` means the backend was unusable this turn.
    async fn classify_intent(
        &self,
        input: &str,
        profile: &UserProfile,
        memory: &ConversationMemory,
    ) -> Option<RawIntent> {
        let mut messages = prompts::intent_messages(input, profile, &memory.context_string(3));

        for attempt in 0..2 {
            let content = match self.backend.generate(&messages).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(error = %e, "Intent classification call failed, using default plan");
                    return None;
                }
            };

            match llm::parse_structured::<RawIntent>(&content) {
                Ok(raw) => return Some(raw),
                Err(e) => {
                    warn!(attempt, error = %e, "Malformed intent output");
                    messages.push(Message::assistant(content));
                    messages.push(prompts::corrective_instruction());
                }
            }
        }

        None
    }
}

/// Drop implausible extracted values rather than letting them poison the
/// profile: ages beyond human range, empty strings for state/occupation.
fn sanitize_facts(facts: &mut ExtractedFacts) {
    if matches!(facts.age, Some(age) if age > 120) {
        facts.age = None;
    }
    if matches!(&facts.state, Some(s) if s.trim().is_empty()) {
        facts.state = None;
    }
    if matches!(&facts.occupation, Some(s) if s.trim().is_empty()) {
        facts.occupation = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LLMError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Backend returning scripted replies; errors once the script runs dry
    struct ScriptedBackend {
        replies: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().map(String::from).collect()),
            }
        }
    }

    #[async_trait]
    impl LanguageBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _messages: &[Message]) -> crate::llm::Result<String> {
            self.replies
                .lock()
                .expect("script lock")
                .pop()
                .ok_or(LLMError::Timeout)
        }
    }

    fn memory() -> ConversationMemory {
        ConversationMemory::new("test", 10)
    }

    #[tokio::test]
    async fn test_extract_facts_happy_path() {
        let backend = Arc::new(ScriptedBackend::new(vec![r#"{"age": 45, "state": "Bihar"}"#]));
        let planner = Planner::new(backend);

        let facts = planner
            .extract_facts("I am 45, from Bihar", &UserProfile::default())
            .await;
        assert_eq!(facts.age, Some(45));
        assert_eq!(facts.state.as_deref(), Some("Bihar"));
        assert_eq!(facts.confidence, EXTRACT_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_extract_facts_corrective_retry() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            "sure! here are the facts you asked for",
            r#"{"age": 45}"#,
        ]));
        let planner = Planner::new(backend);

        let facts = planner.extract_facts("I am 45", &UserProfile::default()).await;
        assert_eq!(facts.age, Some(45));
        assert_eq!(facts.confidence, RETRY_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_extract_facts_gives_up_after_retry() {
        let backend = Arc::new(ScriptedBackend::new(vec!["not json", "still not json"]));
        let planner = Planner::new(backend);

        let facts = planner.extract_facts("hello", &UserProfile::default()).await;
        assert!(facts.is_empty());
    }

    #[tokio::test]
    async fn test_extract_facts_absorbs_backend_failure() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let planner = Planner::new(backend);

        let facts = planner.extract_facts("hello", &UserProfile::default()).await;
        assert!(facts.is_empty());
    }

    #[tokio::test]
    async fn test_sanitize_drops_implausible_age() {
        let backend = Arc::new(ScriptedBackend::new(vec![r#"{"age": 200}"#]));
        let planner = Planner::new(backend);

        let facts = planner.extract_facts("I am 200", &UserProfile::default()).await;
        assert_eq!(facts.age, None);
    }

    #[tokio::test]
    async fn test_plan_retrieval_only_for_sparse_profile() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            r#"{"intent": "wants housing help", "search_query": "house construction"}"#,
        ]));
        let planner = Planner::new(backend);

        let outcome = planner
            .plan(
                &UserProfile::default(),
                &memory(),
                "I want to build a house",
                &[],
                0,
            )
            .await;

        match outcome {
            PlannerOutcome::Plan(plan) => {
                assert_eq!(plan.actions.len(), 1);
                assert!(plan.is_tool_plan());
                assert_eq!(plan.intent, "wants housing help");
            }
            PlannerOutcome::Unintelligible => panic!("expected a plan"),
        }
    }

    #[tokio::test]
    async fn test_plan_eligibility_first_with_known_profile() {
        use sdk::profile::Field;

        let backend = Arc::new(ScriptedBackend::new(vec![
            r#"{"intent": "find matching schemes", "search_query": "schemes"}"#,
        ]));
        let planner = Planner::new(backend);

        let mut profile = UserProfile::default();
        profile.age = Some(Field::new(45, 0.9, 0));
        profile.state = Some(Field::new("Maharashtra".to_string(), 0.9, 0));

        let outcome = planner
            .plan(&profile, &memory(), "what can I get?", &[], 0)
            .await;

        match outcome {
            PlannerOutcome::Plan(plan) => {
                assert_eq!(plan.actions.len(), 2);
                assert!(plan.is_tool_plan());
            }
            PlannerOutcome::Unintelligible => panic!("expected a plan"),
        }
    }

    #[tokio::test]
    async fn test_plan_unintelligible_signal() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            r#"{"intent": "", "unintelligible": true}"#,
        ]));
        let planner = Planner::new(backend);

        let outcome = planner
            .plan(&UserProfile::default(), &memory(), "asdf ghjk", &[], 0)
            .await;
        assert!(matches!(outcome, PlannerOutcome::Unintelligible));
    }

    #[tokio::test]
    async fn test_plan_missing_hint_shortcuts_to_clarification() {
        // No backend call is made on the loop-back path
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let planner = Planner::new(backend);

        let outcome = planner
            .plan(
                &UserProfile::default(),
                &memory(),
                "anything",
                &[Attribute::IsBpl, Attribute::Gender],
                2,
            )
            .await;

        match outcome {
            PlannerOutcome::Plan(plan) => {
                assert_eq!(plan.clarification_attribute(), Some(Attribute::IsBpl));
            }
            PlannerOutcome::Unintelligible => panic!("expected a plan"),
        }
    }

    #[tokio::test]
    async fn test_plan_falls_back_when_backend_fails() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let planner = Planner::new(backend);

        let outcome = planner
            .plan(&UserProfile::default(), &memory(), "find me schemes", &[], 0)
            .await;

        match outcome {
            PlannerOutcome::Plan(plan) => {
                // Default plan uses the raw input as intent and query
                assert_eq!(plan.intent, "find me schemes");
                assert!(plan.is_tool_plan());
            }
            PlannerOutcome::Unintelligible => panic!("expected a fallback plan"),
        }
    }
}
