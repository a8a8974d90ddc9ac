//! Integration tests for the agent orchestration loop
//!
//! Drives the full planner/executor/evaluator cycle through the orchestrator
//! with a scripted language backend and stub retrievers, covering the
//! contract scenarios: a perfect eligibility match, low- and high-severity
//! contradictions, and the loop-back that asks for the most impactful
//! missing attribute when tools come up empty.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use sdk::profile::{Category, Field, Severity, UserProfile};
use sdk::scheme::{Criterion, RetrievalHit, SchemeDefinition};
use yojana_engine::agent::{AgentState, Orchestrator};
use yojana_engine::catalog::SchemeCatalog;
use yojana_engine::config::Config;
use yojana_engine::llm::{LLMError, LanguageBackend, Message};
use yojana_engine::retrieval::{KeywordRetriever, RetrievalError, SchemeRetriever};

/// Scripted backend: `Some(text)` replies in order, `None` simulates a
/// failure; an exhausted script also fails (exercising the fallbacks).
struct ScriptedBackend {
    replies: Mutex<VecDeque<Option<String>>>,
}

impl ScriptedBackend {
    fn new(replies: Vec<Option<&str>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|r| r.map(String::from)).collect()),
        })
    }
}

#[async_trait]
impl LanguageBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _messages: &[Message]) -> yojana_engine::llm::Result<String> {
        match self.replies.lock().expect("script lock").pop_front() {
            Some(Some(text)) => Ok(text),
            _ => Err(LLMError::Timeout),
        }
    }
}

/// Retriever that always times out
struct TimingOutRetriever;

#[async_trait]
impl SchemeRetriever for TimingOutRetriever {
    fn name(&self) -> &str {
        "timing-out"
    }

    async fn search(
        &self,
        _query: &str,
        _top_k: usize,
    ) -> yojana_engine::retrieval::Result<Vec<RetrievalHit>> {
        Err(RetrievalError::Timeout)
    }
}

fn scheme(id: &str, criteria: Vec<Criterion>) -> SchemeDefinition {
    SchemeDefinition {
        id: id.to_string(),
        name: format!("Scheme {}", id),
        description: String::new(),
        keywords: vec![],
        criteria,
    }
}

#[tokio::test]
async fn test_scenario_full_match_scores_one() {
    // Profile {age:45, income:200000, category:obc, state:Maharashtra}
    // against a scheme requiring age 18-60, income <= 250000, category in
    // {obc,sc,st} matches perfectly.
    let catalog = Arc::new(SchemeCatalog::from_schemes(vec![scheme(
        "target",
        vec![
            Criterion::AgeRange { min: 18, max: 60 },
            Criterion::IncomeMax { value: 250_000 },
            Criterion::CategoryIn {
                set: vec![Category::Obc, Category::Sc, Category::St],
            },
        ],
    )]));

    let backend = ScriptedBackend::new(vec![
        Some("{}"),
        Some(r#"{"intent": "find eligible schemes", "search_query": "welfare schemes"}"#),
        None, // response generation falls back to the template
    ]);
    let retriever = Arc::new(KeywordRetriever::new(Arc::clone(&catalog)));
    let orchestrator = Orchestrator::new(&Config::default(), backend, retriever, catalog);

    let profile = UserProfile {
        age: Some(Field::new(45, 0.9, 0)),
        annual_income: Some(Field::new(200_000, 0.9, 0)),
        category: Some(Field::new(Category::Obc, 0.9, 0)),
        state: Some(Field::new("Maharashtra".to_string(), 0.9, 0)),
        ..Default::default()
    };
    let mut session = orchestrator.new_session(None, profile);

    let reply = orchestrator
        .process_turn(&mut session, "which schemes am I eligible for?")
        .await;

    assert_eq!(reply.matched_schemes[0].scheme_id, "target");
    assert_eq!(reply.matched_schemes[0].match_score, Some(1.0));
    assert!(reply.matched_schemes[0].missing_criteria.is_empty());
    assert!(!reply.needs_more_info);
    assert!(reply.text.contains("Scheme target"));
    assert_eq!(session.state, AgentState::Listening);
}

#[tokio::test]
async fn test_scenario_low_severity_contradiction_proceeds() {
    // age 30 then age 32: profile becomes 32, one contradiction recorded,
    // the evaluator proceeds without blocking.
    let catalog = Arc::new(SchemeCatalog::load(None).unwrap());
    let backend = ScriptedBackend::new(vec![
        Some(r#"{"age": 30, "category": "general"}"#),
        Some(r#"{"intent": "schemes", "search_query": "farmer income support"}"#),
        None,
        Some(r#"{"age": 32}"#),
        Some(r#"{"intent": "schemes", "search_query": "farmer income support"}"#),
        None,
    ]);
    let retriever = Arc::new(KeywordRetriever::new(Arc::clone(&catalog)));
    let orchestrator = Orchestrator::new(&Config::default(), backend, retriever, catalog);
    let mut session = orchestrator.new_session(None, UserProfile::default());

    orchestrator.process_turn(&mut session, "I am 30, general category").await;
    let reply = orchestrator.process_turn(&mut session, "I am 32").await;

    assert_eq!(session.profile.age.as_ref().unwrap().value, 32);
    assert_eq!(reply.contradictions.len(), 1);
    assert_eq!(reply.contradictions[0].severity, Severity::Low);
    assert!(!reply.tools_used.is_empty(), "low severity must not block tools");
}

#[tokio::test]
async fn test_scenario_high_severity_contradiction_blocks_tools() {
    // category general then sc: value stays general, the turn produces a
    // clarification question and runs no tools.
    let catalog = Arc::new(SchemeCatalog::load(None).unwrap());
    let backend = ScriptedBackend::new(vec![
        Some(r#"{"category": "general", "age": 45}"#),
        Some(r#"{"intent": "schemes", "search_query": "schemes"}"#),
        None,
        Some(r#"{"category": "sc"}"#),
    ]);
    let retriever = Arc::new(KeywordRetriever::new(Arc::clone(&catalog)));
    let orchestrator = Orchestrator::new(&Config::default(), backend, retriever, catalog);
    let mut session = orchestrator.new_session(None, UserProfile::default());

    orchestrator
        .process_turn(&mut session, "general category, 45 years old")
        .await;
    let reply = orchestrator.process_turn(&mut session, "my category is SC").await;

    assert_eq!(
        session.profile.category.as_ref().unwrap().value,
        Category::General
    );
    assert_eq!(reply.contradictions.len(), 1);
    assert_eq!(reply.contradictions[0].severity, Severity::High);
    assert!(reply.tools_used.is_empty());
    assert!(reply.needs_more_info);
    assert!(reply.text.contains("general") && reply.text.contains("sc"));
    assert_eq!(session.state, AgentState::Listening);
}

#[tokio::test]
async fn test_scenario_loopback_asks_most_impactful_missing_attribute() {
    // Retrieval times out and no eligibility result clears the threshold:
    // the evaluator loops back and the refined plan asks for the attribute
    // missing from the most top-ranked schemes.
    let catalog = Arc::new(SchemeCatalog::from_schemes(vec![
        scheme(
            "a",
            vec![
                Criterion::AgeRange { min: 50, max: 60 },
                Criterion::BplRequired { value: true },
            ],
        ),
        scheme(
            "b",
            vec![
                Criterion::StateIn {
                    set: vec!["Maharashtra".to_string()],
                },
                Criterion::BplRequired { value: true },
                Criterion::GenderIn {
                    set: vec![sdk::profile::Gender::Female],
                },
            ],
        ),
    ]));

    let backend = ScriptedBackend::new(vec![
        Some("{}"),
        Some(r#"{"intent": "find schemes", "search_query": "schemes"}"#),
        // The loop-back clarification is templated; no further calls
    ]);
    let orchestrator = Orchestrator::new(
        &Config::default(),
        backend,
        Arc::new(TimingOutRetriever),
        catalog,
    );

    // Known age and state decide against both schemes; is_bpl is missing
    // from both, gender from one.
    let profile = UserProfile {
        age: Some(Field::new(45, 0.9, 0)),
        state: Some(Field::new("Kerala".to_string(), 0.9, 0)),
        ..Default::default()
    };
    let mut session = orchestrator.new_session(None, profile);

    let reply = orchestrator
        .process_turn(&mut session, "what am I eligible for?")
        .await;

    assert!(reply.needs_more_info);
    // is_bpl is missing from two schemes, gender from one: the question
    // targets BPL status
    assert!(reply.text.contains("BPL"));
    assert!(reply
        .tools_used
        .contains(&"run_eligibility_engine".to_string()));
    assert_eq!(session.state, AgentState::Listening);
}

#[tokio::test]
async fn test_profile_survives_memory_eviction() {
    // More turns than the memory bound: the turn log is capped while the
    // profile keeps accumulating.
    let catalog = Arc::new(SchemeCatalog::load(None).unwrap());

    // Each turn consumes extraction + intent; the sparse profile keeps the
    // evaluator looping back to a templated clarification, so no response
    // generation calls are made.
    let mut script: Vec<Option<&str>> = Vec::new();
    script.push(Some(r#"{"age": 45}"#));
    script.push(Some(r#"{"intent": "schemes", "search_query": "schemes"}"#));
    for _ in 0..11 {
        script.push(Some("{}"));
        script.push(Some(r#"{"intent": "schemes", "search_query": "schemes"}"#));
    }

    let backend = ScriptedBackend::new(script);
    let retriever = Arc::new(KeywordRetriever::new(Arc::clone(&catalog)));
    let orchestrator = Orchestrator::new(&Config::default(), backend, retriever, catalog);
    let mut session = orchestrator.new_session(None, UserProfile::default());

    orchestrator.process_turn(&mut session, "I am 45").await;
    for i in 0..11 {
        orchestrator
            .process_turn(&mut session, &format!("tell me more {}", i))
            .await;
    }

    // 12 user + 12 agent turns were pushed; only 10 remain
    assert_eq!(session.memory.len(), 10);
    // The fact stated in the long-evicted first turn is still in the profile
    assert_eq!(session.profile.age.as_ref().unwrap().value, 45);
}

#[tokio::test]
async fn test_all_backend_failures_still_produce_a_reply() {
    // Every backend call fails; the orchestrator degrades to the default
    // plan and the fallback template rather than erroring.
    let catalog = Arc::new(SchemeCatalog::load(None).unwrap());
    let backend = ScriptedBackend::new(vec![]);
    let retriever = Arc::new(KeywordRetriever::new(Arc::clone(&catalog)));
    let orchestrator = Orchestrator::new(&Config::default(), backend, retriever, catalog);
    let mut session = orchestrator.new_session(None, UserProfile::default());

    let reply = orchestrator
        .process_turn(&mut session, "I want to build a house")
        .await;

    assert!(!reply.text.is_empty());
    assert_eq!(session.state, AgentState::Listening);
}
