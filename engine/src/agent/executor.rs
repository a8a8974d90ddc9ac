//! Agent Executor
//!
//! Runs the tool actions of a plan. Independent actions (eligibility
//! evaluation and retrieval) run concurrently; the executor joins on all of
//! them before returning, and aggregates results by action identity so
//! completion order is irrelevant. Tool failures are caught per action and
//! recorded — a single failing tool never aborts the turn.

use crate::agent::types::{Action, ExecutionReport, Plan, ToolFailure};
use crate::catalog::SchemeCatalog;
use crate::eligibility;
use crate::retrieval::SchemeRetriever;
use sdk::profile::UserProfile;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct Executor {
    catalog: Arc<SchemeCatalog>,
    retriever: Arc<dyn SchemeRetriever>,

    /// Bound on any single external action; on expiry the action is a
    /// recorded failure, not a fatal error
    action_timeout: Duration,

    /// Hits requested from the retriever
    top_k: usize,
}

impl Executor {
    pub fn new(
        catalog: Arc<SchemeCatalog>,
        retriever: Arc<dyn SchemeRetriever>,
        action_timeout: Duration,
        top_k: usize,
    ) -> Self {
        Self {
            catalog,
            retriever,
            action_timeout,
            top_k,
        }
    }

    /// Execute every tool action in the plan, concurrently where independent,
    /// and return once all of them have settled (barrier join).
    ///
    /// Interactive actions (clarification, final response) are the
    /// orchestrator's concern and are skipped here.
    pub async fn execute(&self, plan: &Plan, profile: &UserProfile) -> ExecutionReport {
        let mut wants_eligibility = false;
        let mut retrieval_query: Option<String> = None;

        for action in &plan.actions {
            match action {
                Action::RunEligibility => wants_eligibility = true,
                Action::RunRetrieval { query } => retrieval_query = Some(query.clone()),
                Action::AskClarification { .. } | Action::RespondFinal => {
                    debug!(action = action.label(), "Interactive action left to orchestrator");
                }
            }
        }

        let eligibility_task = async {
            if wants_eligibility {
                // Pure and in-process; cannot fail or block
                Some(eligibility::evaluate(profile, &self.catalog))
            } else {
                None
            }
        };

        let retrieval_task = async {
            let query = retrieval_query?;
            let outcome =
                match tokio::time::timeout(self.action_timeout, self.retriever.search(&query, self.top_k))
                    .await
                {
                    Err(_elapsed) => Err(ToolFailure {
                        action: "run_scheme_retrieval",
                        reason: "timeout".to_string(),
                    }),
                    Ok(Err(e)) => Err(ToolFailure {
                        action: "run_scheme_retrieval",
                        reason: e.to_string(),
                    }),
                    Ok(Ok(hits)) => Ok(hits),
                };
            Some(outcome)
        };

        let (eligibility_results, retrieval_outcome) =
            tokio::join!(eligibility_task, retrieval_task);

        let mut report = ExecutionReport {
            eligibility: eligibility_results,
            ..Default::default()
        };

        match retrieval_outcome {
            None => {}
            Some(Ok(hits)) => {
                debug!(hits = hits.len(), "Retrieval completed");
                report.retrieval = Some(hits);
            }
            Some(Err(failure)) => {
                warn!(action = failure.action, reason = %failure.reason, "Tool failure recorded");
                report.failures.push(failure);
            }
        }

        debug!(
            plan_id = %plan.id,
            tools = ?report.tools_used(),
            failures = report.failures.len(),
            "Plan execution settled"
        );
        report
    }
}
