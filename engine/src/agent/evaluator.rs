//! Agent Evaluator
//!
//! Inspects one round of execution results together with the contradiction
//! detector's output and decides: respond now, or loop back for more
//! information. Deterministic — no backend calls.
//!
//! Completeness requires at least one eligibility result above the configured
//! score threshold OR at least one retrieval hit, AND no unresolved
//! high-severity contradiction.

use crate::agent::types::{Evaluation, ExecutionReport};
use crate::eligibility;
use sdk::profile::{Contradiction, Severity};
use tracing::debug;

pub struct Evaluator {
    /// Minimum match score accepted as a confident eligibility answer
    score_threshold: f64,

    /// Top-ranked schemes considered when aggregating missing attributes
    top_n: usize,
}

impl Evaluator {
    pub fn new(score_threshold: f64, top_n: usize) -> Self {
        Self {
            score_threshold,
            top_n,
        }
    }

    pub fn evaluate(
        &self,
        report: &ExecutionReport,
        contradictions: &[Contradiction],
    ) -> Evaluation {
        if contradictions
            .iter()
            .any(|c| c.severity == Severity::High)
        {
            return Evaluation::NeedMoreInfo {
                missing: vec![],
                reason: "unresolved high-severity contradiction".to_string(),
            };
        }

        let eligibility_ok = report
            .eligibility
            .as_deref()
            .map(|results| results.iter().any(|r| r.clears(self.score_threshold)))
            .unwrap_or(false);

        let retrieval_ok = report
            .retrieval
            .as_deref()
            .map(|hits| !hits.is_empty())
            .unwrap_or(false);

        if eligibility_ok || retrieval_ok {
            let reason = if eligibility_ok {
                "eligibility match above threshold".to_string()
            } else {
                "relevant retrieval results".to_string()
            };
            debug!(%reason, "Evaluation complete");
            return Evaluation::Complete { reason };
        }

        // The attributes missing from the most top-ranked schemes drive the
        // next plan
        let missing = report
            .eligibility
            .as_deref()
            .map(|results| eligibility::missing_attributes(results, self.top_n))
            .unwrap_or_default();

        debug!(missing = missing.len(), "Evaluation needs more info");
        Evaluation::NeedMoreInfo {
            missing,
            reason: "no confident eligibility match and no retrieval results".to_string(),
        }
    }
}
