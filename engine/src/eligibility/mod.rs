//! Rule-based eligibility engine
//!
//! Pure, deterministic matching of a user profile against the scheme catalog.
//! No I/O. Every criterion is classified into exactly one of satisfied,
//! failed, or missing: a criterion whose profile attribute is unknown is
//! missing and counts toward neither the numerator nor the denominator of the
//! match score.

use crate::catalog::SchemeCatalog;
use sdk::profile::{Attribute, UserProfile};
use sdk::scheme::{Criterion, EligibilityResult, SchemeDefinition};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Outcome of checking one criterion against the profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CriterionOutcome {
    Satisfied,
    Failed,
    /// The relevant profile attribute is unknown
    Missing,
}

/// Check a single criterion against the profile.
///
/// An absent attribute is never satisfied and never failed.
fn check_criterion(profile: &UserProfile, criterion: &Criterion) -> CriterionOutcome {
    match criterion {
        Criterion::AgeRange { min, max } => match &profile.age {
            None => CriterionOutcome::Missing,
            Some(f) if (*min..=*max).contains(&f.value) => CriterionOutcome::Satisfied,
            Some(_) => CriterionOutcome::Failed,
        },
        Criterion::IncomeMax { value } => match &profile.annual_income {
            None => CriterionOutcome::Missing,
            Some(f) if f.value <= *value => CriterionOutcome::Satisfied,
            Some(_) => CriterionOutcome::Failed,
        },
        Criterion::CategoryIn { set } => match &profile.category {
            None => CriterionOutcome::Missing,
            Some(f) if set.contains(&f.value) => CriterionOutcome::Satisfied,
            Some(_) => CriterionOutcome::Failed,
        },
        Criterion::StateIn { set } => match &profile.state {
            None => CriterionOutcome::Missing,
            Some(f) if set.iter().any(|s| s.eq_ignore_ascii_case(&f.value)) => {
                CriterionOutcome::Satisfied
            }
            Some(_) => CriterionOutcome::Failed,
        },
        Criterion::GenderIn { set } => match &profile.gender {
            None => CriterionOutcome::Missing,
            Some(f) if set.contains(&f.value) => CriterionOutcome::Satisfied,
            Some(_) => CriterionOutcome::Failed,
        },
        Criterion::BplRequired { value } => match &profile.is_bpl {
            None => CriterionOutcome::Missing,
            Some(f) if f.value == *value => CriterionOutcome::Satisfied,
            Some(_) => CriterionOutcome::Failed,
        },
    }
}

/// Evaluate one scheme against the profile
fn evaluate_scheme(profile: &UserProfile, scheme: &SchemeDefinition) -> EligibilityResult {
    let mut satisfied = BTreeSet::new();
    let mut failed = BTreeSet::new();
    let mut missing = BTreeSet::new();

    for criterion in &scheme.criteria {
        match check_criterion(profile, criterion) {
            CriterionOutcome::Satisfied => {
                satisfied.insert(criterion.label().to_string());
            }
            CriterionOutcome::Failed => {
                failed.insert(criterion.label().to_string());
            }
            CriterionOutcome::Missing => {
                missing.insert(criterion.attribute());
            }
        }
    }

    let decided = satisfied.len() + failed.len();
    let match_score = if decided == 0 {
        None
    } else {
        Some(satisfied.len() as f64 / decided as f64)
    };

    EligibilityResult {
        scheme_id: scheme.id.clone(),
        match_score,
        satisfied_criteria: satisfied,
        missing_criteria: missing,
        failed_criteria: failed,
    }
}

/// Ordering: descending score, undefined scores last, ties by ascending id
fn compare_results(a: &EligibilityResult, b: &EligibilityResult) -> Ordering {
    match (a.match_score, b.match_score) {
        (Some(sa), Some(sb)) => sb
            .partial_cmp(&sa)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.scheme_id.cmp(&b.scheme_id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.scheme_id.cmp(&b.scheme_id),
    }
}

/// Evaluate the full catalog against the profile.
///
/// Returns the complete ranked list; truncation to a top-k is a presentation
/// concern of the caller.
pub fn evaluate(profile: &UserProfile, catalog: &SchemeCatalog) -> Vec<EligibilityResult> {
    let mut results: Vec<EligibilityResult> = catalog
        .schemes()
        .iter()
        .map(|scheme| evaluate_scheme(profile, scheme))
        .collect();

    results.sort_by(compare_results);
    results
}

/// Aggregate missing attributes across the top-N ranked results, most
/// frequent first; ties break by canonical attribute order.
///
/// These become the candidates the planner asks about next.
pub fn missing_attributes(results: &[EligibilityResult], top_n: usize) -> Vec<Attribute> {
    let mut counts: Vec<(Attribute, usize)> = Vec::new();

    for result in results.iter().take(top_n) {
        for attribute in &result.missing_criteria {
            match counts.iter_mut().find(|(a, _)| a == attribute) {
                Some((_, n)) => *n += 1,
                None => counts.push((*attribute, 1)),
            }
        }
    }

    counts.sort_by(|(aa, an), (ba, bn)| bn.cmp(an).then_with(|| aa.cmp(ba)));
    counts.into_iter().map(|(a, _)| a).collect()
}
