//! Scheme catalog and eligibility result schemas
//!
//! A scheme definition is immutable once loaded. Criteria are a closed tagged
//! variant; matching logic dispatches over them exhaustively.

use crate::profile::{Attribute, Category, Gender};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single eligibility condition attached to a scheme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Criterion {
    /// Age must lie within [min, max] inclusive
    AgeRange { min: u8, max: u8 },

    /// Annual income must not exceed the value
    IncomeMax { value: u64 },

    /// Category must be one of the set
    CategoryIn { set: Vec<Category> },

    /// State must be one of the set (compared case-insensitively)
    StateIn { set: Vec<String> },

    /// Gender must be one of the set
    GenderIn { set: Vec<Gender> },

    /// BPL status must equal the value
    BplRequired { value: bool },
}

impl Criterion {
    /// Stable label used in satisfied/failed sets
    pub fn label(&self) -> &'static str {
        match self {
            Criterion::AgeRange { .. } => "age_range",
            Criterion::IncomeMax { .. } => "income_max",
            Criterion::CategoryIn { .. } => "category_in",
            Criterion::StateIn { .. } => "state_in",
            Criterion::GenderIn { .. } => "gender_in",
            Criterion::BplRequired { .. } => "bpl_required",
        }
    }

    /// The profile attribute this criterion reads
    pub fn attribute(&self) -> Attribute {
        match self {
            Criterion::AgeRange { .. } => Attribute::Age,
            Criterion::IncomeMax { .. } => Attribute::AnnualIncome,
            Criterion::CategoryIn { .. } => Attribute::Category,
            Criterion::StateIn { .. } => Attribute::State,
            Criterion::GenderIn { .. } => Attribute::Gender,
            Criterion::BplRequired { .. } => Attribute::IsBpl,
        }
    }
}

/// A government scheme with its eligibility criteria
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeDefinition {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Search keywords, used by the catalog-backed keyword retriever
    #[serde(default)]
    pub keywords: Vec<String>,

    pub criteria: Vec<Criterion>,
}

/// Result of evaluating one scheme against a profile
///
/// Produced fresh per evaluation call; never persisted. The three criterion
/// sets partition the scheme's criteria: a criterion whose profile attribute
/// is unknown is missing, never satisfied or failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub scheme_id: String,

    /// satisfied / (satisfied + failed); `None` when every criterion is
    /// missing (undefined score, sorted last)
    pub match_score: Option<f64>,

    pub satisfied_criteria: BTreeSet<String>,

    /// Profile attributes that would be needed to decide the missing criteria
    pub missing_criteria: BTreeSet<Attribute>,

    pub failed_criteria: BTreeSet<String>,
}

impl EligibilityResult {
    /// Whether this result clears the given completeness threshold
    pub fn clears(&self, threshold: f64) -> bool {
        self.match_score.map(|s| s >= threshold).unwrap_or(false)
    }
}

/// A ranked hit from the scheme retrieval service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub scheme_id: String,
    pub relevance_score: f64,
}
