//! User profile schema
//!
//! The profile is a mapping of attribute name to value, where absent means
//! "unknown" — never a sentinel like zero or an empty string. Matching logic
//! must be able to distinguish unknown from explicitly-false. Each present
//! attribute carries the confidence it was extracted with and the turn index
//! of its last update.
//!
//! The profile is owned by its session and is only ever mutated through the
//! contradiction detector's merge operation in the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Social category used for eligibility matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    General,
    Obc,
    Sc,
    St,
    Ews,
    Other,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::General => "general",
            Category::Obc => "obc",
            Category::Sc => "sc",
            Category::St => "st",
            Category::Ews => "ews",
            Category::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// Gender options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// The closed set of profile attribute names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Age,
    AnnualIncome,
    Category,
    State,
    Gender,
    IsBpl,
    Occupation,
}

impl Attribute {
    /// All attributes, in canonical order
    pub const ALL: [Attribute; 7] = [
        Attribute::Age,
        Attribute::AnnualIncome,
        Attribute::Category,
        Attribute::State,
        Attribute::Gender,
        Attribute::IsBpl,
        Attribute::Occupation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::Age => "age",
            Attribute::AnnualIncome => "annual_income",
            Attribute::Category => "category",
            Attribute::State => "state",
            Attribute::Gender => "gender",
            Attribute::IsBpl => "is_bpl",
            Attribute::Occupation => "occupation",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A known profile attribute value with its extraction metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field<T> {
    /// The attribute value
    pub value: T,

    /// Confidence assigned at extraction time (0.0-1.0)
    pub confidence: f32,

    /// Turn index of the last update or restatement
    pub last_updated_turn: u32,
}

impl<T> Field<T> {
    pub fn new(value: T, confidence: f32, turn: u32) -> Self {
        Self {
            value,
            confidence,
            last_updated_turn: turn,
        }
    }
}

/// User profile for eligibility matching
///
/// `None` means unknown; the profile is cumulative across turns and is never
/// affected by conversation-memory eviction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<Field<u8>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_income: Option<Field<u64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Field<Category>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Field<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Field<Gender>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_bpl: Option<Field<bool>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<Field<String>>,
}

impl UserProfile {
    /// Whether a value is known for the given attribute
    pub fn is_known(&self, attribute: Attribute) -> bool {
        match attribute {
            Attribute::Age => self.age.is_some(),
            Attribute::AnnualIncome => self.annual_income.is_some(),
            Attribute::Category => self.category.is_some(),
            Attribute::State => self.state.is_some(),
            Attribute::Gender => self.gender.is_some(),
            Attribute::IsBpl => self.is_bpl.is_some(),
            Attribute::Occupation => self.occupation.is_some(),
        }
    }

    /// Number of attributes with a known value
    pub fn known_count(&self) -> usize {
        Attribute::ALL.iter().filter(|a| self.is_known(**a)).count()
    }

    /// Attributes with a known value, in canonical order
    pub fn known_attributes(&self) -> Vec<Attribute> {
        Attribute::ALL
            .iter()
            .copied()
            .filter(|a| self.is_known(*a))
            .collect()
    }

    /// Attributes without a known value, in canonical order
    pub fn missing_attributes(&self) -> Vec<Attribute> {
        Attribute::ALL
            .iter()
            .copied()
            .filter(|a| !self.is_known(*a))
            .collect()
    }

    /// Display text of the value for an attribute, if known
    pub fn value_text(&self, attribute: Attribute) -> Option<String> {
        match attribute {
            Attribute::Age => self.age.as_ref().map(|f| f.value.to_string()),
            Attribute::AnnualIncome => self.annual_income.as_ref().map(|f| f.value.to_string()),
            Attribute::Category => self.category.as_ref().map(|f| f.value.to_string()),
            Attribute::State => self.state.as_ref().map(|f| f.value.clone()),
            Attribute::Gender => self.gender.as_ref().map(|f| f.value.to_string()),
            Attribute::IsBpl => self.is_bpl.as_ref().map(|f| f.value.to_string()),
            Attribute::Occupation => self.occupation.as_ref().map(|f| f.value.clone()),
        }
    }

    /// One-line summary of all known attributes, for prompt context
    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .known_attributes()
            .into_iter()
            .filter_map(|a| self.value_text(a).map(|v| format!("{}: {}", a, v)))
            .collect();
        if parts.is_empty() {
            "nothing known yet".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Facts extracted from a single user utterance
///
/// A partial profile: only the attributes the utterance mentioned are set.
/// Deserialized from the language backend's extraction output; `confidence`
/// is assigned by the caller after validation, not by the backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractedFacts {
    #[serde(default)]
    pub age: Option<u8>,

    #[serde(default)]
    pub annual_income: Option<u64>,

    #[serde(default)]
    pub category: Option<Category>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub gender: Option<Gender>,

    #[serde(default)]
    pub is_bpl: Option<bool>,

    #[serde(default)]
    pub occupation: Option<String>,

    #[serde(skip)]
    pub confidence: f32,
}

impl ExtractedFacts {
    /// True when the utterance mentioned no profile attribute at all
    pub fn is_empty(&self) -> bool {
        self.mentioned_attributes().is_empty()
    }

    /// Attributes this utterance supplied a value for
    pub fn mentioned_attributes(&self) -> Vec<Attribute> {
        let mut out = Vec::new();
        if self.age.is_some() {
            out.push(Attribute::Age);
        }
        if self.annual_income.is_some() {
            out.push(Attribute::AnnualIncome);
        }
        if self.category.is_some() {
            out.push(Attribute::Category);
        }
        if self.state.is_some() {
            out.push(Attribute::State);
        }
        if self.gender.is_some() {
            out.push(Attribute::Gender);
        }
        if self.is_bpl.is_some() {
            out.push(Attribute::IsBpl);
        }
        if self.occupation.is_some() {
            out.push(Attribute::Occupation);
        }
        out
    }

    /// Display text of the extracted value for an attribute, if present
    pub fn value_text(&self, attribute: Attribute) -> Option<String> {
        match attribute {
            Attribute::Age => self.age.map(|v| v.to_string()),
            Attribute::AnnualIncome => self.annual_income.map(|v| v.to_string()),
            Attribute::Category => self.category.map(|v| v.to_string()),
            Attribute::State => self.state.clone(),
            Attribute::Gender => self.gender.map(|v| v.to_string()),
            Attribute::IsBpl => self.is_bpl.map(|v| v.to_string()),
            Attribute::Occupation => self.occupation.clone(),
        }
    }
}

/// Severity of a detected contradiction
///
/// High-severity attributes are central to eligibility and unlikely to be
/// volatile within a session; they block progress until clarified. Low
/// severity attributes can legitimately evolve or be restated loosely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Low,
}

impl Severity {
    /// Classify the severity of a conflicting statement about an attribute
    pub fn for_attribute(attribute: Attribute) -> Severity {
        match attribute {
            Attribute::Category | Attribute::Gender | Attribute::State | Attribute::IsBpl => {
                Severity::High
            }
            Attribute::Age | Attribute::AnnualIncome | Attribute::Occupation => Severity::Low,
        }
    }
}

/// A conflict between an existing profile value and a newly stated one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contradiction {
    pub attribute: Attribute,
    pub previous_value: String,
    pub new_value: String,
    pub severity: Severity,
    pub turn_index: u32,
}
