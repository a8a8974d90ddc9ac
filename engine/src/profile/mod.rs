//! Profile merge and contradiction detection
//!
//! The user profile is mutated only through [`ContradictionDetector::merge`]:
//! a pure function from (existing profile, newly extracted facts) to an
//! updated profile plus the list of conflicts found. The caller owns the
//! profile value; nothing here is shared or global.
//!
//! Severity policy: attributes central to eligibility and unlikely to change
//! within a session (category, gender, state, BPL status) are high severity —
//! the existing value is kept and the orchestrator must clarify before
//! proceeding. Age and income estimates are low severity — the new value wins
//! immediately, with the conflict still recorded for the transcript.

use sdk::errors::EngineError;
use sdk::profile::{Attribute, Contradiction, ExtractedFacts, Field, Severity, UserProfile};
use tracing::warn;

/// Detects and resolves conflicting statements while merging extracted facts
/// into the profile.
#[derive(Debug, Clone)]
pub struct ContradictionDetector {
    /// Relative income difference treated as a restatement, not a conflict
    income_tolerance: f64,
}

impl Default for ContradictionDetector {
    fn default() -> Self {
        Self {
            income_tolerance: 0.05,
        }
    }
}

impl ContradictionDetector {
    pub fn new(income_tolerance: f64) -> Self {
        Self { income_tolerance }
    }

    /// Merge newly extracted facts into the profile.
    ///
    /// Returns the updated profile and any contradictions found. The profile
    /// invariant (one value per attribute, absent stays absent unless stated)
    /// is checked before returning; a violation is a detector bug and fails
    /// the merge call.
    pub fn merge(
        &self,
        profile: &UserProfile,
        facts: &ExtractedFacts,
        turn_index: u32,
    ) -> Result<(UserProfile, Vec<Contradiction>), EngineError> {
        let mut updated = profile.clone();
        let mut contradictions = Vec::new();
        let confidence = facts.confidence;

        if let Some(new) = facts.age {
            match updated.age.take() {
                None => updated.age = Some(Field::new(new, confidence, turn_index)),
                Some(mut field) => {
                    // Same age, or one year older: natural restatement
                    if new == field.value || new == field.value.saturating_add(1) {
                        field.last_updated_turn = turn_index;
                        updated.age = Some(field);
                    } else {
                        contradictions.push(Contradiction {
                            attribute: Attribute::Age,
                            previous_value: field.value.to_string(),
                            new_value: new.to_string(),
                            severity: Severity::for_attribute(Attribute::Age),
                            turn_index,
                        });
                        updated.age = Some(Field::new(new, confidence, turn_index));
                    }
                }
            }
        }

        if let Some(new) = facts.annual_income {
            match updated.annual_income.take() {
                None => updated.annual_income = Some(Field::new(new, confidence, turn_index)),
                Some(mut field) => {
                    if self.incomes_equal(field.value, new) {
                        field.last_updated_turn = turn_index;
                        updated.annual_income = Some(field);
                    } else {
                        contradictions.push(Contradiction {
                            attribute: Attribute::AnnualIncome,
                            previous_value: field.value.to_string(),
                            new_value: new.to_string(),
                            severity: Severity::for_attribute(Attribute::AnnualIncome),
                            turn_index,
                        });
                        updated.annual_income = Some(Field::new(new, confidence, turn_index));
                    }
                }
            }
        }

        if let Some(new) = facts.category {
            match updated.category.take() {
                None => updated.category = Some(Field::new(new, confidence, turn_index)),
                Some(mut field) => {
                    if new == field.value {
                        field.last_updated_turn = turn_index;
                        updated.category = Some(field);
                    } else {
                        contradictions.push(Contradiction {
                            attribute: Attribute::Category,
                            previous_value: field.value.to_string(),
                            new_value: new.to_string(),
                            severity: Severity::for_attribute(Attribute::Category),
                            turn_index,
                        });
                        // High severity: existing value stands until clarified
                        updated.category = Some(field);
                    }
                }
            }
        }

        if let Some(new) = &facts.state {
            match updated.state.take() {
                None => updated.state = Some(Field::new(new.clone(), confidence, turn_index)),
                Some(mut field) => {
                    if new.eq_ignore_ascii_case(&field.value) {
                        field.last_updated_turn = turn_index;
                        updated.state = Some(field);
                    } else {
                        contradictions.push(Contradiction {
                            attribute: Attribute::State,
                            previous_value: field.value.clone(),
                            new_value: new.clone(),
                            severity: Severity::for_attribute(Attribute::State),
                            turn_index,
                        });
                        updated.state = Some(field);
                    }
                }
            }
        }

        if let Some(new) = facts.gender {
            match updated.gender.take() {
                None => updated.gender = Some(Field::new(new, confidence, turn_index)),
                Some(mut field) => {
                    if new == field.value {
                        field.last_updated_turn = turn_index;
                        updated.gender = Some(field);
                    } else {
                        contradictions.push(Contradiction {
                            attribute: Attribute::Gender,
                            previous_value: field.value.to_string(),
                            new_value: new.to_string(),
                            severity: Severity::for_attribute(Attribute::Gender),
                            turn_index,
                        });
                        updated.gender = Some(field);
                    }
                }
            }
        }

        if let Some(new) = facts.is_bpl {
            match updated.is_bpl.take() {
                None => updated.is_bpl = Some(Field::new(new, confidence, turn_index)),
                Some(mut field) => {
                    if new == field.value {
                        field.last_updated_turn = turn_index;
                        updated.is_bpl = Some(field);
                    } else {
                        contradictions.push(Contradiction {
                            attribute: Attribute::IsBpl,
                            previous_value: field.value.to_string(),
                            new_value: new.to_string(),
                            severity: Severity::for_attribute(Attribute::IsBpl),
                            turn_index,
                        });
                        updated.is_bpl = Some(field);
                    }
                }
            }
        }

        if let Some(new) = &facts.occupation {
            match updated.occupation.take() {
                None => updated.occupation = Some(Field::new(new.clone(), confidence, turn_index)),
                Some(mut field) => {
                    if new.eq_ignore_ascii_case(&field.value) {
                        field.last_updated_turn = turn_index;
                        updated.occupation = Some(field);
                    } else {
                        contradictions.push(Contradiction {
                            attribute: Attribute::Occupation,
                            previous_value: field.value.clone(),
                            new_value: new.clone(),
                            severity: Severity::for_attribute(Attribute::Occupation),
                            turn_index,
                        });
                        updated.occupation = Some(Field::new(new.clone(), confidence, turn_index));
                    }
                }
            }
        }

        self.check_invariant(profile, facts, &updated)?;

        for c in &contradictions {
            warn!(
                attribute = %c.attribute,
                previous = %c.previous_value,
                new = %c.new_value,
                severity = ?c.severity,
                "Contradiction detected"
            );
        }

        Ok((updated, contradictions))
    }

    /// Force-overwrite one attribute with the value the user confirmed while
    /// resolving a pending high-severity contradiction.
    ///
    /// Returns `None` if the facts do not restate the attribute.
    pub fn resolve(
        &self,
        profile: &UserProfile,
        attribute: Attribute,
        facts: &ExtractedFacts,
        turn_index: u32,
    ) -> Option<UserProfile> {
        let confidence = facts.confidence;
        let mut updated = profile.clone();
        match attribute {
            Attribute::Age => {
                updated.age = Some(Field::new(facts.age?, confidence, turn_index));
            }
            Attribute::AnnualIncome => {
                updated.annual_income =
                    Some(Field::new(facts.annual_income?, confidence, turn_index));
            }
            Attribute::Category => {
                updated.category = Some(Field::new(facts.category?, confidence, turn_index));
            }
            Attribute::State => {
                updated.state = Some(Field::new(facts.state.clone()?, confidence, turn_index));
            }
            Attribute::Gender => {
                updated.gender = Some(Field::new(facts.gender?, confidence, turn_index));
            }
            Attribute::IsBpl => {
                updated.is_bpl = Some(Field::new(facts.is_bpl?, confidence, turn_index));
            }
            Attribute::Occupation => {
                updated.occupation =
                    Some(Field::new(facts.occupation.clone()?, confidence, turn_index));
            }
        }
        Some(updated)
    }

    /// Incomes within the configured relative tolerance are a restatement
    fn incomes_equal(&self, previous: u64, new: u64) -> bool {
        if previous == new {
            return true;
        }
        if previous == 0 {
            return false;
        }
        let diff = previous.abs_diff(new) as f64;
        diff / previous as f64 <= self.income_tolerance
    }

    /// Post-condition: every merged attribute holds exactly one value, and it
    /// is either the previous value or the newly stated one.
    fn check_invariant(
        &self,
        previous: &UserProfile,
        facts: &ExtractedFacts,
        updated: &UserProfile,
    ) -> Result<(), EngineError> {
        for attribute in facts.mentioned_attributes() {
            let merged = updated.value_text(attribute);
            let before = previous.value_text(attribute);
            let stated = facts.value_text(attribute);

            let valid = match &merged {
                None => false,
                Some(v) => before.as_deref() == Some(v) || stated.as_deref() == Some(v),
            };
            if !valid {
                return Err(EngineError::ProfileInvariant {
                    attribute: attribute.as_str().to_string(),
                });
            }
        }
        Ok(())
    }
}
