//! Conversation log schema
//!
//! Turns are an ordered record of the dialogue. The engine's conversation
//! memory retains a bounded window of recent turns; eviction never touches
//! the user profile, which is cumulative and stored separately.

use crate::profile::ExtractedFacts;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Agent,
}

/// A single turn in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub turn_index: u32,
    pub speaker: Speaker,
    pub raw_text: String,

    /// Facts extracted from a user turn; `None` for agent turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_facts: Option<ExtractedFacts>,

    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(turn_index: u32, raw_text: impl Into<String>, facts: ExtractedFacts) -> Self {
        Self {
            turn_index,
            speaker: Speaker::User,
            raw_text: raw_text.into(),
            extracted_facts: Some(facts),
            timestamp: Utc::now(),
        }
    }

    pub fn agent(turn_index: u32, raw_text: impl Into<String>) -> Self {
        Self {
            turn_index,
            speaker: Speaker::Agent,
            raw_text: raw_text.into(),
            extracted_facts: None,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_constructors() {
        let user = ConversationTurn::user(0, "I am 45 years old", ExtractedFacts::default());
        assert_eq!(user.speaker, Speaker::User);
        assert!(user.extracted_facts.is_some());

        let agent = ConversationTurn::agent(1, "What is your annual income?");
        assert_eq!(agent.speaker, Speaker::Agent);
        assert!(agent.extracted_facts.is_none());
    }

    #[test]
    fn test_turn_serde_round_trip() {
        let turn = ConversationTurn::agent(3, "hello");
        let json = serde_json::to_string(&turn).unwrap();
        let back: ConversationTurn = serde_json::from_str(&json).unwrap();
        assert_eq!(turn, back);
    }
}
