//! Bounded conversation memory
//!
//! Ordered log of the most recent turns for one session. Older turns are
//! evicted FIFO once the retention bound is reached. Eviction never touches
//! the user profile, which is cumulative and owned by the session context.

use sdk::conversation::{ConversationTurn, Speaker};
use sdk::profile::ExtractedFacts;
use std::collections::VecDeque;

/// Default number of turns retained
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Short-term conversation memory for one session
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    session_id: String,
    turns: VecDeque<ConversationTurn>,
    max_turns: usize,
}

impl ConversationMemory {
    pub fn new(session_id: impl Into<String>, max_turns: usize) -> Self {
        Self {
            session_id: session_id.into(),
            turns: VecDeque::with_capacity(max_turns),
            max_turns,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Append a user turn with its extracted facts
    pub fn push_user(&mut self, turn_index: u32, raw_text: &str, facts: ExtractedFacts) {
        self.push(ConversationTurn::user(turn_index, raw_text, facts));
    }

    /// Append an agent turn
    pub fn push_agent(&mut self, turn_index: u32, raw_text: &str) {
        self.push(ConversationTurn::agent(turn_index, raw_text));
    }

    fn push(&mut self, turn: ConversationTurn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }

    /// All retained turns, oldest first
    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    /// The most recent `n` turns, oldest first
    pub fn recent(&self, n: usize) -> Vec<&ConversationTurn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).collect()
    }

    /// Formatted context of the most recent `n` turns, for prompt assembly
    pub fn context_string(&self, n: usize) -> String {
        if self.turns.is_empty() {
            return "no previous conversation".to_string();
        }

        self.recent(n)
            .into_iter()
            .map(|turn| {
                let speaker = match turn.speaker {
                    Speaker::User => "User",
                    Speaker::Agent => "Agent",
                };
                format!("{}: {}", speaker, turn.raw_text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Drop all retained turns (used when a session is archived)
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
