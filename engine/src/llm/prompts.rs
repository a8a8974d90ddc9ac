//! Prompt templates and deterministic reply text
//!
//! Builders for the structured-output prompts sent to the language backend
//! (fact extraction, intent classification, response generation) and the
//! deterministic templates used for clarification questions and degraded
//! replies. Clarifications are templated, not generated: they must work even
//! when the backend is down.

use super::Message;
use sdk::profile::{Attribute, Contradiction, Severity, UserProfile};

/// Messages asking the backend to extract profile facts from one utterance
pub fn extraction_messages(input: &str, profile: &UserProfile) -> Vec<Message> {
    let system = Message::system(format!(
        "You extract structured facts about a citizen from one message.\n\
        Reply with ONLY a JSON object with these keys:\n\
        - \"age\": integer or null\n\
        - \"annual_income\": integer (rupees per year) or null\n\
        - \"category\": one of \"general\", \"obc\", \"sc\", \"st\", \"ews\", \"other\", or null\n\
        - \"state\": string or null\n\
        - \"gender\": one of \"male\", \"female\", \"other\", or null\n\
        - \"is_bpl\": boolean (has a BPL card) or null\n\
        - \"occupation\": string or null\n\
        Use null for anything the message does not state. Do not guess.\n\
        Already known: {}.\n\
        Output ONLY the JSON object, no markdown, no explanation.",
        profile.summary()
    ));

    vec![system, Message::user(input)]
}

/// Messages asking the backend to classify the user's intent
pub fn intent_messages(input: &str, profile: &UserProfile, history: &str) -> Vec<Message> {
    let system = Message::system(
        "You classify what a citizen wants from a government-scheme assistant.\n\
        Reply with ONLY a JSON object:\n\
        - \"intent\": short English description of what the user wants\n\
        - \"unintelligible\": true when the message cannot be understood at all\n\
        - \"search_query\": a short scheme-search phrase for the request, or null\n\
        Output ONLY the JSON object, no markdown, no explanation.",
    );

    let context = format!(
        "Known profile: {}\n\nRecent conversation:\n{}\n\nCurrent user message: {}",
        profile.summary(),
        history,
        input
    );

    vec![system, Message::user(context)]
}

/// Follow-up instruction after a malformed structured reply
pub fn corrective_instruction() -> Message {
    Message::user(
        "Your previous reply was not a valid JSON object of the requested shape. \
        Reply again with ONLY the JSON object.",
    )
}

/// Messages asking the backend to phrase the final answer
pub fn response_messages(
    intent: &str,
    profile: &UserProfile,
    scheme_summaries: &[String],
) -> Vec<Message> {
    let system = Message::system(
        "You help Indian citizens discover government welfare schemes.\n\
        Write a short, warm, conversational reply. Use simple language.\n\
        Name each scheme, its main benefit, and how to apply. If details are\n\
        still missing, ask for them politely. Never invent schemes.",
    );

    let schemes_block = if scheme_summaries.is_empty() {
        "No matching schemes were found.".to_string()
    } else {
        scheme_summaries.join("\n")
    };

    let context = format!(
        "User request: {}\nKnown profile: {}\n\nSchemes found:\n{}",
        intent,
        profile.summary(),
        schemes_block
    );

    vec![system, Message::user(context)]
}

/// Deterministic question asking for one missing attribute
pub fn clarification_question(attribute: Attribute) -> String {
    match attribute {
        Attribute::Age => "What is your age?",
        Attribute::AnnualIncome => "What is your annual income, roughly?",
        Attribute::Category => {
            "Which category do you belong to — general, SC, ST, OBC or EWS?"
        }
        Attribute::State => "Which state do you live in?",
        Attribute::Gender => "May I ask your gender?",
        Attribute::IsBpl => "Do you have a BPL card?",
        Attribute::Occupation => "What is your occupation?",
    }
    .to_string()
}

/// Deterministic question surfacing a contradiction for confirmation
pub fn contradiction_question(contradiction: &Contradiction) -> String {
    match contradiction.severity {
        Severity::High => format!(
            "Earlier you said your {} was '{}', but now '{}'. \
            Could you confirm which is correct?",
            contradiction.attribute, contradiction.previous_value, contradiction.new_value
        ),
        Severity::Low => format!(
            "You earlier mentioned {} '{}'. Has this changed to '{}'?",
            contradiction.attribute, contradiction.previous_value, contradiction.new_value
        ),
    }
}

/// Reply when the input could not be understood at all
pub fn unintelligible_reply() -> String {
    "I did not quite catch that. Could you tell me again what kind of help \
    you are looking for?"
        .to_string()
}

/// Reply when speech transcription failed
pub fn repeat_request() -> String {
    "Sorry, I could not hear that clearly. Could you please repeat it?".to_string()
}

/// Degraded final reply used when response generation fails
pub fn fallback_response(scheme_names: &[String]) -> String {
    if scheme_names.is_empty() {
        "I could not find a scheme matching your details yet. Could you tell \
        me a little more about yourself?"
            .to_string()
    } else {
        format!(
            "Based on your details, you may be eligible for: {}. \
            Would you like to know how to apply?",
            scheme_names.join(", ")
        )
    }
}
