//! Heuristic conversation phase tagging.
//!
//! Pure and best-effort: the tag is attached to replies and logs and never
//! changes how a request is handled.

use std::collections::HashSet;

use persona_types::chat::ConversationPhase;

/// How many trailing messages the heuristic looks at.
const PHASE_WINDOW: usize = 5;

const PROBLEM_WORDS: &[&str] = &["help", "problem", "issue", "error"];
const GREETING_WORDS: &[&str] = &["hello", "hi", "hey"];
const FAREWELL_WORDS: &[&str] = &["bye", "goodbye", "thanks"];

/// Classify from raw message texts (oldest first).
pub fn classify_contents(contents: &[&str]) -> ConversationPhase {
    if contents.is_empty() {
        return ConversationPhase::Greeting;
    }

    let start = contents.len().saturating_sub(PHASE_WINDOW);
    let words: HashSet<String> = contents[start..]
        .iter()
        .flat_map(|text| text.split(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    let contains_any = |list: &[&str]| list.iter().any(|w| words.contains(*w));

    if contains_any(PROBLEM_WORDS) {
        ConversationPhase::ProblemSolving
    } else if contains_any(GREETING_WORDS) && contents.len() <= 2 {
        ConversationPhase::Greeting
    } else if contains_any(FAREWELL_WORDS) {
        ConversationPhase::WrapUp
    } else {
        ConversationPhase::InformationGathering
    }
}
