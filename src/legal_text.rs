// =============================================================================
// legal_text.rs — THE READING ROOM
// =============================================================================
//
// All the places where the engine has to read prose instead of numbers:
//
// 1. Does a snippet sound like it was drafted by someone who bills by the
//    "notwithstanding"? (The legal_precision procedural heuristic.)
// 2. What did the court actually do? Allowed, dismissed, remanded? We read
//    it off the AI summary's decision line.
// 3. Is a citing court foreign? Privy Council opinions still turn up in
//    Indian judgments and they deserve their own weight.
//
// Each vocabulary is compiled once into an Aho-Corasick automaton and every
// text is scanned in a single pass. Batches go through Rayon.
// =============================================================================

use aho_corasick::{AhoCorasick, MatchKind};
use rayon::prelude::*;
use std::borrow::Borrow;
use std::sync::LazyLock;
use tracing::debug;

use crate::models::{CaseRecord, Outcome};

/// Words that mark formal, precise drafting.
const FORMAL_TERMS: &[&str] = &["whereas", "therefore", "pursuant", "notwithstanding"];

/// Decision vocabulary, grouped by the outcome it implies. Order matters:
/// a decision is classified by the first group that matches anywhere in it.
const OUTCOME_GROUPS: &[(Outcome, &[&str])] = &[
    (Outcome::PetitionerFavorable, &["allowed", "granted"]),
    (Outcome::RespondentFavorable, &["dismissed", "rejected"]),
    (Outcome::Partial, &["partially"]),
    (Outcome::Remanded, &["remanded"]),
];

/// Courts whose opinions count as international authority.
const INTERNATIONAL_MARKERS: &[&str] = &[
    "privy council",
    "house of lords",
    "international court",
    "european court",
    "united kingdom",
    "uk supreme court",
    "england and wales",
    "united states",
    "u.s. supreme court",
    "supreme court of canada",
    "high court of australia",
    "new zealand",
];

static FORMAL_AUTOMATON: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(FORMAL_TERMS)
        .expect("formal-term vocabulary is a fixed list of plain words")
});

static OUTCOME_AUTOMATON: LazyLock<AhoCorasick> = LazyLock::new(|| {
    let words: Vec<&str> = OUTCOME_GROUPS
        .iter()
        .flat_map(|(_, words)| words.iter().copied())
        .collect();
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(words)
        .expect("outcome vocabulary is a fixed list of plain words")
});

static INTERNATIONAL_AUTOMATON: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .match_kind(MatchKind::LeftmostLongest)
        .build(INTERNATIONAL_MARKERS)
        .expect("international court markers are a fixed list of plain words")
});

/// Does the text use formal legal drafting terms?
pub fn has_formal_language(text: &str) -> bool {
    !text.is_empty() && FORMAL_AUTOMATON.is_match(text)
}

/// Classify a decision line. Text with none of the decision words is
/// `Unknown`.
pub fn classify_decision(decision: &str) -> Outcome {
    if decision.is_empty() {
        return Outcome::Unknown;
    }

    // Pattern ids follow the flattened OUTCOME_GROUPS order, so the lowest
    // id seen decides the group.
    let lowest = OUTCOME_AUTOMATON
        .find_overlapping_iter(decision)
        .map(|m| m.pattern().as_usize())
        .min();

    let Some(pattern) = lowest else {
        return Outcome::Unknown;
    };

    let mut offset = 0;
    for (outcome, words) in OUTCOME_GROUPS {
        if pattern < offset + words.len() {
            return *outcome;
        }
        offset += words.len();
    }
    Outcome::Unknown
}

/// Outcome of a case from its AI summary. No summary decision, no verdict.
pub fn record_outcome(record: &CaseRecord) -> Outcome {
    record
        .decision_text()
        .map(classify_decision)
        .unwrap_or(Outcome::Unknown)
}

/// Classify a whole snapshot in parallel. Output order follows input order.
pub fn batch_outcomes<R: Borrow<CaseRecord> + Sync>(records: &[R]) -> Vec<Outcome> {
    let outcomes: Vec<Outcome> = records.par_iter().map(|r| record_outcome(r.borrow())).collect();
    debug!(records = records.len(), "Batch outcome classification complete");
    outcomes
}

/// Is this court name a foreign or international court?
pub fn is_international_court(court: &str) -> bool {
    !court.is_empty() && INTERNATIONAL_AUTOMATON.is_match(court)
}

/// Case-insensitive containment check for short ASCII court-name markers.
/// `haystack_lower` must already be lowercased.
pub fn mentions(haystack_lower: &str, needle_lower: &str) -> bool {
    memchr::memmem::find(haystack_lower.as_bytes(), needle_lower.as_bytes()).is_some()
}
