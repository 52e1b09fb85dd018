// =============================================================================
// analytics/mod.rs — NUMBERS ABOUT JUDGMENTS
// =============================================================================
//
// relevance — TF-IDF baseline scores for a query
// trends    — docket statistics over a snapshot, memoised
//
// Outcome classification lives in legal_text, next to the other prose
// readers.
// =============================================================================

pub mod relevance;
pub mod trends;
