// =============================================================================
// jurisdiction/filter.rs — THE FIRST PASS
// =============================================================================
//
// A judge in Delhi wants Delhi law first. Starting from the search layer's
// baseline score, each case is multiplied by:
//
//   ×1.5  decided by the target court itself
//   ×1.3  cites one of the court's local acts
//   ×1.2  fits the court's procedural emphasis (see below)
//
// The boosted score goes into its own field. The baseline is never touched,
// which is what lets the emphasis pass run after us without counting our
// boosts twice and lets anyone rerun the whole pipeline on our output.
//
// If anything about the input makes scoring meaningless (a NaN or negative
// baseline) the filter hands the input back unmodified and says so.
// =============================================================================

use aho_corasick::AhoCorasick;
use thiserror::Error;
use tracing::{debug, warn};

use crate::jurisdiction::rules::{ProceduralEmphasis, RuleBook};
use crate::jurisdiction::PassOutcome;
use crate::legal_text;
use crate::models::{CaseRecord, JurisdictionFactors, RankedCase};

pub const LOCAL_COURT_BOOST: f64 = 1.5;
pub const LOCAL_ACT_BOOST: f64 = 1.3;
pub const PROCEDURAL_BOOST: f64 = 1.2;

/// "Well-established case" proxy for courts that value speedy resolution.
const SPEEDY_MIN_VIEWS: u64 = 10;
const THOROUGH_MIN_STATUTES: usize = 5;
const THOROUGH_MIN_PRECEDENTS: usize = 10;

#[derive(Debug, Error)]
pub enum JurisdictionError {
    #[error("case {id} has unusable relevance score {score}")]
    InvalidScore { id: String, score: f64 },

    #[error("failed to build local-act matcher: {0}")]
    Matcher(#[from] aho_corasick::BuildError),
}

/// Does the case fit the court's procedural emphasis?
pub fn matches_procedural_preference(record: &CaseRecord, emphasis: ProceduralEmphasis) -> bool {
    match emphasis {
        ProceduralEmphasis::SpeedyResolution => record.view_count > SPEEDY_MIN_VIEWS,
        ProceduralEmphasis::ThoroughAnalysis => {
            record.statutes_cited.len() > THOROUGH_MIN_STATUTES
                || record.precedents_cited.len() > THOROUGH_MIN_PRECEDENTS
        }
        ProceduralEmphasis::LegalPrecision => legal_text::has_formal_language(&record.snippet),
        ProceduralEmphasis::TechnologyIntegration
        | ProceduralEmphasis::StandardProcedure
        | ProceduralEmphasis::Other => true,
    }
}

/// Rejects baselines that would poison the ordering.
pub(crate) fn validate_baselines(records: &[CaseRecord]) -> Result<(), JurisdictionError> {
    match records
        .iter()
        .find(|r| !r.relevance_score.is_finite() || r.relevance_score < 0.0)
    {
        Some(bad) => Err(JurisdictionError::InvalidScore {
            id: bad.id.clone(),
            score: bad.relevance_score,
        }),
        None => Ok(()),
    }
}

/// The jurisdiction-boost pass.
pub struct JurisdictionFilter<'a> {
    rules: &'a RuleBook,
}

impl<'a> JurisdictionFilter<'a> {
    pub fn new(rules: &'a RuleBook) -> Self {
        Self { rules }
    }

    /// Boost, annotate and sort. Falls back to the untouched input on error.
    /// User customization only reaches the emphasis pass; the court rules
    /// alone decide the boosts here.
    pub fn apply(&self, records: Vec<CaseRecord>, court: &str) -> PassOutcome {
        match self.try_apply(&records, court) {
            Ok(results) => {
                debug!(court = court, results = results.len(), "Jurisdiction filtering complete");
                PassOutcome {
                    results,
                    fallback_used: false,
                }
            }
            Err(e) => {
                warn!(
                    court = court,
                    error = %e,
                    "Jurisdiction filtering failed — returning results unmodified"
                );
                PassOutcome {
                    results: records.into_iter().map(RankedCase::passthrough).collect(),
                    fallback_used: true,
                }
            }
        }
    }

    pub fn try_apply(&self, records: &[CaseRecord], court: &str) -> Result<Vec<RankedCase>, JurisdictionError> {
        validate_baselines(records)?;

        let rules = self.rules.court_rules(court);
        let local_acts = if rules.local_acts.is_empty() {
            None
        } else {
            Some(AhoCorasick::new(&rules.local_acts)?)
        };
        let emphasis = rules.procedural_preferences.emphasis;

        let mut results: Vec<RankedCase> = records
            .iter()
            .map(|record| {
                let local_court = record.court == court;
                let local_acts_cited = local_acts
                    .as_ref()
                    .map(|matcher| record.statutes_cited.iter().any(|s| matcher.is_match(s)))
                    .unwrap_or(false);
                let procedural_match = matches_procedural_preference(record, emphasis);

                let mut score = record.relevance_score;
                if local_court {
                    score *= LOCAL_COURT_BOOST;
                }
                if local_acts_cited {
                    score *= LOCAL_ACT_BOOST;
                }
                if procedural_match {
                    score *= PROCEDURAL_BOOST;
                }

                RankedCase {
                    record: record.clone(),
                    jurisdiction_boosted_score: score,
                    jurisdiction_factors: Some(JurisdictionFactors {
                        local_court,
                        local_acts_cited,
                        procedural_match,
                    }),
                    // Until the emphasis pass runs, the boosted score is final.
                    emphasized_score: score,
                    emphasis_factors: None,
                }
            })
            .collect();

        results.sort_by(|a, b| b.jurisdiction_boosted_score.total_cmp(&a.jurisdiction_boosted_score));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, court: &str, score: f64) -> CaseRecord {
        CaseRecord::new(id, format!("Case {id}"), court, score)
    }

    #[test]
    fn test_local_court_outranks_equal_baseline() {
        let rules = RuleBook::builtin();
        let filter = JurisdictionFilter::new(&rules);
        let outcome = filter.apply(
            vec![record("far", "Bombay High Court", 1.0), record("near", "Delhi High Court", 1.0)],
            "Delhi High Court",
        );
        assert!(!outcome.fallback_used);
        assert_eq!(outcome.results[0].record.id, "near");
        assert!(outcome.results[0].jurisdiction_factors.unwrap().local_court);
    }

    #[test]
    fn test_all_three_boosts_compound() {
        let rules = RuleBook::builtin();
        let filter = JurisdictionFilter::new(&rules);
        let mut case = record("c1", "Delhi High Court", 1.0);
        case.statutes_cited = vec!["Section 14, Delhi Rent Control Act, 1958".to_string()];
        case.view_count = 11;

        let outcome = filter.apply(vec![case], "Delhi High Court");
        let ranked = &outcome.results[0];
        let expected = LOCAL_COURT_BOOST * LOCAL_ACT_BOOST * PROCEDURAL_BOOST;
        assert!((ranked.jurisdiction_boosted_score - expected).abs() < 1e-12);
        assert_eq!(
            ranked.jurisdiction_factors,
            Some(JurisdictionFactors {
                local_court: true,
                local_acts_cited: true,
                procedural_match: true
            })
        );
        // Baseline is untouched.
        assert_eq!(ranked.record.relevance_score, 1.0);
    }

    #[test]
    fn test_local_act_match_is_case_sensitive_substring() {
        let rules = RuleBook::builtin();
        let filter = JurisdictionFilter::new(&rules);
        let mut lower = record("c1", "Other Court", 1.0);
        lower.statutes_cited = vec!["delhi rent control act".to_string()];
        let outcome = filter.try_apply(&[lower], "Delhi High Court").unwrap();
        assert!(!outcome[0].jurisdiction_factors.unwrap().local_acts_cited);
    }

    #[test]
    fn test_unknown_court_uses_default_rules() {
        let rules = RuleBook::builtin();
        let filter = JurisdictionFilter::new(&rules);
        let outcome = filter.apply(
            vec![record("a", "Unknown Court", 0.5), record("b", "Delhi High Court", 0.7)],
            "Unknown Court",
        );
        assert!(!outcome.fallback_used);
        // Default emphasis always matches; local court adds 1.5 for "a".
        let a = outcome.results.iter().find(|r| r.record.id == "a").unwrap();
        assert!((a.jurisdiction_boosted_score - 0.5 * 1.5 * 1.2).abs() < 1e-12);
        let b = outcome.results.iter().find(|r| r.record.id == "b").unwrap();
        assert!((b.jurisdiction_boosted_score - 0.7 * 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_procedural_heuristics() {
        let mut case = record("c1", "X", 1.0);
        assert!(!matches_procedural_preference(&case, ProceduralEmphasis::SpeedyResolution));
        case.view_count = 11;
        assert!(matches_procedural_preference(&case, ProceduralEmphasis::SpeedyResolution));

        assert!(!matches_procedural_preference(&case, ProceduralEmphasis::ThoroughAnalysis));
        case.precedents_cited = (0..11).map(|i| format!("P{i}")).collect();
        assert!(matches_procedural_preference(&case, ProceduralEmphasis::ThoroughAnalysis));

        assert!(!matches_procedural_preference(&case, ProceduralEmphasis::LegalPrecision));
        case.snippet = "Pursuant to the order dated 3 March".to_string();
        assert!(matches_procedural_preference(&case, ProceduralEmphasis::LegalPrecision));

        assert!(matches_procedural_preference(&record("c2", "X", 1.0), ProceduralEmphasis::TechnologyIntegration));
    }

    #[test]
    fn test_invalid_baseline_returns_input_unmodified() {
        let rules = RuleBook::builtin();
        let filter = JurisdictionFilter::new(&rules);
        let outcome = filter.apply(
            vec![record("a", "Bombay High Court", 0.2), record("b", "Delhi High Court", f64::NAN)],
            "Delhi High Court",
        );
        assert!(outcome.fallback_used);
        assert_eq!(outcome.results[0].record.id, "a");
        assert_eq!(outcome.results[1].record.id, "b");
        assert!(outcome.results.iter().all(|r| r.jurisdiction_factors.is_none()));
    }

    #[test]
    fn test_empty_input() {
        let rules = RuleBook::builtin();
        let outcome = JurisdictionFilter::new(&rules).apply(Vec::new(), "Delhi High Court");
        assert!(outcome.results.is_empty());
        assert!(!outcome.fallback_used);
    }
}
