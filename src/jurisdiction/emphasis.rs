// =============================================================================
// jurisdiction/emphasis.rs — THE SECOND PASS
// =============================================================================
//
// After the filter has boosted local law, this pass asks where each judgment
// came from relative to the searching court and weighs it accordingly:
// the court's own past rulings first, then the Supreme Court, then sister
// High Courts, with foreign authority last. Then the user's own preferences
// for the suit get a say: recent cases, precedent-heavy cases,
// statute-heavy cases.
//
// This pass stacks on the jurisdiction-boosted score and writes its own
// field. It never reads its own output, so running it twice on the same
// filtered input gives the same answer.
// =============================================================================

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::jurisdiction::rules::{PrecedentWeights, RuleBook};
use crate::jurisdiction::PassOutcome;
use crate::legal_text;
use crate::models::{
    CaseRecord, CourtCategory, EmphasisFactors, EmphasisPreferences, LegalEmphasis, RankedCase, TimePeriodFocus,
};

pub const RECENCY_BOOST: f64 = 1.2;
pub const CITATION_BOOST: f64 = 1.1;

/// "Recent" means decided within five years of the evaluation date.
pub const RECENCY_WINDOW_DAYS: i64 = 5 * 365;

const PRECEDENT_HEAVY_MIN: usize = 10;
const STATUTE_HEAVY_MIN: usize = 5;

/// Which bucket a judgment's originating court falls into for `target`.
///
/// Same-court matching only applies to courts with a weight table: the
/// record's court must mention the first word of the target's name.
pub fn classify_court(record_court: &str, target_court: &str, rules: &RuleBook) -> CourtCategory {
    let record_lower = record_court.to_lowercase();

    if rules.precedent_weights(target_court).is_some() {
        if let Some(first_word) = target_court.split_whitespace().next() {
            if legal_text::mentions(&record_lower, &first_word.to_lowercase()) {
                return CourtCategory::SameCourt;
            }
        }
    }

    if legal_text::is_international_court(record_court) {
        CourtCategory::International
    } else if legal_text::mentions(&record_lower, "supreme court") {
        CourtCategory::SupremeCourt
    } else if legal_text::mentions(&record_lower, "high court") {
        CourtCategory::OtherHighCourt
    } else {
        CourtCategory::Uncategorized
    }
}

/// Multiplier for a category. Courts without a table weigh everything 1.0.
pub fn category_weight(category: CourtCategory, weights: Option<&PrecedentWeights>) -> f64 {
    let Some(weights) = weights else {
        return 1.0;
    };
    match category {
        CourtCategory::SameCourt => weights.same_court,
        CourtCategory::SupremeCourt => weights.supreme_court,
        CourtCategory::OtherHighCourt => weights.other_high_courts,
        CourtCategory::International => weights.international,
        CourtCategory::Uncategorized => 1.0,
    }
}

/// Judgment within the recency window. Future-dated judgments count.
fn is_recent(record: &CaseRecord, as_of: NaiveDate) -> bool {
    record
        .judgment_date
        .map(|date| (as_of - date).num_days() < RECENCY_WINDOW_DAYS)
        .unwrap_or(false)
}

pub struct LocalEmphasisEngine<'a> {
    rules: &'a RuleBook,
}

impl<'a> LocalEmphasisEngine<'a> {
    pub fn new(rules: &'a RuleBook) -> Self {
        Self { rules }
    }

    /// Weigh, annotate and re-sort jurisdiction-filtered results.
    ///
    /// User preference multipliers apply only when `preferences` is present
    /// and has at least one key.
    pub fn apply(
        &self,
        results: Vec<RankedCase>,
        court: &str,
        preferences: Option<&EmphasisPreferences>,
        as_of: NaiveDate,
    ) -> PassOutcome {
        if let Some(bad) = results
            .iter()
            .find(|r| !r.jurisdiction_boosted_score.is_finite() || r.jurisdiction_boosted_score < 0.0)
        {
            warn!(
                court = court,
                case_id = %bad.record.id,
                score = bad.jurisdiction_boosted_score,
                "Local emphasis failed — returning results unmodified"
            );
            return PassOutcome {
                results,
                fallback_used: true,
            };
        }

        let weights = self.rules.precedent_weights(court);
        let preferences = preferences.filter(|p| !p.is_empty());
        let first_word = court
            .split_whitespace()
            .next()
            .map(str::to_lowercase)
            .unwrap_or_default();

        let mut emphasized: Vec<RankedCase> = results
            .into_iter()
            .map(|mut ranked| {
                let category = classify_court(&ranked.record.court, court, self.rules);
                let weight = category_weight(category, weights);
                let base = ranked.jurisdiction_boosted_score;
                let mut score = base * weight;

                let mut recency_boost = false;
                let mut citation_boost = false;
                if let Some(prefs) = preferences {
                    let focus = prefs.time_period_focus.unwrap_or_default();
                    if focus == TimePeriodFocus::Recent && is_recent(&ranked.record, as_of) {
                        score *= RECENCY_BOOST;
                        recency_boost = true;
                    }

                    citation_boost = match prefs.legal_emphasis.unwrap_or_default() {
                        LegalEmphasis::Precedent => ranked.record.precedents_cited.len() > PRECEDENT_HEAVY_MIN,
                        LegalEmphasis::Statute => ranked.record.statutes_cited.len() > STATUTE_HEAVY_MIN,
                        LegalEmphasis::Balanced | LegalEmphasis::Other => false,
                    };
                    if citation_boost {
                        score *= CITATION_BOOST;
                    }
                }

                let local_court_boost =
                    !first_word.is_empty() && legal_text::mentions(&ranked.record.court.to_lowercase(), &first_word);

                ranked.emphasized_score = score;
                ranked.emphasis_factors = Some(EmphasisFactors {
                    court_category: category,
                    category_weight: weight,
                    local_court_boost,
                    recency_boost,
                    citation_boost,
                    precedent_weight: if base > 0.0 { score / base } else { 1.0 },
                });
                ranked
            })
            .collect();

        emphasized.sort_by(|a, b| b.emphasized_score.total_cmp(&a.emphasized_score));

        debug!(
            court = court,
            results = emphasized.len(),
            preferences = preferences.is_some(),
            "Local emphasis applied"
        );

        PassOutcome {
            results: emphasized,
            fallback_used: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(id: &str, court: &str, score: f64) -> RankedCase {
        RankedCase::passthrough(CaseRecord::new(id, format!("Case {id}"), court, score))
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_court_classification() {
        let rules = RuleBook::builtin();
        let target = "Delhi High Court";
        assert_eq!(classify_court("High Court of Delhi", target, &rules), CourtCategory::SameCourt);
        assert_eq!(classify_court("Supreme Court of India", target, &rules), CourtCategory::SupremeCourt);
        assert_eq!(classify_court("Bombay High Court", target, &rules), CourtCategory::OtherHighCourt);
        assert_eq!(classify_court("Privy Council", target, &rules), CourtCategory::International);
        assert_eq!(classify_court("UK Supreme Court", target, &rules), CourtCategory::International);
        assert_eq!(classify_court("District Court, Saket", target, &rules), CourtCategory::Uncategorized);
    }

    #[test]
    fn test_same_court_requires_weight_table() {
        let rules = RuleBook::builtin();
        // "Unknown" has no table, so its own rulings land in a generic bucket.
        assert_eq!(
            classify_court("Unknown High Court", "Unknown High Court", &rules),
            CourtCategory::OtherHighCourt
        );
    }

    #[test]
    fn test_category_weights_applied() {
        let rules = RuleBook::builtin();
        let engine = LocalEmphasisEngine::new(&rules);
        let outcome = engine.apply(
            vec![
                ranked("sc", "Supreme Court of India", 1.0),
                ranked("own", "Delhi High Court", 1.0),
                ranked("pc", "Privy Council", 1.0),
            ],
            "Delhi High Court",
            None,
            as_of(),
        );
        let ids: Vec<&str> = outcome.results.iter().map(|r| r.record.id.as_str()).collect();
        assert_eq!(ids, vec!["own", "sc", "pc"]);
        assert!((outcome.results[0].emphasized_score - 2.0).abs() < 1e-12);
        assert!((outcome.results[2].emphasized_score - 0.8).abs() < 1e-12);
        let factors = outcome.results[0].emphasis_factors.as_ref().unwrap();
        assert!(factors.local_court_boost);
        assert!((factors.precedent_weight - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_stacks_on_boosted_score_not_baseline() {
        let rules = RuleBook::builtin();
        let mut case = ranked("a", "Bombay High Court", 1.0);
        case.jurisdiction_boosted_score = 1.2;
        let outcome = LocalEmphasisEngine::new(&rules).apply(vec![case], "Delhi High Court", None, as_of());
        let result = &outcome.results[0];
        assert!((result.emphasized_score - 1.2 * 1.2).abs() < 1e-12);
        assert_eq!(result.record.relevance_score, 1.0);
    }

    #[test]
    fn test_unknown_court_weighs_everything_one() {
        let rules = RuleBook::builtin();
        let outcome = LocalEmphasisEngine::new(&rules).apply(
            vec![ranked("a", "Supreme Court of India", 0.4), ranked("b", "Privy Council", 0.6)],
            "Unknown Court",
            None,
            as_of(),
        );
        assert!(!outcome.fallback_used);
        assert_eq!(outcome.results[0].record.id, "b");
        assert!((outcome.results[0].emphasized_score - 0.6).abs() < 1e-12);
        assert!((outcome.results[1].emphasized_score - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_empty_preferences_apply_no_multipliers() {
        let rules = RuleBook::builtin();
        let mut case = ranked("a", "District Court", 1.0);
        case.record.judgment_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        let prefs = EmphasisPreferences::default();
        let outcome = LocalEmphasisEngine::new(&rules).apply(vec![case], "Delhi High Court", Some(&prefs), as_of());
        assert_eq!(outcome.results[0].emphasized_score, 1.0);
        assert!(!outcome.results[0].emphasis_factors.as_ref().unwrap().recency_boost);
    }

    #[test]
    fn test_any_key_enables_recency_default() {
        let rules = RuleBook::builtin();
        let mut recent = ranked("recent", "District Court", 1.0);
        recent.record.judgment_date = NaiveDate::from_ymd_opt(2023, 1, 1);
        let mut old = ranked("old", "District Court", 1.0);
        old.record.judgment_date = NaiveDate::from_ymd_opt(2010, 1, 1);
        let mut future = ranked("future", "District Court", 1.0);
        future.record.judgment_date = NaiveDate::from_ymd_opt(2030, 1, 1);

        let prefs: EmphasisPreferences = serde_json::from_str(r#"{"focus_area": "tax"}"#).unwrap();
        let outcome =
            LocalEmphasisEngine::new(&rules).apply(vec![old, recent, future], "Delhi High Court", Some(&prefs), as_of());

        let score = |id: &str| {
            outcome
                .results
                .iter()
                .find(|r| r.record.id == id)
                .map(|r| r.emphasized_score)
                .unwrap()
        };
        assert!((score("recent") - RECENCY_BOOST).abs() < 1e-12);
        assert!((score("future") - RECENCY_BOOST).abs() < 1e-12);
        assert_eq!(score("old"), 1.0);
        assert_eq!(outcome.results[2].record.id, "old");
    }

    #[test]
    fn test_legal_emphasis_multipliers() {
        let rules = RuleBook::builtin();
        let mut heavy = ranked("heavy", "District Court", 1.0);
        heavy.record.statutes_cited = (0..6).map(|i| format!("S{i}")).collect();
        let light = ranked("light", "District Court", 1.0);

        let prefs = EmphasisPreferences {
            time_period_focus: Some(TimePeriodFocus::Historical),
            legal_emphasis: Some(LegalEmphasis::Statute),
            ..Default::default()
        };
        let outcome =
            LocalEmphasisEngine::new(&rules).apply(vec![light, heavy], "Delhi High Court", Some(&prefs), as_of());
        assert_eq!(outcome.results[0].record.id, "heavy");
        assert!((outcome.results[0].emphasized_score - CITATION_BOOST).abs() < 1e-12);
        assert!(outcome.results[0].emphasis_factors.as_ref().unwrap().citation_boost);
    }

    #[test]
    fn test_zero_score_precedent_weight_is_one() {
        let rules = RuleBook::builtin();
        let outcome = LocalEmphasisEngine::new(&rules).apply(
            vec![ranked("z", "Delhi High Court", 0.0)],
            "Delhi High Court",
            None,
            as_of(),
        );
        assert_eq!(outcome.results[0].emphasis_factors.as_ref().unwrap().precedent_weight, 1.0);
    }

    #[test]
    fn test_invalid_input_returned_unmodified() {
        let rules = RuleBook::builtin();
        let mut bad = ranked("bad", "Delhi High Court", 1.0);
        bad.jurisdiction_boosted_score = f64::INFINITY;
        let outcome = LocalEmphasisEngine::new(&rules).apply(
            vec![ranked("ok", "Bombay High Court", 0.1), bad],
            "Delhi High Court",
            None,
            as_of(),
        );
        assert!(outcome.fallback_used);
        assert_eq!(outcome.results[0].record.id, "ok");
        assert!(outcome.results[0].emphasis_factors.is_none());
    }
}
