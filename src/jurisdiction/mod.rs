// =============================================================================
// jurisdiction/mod.rs — THE RERANKING PIPELINE
// =============================================================================
//
// search layer ──► JurisdictionFilter ──► LocalEmphasisEngine ──► judge
//                  (court rules boost)     (precedent weighting)
//
// Both passes are pure functions over snapshots. Each one writes its own
// score field, sorts, and falls back to handing its input back untouched if
// something is wrong with it. The pipeline reports whether either pass did.
// =============================================================================

pub mod emphasis;
pub mod filter;
pub mod insights;
pub mod rules;

use chrono::NaiveDate;
use tracing::info;

use crate::models::{CaseRecord, Customization, RankedCase};
use emphasis::LocalEmphasisEngine;
use filter::JurisdictionFilter;
use rules::RuleBook;

/// What a pass (or the whole pipeline) hands back.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PassOutcome {
    pub results: Vec<RankedCase>,
    pub fallback_used: bool,
}

/// Jurisdiction filtering followed by local emphasis.
///
/// `as_of` is the date recency is judged against; callers pass today.
pub fn rerank(
    records: Vec<CaseRecord>,
    court: &str,
    rules: &RuleBook,
    customization: Option<&Customization>,
    as_of: NaiveDate,
) -> PassOutcome {
    let total = records.len();

    let filtered = JurisdictionFilter::new(rules).apply(records, court);
    let emphasized = LocalEmphasisEngine::new(rules).apply(
        filtered.results,
        court,
        customization.map(|c| &c.jurisdiction_emphasis),
        as_of,
    );

    let fallback_used = filtered.fallback_used || emphasized.fallback_used;
    info!(
        court = court,
        results = total,
        known_court = rules.is_known_court(court),
        fallback_used = fallback_used,
        "Reranking complete"
    );

    PassOutcome {
        results: emphasized.results,
        fallback_used,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CourtCategory, EmphasisPreferences, LegalEmphasis};
    use proptest::prelude::*;
    use std::collections::HashMap;

    const COURTS: &[&str] = &[
        "Delhi High Court",
        "Bombay High Court",
        "Calcutta High Court",
        "Madras High Court",
        "Supreme Court of India",
        "Privy Council",
        "District Court, Saket",
    ];

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn arb_record() -> impl Strategy<Value = CaseRecord> {
        (
            0..COURTS.len(),
            0.0f64..100.0,
            0u64..20,
            0usize..8,
            0usize..13,
            prop::option::of(0i64..4000),
        )
            .prop_map(|(court, score, views, statutes, precedents, age_days)| {
                let mut record = CaseRecord::new("", "generated", COURTS[court], score);
                record.view_count = views;
                record.statutes_cited = (0..statutes)
                    .map(|i| {
                        if i == 0 {
                            "Delhi Rent Control Act, 1958".to_string()
                        } else {
                            format!("Section {i}")
                        }
                    })
                    .collect();
                record.precedents_cited = (0..precedents).map(|i| format!("P{i}")).collect();
                record.judgment_date = age_days.map(|d| as_of() - chrono::Duration::days(d));
                record
            })
    }

    fn arb_records() -> impl Strategy<Value = Vec<CaseRecord>> {
        prop::collection::vec(arb_record(), 0..24).prop_map(|mut records| {
            for (i, record) in records.iter_mut().enumerate() {
                record.id = format!("case-{i}");
            }
            records
        })
    }

    fn arb_target() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec![
            "Delhi High Court",
            "Bombay High Court",
            "Calcutta High Court",
            "Madras High Court",
            "Unknown Court",
        ])
    }

    fn template_score_positive(outcome: &PassOutcome) -> bool {
        outcome.results.iter().all(|r| r.record.relevance_score > 0.0)
    }

    fn customization() -> Customization {
        Customization {
            jurisdiction_emphasis: EmphasisPreferences {
                legal_emphasis: Some(LegalEmphasis::Precedent),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    proptest! {
        #[test]
        fn prop_local_court_ranks_at_or_above_equal_baseline(
            target in arb_target(),
            other in 0..COURTS.len(),
            template in arb_record(),
        ) {
            prop_assume!(COURTS[other] != target);
            let rules = RuleBook::builtin();

            let mut local = template.clone();
            local.id = "local".to_string();
            local.court = target.to_string();
            let mut foreign = template;
            foreign.id = "foreign".to_string();
            foreign.court = COURTS[other].to_string();

            let outcome = JurisdictionFilter::new(&rules).apply(vec![foreign, local], target);
            prop_assert!(!outcome.fallback_used);
            let score = |id: &str| {
                outcome
                    .results
                    .iter()
                    .find(|r| r.record.id == id)
                    .map(|r| r.jurisdiction_boosted_score)
                    .unwrap_or_default()
            };
            prop_assert!(score("local") >= score("foreign"));
            if template_score_positive(&outcome) {
                prop_assert_eq!(outcome.results[0].record.id.as_str(), "local");
            }
        }

        #[test]
        fn prop_rerun_on_baselines_reproduces_scores(
            records in arb_records(),
            target in arb_target(),
            customized in any::<bool>(),
        ) {
            let rules = RuleBook::builtin();
            let custom = customization();
            let custom = customized.then_some(&custom);

            let first = rerank(records, target, &rules, custom, as_of());
            let baselines: Vec<CaseRecord> = first.results.iter().map(|r| r.record.clone()).collect();
            let second = rerank(baselines, target, &rules, custom, as_of());

            let by_id: HashMap<&str, &RankedCase> =
                second.results.iter().map(|r| (r.record.id.as_str(), r)).collect();
            for ranked in &first.results {
                prop_assert_eq!(Some(&ranked), by_id.get(ranked.record.id.as_str()));
            }
            let first_scores: Vec<f64> = first.results.iter().map(|r| r.emphasized_score).collect();
            let second_scores: Vec<f64> = second.results.iter().map(|r| r.emphasized_score).collect();
            prop_assert_eq!(first_scores, second_scores);
        }

        #[test]
        fn prop_final_order_is_descending(records in arb_records(), target in arb_target()) {
            let rules = RuleBook::builtin();
            let outcome = rerank(records, target, &rules, None, as_of());
            for pair in outcome.results.windows(2) {
                prop_assert!(pair[0].emphasized_score >= pair[1].emphasized_score);
            }
        }

        #[test]
        fn prop_unknown_court_uses_defaults(records in arb_records()) {
            let rules = RuleBook::builtin();
            let outcome = rerank(records, "Unknown Court", &rules, None, as_of());
            prop_assert!(!outcome.fallback_used);
            for ranked in &outcome.results {
                let factors = ranked.emphasis_factors.as_ref().unwrap();
                prop_assert_eq!(factors.category_weight, 1.0);
                prop_assert_eq!(ranked.emphasized_score, ranked.jurisdiction_boosted_score);
            }
        }

        #[test]
        fn prop_empty_customization_keeps_tied_order(records in arb_records(), target in arb_target()) {
            let rules = RuleBook::builtin();
            let filtered = JurisdictionFilter::new(&rules).apply(records, target);
            let position: HashMap<String, usize> = filtered
                .results
                .iter()
                .enumerate()
                .map(|(i, r)| (r.record.id.clone(), i))
                .collect();

            let empty = Customization::default();
            let emphasized = LocalEmphasisEngine::new(&rules).apply(
                filtered.results,
                target,
                Some(&empty.jurisdiction_emphasis),
                as_of(),
            );

            let key = |r: &RankedCase| -> (u64, CourtCategory) {
                (
                    r.jurisdiction_boosted_score.to_bits(),
                    r.emphasis_factors.as_ref().map(|f| f.court_category).unwrap_or(CourtCategory::Uncategorized),
                )
            };
            for (i, a) in emphasized.results.iter().enumerate() {
                for b in &emphasized.results[i + 1..] {
                    if key(a) == key(b) {
                        prop_assert!(position[&a.record.id] < position[&b.record.id]);
                    }
                }
            }
        }
    }

    #[test]
    fn test_unknown_court_end_to_end() {
        let rules = RuleBook::builtin();
        let records = vec![
            CaseRecord::new("a", "A v. B", "Unknown Court", 0.5),
            CaseRecord::new("b", "C v. D", "Supreme Court of India", 0.6),
        ];
        let outcome = rerank(records, "Unknown Court", &rules, None, as_of());
        assert!(!outcome.fallback_used);
        // a: 0.5 * 1.5 (own court) * 1.2 (standard procedure) = 0.9
        // b: 0.6 * 1.2 = 0.72
        assert_eq!(outcome.results[0].record.id, "a");
        assert!((outcome.results[0].emphasized_score - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_baseline_flags_fallback() {
        let rules = RuleBook::builtin();
        let records = vec![
            CaseRecord::new("a", "A", "Delhi High Court", -1.0),
            CaseRecord::new("b", "B", "Delhi High Court", 1.0),
        ];
        let outcome = rerank(records, "Delhi High Court", &rules, None, as_of());
        assert!(outcome.fallback_used);
        assert_eq!(outcome.results[0].record.id, "a");
        assert_eq!(outcome.results[0].record.relevance_score, -1.0);
    }

    #[test]
    fn test_customization_leaves_first_pass_scores_alone() {
        let rules = RuleBook::builtin();
        let mut heavy = CaseRecord::new("heavy", "E v. F", "Bombay High Court", 0.5);
        heavy.precedents_cited = (0..11).map(|i| format!("P{i}")).collect();
        let records = vec![heavy, CaseRecord::new("plain", "G v. H", "Delhi High Court", 0.5)];

        let plain = rerank(records.clone(), "Delhi High Court", &rules, None, as_of());
        let custom = rerank(records, "Delhi High Court", &rules, Some(&customization()), as_of());

        let boosted = |outcome: &PassOutcome, id: &str| {
            outcome
                .results
                .iter()
                .find(|r| r.record.id == id)
                .map(|r| r.jurisdiction_boosted_score)
        };
        assert_eq!(boosted(&plain, "heavy"), boosted(&custom, "heavy"));
        assert_eq!(boosted(&plain, "plain"), boosted(&custom, "plain"));
        let heavy = custom.results.iter().find(|r| r.record.id == "heavy").unwrap();
        assert!(heavy.emphasis_factors.as_ref().unwrap().citation_boost);
    }
}
