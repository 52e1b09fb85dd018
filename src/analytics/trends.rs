// =============================================================================
// analytics/trends.rs — THE CAUSE LIST STATISTICIAN
// =============================================================================
//
// Given a snapshot of judgments, a look-back period and optionally a single
// court, work out what the docket has been about: which case types, which
// courts are busiest, which tags keep coming up, how many judgments a month,
// who tends to win, and which topics only started showing up recently.
//
// Reports are memoised for an hour in a bounded LRU. The memo key includes a
// blake3 fingerprint of the snapshot's case ids, so a different snapshot for
// the same period never gets a stale answer.
// =============================================================================

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use lru::LruCache;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::legal_text;
use crate::models::{CaseRecord, Outcome};

const MONTH_DAYS: i64 = 30;
const MAX_MONTHS: i64 = 12;
const EMERGING_WINDOW_DAYS: i64 = 90;
const TOP_TAGS: usize = 20;
const TOP_EMERGING: usize = 10;

const FALLBACK_MEMO_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(n) => n,
    None => unreachable!(),
};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CaseTypeTrend {
    pub count: usize,
    pub percentage: f64,
    pub trend_direction: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CourtTrend {
    pub case_count: usize,
    pub avg_relevance: f64,
    pub court_activity: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TagTrend {
    pub tag: String,
    pub frequency: usize,
    pub trend_status: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthlyCount {
    pub month: String,
    pub case_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TemporalTrends {
    pub monthly_counts: Vec<MonthlyCount>,
    pub average_cases_per_month: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutcomeShare {
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmergingTopic {
    pub topic: String,
    pub recent_cases: usize,
    pub growth_rate: &'static str,
    pub significance: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnalysisMetadata {
    pub time_period_days: u32,
    pub total_cases: usize,
    pub courts_analyzed: usize,
    pub analysis_date: DateTime<Utc>,
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrendReport {
    pub case_type_trends: BTreeMap<String, CaseTypeTrend>,
    pub court_trends: BTreeMap<String, CourtTrend>,
    pub tag_trends: Vec<TagTrend>,
    pub temporal_trends: TemporalTrends,
    pub outcome_trends: BTreeMap<Outcome, OutcomeShare>,
    pub emerging_topics: Vec<EmergingTopic>,
    pub analysis_metadata: AnalysisMetadata,
}

impl TrendReport {
    /// The report for a window with no judgments in it.
    pub fn empty() -> Self {
        Self {
            case_type_trends: BTreeMap::new(),
            court_trends: BTreeMap::new(),
            tag_trends: Vec::new(),
            temporal_trends: TemporalTrends::default(),
            outcome_trends: BTreeMap::new(),
            emerging_topics: Vec::new(),
            analysis_metadata: AnalysisMetadata {
                time_period_days: 0,
                total_cases: 0,
                courts_analyzed: 0,
                analysis_date: Utc::now(),
                status: "no_data",
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.analysis_metadata.status == "no_data"
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(count as f64 / total as f64 * 100.0)
    }
}

fn court_activity(count: usize) -> &'static str {
    if count > 50 {
        "high"
    } else if count > 20 {
        "medium"
    } else {
        "low"
    }
}

fn tag_status(count: usize) -> &'static str {
    if count > 10 {
        "hot"
    } else if count > 5 {
        "warm"
    } else {
        "cool"
    }
}

/// Tag counts, most frequent first, ties alphabetical.
fn ranked_tags<'a>(cases: impl Iterator<Item = &'a CaseRecord>) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for tag in cases.flat_map(|c| c.tags.iter()) {
        *counts.entry(tag.as_str()).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().map(|(t, c)| (t.to_string(), c)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

pub fn case_type_trends(cases: &[&CaseRecord]) -> BTreeMap<String, CaseTypeTrend> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for case in cases {
        *counts.entry(case.case_type.to_string()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(case_type, count)| {
            (
                case_type,
                CaseTypeTrend {
                    count,
                    percentage: percentage(count, cases.len()),
                    trend_direction: "stable",
                },
            )
        })
        .collect()
}

pub fn court_trends(cases: &[&CaseRecord]) -> BTreeMap<String, CourtTrend> {
    let mut totals: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for case in cases {
        let entry = totals.entry(case.court.as_str()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += case.relevance_score;
    }
    totals
        .into_iter()
        .map(|(court, (count, score_sum))| {
            (
                court.to_string(),
                CourtTrend {
                    case_count: count,
                    avg_relevance: round2(score_sum / count as f64),
                    court_activity: court_activity(count),
                },
            )
        })
        .collect()
}

pub fn tag_trends(cases: &[&CaseRecord]) -> Vec<TagTrend> {
    ranked_tags(cases.iter().copied())
        .into_iter()
        .take(TOP_TAGS)
        .map(|(tag, frequency)| TagTrend {
            tag,
            frequency,
            trend_status: tag_status(frequency),
        })
        .collect()
}

/// 30-day buckets counting back from `as_of`, oldest first.
pub fn temporal_trends(cases: &[&CaseRecord], period_days: u32, as_of: NaiveDate) -> TemporalTrends {
    let months = (period_days as i64 / MONTH_DAYS).min(MAX_MONTHS);
    let mut monthly_counts: Vec<MonthlyCount> = (0..months)
        .map(|months_ago| {
            let end = as_of - ChronoDuration::days(MONTH_DAYS * months_ago);
            let start = as_of - ChronoDuration::days(MONTH_DAYS * (months_ago + 1));
            let case_count = cases
                .iter()
                .filter(|c| c.judgment_date.is_some_and(|d| d >= start && d < end))
                .count();
            MonthlyCount {
                month: end.format("%Y-%m").to_string(),
                case_count,
            }
        })
        .collect();
    monthly_counts.reverse();

    let average_cases_per_month = if monthly_counts.is_empty() {
        0.0
    } else {
        monthly_counts.iter().map(|m| m.case_count).sum::<usize>() as f64 / monthly_counts.len() as f64
    };

    TemporalTrends {
        monthly_counts,
        average_cases_per_month,
    }
}

pub fn outcome_trends(cases: &[&CaseRecord]) -> BTreeMap<Outcome, OutcomeShare> {
    let mut counts: BTreeMap<Outcome, usize> = BTreeMap::new();
    for outcome in legal_text::batch_outcomes(cases) {
        *counts.entry(outcome).or_insert(0) += 1;
    }
    let total: usize = counts.values().sum();
    counts
        .into_iter()
        .map(|(outcome, count)| {
            (
                outcome,
                OutcomeShare {
                    count,
                    percentage: percentage(count, total),
                },
            )
        })
        .collect()
}

/// Tags from the last 90 days, most frequent first.
pub fn emerging_topics(cases: &[&CaseRecord], as_of: NaiveDate) -> Vec<EmergingTopic> {
    let cutoff = as_of - ChronoDuration::days(EMERGING_WINDOW_DAYS);
    let recent = cases
        .iter()
        .copied()
        .filter(|c| c.judgment_date.is_some_and(|d| d >= cutoff));

    ranked_tags(recent)
        .into_iter()
        .take(TOP_EMERGING)
        .map(|(topic, recent_cases)| EmergingTopic {
            topic,
            recent_cases,
            growth_rate: "increasing",
            significance: if recent_cases > 5 { "high" } else { "medium" },
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TrendKey {
    period_days: u32,
    court: Option<String>,
    as_of: NaiveDate,
    fingerprint: String,
}

/// Trend reports over caller-supplied snapshots, memoised with a TTL and
/// a capacity bound.
pub struct TrendAnalyzer {
    memo: Mutex<LruCache<TrendKey, (Instant, TrendReport)>>,
    ttl: Duration,
}

impl TrendAnalyzer {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(FALLBACK_MEMO_CAPACITY);
        info!(
            ttl_secs = ttl.as_secs(),
            capacity = capacity.get(),
            "Trend analyzer initialized"
        );
        Self {
            memo: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    fn fingerprint(cases: &[CaseRecord]) -> String {
        let mut hasher = blake3::Hasher::new();
        for case in cases {
            hasher.update(case.id.as_bytes());
            hasher.update(&[0]);
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Analyse judgments from the last `period_days` before `as_of`,
    /// optionally restricted to one court (exact name).
    pub fn analyze(&self, cases: &[CaseRecord], period_days: u32, court: Option<&str>, as_of: NaiveDate) -> TrendReport {
        let key = TrendKey {
            period_days,
            court: court.map(str::to_string),
            as_of,
            fingerprint: Self::fingerprint(cases),
        };

        {
            let mut memo = self.memo.lock();
            match memo.get(&key) {
                Some((stored_at, report)) if stored_at.elapsed() < self.ttl => {
                    debug!(period_days = period_days, court = ?court, "Trend report served from memo");
                    return report.clone();
                }
                Some(_) => {
                    memo.pop(&key);
                }
                None => {}
            }
        }

        let cutoff = as_of - ChronoDuration::days(period_days as i64);
        let window: Vec<&CaseRecord> = cases
            .iter()
            .filter(|c| c.judgment_date.is_some_and(|d| d >= cutoff))
            .filter(|c| court.map_or(true, |name| c.court == name))
            .collect();

        if window.is_empty() {
            debug!(period_days = period_days, court = ?court, "No judgments in window");
            return TrendReport::empty();
        }

        let courts: BTreeSet<&str> = window.iter().map(|c| c.court.as_str()).collect();
        let report = TrendReport {
            case_type_trends: case_type_trends(&window),
            court_trends: court_trends(&window),
            tag_trends: tag_trends(&window),
            temporal_trends: temporal_trends(&window, period_days, as_of),
            outcome_trends: outcome_trends(&window),
            emerging_topics: emerging_topics(&window, as_of),
            analysis_metadata: AnalysisMetadata {
                time_period_days: period_days,
                total_cases: window.len(),
                courts_analyzed: courts.len(),
                analysis_date: Utc::now(),
                status: "ok",
            },
        };

        info!(
            period_days = period_days,
            court = ?court,
            cases = window.len(),
            courts = courts.len(),
            "Trend analysis complete"
        );

        self.memo.lock().put(key, (Instant::now(), report.clone()));
        report
    }

    pub fn memo_len(&self) -> usize {
        self.memo.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn case(id: &str, court: &str, days_ago: i64, tags: &[&str], decision: &str) -> CaseRecord {
        let mut record = CaseRecord::new(id, format!("Case {id}"), court, 0.5);
        record.judgment_date = Some(as_of() - ChronoDuration::days(days_ago));
        record.tags = tags.iter().map(|t| t.to_string()).collect();
        record.ai_summary = json!({ "decision": decision });
        record
    }

    fn snapshot() -> Vec<CaseRecord> {
        vec![
            case("c1", "Delhi High Court", 10, &["arbitration", "commercial"], "Appeal allowed"),
            case("c2", "Delhi High Court", 45, &["arbitration"], "Petition dismissed"),
            case("c3", "Bombay High Court", 200, &["tax"], "Relief granted"),
            case("c4", "Bombay High Court", 800, &["tax"], "Appeal allowed"),
        ]
    }

    #[test]
    fn test_full_report() {
        let analyzer = TrendAnalyzer::new(Duration::from_secs(3600), 8);
        let report = analyzer.analyze(&snapshot(), 365, None, as_of());

        assert_eq!(report.analysis_metadata.total_cases, 3);
        assert_eq!(report.analysis_metadata.courts_analyzed, 2);
        assert_eq!(report.analysis_metadata.status, "ok");

        assert_eq!(report.case_type_trends["judgment"].count, 3);
        assert_eq!(report.case_type_trends["judgment"].percentage, 100.0);

        let delhi = &report.court_trends["Delhi High Court"];
        assert_eq!(delhi.case_count, 2);
        assert_eq!(delhi.avg_relevance, 0.5);
        assert_eq!(delhi.court_activity, "low");

        assert_eq!(report.tag_trends[0].tag, "arbitration");
        assert_eq!(report.tag_trends[0].frequency, 2);
        assert_eq!(report.tag_trends[0].trend_status, "cool");

        assert_eq!(report.temporal_trends.monthly_counts.len(), 12);
        let latest = report.temporal_trends.monthly_counts.last().unwrap();
        assert_eq!(latest.month, "2024-06");
        assert_eq!(latest.case_count, 1);

        let petitioner = &report.outcome_trends[&Outcome::PetitionerFavorable];
        assert_eq!(petitioner.count, 2);
        assert_eq!(petitioner.percentage, 66.67);

        let topics: Vec<&str> = report.emerging_topics.iter().map(|t| t.topic.as_str()).collect();
        assert_eq!(topics, vec!["arbitration", "commercial"]);
        assert_eq!(report.emerging_topics[0].significance, "medium");
    }

    #[test]
    fn test_court_filter() {
        let analyzer = TrendAnalyzer::new(Duration::from_secs(3600), 8);
        let report = analyzer.analyze(&snapshot(), 365, Some("Bombay High Court"), as_of());
        assert_eq!(report.analysis_metadata.total_cases, 1);
        assert!(report.emerging_topics.is_empty());
    }

    #[test]
    fn test_empty_window_is_no_data() {
        let analyzer = TrendAnalyzer::new(Duration::from_secs(3600), 8);
        let report = analyzer.analyze(&snapshot(), 5, Some("Madras High Court"), as_of());
        assert!(report.is_empty());
        assert_eq!(report.analysis_metadata.time_period_days, 0);
        assert!(report.temporal_trends.monthly_counts.is_empty());
        assert_eq!(analyzer.memo_len(), 0);
    }

    #[test]
    fn test_memo_keyed_by_snapshot() {
        let analyzer = TrendAnalyzer::new(Duration::from_secs(3600), 8);
        let first = analyzer.analyze(&snapshot(), 365, None, as_of());
        let again = analyzer.analyze(&snapshot(), 365, None, as_of());
        assert_eq!(first, again);
        assert_eq!(analyzer.memo_len(), 1);

        let mut changed = snapshot();
        changed.pop();
        changed.push(case("c9", "Madras High Court", 3, &["labour"], "dismissed"));
        let other = analyzer.analyze(&changed, 365, None, as_of());
        assert_eq!(other.analysis_metadata.courts_analyzed, 3);
        assert_eq!(analyzer.memo_len(), 2);
    }

    #[test]
    fn test_memo_evicts_past_capacity() {
        let analyzer = TrendAnalyzer::new(Duration::from_secs(3600), 3);
        for period_days in 300..310 {
            analyzer.analyze(&snapshot(), period_days, None, as_of());
        }
        assert_eq!(analyzer.memo_len(), 3);

        // The most recent keys survive and are still served.
        let report = analyzer.analyze(&snapshot(), 309, None, as_of());
        assert_eq!(report.analysis_metadata.time_period_days, 309);
        assert_eq!(analyzer.memo_len(), 3);
    }

    #[test]
    fn test_zero_capacity_falls_back() {
        let analyzer = TrendAnalyzer::new(Duration::from_secs(3600), 0);
        analyzer.analyze(&snapshot(), 365, None, as_of());
        assert_eq!(analyzer.memo_len(), 1);
    }

    #[test]
    fn test_expired_memo_recomputes() {
        let analyzer = TrendAnalyzer::new(Duration::from_millis(10), 8);
        analyzer.analyze(&snapshot(), 365, None, as_of());
        std::thread::sleep(Duration::from_millis(30));
        let report = analyzer.analyze(&snapshot(), 365, None, as_of());
        assert_eq!(report.analysis_metadata.total_cases, 3);
        assert_eq!(analyzer.memo_len(), 1);
    }

    #[test]
    fn test_activity_and_status_thresholds() {
        assert_eq!(court_activity(51), "high");
        assert_eq!(court_activity(21), "medium");
        assert_eq!(court_activity(20), "low");
        assert_eq!(tag_status(11), "hot");
        assert_eq!(tag_status(6), "warm");
        assert_eq!(tag_status(5), "cool");
    }
}
