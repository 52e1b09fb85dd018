// =============================================================================
// models.rs — THE CASE FILE
// =============================================================================
//
// Everything the engine reads or writes about a judgment lives here. The
// persistence layer owns the real rows; we only ever see snapshots of them,
// score the snapshots, and hand back annotated copies. Nobody in this crate
// gets to scribble on the baseline relevance score. Not the jurisdiction
// filter, not the emphasis engine, not even the intern.
// =============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// What kind of document the judgment is.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CaseType {
    #[default]
    Judgment,
    Order,
    Interim,
    Appeal,
    Revision,
}

impl fmt::Display for CaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseType::Judgment => write!(f, "judgment"),
            CaseType::Order => write!(f, "order"),
            CaseType::Interim => write!(f, "interim"),
            CaseType::Appeal => write!(f, "appeal"),
            CaseType::Revision => write!(f, "revision"),
        }
    }
}

/// A snapshot of one judgment as the search layer handed it to us.
///
/// The web app serialises these straight out of its case table, so every
/// field except the identity ones is optional on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseRecord {
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub citation: String,

    /// Court name as stored on the case, e.g. "Delhi High Court".
    #[serde(default)]
    pub court: String,

    #[serde(default)]
    pub case_type: CaseType,

    #[serde(default)]
    pub judgment_date: Option<NaiveDate>,

    #[serde(default)]
    pub decision_date: Option<NaiveDate>,

    /// Free text: the search snippet or the headnotes, whichever we got.
    #[serde(default)]
    pub snippet: String,

    /// The AI summary blob. Opaque to the ranking code; the analytics code
    /// only ever peeks at its `decision` and `key_points` keys.
    #[serde(default)]
    pub ai_summary: serde_json::Value,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default)]
    pub statutes_cited: Vec<String>,

    #[serde(default)]
    pub precedents_cited: Vec<String>,

    /// Baseline relevance from the search layer. Read-only for reranking.
    #[serde(default)]
    pub relevance_score: f64,

    #[serde(default)]
    pub view_count: u64,
}

impl CaseRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>, court: impl Into<String>, relevance_score: f64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            citation: String::new(),
            court: court.into(),
            case_type: CaseType::Judgment,
            judgment_date: None,
            decision_date: None,
            snippet: String::new(),
            ai_summary: serde_json::Value::Null,
            tags: BTreeSet::new(),
            statutes_cited: Vec::new(),
            precedents_cited: Vec::new(),
            relevance_score,
            view_count: 0,
        }
    }

    /// Title, snippet and tags glued together for text scoring.
    pub fn searchable_text(&self) -> String {
        let mut text = String::with_capacity(self.title.len() + self.snippet.len() + 64);
        text.push_str(&self.title);
        text.push(' ');
        text.push_str(&self.snippet);
        for tag in &self.tags {
            text.push(' ');
            text.push_str(tag);
        }
        text
    }

    /// The `decision` line of the AI summary, if the summary has one.
    pub fn decision_text(&self) -> Option<&str> {
        self.ai_summary.get("decision").and_then(|d| d.as_str())
    }

    /// Up to `limit` key points from the AI summary.
    pub fn key_points(&self, limit: usize) -> Vec<String> {
        self.ai_summary
            .get("key_points")
            .and_then(|k| k.as_array())
            .map(|points| {
                points
                    .iter()
                    .filter_map(|p| p.as_str())
                    .take(limit)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Days between judgment and decision, when both dates are known.
    pub fn duration_days(&self) -> Option<i64> {
        match (self.judgment_date, self.decision_date) {
            (Some(judgment), Some(decision)) => Some((decision - judgment).num_days()),
            _ => None,
        }
    }
}

/// Why the jurisdiction filter boosted (or didn't boost) a case.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JurisdictionFactors {
    pub local_court: bool,
    pub local_acts_cited: bool,
    pub procedural_match: bool,
}

/// Where a judgment came from, relative to the court doing the searching.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CourtCategory {
    SameCourt,
    SupremeCourt,
    OtherHighCourt,
    International,
    Uncategorized,
}

impl fmt::Display for CourtCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CourtCategory::SameCourt => write!(f, "same_court"),
            CourtCategory::SupremeCourt => write!(f, "supreme_court"),
            CourtCategory::OtherHighCourt => write!(f, "other_high_court"),
            CourtCategory::International => write!(f, "international"),
            CourtCategory::Uncategorized => write!(f, "uncategorized"),
        }
    }
}

/// Breakdown of the local emphasis pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmphasisFactors {
    pub court_category: CourtCategory,
    pub category_weight: f64,
    /// Record court mentions the first word of the target court.
    pub local_court_boost: bool,
    pub recency_boost: bool,
    pub citation_boost: bool,
    /// emphasized / jurisdiction-boosted, 1.0 when the latter is zero.
    pub precedent_weight: f64,
}

/// A case after reranking. The original record rides along untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedCase {
    #[serde(flatten)]
    pub record: CaseRecord,

    pub jurisdiction_boosted_score: f64,

    #[serde(default)]
    pub jurisdiction_factors: Option<JurisdictionFactors>,

    pub emphasized_score: f64,

    #[serde(default)]
    pub emphasis_factors: Option<EmphasisFactors>,
}

impl RankedCase {
    /// Wrap a record with every score equal to its baseline and no factors.
    /// This is what both passes hand back when they give up.
    pub fn passthrough(record: CaseRecord) -> Self {
        let baseline = record.relevance_score;
        Self {
            record,
            jurisdiction_boosted_score: baseline,
            jurisdiction_factors: None,
            emphasized_score: baseline,
            emphasis_factors: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriodFocus {
    #[default]
    Recent,
    Medium,
    Historical,
    Custom,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LegalEmphasis {
    #[default]
    Balanced,
    Precedent,
    Statute,
    #[serde(other)]
    Other,
}

/// The raw preference map a user saved against a suit. Keys we don't know
/// about are kept so an "empty" check means exactly that: no keys at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EmphasisPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_period_focus: Option<TimePeriodFocus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_emphasis: Option<LegalEmphasis>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl EmphasisPreferences {
    pub fn is_empty(&self) -> bool {
        self.time_period_focus.is_none() && self.legal_emphasis.is_none() && self.extra.is_empty()
    }
}

fn default_precedent_statute_weight() -> f64 {
    0.5
}

/// Per (user, suit) customization record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customization {
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub suit_id: Option<String>,

    #[serde(default)]
    pub jurisdiction_emphasis: EmphasisPreferences,

    /// 0.0 leans on precedent, 1.0 leans on statute.
    #[serde(default = "default_precedent_statute_weight")]
    pub precedent_statute_weight: f64,

    #[serde(default)]
    pub analysis_focus_areas: Vec<String>,

    #[serde(default)]
    pub language_preferences: Vec<String>,
}

impl Default for Customization {
    fn default() -> Self {
        Self {
            user_id: None,
            suit_id: None,
            jurisdiction_emphasis: EmphasisPreferences::default(),
            precedent_statute_weight: default_precedent_statute_weight(),
            analysis_focus_areas: Vec::new(),
            language_preferences: Vec::new(),
        }
    }
}

/// How a judgment came out, read off the AI summary's decision line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    PetitionerFavorable,
    RespondentFavorable,
    Partial,
    Remanded,
    Other,
    Unknown,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::PetitionerFavorable => write!(f, "petitioner_favorable"),
            Outcome::RespondentFavorable => write!(f, "respondent_favorable"),
            Outcome::Partial => write!(f, "partial"),
            Outcome::Remanded => write!(f, "remanded"),
            Outcome::Other => write!(f, "other"),
            Outcome::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_preference_values_fall_back_to_other() {
        let prefs: EmphasisPreferences = serde_json::from_str(
            r#"{"legal_emphasis": "mixed", "time_period_focus": "Weekly", "tone": "formal"}"#,
        )
        .unwrap();
        assert_eq!(prefs.legal_emphasis, Some(LegalEmphasis::Other));
        assert_eq!(prefs.time_period_focus, Some(TimePeriodFocus::Other));
        assert!(prefs.extra.contains_key("tone"));
        assert!(!prefs.is_empty());
    }

    #[test]
    fn test_minimal_record_deserializes_with_defaults() {
        let record: CaseRecord =
            serde_json::from_str(r#"{"id": "c1", "court": "Delhi High Court"}"#).unwrap();
        assert_eq!(record.case_type, CaseType::Judgment);
        assert_eq!(record.relevance_score, 0.0);
        assert!(record.ai_summary.is_null());
        assert!(record.tags.is_empty());
    }

    #[test]
    fn test_ranked_case_flattens_record() {
        let ranked = RankedCase::passthrough(CaseRecord::new("c1", "A v. B", "Bombay High Court", 0.4));
        let json = serde_json::to_value(&ranked).unwrap();
        assert_eq!(json["id"], "c1");
        assert_eq!(json["relevance_score"], 0.4);
        assert_eq!(json["emphasized_score"], 0.4);
    }

    #[test]
    fn test_unknown_preference_keys_make_map_non_empty() {
        let prefs: EmphasisPreferences = serde_json::from_str(r#"{"focus": "tax"}"#).unwrap();
        assert!(!prefs.is_empty());
        assert!(prefs.time_period_focus.is_none());

        let empty: EmphasisPreferences = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_summary_accessors() {
        let mut record = CaseRecord::new("c1", "A v. B", "Madras High Court", 1.0);
        record.ai_summary = serde_json::json!({
            "decision": "Appeal allowed",
            "key_points": ["one", "two", "three", "four"]
        });
        record.judgment_date = NaiveDate::from_ymd_opt(2022, 1, 1);
        record.decision_date = NaiveDate::from_ymd_opt(2022, 3, 2);
        assert_eq!(record.decision_text(), Some("Appeal allowed"));
        assert_eq!(record.key_points(3).len(), 3);
        assert_eq!(record.duration_days(), Some(60));
    }
}
