// =============================================================================
// jurisdiction/insights.rs — THE BRIEFING NOTE
// =============================================================================
//
// Before a judge takes up a matter, it helps to know the house rules and how
// the house has been ruling lately. Three parts:
//
// 1. Guidance: procedural requirements, timelines, local legislation and tips
//    straight off the rule book.
// 2. Local context: the court's recent judgments of the same type, boiled
//    down to outcomes, recurring tags and how long matters take.
// 3. Recommendations: the two above turned into a short to-do list.
//
// The engine never queries the case table. The caller ships the candidate
// cases with the job and we do the filtering here.
// =============================================================================

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::jurisdiction::rules::{CourtRules, DocumentFormat, ProceduralCode, RuleBook};
use crate::legal_text;
use crate::models::{CaseRecord, CaseType, Outcome};

/// Only judgments from the last two years count as local context.
pub const CONTEXT_WINDOW_DAYS: i64 = 2 * 365;
const MAX_CONTEXT_CASES: usize = 20;
const MAX_LISTED_CASES: usize = 10;
const MAX_COMMON_TAGS: usize = 10;
const MAX_KEY_POINTS: usize = 3;

const LONG_DURATION_DAYS: f64 = 200.0;
const QUICK_DURATION_DAYS: f64 = 100.0;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProceduralRequirements {
    pub fast_track_available: bool,
    pub mediation_required: bool,
    pub specialized_division: bool,
    pub document_format: DocumentFormat,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimelineInformation {
    pub expected_duration_days: u32,
    pub appeal_period_days: u32,
    /// 0.5 where fast-track procedures exist, 1.0 otherwise.
    pub fast_track_reduction: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JurisdictionGuidance {
    pub court_name: String,
    pub case_type: String,
    pub procedural_requirements: ProceduralRequirements,
    pub timeline_information: TimelineInformation,
    pub local_legislation: Vec<String>,
    pub procedural_code: Option<ProceduralCode>,
    pub procedural_tips: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct LocalPatterns {
    pub common_outcomes: BTreeMap<Outcome, usize>,
    pub common_tags: Vec<(String, usize)>,
    pub average_duration_days: f64,
    pub total_cases_analyzed: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecentLocalCase {
    pub id: String,
    pub title: String,
    pub citation: String,
    pub judgment_date: Option<NaiveDate>,
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocalContext {
    Found {
        court_name: String,
        case_type: CaseType,
        local_patterns: LocalPatterns,
        recent_local_cases: Vec<RecentLocalCase>,
        context_summary: String,
    },
    CourtNotFound {
        court_name: String,
    },
}

impl LocalContext {
    fn patterns(&self) -> Option<&LocalPatterns> {
        match self {
            LocalContext::Found { local_patterns, .. } => Some(local_patterns),
            LocalContext::CourtNotFound { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JurisdictionInsights {
    pub local_context: LocalContext,
    pub procedural_guidance: JurisdictionGuidance,
    pub recommendations: Vec<String>,
    pub insight_date: chrono::DateTime<Utc>,
}

/// Tips that follow directly from the court's rules.
pub fn procedural_tips(rules: &CourtRules) -> Vec<String> {
    let mut tips = Vec::new();

    if rules.fast_track_procedures {
        tips.push("Consider applying for fast-track proceedings to expedite resolution".to_string());
    }
    if rules.mediation_mandatory {
        tips.push("Mediation is mandatory - prepare settlement proposals".to_string());
    }
    if rules.commercial_court_division {
        tips.push("Case will be heard in specialized commercial division".to_string());
    }
    match rules.document_filing_format {
        DocumentFormat::Digital => {
            tips.push("Ensure all documents are in digital format as per court requirements".to_string())
        }
        DocumentFormat::Hybrid => {
            tips.push("Both digital and physical documents accepted - prepare both formats".to_string())
        }
        DocumentFormat::Traditional => {}
    }
    if !rules.local_acts.is_empty() {
        let acts: Vec<&str> = rules.local_acts.iter().take(3).map(String::as_str).collect();
        tips.push(format!("Be aware of applicable local legislation: {}", acts.join(", ")));
    }

    tips
}

/// Procedural guidance for a court and case type. Unknown courts get the
/// default rules; unknown case types get no procedural code.
pub fn guidance(rules: &RuleBook, court: &str, case_type: &str) -> JurisdictionGuidance {
    let court_rules = rules.court_rules(court);

    JurisdictionGuidance {
        court_name: court.to_string(),
        case_type: case_type.to_string(),
        procedural_requirements: ProceduralRequirements {
            fast_track_available: court_rules.fast_track_procedures,
            mediation_required: court_rules.mediation_mandatory,
            specialized_division: court_rules.commercial_court_division,
            document_format: court_rules.document_filing_format,
        },
        timeline_information: TimelineInformation {
            expected_duration_days: court_rules.case_time_limit_days,
            appeal_period_days: court_rules.appeal_period_days,
            fast_track_reduction: if court_rules.fast_track_procedures { 0.5 } else { 1.0 },
        },
        local_legislation: court_rules.local_acts.clone(),
        procedural_code: rules.procedural_code(case_type).cloned(),
        procedural_tips: procedural_tips(court_rules),
    }
}

/// Outcome buckets used in local patterns: only the two sides, or other.
fn side_of(record: &CaseRecord) -> Option<Outcome> {
    record.decision_text()?;
    Some(match legal_text::record_outcome(record) {
        outcome @ (Outcome::PetitionerFavorable | Outcome::RespondentFavorable) => outcome,
        _ => Outcome::Other,
    })
}

/// Outcome, tag and duration patterns across a set of cases.
pub fn analyze_patterns(cases: &[&CaseRecord]) -> LocalPatterns {
    if cases.is_empty() {
        return LocalPatterns::default();
    }

    let mut common_outcomes = BTreeMap::new();
    for outcome in cases.iter().filter_map(|c| side_of(c)) {
        *common_outcomes.entry(outcome).or_insert(0) += 1;
    }

    let mut tag_counts: HashMap<&str, usize> = HashMap::new();
    for tag in cases.iter().flat_map(|c| c.tags.iter()) {
        *tag_counts.entry(tag.as_str()).or_insert(0) += 1;
    }
    let mut common_tags: Vec<(String, usize)> =
        tag_counts.into_iter().map(|(tag, count)| (tag.to_string(), count)).collect();
    common_tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    common_tags.truncate(MAX_COMMON_TAGS);

    let durations: Vec<i64> = cases.iter().filter_map(|c| c.duration_days()).collect();
    let average_duration_days = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<i64>() as f64 / durations.len() as f64
    };

    LocalPatterns {
        common_outcomes,
        common_tags,
        average_duration_days,
        total_cases_analyzed: cases.len(),
    }
}

/// One-line narrative: dominant outcome, duration, procedural notes.
pub fn context_summary(patterns: &LocalPatterns, guidance: &JurisdictionGuidance) -> String {
    let mut parts = Vec::new();

    let classified: usize = patterns.common_outcomes.values().sum();
    if let Some((outcome, count)) = patterns
        .common_outcomes
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
    {
        let share = *count as f64 / classified as f64 * 100.0;
        parts.push(format!("Most common outcome: {outcome} ({share:.0}% of cases)"));
    }

    if patterns.average_duration_days > 0.0 {
        parts.push(format!(
            "Average case duration: {} days",
            patterns.average_duration_days as i64
        ));
    }

    if guidance.procedural_requirements.fast_track_available {
        parts.push("Fast-track procedures are available".to_string());
    }
    if guidance.procedural_requirements.mediation_required {
        parts.push("Mediation is mandatory".to_string());
    }

    parts.join(" | ")
}

/// Recent same-type cases from the court, summarised.
///
/// A case belongs to the court when its court name mentions the first word
/// of the requested court. When no supplied case does, the court is
/// reported as not found.
pub fn local_context(
    rules: &RuleBook,
    court: &str,
    case_type: CaseType,
    cases: &[CaseRecord],
    as_of: NaiveDate,
) -> LocalContext {
    let first_word = court
        .split_whitespace()
        .next()
        .map(str::to_lowercase)
        .unwrap_or_default();

    let court_cases: Vec<&CaseRecord> = cases
        .iter()
        .filter(|c| !first_word.is_empty() && legal_text::mentions(&c.court.to_lowercase(), &first_word))
        .collect();

    let Some(resolved) = court_cases.first().map(|c| c.court.clone()) else {
        debug!(court = court, "No cases for court — local context unavailable");
        return LocalContext::CourtNotFound {
            court_name: court.to_string(),
        };
    };

    let recent: Vec<&CaseRecord> = court_cases
        .into_iter()
        .filter(|c| c.court == resolved && c.case_type == case_type)
        .filter(|c| {
            c.judgment_date
                .map(|d| (as_of - d).num_days() <= CONTEXT_WINDOW_DAYS)
                .unwrap_or(false)
        })
        .take(MAX_CONTEXT_CASES)
        .collect();

    let local_patterns = analyze_patterns(&recent);
    let court_guidance = guidance(rules, &resolved, &case_type.to_string());
    let context_summary = context_summary(&local_patterns, &court_guidance);

    let recent_local_cases = recent
        .iter()
        .take(MAX_LISTED_CASES)
        .map(|c| RecentLocalCase {
            id: c.id.clone(),
            title: c.title.clone(),
            citation: c.citation.clone(),
            judgment_date: c.judgment_date,
            key_points: c.key_points(MAX_KEY_POINTS),
        })
        .collect();

    LocalContext::Found {
        court_name: resolved,
        case_type,
        local_patterns,
        recent_local_cases,
        context_summary,
    }
}

/// Turn guidance and local context into concrete advice.
pub fn recommendations(guidance: &JurisdictionGuidance, context: &LocalContext) -> Vec<String> {
    let mut out = Vec::new();
    let reqs = &guidance.procedural_requirements;

    if reqs.fast_track_available {
        out.push("Consider filing for fast-track proceedings to reduce resolution time".to_string());
    }
    if reqs.mediation_required {
        out.push("Prepare for mandatory mediation process".to_string());
    }
    if reqs.document_format == DocumentFormat::Digital {
        out.push("Ensure all documentation is in digital format as per court requirements".to_string());
    }

    let average = context.patterns().map(|p| p.average_duration_days).unwrap_or(0.0);
    if average > LONG_DURATION_DAYS {
        out.push("Cases in this jurisdiction typically take longer than average - plan accordingly".to_string());
    } else if average < QUICK_DURATION_DAYS {
        out.push("This jurisdiction has relatively quick resolution times".to_string());
    }

    if !guidance.local_legislation.is_empty() {
        let acts: Vec<&str> = guidance.local_legislation.iter().take(2).map(String::as_str).collect();
        out.push(format!("Pay special attention to: {}", acts.join(", ")));
    }

    out
}

/// Guidance, local context and recommendations in one bundle.
///
/// `matter_type` (e.g. `commercial_disputes`) keys the procedural code
/// lookup. Without it the document type is used, which matches no code in
/// the built-in rule book.
pub fn insights(
    rules: &RuleBook,
    court: &str,
    case_type: CaseType,
    matter_type: Option<&str>,
    cases: &[CaseRecord],
    as_of: NaiveDate,
) -> JurisdictionInsights {
    let local_context = local_context(rules, court, case_type, cases, as_of);
    let procedural_guidance = match matter_type.map(str::trim).filter(|m| !m.is_empty()) {
        Some(matter) => guidance(rules, court, matter),
        None => guidance(rules, court, &case_type.to_string()),
    };
    let recommendations = recommendations(&procedural_guidance, &local_context);

    JurisdictionInsights {
        local_context,
        procedural_guidance,
        recommendations,
        insight_date: Utc::now(),
    }
}
