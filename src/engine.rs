// =============================================================================
// engine.rs — THE REGISTRY
// =============================================================================
//
// The web app writes a job slip, drops it on the Redis list, and waits for a
// result with the same job id. This module reads the slips and routes each
// one to the part of the engine that can answer it:
//
//   rerank / score / insights / trends  → pure computation, never fails
//   principles / summarize / precedents → the AI façade, may degrade
//   predict / process_document          → the AI façade, always answers
//
// A slip that can't be read still gets an answer if we can find its job id
// in the wreckage. Otherwise the web app times out and the intake counts it.
// =============================================================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::ai::backend::ChatBackend;
use crate::ai::processor::LegalTextProcessor;
use crate::ai::{CaseFeatures, HistoricalCase, PrecedentCandidate};
use crate::analytics::relevance;
use crate::analytics::trends::TrendAnalyzer;
use crate::jurisdiction::{self, insights, rules::RuleBook};
use crate::models::{CaseRecord, CaseType, Customization};

fn new_job_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_period_days() -> u32 {
    30
}

/// What the job asks for. The `kind` field on the wire picks the variant.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    /// Jurisdiction filter and local emphasis. With a `query`, baselines are
    /// recomputed by TF-IDF first.
    Rerank {
        court: String,
        records: Vec<CaseRecord>,
        #[serde(default)]
        customization: Option<Customization>,
        #[serde(default)]
        query: Option<String>,
    },
    Score {
        query: String,
        records: Vec<CaseRecord>,
    },
    Insights {
        court: String,
        #[serde(default)]
        case_type: CaseType,
        /// Procedural code key, e.g. `commercial_disputes`.
        #[serde(default)]
        matter_type: Option<String>,
        #[serde(default)]
        cases: Vec<CaseRecord>,
    },
    Trends {
        #[serde(default)]
        cases: Vec<CaseRecord>,
        #[serde(default = "default_period_days")]
        period_days: u32,
        #[serde(default)]
        court: Option<String>,
    },
    Summarize {
        text: String,
        #[serde(default)]
        customization: Option<Customization>,
    },
    Principles {
        text: String,
    },
    Precedents {
        text: String,
        #[serde(default)]
        candidates: Vec<PrecedentCandidate>,
    },
    Predict {
        #[serde(default)]
        features: CaseFeatures,
        #[serde(default)]
        history: Vec<HistoricalCase>,
    },
    ProcessDocument {
        case: CaseRecord,
        #[serde(default)]
        text: String,
        #[serde(default)]
        customization: Option<Customization>,
        #[serde(default)]
        candidates: Vec<PrecedentCandidate>,
    },
}

impl JobKind {
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::Rerank { .. } => "rerank",
            JobKind::Score { .. } => "score",
            JobKind::Insights { .. } => "insights",
            JobKind::Trends { .. } => "trends",
            JobKind::Summarize { .. } => "summarize",
            JobKind::Principles { .. } => "principles",
            JobKind::Precedents { .. } => "precedents",
            JobKind::Predict { .. } => "predict",
            JobKind::ProcessDocument { .. } => "process_document",
        }
    }
}

/// One job slip.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineJob {
    #[serde(default = "new_job_id")]
    pub job_id: String,

    /// The day recency and trend windows are measured from. Default: today.
    #[serde(default)]
    pub as_of: Option<NaiveDate>,

    #[serde(flatten)]
    pub kind: JobKind,
}

/// What the web app gets back under the job id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineResult {
    pub job_id: String,
    pub kind: String,
    pub ok: bool,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl EngineResult {
    pub fn success(job_id: impl Into<String>, kind: impl Into<String>, payload: Value) -> Self {
        Self {
            job_id: job_id.into(),
            kind: kind.into(),
            ok: true,
            payload,
            error: None,
            completed_at: Utc::now(),
        }
    }

    /// A failed job still carries whatever degraded payload was available.
    pub fn failure(job_id: impl Into<String>, kind: impl Into<String>, payload: Value, error: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            kind: kind.into(),
            ok: false,
            payload,
            error: Some(error.into()),
            completed_at: Utc::now(),
        }
    }
}

/// A slip that didn't parse, with whatever identity could be salvaged.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedJob {
    pub job_id: Option<String>,
    pub kind: Option<String>,
    pub error: String,
}

impl MalformedJob {
    /// The error result to publish, if there is a job id to publish it under.
    pub fn into_result(self) -> Option<EngineResult> {
        let job_id = self.job_id?;
        let kind = self.kind.unwrap_or_else(|| "unknown".to_string());
        Some(EngineResult::failure(job_id, kind, Value::Null, format!("malformed job: {}", self.error)))
    }
}

pub fn parse_job(raw: &str) -> Result<EngineJob, MalformedJob> {
    serde_json::from_str::<EngineJob>(raw).map_err(|e| {
        let salvaged = serde_json::from_str::<Value>(raw).ok();
        let field = |name: &str| {
            salvaged
                .as_ref()
                .and_then(|v| v.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        MalformedJob {
            job_id: field("job_id"),
            kind: field("kind"),
            error: e.to_string(),
        }
    })
}

fn to_payload<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        warn!(error = %e, "Result payload could not be serialised");
        Value::Null
    })
}

/// Everything a job can be routed to.
pub struct Engine<B> {
    rules: RuleBook,
    processor: LegalTextProcessor<B>,
    trends: TrendAnalyzer,
}

impl<B: ChatBackend> Engine<B> {
    pub fn new(rules: RuleBook, processor: LegalTextProcessor<B>, trends: TrendAnalyzer) -> Self {
        Self { rules, processor, trends }
    }

    pub async fn handle(&self, job: EngineJob) -> EngineResult {
        let EngineJob { job_id, as_of, kind } = job;
        let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
        let name = kind.name();
        debug!(job_id = %job_id, kind = name, "Handling job");

        match kind {
            JobKind::Rerank {
                court,
                records,
                customization,
                query,
            } => {
                let records = match query {
                    Some(query) => relevance::with_baselines(&query, records),
                    None => records,
                };
                let outcome = jurisdiction::rerank(records, &court, &self.rules, customization.as_ref(), as_of);
                EngineResult::success(job_id, name, to_payload(&outcome))
            }

            JobKind::Score { query, records } => {
                let scored = relevance::score_records(&query, &records);
                EngineResult::success(job_id, name, to_payload(&scored))
            }

            JobKind::Insights {
                court,
                case_type,
                matter_type,
                cases,
            } => {
                let report = insights::insights(&self.rules, &court, case_type, matter_type.as_deref(), &cases, as_of);
                EngineResult::success(job_id, name, to_payload(&report))
            }

            JobKind::Trends {
                cases,
                period_days,
                court,
            } => {
                let report = self.trends.analyze(&cases, period_days, court.as_deref(), as_of);
                EngineResult::success(job_id, name, to_payload(&report))
            }

            JobKind::Summarize { text, customization } => {
                match self.processor.generate_case_summary(&text, customization.as_ref()).await {
                    Ok(summary) => EngineResult::success(job_id, name, to_payload(&summary)),
                    Err(e) => EngineResult::failure(job_id, name, Value::Null, e.to_string()),
                }
            }

            JobKind::Principles { text } => match self.processor.extract_legal_principles(&text).await {
                Ok(principles) => EngineResult::success(job_id, name, to_payload(&principles)),
                Err(e) => EngineResult::failure(job_id, name, Value::Array(Vec::new()), e.to_string()),
            },

            JobKind::Precedents { text, candidates } => {
                match self.processor.identify_precedents(&text, &candidates).await {
                    Ok(matches) => EngineResult::success(job_id, name, to_payload(&matches)),
                    Err(e) => EngineResult::failure(job_id, name, Value::Array(Vec::new()), e.to_string()),
                }
            }

            JobKind::Predict { features, history } => {
                let prediction = self.processor.predict_case_outcome(&features, &history).await;
                EngineResult::success(job_id, name, to_payload(&prediction))
            }

            JobKind::ProcessDocument {
                case,
                text,
                customization,
                candidates,
            } => {
                let document = self
                    .processor
                    .process_document(&case, &text, customization.as_ref(), &candidates)
                    .await;
                EngineResult::success(job_id, name, to_payload(&document))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AiError;
    use crate::ai::backend::ChatRequest;
    use crate::circuit_breaker::CircuitBreaker;
    use crate::response_cache::ResponseCache;
    use std::time::Duration;

    /// A chat service that is always down.
    struct OfflineBackend;

    impl ChatBackend for OfflineBackend {
        fn name(&self) -> &str {
            "offline"
        }

        async fn complete(&self, _request: ChatRequest) -> Result<String, AiError> {
            Err(AiError::Status {
                status: 503,
                body: "maintenance".to_string(),
            })
        }
    }

    fn engine() -> Engine<OfflineBackend> {
        Engine::new(
            RuleBook::builtin(),
            LegalTextProcessor::new(
                OfflineBackend,
                CircuitBreaker::new("offline", 5, Duration::from_secs(300)),
                ResponseCache::new(10, Duration::from_secs(60)),
            ),
            TrendAnalyzer::new(Duration::from_secs(60), 16),
        )
    }

    #[test]
    fn test_parse_rerank_job() {
        let job = parse_job(
            r#"{"job_id": "j1", "kind": "rerank", "court": "Delhi High Court",
                "as_of": "2024-06-01",
                "records": [{"id": "c1", "court": "Delhi High Court", "relevance_score": 0.5}]}"#,
        )
        .unwrap();
        assert_eq!(job.job_id, "j1");
        assert_eq!(job.kind.name(), "rerank");
        assert_eq!(job.as_of, NaiveDate::from_ymd_opt(2024, 6, 1));
    }

    #[test]
    fn test_missing_job_id_is_generated() {
        let job = parse_job(r#"{"kind": "principles", "text": "x"}"#).unwrap();
        assert!(uuid::Uuid::parse_str(&job.job_id).is_ok());
    }

    #[test]
    fn test_malformed_job_salvages_identity() {
        let malformed = parse_job(r#"{"job_id": "j9", "kind": "rerank", "court": 42}"#).unwrap_err();
        assert_eq!(malformed.job_id.as_deref(), Some("j9"));
        let result = malformed.into_result().unwrap();
        assert!(!result.ok);
        assert_eq!(result.kind, "rerank");
        assert!(result.error.unwrap().starts_with("malformed job"));

        let hopeless = parse_job("not json at all").unwrap_err();
        assert!(hopeless.job_id.is_none());
        assert!(hopeless.into_result().is_none());
    }

    #[test]
    fn test_unknown_kind_is_malformed() {
        let malformed = parse_job(r#"{"job_id": "j3", "kind": "translate"}"#).unwrap_err();
        assert_eq!(malformed.kind.as_deref(), Some("translate"));
    }

    #[tokio::test]
    async fn test_rerank_boosts_local_court() {
        let job = parse_job(
            r#"{"job_id": "j1", "kind": "rerank", "court": "Delhi High Court",
                "records": [
                    {"id": "far", "court": "Bombay High Court", "relevance_score": 0.5},
                    {"id": "near", "court": "Delhi High Court", "relevance_score": 0.5}
                ]}"#,
        )
        .unwrap();
        let result = engine().handle(job).await;
        assert!(result.ok);
        assert_eq!(result.payload["results"][0]["id"], "near");
        assert_eq!(result.payload["fallback_used"], false);
    }

    #[tokio::test]
    async fn test_trends_without_data() {
        let job = parse_job(r#"{"job_id": "t1", "kind": "trends"}"#).unwrap();
        let result = engine().handle(job).await;
        assert!(result.ok);
        assert_eq!(result.payload["analysis_metadata"]["status"], "no_data");
    }

    #[tokio::test]
    async fn test_principles_degrade_to_empty_list() {
        let job = parse_job(r#"{"job_id": "p1", "kind": "principles", "text": "judgment"}"#).unwrap();
        let result = engine().handle(job).await;
        assert!(!result.ok);
        assert_eq!(result.payload, Value::Array(Vec::new()));
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_predict_always_answers() {
        let job = parse_job(r#"{"job_id": "x1", "kind": "predict"}"#).unwrap();
        let result = engine().handle(job).await;
        assert!(result.ok);
        assert_eq!(result.payload["fallback_used"], true);
    }

    #[tokio::test]
    async fn test_insights_for_unknown_court() {
        let job = parse_job(r#"{"job_id": "i1", "kind": "insights", "court": "Unknown Court"}"#).unwrap();
        let result = engine().handle(job).await;
        assert!(result.ok);
        assert_eq!(result.payload["local_context"]["status"], "court_not_found");
    }

    #[tokio::test]
    async fn test_insights_matter_type_reaches_procedural_code() {
        let job = parse_job(
            r#"{"job_id": "i2", "kind": "insights", "court": "Delhi High Court",
                "matter_type": "commercial_disputes"}"#,
        )
        .unwrap();
        let result = engine().handle(job).await;
        assert!(result.ok);
        let guidance = &result.payload["procedural_guidance"];
        assert_eq!(guidance["case_type"], "commercial_disputes");
        assert_eq!(guidance["procedural_code"]["procedure"], "summary_judgment");
    }

    #[tokio::test]
    async fn test_rerank_ignores_unknown_preference_values() {
        let job = parse_job(
            r#"{"job_id": "r2", "kind": "rerank", "court": "Delhi High Court", "as_of": "2024-06-01",
                "customization": {"jurisdiction_emphasis": {"legal_emphasis": "mixed", "time_period_focus": "Weekly"}},
                "records": [
                    {"id": "cited", "court": "Bombay High Court", "relevance_score": 0.5,
                     "judgment_date": "2024-05-01",
                     "precedents_cited": ["p1", "p2", "p3", "p4", "p5", "p6", "p7", "p8", "p9", "p10", "p11"],
                     "statutes_cited": ["s1", "s2", "s3", "s4", "s5", "s6"]},
                    {"id": "near", "court": "Delhi High Court", "relevance_score": 0.5}
                ]}"#,
        )
        .unwrap();
        let result = engine().handle(job).await;
        assert!(result.ok);

        let results = result.payload["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["id"], "near");
        for ranked in results {
            assert_eq!(ranked["emphasis_factors"]["citation_boost"], false);
            assert_eq!(ranked["emphasis_factors"]["recency_boost"], false);
        }
    }
}
