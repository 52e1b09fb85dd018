// =============================================================================
// ai/mod.rs — THE AI FAÇADE
// =============================================================================
//
// The models do the reading. This module does the bookkeeping around them:
//
//   backend   — "send a system prompt and a user prompt, get text back"
//   coerce    — turn whatever text came back into the JSON shapes we promised
//   processor — the breaker, the cache, the prompts and the fallbacks
//
// Nothing here ever lets a model failure reach a judge as an error page. The
// worst case is an empty list, a cached answer, or a prediction that says it
// couldn't predict.
// =============================================================================

pub mod backend;
pub mod coerce;
pub mod processor;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("{service} service is currently unavailable")]
    Unavailable { service: String },

    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid chat endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("chat service returned no content")]
    EmptyResponse,

    #[error("model output is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model output has an unexpected shape: {0}")]
    Shape(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LegalPrinciple {
    pub principle: String,
    pub context: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CaseSummary {
    pub summary: String,
    pub key_points: Vec<String>,
    pub decision: String,
    pub implications: String,
    pub statutes_cited: Vec<String>,
    pub precedents_cited: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrecedentMatch {
    pub case_id: String,
    pub relevance_score: f64,
    pub reasoning: String,
    pub legal_principles: Vec<String>,
}

/// A candidate precedent offered to the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PrecedentCandidate {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub citation: String,
    #[serde(default)]
    pub summary: String,
}

/// Features of the case whose outcome is being predicted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CaseFeatures {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub court: String,
    #[serde(default)]
    pub case_type: String,
    #[serde(default)]
    pub judgment_date: Option<chrono::NaiveDate>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub citation: String,
}

impl From<&crate::models::CaseRecord> for CaseFeatures {
    fn from(record: &crate::models::CaseRecord) -> Self {
        Self {
            title: record.title.clone(),
            court: record.court.clone(),
            case_type: record.case_type.to_string(),
            judgment_date: record.judgment_date,
            tags: record.tags.iter().cloned().collect(),
            citation: record.citation.clone(),
        }
    }
}

/// One line of outcome history for the prediction prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HistoricalCase {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub court: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutcomePrediction {
    pub predicted_outcome: String,
    pub confidence: f64,
    pub key_factors: Vec<String>,
    pub similar_cases: Vec<serde_json::Value>,
    pub risk_assessment: serde_json::Value,
    pub fallback_used: bool,
}

impl OutcomePrediction {
    /// What we say when the model can't be asked.
    pub fn fallback() -> Self {
        Self {
            predicted_outcome: "Unable to predict due to service limitations".to_string(),
            confidence: 0.0,
            key_factors: vec!["AI service unavailable".to_string()],
            similar_cases: Vec::new(),
            risk_assessment: serde_json::Value::String("Cannot assess risk at this time".to_string()),
            fallback_used: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingMetadata {
    pub processed_at: chrono::DateTime<chrono::Utc>,
    pub services_used: Vec<String>,
}

/// Everything the processor could work out about one judgment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessedDocument {
    pub case_id: String,
    pub principles: Vec<LegalPrinciple>,
    pub summary: Option<CaseSummary>,
    pub precedents: Vec<PrecedentMatch>,
    pub processing_metadata: ProcessingMetadata,
}
