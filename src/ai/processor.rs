// =============================================================================
// ai/processor.rs — THE RESEARCH ASSISTANT
// =============================================================================
//
// Every question the engine asks a language model goes through here, and
// every one follows the same routine:
//
//   1. Is the answer already on the shelf? (response cache, content-hashed)
//   2. Is the service available? (circuit breaker)
//   3. Ask. Parse. Coerce into shape.
//   4. Tell the breaker how it went. Put a good answer on the shelf.
//
// Calls are awaited one after another. A document that needs principles, a
// summary and precedents makes three sequential trips, and each trip can
// fail without taking the other two down.
// =============================================================================

use chrono::Utc;
use serde_json::Value;
use std::fmt::Write as _;
use tracing::{debug, info, warn};

use super::backend::{ChatBackend, ChatRequest};
use super::{
    coerce, AiError, CaseFeatures, CaseSummary, HistoricalCase, LegalPrinciple, OutcomePrediction,
    PrecedentCandidate, PrecedentMatch, ProcessedDocument, ProcessingMetadata,
};
use crate::circuit_breaker::CircuitBreaker;
use crate::models::{CaseRecord, Customization};
use crate::response_cache::ResponseCache;

const DOCUMENT_CHARS: usize = 4000;
const PRECEDENT_CASE_CHARS: usize = 2000;
const CANDIDATE_SUMMARY_CHARS: usize = 200;
const MAX_CANDIDATES: usize = 10;
const MAX_HISTORY: usize = 10;

const LEGAL_EXPERT: &str = "You are a legal expert AI assistant.";
const SUMMARY_EXPERT: &str = "You are a legal expert providing case summaries for judicial officers.";
const RESEARCH_EXPERT: &str = "You are a legal research expert AI.";
const ANALYTICS_EXPERT: &str = "You are a legal analytics expert providing case outcome predictions.";

/// The first `max` characters of `text`, on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

pub fn principles_prompt(text: &str) -> String {
    format!(
        "Extract the key legal principles from this legal document.\n\
         Return them as a JSON array where each principle has:\n\
         - principle: The legal principle statement\n\
         - context: Brief context/explanation\n\
         - confidence: Confidence score (0-1)\n\n\
         Document text:\n{}",
        truncate_chars(text, DOCUMENT_CHARS)
    )
}

/// Focus areas and the precedent/statute lean, as prompt instructions.
pub fn customization_context(customization: Option<&Customization>) -> String {
    let Some(custom) = customization else {
        return String::new();
    };
    let mut context = String::new();
    if !custom.analysis_focus_areas.is_empty() {
        let _ = write!(context, "\nFocus on these areas: {}", custom.analysis_focus_areas.join(", "));
    }
    if custom.precedent_statute_weight > 0.6 {
        context.push_str("\nEmphasize statutory interpretation over precedent.");
    } else if custom.precedent_statute_weight < 0.4 {
        context.push_str("\nEmphasize case law precedent over statutory interpretation.");
    }
    context
}

pub fn summary_prompt(text: &str, customization: Option<&Customization>) -> String {
    format!(
        "Generate a comprehensive summary of this legal case as a JSON object with:\n\
         - summary: Brief overview of the case\n\
         - key_points: Main legal issues and decisions\n\
         - decision: Final judgment and its implications\n\
         - implications: Broader legal implications\n\
         - statutes_cited: Key statutes mentioned\n\
         - precedents_cited: Important precedents referenced\n\
         {}\n\n\
         Case text:\n{}",
        customization_context(customization),
        truncate_chars(text, DOCUMENT_CHARS)
    )
}

pub fn precedents_prompt(text: &str, candidates: &[PrecedentCandidate]) -> String {
    let mut database = String::new();
    for (i, candidate) in candidates.iter().take(MAX_CANDIDATES).enumerate() {
        let _ = writeln!(
            database,
            "Case {} (id {}): {} - {} - {}",
            i + 1,
            candidate.id,
            candidate.title,
            candidate.citation,
            truncate_chars(&candidate.summary, CANDIDATE_SUMMARY_CHARS)
        );
    }
    format!(
        "Given the current case and a database of precedents, identify the most relevant precedents.\n\
         Return a JSON array with:\n\
         - case_id: ID of the precedent case\n\
         - relevance_score: Score 0-1 indicating relevance\n\
         - reasoning: Why this precedent is relevant\n\
         - legal_principles: Common legal principles\n\n\
         Current Case:\n{}\n\n\
         Precedent Database:\n{}",
        truncate_chars(text, PRECEDENT_CASE_CHARS),
        database.trim_end()
    )
}

pub fn history_summary(history: &[HistoricalCase]) -> String {
    if history.is_empty() {
        return "No historical data available.".to_string();
    }
    history
        .iter()
        .take(MAX_HISTORY)
        .enumerate()
        .map(|(i, case)| {
            format!(
                "Case {}: {} - Outcome: {} - Duration: {} - Court: {}",
                i + 1,
                case.title,
                case.outcome,
                case.duration,
                case.court
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn prediction_prompt(features: &CaseFeatures, history: &[HistoricalCase]) -> String {
    let features = serde_json::to_string_pretty(features).unwrap_or_default();
    format!(
        "Based on historical case data and current case features, predict the likely outcome.\n\
         Provide a JSON object with:\n\
         - predicted_outcome: Likely judgment\n\
         - confidence: Confidence score (0-1)\n\
         - key_factors: Main factors influencing prediction\n\
         - similar_cases: Historical cases with similar outcomes\n\
         - risk_assessment: Risk level and factors\n\n\
         Current Case Features:\n{}\n\n\
         Historical Data Summary:\n{}",
        features,
        history_summary(history)
    )
}

/// Breaker, cache and prompts around a chat backend.
pub struct LegalTextProcessor<B> {
    backend: B,
    breaker: CircuitBreaker,
    cache: ResponseCache,
}

impl<B: ChatBackend> LegalTextProcessor<B> {
    pub fn new(backend: B, breaker: CircuitBreaker, cache: ResponseCache) -> Self {
        info!(
            backend = backend.name(),
            breaker = breaker.name(),
            "Legal text processor initialized"
        );
        Self { backend, breaker, cache }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// One guarded round trip: breaker check, call, JSON parse, bookkeeping.
    async fn ask(&self, system: &str, user: String, temperature: f32, max_tokens: u32) -> Result<Value, AiError> {
        if !self.breaker.allow_request() {
            return Err(AiError::Unavailable {
                service: self.backend.name().to_string(),
            });
        }

        let request = ChatRequest {
            system: system.to_string(),
            user,
            temperature,
            max_tokens,
        };

        let outcome = match self.backend.complete(request).await {
            Ok(raw) => coerce::parse_json(&raw),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(value) => {
                self.breaker.record_success();
                Ok(value)
            }
            Err(e) => {
                self.breaker.record_failure();
                warn!(backend = self.backend.name(), error = %e, "AI service error");
                Err(e)
            }
        }
    }

    /// A shape error after a successful round trip still counts against the
    /// service: the model did not do what it was asked.
    fn shaped<T>(&self, result: Result<T, AiError>) -> Result<T, AiError> {
        if let Err(e) = &result {
            self.breaker.record_failure();
            warn!(backend = self.backend.name(), error = %e, "AI response could not be coerced");
        }
        result
    }

    pub async fn extract_legal_principles(&self, text: &str) -> Result<Vec<LegalPrinciple>, AiError> {
        let key = ResponseCache::content_key("principles", text);
        if let Some(cached) = self.cache.get_typed::<Vec<LegalPrinciple>>(&key) {
            return Ok(cached);
        }

        let value = self.ask(LEGAL_EXPERT, principles_prompt(text), 0.1, 1500).await?;
        let principles = self.shaped(coerce::principles(value))?;

        self.cache.put_typed(key, &principles);
        debug!(principles = principles.len(), "Legal principles extracted");
        Ok(principles)
    }

    pub async fn generate_case_summary(
        &self,
        text: &str,
        customization: Option<&Customization>,
    ) -> Result<CaseSummary, AiError> {
        let context = customization_context(customization);
        let key = ResponseCache::content_key("summary", &format!("{context}\u{0}{text}"));
        if let Some(cached) = self.cache.get_typed::<CaseSummary>(&key) {
            return Ok(cached);
        }

        let value = self.ask(SUMMARY_EXPERT, summary_prompt(text, customization), 0.2, 2000).await?;
        let summary = self.shaped(coerce::summary(value))?;

        self.cache.put_typed(key, &summary);
        Ok(summary)
    }

    pub async fn identify_precedents(
        &self,
        text: &str,
        candidates: &[PrecedentCandidate],
    ) -> Result<Vec<PrecedentMatch>, AiError> {
        let value = self
            .ask(RESEARCH_EXPERT, precedents_prompt(text, candidates), 0.1, 1500)
            .await?;
        let mut matches = self.shaped(coerce::precedents(value))?;
        matches.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        Ok(matches)
    }

    /// Never fails: an unavailable or misbehaving service yields the
    /// fallback prediction.
    pub async fn predict_case_outcome(&self, features: &CaseFeatures, history: &[HistoricalCase]) -> OutcomePrediction {
        let result = match self
            .ask(ANALYTICS_EXPERT, prediction_prompt(features, history), 0.1, 1500)
            .await
        {
            Ok(value) => self.shaped(coerce::prediction(value)),
            Err(e) => Err(e),
        };

        match result {
            Ok(prediction) => prediction,
            Err(e) => {
                warn!(error = %e, "Prediction failed — using fallback");
                OutcomePrediction::fallback()
            }
        }
    }

    /// Principles, summary and precedents for one judgment.
    ///
    /// `text` defaults to the record's snippet when empty. Each step degrades
    /// on its own. Only a result where every attempted step succeeded is
    /// cached, under the case id.
    pub async fn process_document(
        &self,
        case: &CaseRecord,
        text: &str,
        customization: Option<&Customization>,
        candidates: &[PrecedentCandidate],
    ) -> ProcessedDocument {
        let key = format!("document:{}", case.id);
        if let Some(cached) = self.cache.get_typed::<ProcessedDocument>(&key) {
            return cached;
        }

        let text = if text.is_empty() { case.snippet.as_str() } else { text };
        let mut services_used = Vec::new();
        let mut degraded = false;

        let principles = match self.extract_legal_principles(text).await {
            Ok(principles) => {
                services_used.push("chat_principles".to_string());
                principles
            }
            Err(e) => {
                degraded = true;
                warn!(case_id = %case.id, error = %e, "Principle extraction failed");
                Vec::new()
            }
        };

        let summary = match self.generate_case_summary(text, customization).await {
            Ok(summary) => {
                services_used.push("chat_summary".to_string());
                Some(summary)
            }
            Err(e) => {
                degraded = true;
                warn!(case_id = %case.id, error = %e, "Summary generation failed");
                None
            }
        };

        let candidates: Vec<PrecedentCandidate> = candidates.iter().filter(|c| c.id != case.id).cloned().collect();
        let precedents = if candidates.is_empty() {
            Vec::new()
        } else {
            match self.identify_precedents(text, &candidates).await {
                Ok(precedents) => {
                    services_used.push("chat_precedents".to_string());
                    precedents
                }
                Err(e) => {
                    degraded = true;
                    warn!(case_id = %case.id, error = %e, "Precedent identification failed");
                    Vec::new()
                }
            }
        };

        let document = ProcessedDocument {
            case_id: case.id.clone(),
            principles,
            summary,
            precedents,
            processing_metadata: ProcessingMetadata {
                processed_at: Utc::now(),
                services_used,
            },
        };

        if degraded {
            info!(case_id = %case.id, "Document processed with degraded steps — not caching");
        } else {
            self.cache.put_typed(key, &document);
        }
        document
    }
}
