// =============================================================================
// analytics/relevance.rs — THE FIRST-CUT RELEVANCE SCORE
// =============================================================================
//
// Before anybody reranks anything, somebody has to say how well a judgment
// matches the query at all. This is that somebody: plain TF-IDF over
// unigrams and bigrams, English stop words out, smoothed IDF, L2-normalised
// vectors, cosine similarity. The vocabulary is fitted on the documents
// being scored, capped at the most frequent terms.
// =============================================================================

use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use tracing::debug;

use crate::models::CaseRecord;

pub const MAX_FEATURES: usize = 5000;
const PREVIEW_CHARS: usize = 200;

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any", "are", "as",
        "at", "be", "because", "been", "before", "being", "below", "between", "both", "but", "by", "can",
        "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from", "further", "had",
        "has", "have", "having", "he", "her", "here", "hers", "him", "his", "how", "i", "if", "in", "into", "is",
        "it", "its", "itself", "just", "me", "more", "most", "my", "no", "nor", "not", "now", "of", "off", "on",
        "once", "only", "or", "other", "our", "out", "over", "own", "same", "she", "should", "so", "some",
        "such", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "those",
        "through", "to", "too", "under", "until", "up", "upon", "very", "was", "we", "were", "what", "when",
        "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your",
    ]
    .into_iter()
    .collect()
});

/// Lowercase, split on anything that isn't alphanumeric, drop stop words and
/// single characters.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1 && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Unigrams followed by bigrams of adjacent kept tokens.
pub fn terms(text: &str) -> Vec<String> {
    let tokens = tokenize(text);
    let bigrams: Vec<String> = tokens.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])).collect();
    let mut out = tokens;
    out.extend(bigrams);
    out
}

fn term_counts(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for term in terms(text) {
        *counts.entry(term).or_insert(0) += 1;
    }
    counts
}

type SparseVector = HashMap<usize, f64>;

/// A TF-IDF vocabulary fitted on a corpus.
pub struct TfIdfIndex {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    documents: Vec<SparseVector>,
}

impl TfIdfIndex {
    pub fn fit<S: AsRef<str> + Sync>(documents: &[S]) -> Self {
        let counted: Vec<HashMap<String, usize>> =
            documents.par_iter().map(|d| term_counts(d.as_ref())).collect();

        let mut totals: HashMap<&str, (usize, usize)> = HashMap::new();
        for doc in &counted {
            for (term, count) in doc {
                let entry = totals.entry(term.as_str()).or_insert((0, 0));
                entry.0 += count;
                entry.1 += 1;
            }
        }

        let mut ranked: Vec<(&str, usize, usize)> = totals.into_iter().map(|(t, (tf, df))| (t, tf, df)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(MAX_FEATURES);

        let n = documents.len() as f64;
        let mut vocabulary = HashMap::with_capacity(ranked.len());
        let mut idf = Vec::with_capacity(ranked.len());
        for (index, (term, _, df)) in ranked.into_iter().enumerate() {
            vocabulary.insert(term.to_string(), index);
            idf.push(((1.0 + n) / (1.0 + df as f64)).ln() + 1.0);
        }

        let mut index = Self {
            vocabulary,
            idf,
            documents: Vec::new(),
        };
        let vectors = counted.iter().map(|c| index.vectorize_counts(c)).collect();
        index.documents = vectors;

        debug!(
            documents = documents.len(),
            vocabulary = index.vocabulary.len(),
            "TF-IDF index fitted"
        );
        index
    }

    fn vectorize_counts(&self, counts: &HashMap<String, usize>) -> SparseVector {
        let mut vector: SparseVector = counts
            .iter()
            .filter_map(|(term, count)| {
                self.vocabulary
                    .get(term)
                    .map(|&i| (i, *count as f64 * self.idf[i]))
            })
            .collect();

        let norm = vector.values().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in vector.values_mut() {
                *value /= norm;
            }
        }
        vector
    }

    pub fn vectorize(&self, text: &str) -> SparseVector {
        self.vectorize_counts(&term_counts(text))
    }

    /// Cosine similarity between `query` and every fitted document, in
    /// corpus order.
    pub fn similarities(&self, query: &str) -> Vec<f64> {
        let query = self.vectorize(query);
        self.documents
            .iter()
            .map(|doc| {
                query
                    .iter()
                    .filter_map(|(i, q)| doc.get(i).map(|d| q * d))
                    .sum::<f64>()
            })
            .collect()
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let mut cut: String = text.chars().take(PREVIEW_CHARS).collect();
        cut.push_str("...");
        cut
    } else {
        text.to_string()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoredCase {
    pub case_id: String,
    pub case_title: String,
    pub court: String,
    pub judgment_date: Option<chrono::NaiveDate>,
    pub tags: Vec<String>,
    pub relevance_score: f64,
    pub document_preview: String,
}

/// Score each record's searchable text against `query`, best first.
pub fn score_records(query: &str, records: &[CaseRecord]) -> Vec<ScoredCase> {
    if records.is_empty() {
        return Vec::new();
    }

    let texts: Vec<String> = records.iter().map(CaseRecord::searchable_text).collect();
    let index = TfIdfIndex::fit(&texts);
    let scores = index.similarities(query);

    let mut scored: Vec<ScoredCase> = records
        .iter()
        .zip(texts.iter())
        .zip(scores)
        .map(|((record, text), score)| ScoredCase {
            case_id: record.id.clone(),
            case_title: record.title.clone(),
            court: record.court.clone(),
            judgment_date: record.judgment_date,
            tags: record.tags.iter().cloned().collect(),
            relevance_score: score,
            document_preview: preview(text),
        })
        .collect();

    scored.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    scored
}

/// The same records with `relevance_score` replaced by the TF-IDF score,
/// ready to be reranked. Input order is kept.
pub fn with_baselines(query: &str, records: Vec<CaseRecord>) -> Vec<CaseRecord> {
    if records.is_empty() {
        return records;
    }
    let texts: Vec<String> = records.iter().map(CaseRecord::searchable_text).collect();
    let scores = TfIdfIndex::fit(&texts).similarities(query);
    records
        .into_iter()
        .zip(scores)
        .map(|(mut record, score)| {
            record.relevance_score = score;
            record
        })
        .collect()
}
