// =============================================================================
// ai/coerce.rs — MAKING THE MODEL'S HOMEWORK FIT THE FORM
// =============================================================================
//
// Ask a model for "a JSON array" and you will get, on a good day, a JSON
// array. On other days: the array wrapped in ```json fences, an object with
// the array under some key of its choosing, confidences of 1.3 or "75%",
// case ids as numbers, key points as one long string. Everything here takes
// what came back and produces the shape the rest of the engine relies on,
// with defaults for whatever is missing.
// =============================================================================

use serde_json::{Map, Value};

use super::{AiError, CaseSummary, LegalPrinciple, OutcomePrediction, PrecedentMatch};

/// Remove a surrounding markdown code fence, with or without a language tag.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "JSON", ...) up to the first newline.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

pub fn parse_json(raw: &str) -> Result<Value, AiError> {
    Ok(serde_json::from_str(strip_code_fences(raw))?)
}

/// Clamp into [0, 1]. Non-numbers and NaN become 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// The list a model meant to return: the value itself when it's an array,
/// otherwise the first of `preferred_keys` holding an array, otherwise the
/// first array-valued field of the object.
pub fn extract_array(value: Value, preferred_keys: &[&str]) -> Result<Vec<Value>, AiError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            for key in preferred_keys {
                if let Some(Value::Array(items)) = map.remove(*key) {
                    return Ok(items);
                }
            }
            map.into_iter()
                .find_map(|(_, v)| match v {
                    Value::Array(items) => Some(items),
                    _ => None,
                })
                .ok_or_else(|| AiError::Shape("object contains no array".to_string()))
        }
        other => Err(AiError::Shape(format!("expected an array, got {}", type_name(&other)))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn text(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// A score as a fraction. Strings are parsed, "75%" reads as 0.75.
fn score(map: &Map<String, Value>, key: &str) -> f64 {
    let raw = match map.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => {
            let s = s.trim();
            match s.strip_suffix('%') {
                Some(pct) => pct.trim().parse::<f64>().map(|p| p / 100.0).unwrap_or(0.0),
                None => s.parse().unwrap_or(0.0),
            }
        }
        _ => 0.0,
    };
    clamp_unit(raw)
}

/// A list of strings, accepting a single string or a list of anything.
fn strings(map: &Map<String, Value>, key: &str) -> Vec<String> {
    match map.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

pub fn principles(value: Value) -> Result<Vec<LegalPrinciple>, AiError> {
    let items = extract_array(value, &["principles", "legal_principles"])?;
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(principle) => Some(LegalPrinciple {
                principle,
                context: String::new(),
                confidence: 0.0,
            }),
            Value::Object(map) => {
                let principle = text(&map, "principle");
                (!principle.is_empty()).then(|| LegalPrinciple {
                    principle,
                    context: text(&map, "context"),
                    confidence: score(&map, "confidence"),
                })
            }
            _ => None,
        })
        .collect())
}

pub fn summary(value: Value) -> Result<CaseSummary, AiError> {
    let map = match value {
        Value::Object(map) => map,
        other => return Err(AiError::Shape(format!("expected a summary object, got {}", type_name(&other)))),
    };
    Ok(CaseSummary {
        summary: text(&map, "summary"),
        key_points: strings(&map, "key_points"),
        decision: text(&map, "decision"),
        implications: text(&map, "implications"),
        statutes_cited: strings(&map, "statutes_cited"),
        precedents_cited: strings(&map, "precedents_cited"),
    })
}

pub fn precedents(value: Value) -> Result<Vec<PrecedentMatch>, AiError> {
    let items = extract_array(value, &["precedents", "relevant_precedents"])?;
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => {
                let case_id = text(&map, "case_id");
                (!case_id.is_empty()).then(|| PrecedentMatch {
                    case_id,
                    relevance_score: score(&map, "relevance_score"),
                    reasoning: text(&map, "reasoning"),
                    legal_principles: strings(&map, "legal_principles"),
                })
            }
            _ => None,
        })
        .collect())
}

pub fn prediction(value: Value) -> Result<OutcomePrediction, AiError> {
    let map = match value {
        Value::Object(map) => map,
        other => return Err(AiError::Shape(format!("expected a prediction object, got {}", type_name(&other)))),
    };
    let predicted_outcome = text(&map, "predicted_outcome");
    if predicted_outcome.is_empty() {
        return Err(AiError::Shape("prediction has no predicted_outcome".to_string()));
    }
    Ok(OutcomePrediction {
        predicted_outcome,
        confidence: score(&map, "confidence"),
        key_factors: strings(&map, "key_factors"),
        similar_cases: match map.get("similar_cases") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        },
        risk_assessment: map.get("risk_assessment").cloned().unwrap_or(Value::Null),
        fallback_used: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  [1]  "), "[1]");
    }

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(1.7), 1.0);
        assert_eq!(clamp_unit(-0.2), 0.0);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
        assert_eq!(clamp_unit(0.42), 0.42);
    }

    #[test]
    fn test_extract_array_from_wrapper_object() {
        let items = extract_array(json!({"note": "x", "principles": [1, 2]}), &["principles"]).unwrap();
        assert_eq!(items.len(), 2);
        let items = extract_array(json!({"results": [1]}), &["principles"]).unwrap();
        assert_eq!(items.len(), 1);
        assert!(extract_array(json!("nope"), &[]).is_err());
        assert!(extract_array(json!({"a": 1}), &[]).is_err());
    }

    #[test]
    fn test_principles_defaults_and_clamping() {
        let parsed = principles(json!([
            {"principle": "Audi alteram partem", "context": "Natural justice", "confidence": 0.9},
            {"principle": "Res judicata", "confidence": 8},
            {"principle": "Delay defeats equity", "confidence": "75%"},
            "Bare string principle",
            {"context": "no principle text"},
            42
        ]))
        .unwrap();
        assert_eq!(parsed.len(), 4);
        assert_eq!(parsed[0].confidence, 0.9);
        assert_eq!(parsed[1].confidence, 1.0);
        assert_eq!(parsed[1].context, "");
        assert_eq!(parsed[2].confidence, 0.75);
        assert_eq!(parsed[3].principle, "Bare string principle");
    }

    #[test]
    fn test_summary_coercion() {
        let parsed = summary(json!({
            "summary": "Eviction upheld.",
            "key_points": "Tenant defaulted on rent",
            "decision": "Appeal dismissed",
            "statutes_cited": ["Delhi Rent Control Act", 14]
        }))
        .unwrap();
        assert_eq!(parsed.key_points, vec!["Tenant defaulted on rent"]);
        assert_eq!(parsed.statutes_cited, vec!["Delhi Rent Control Act", "14"]);
        assert!(parsed.precedents_cited.is_empty());
        assert_eq!(parsed.implications, "");
        assert!(summary(json!([1])).is_err());
    }

    #[test]
    fn test_precedents_coercion() {
        let parsed = precedents(json!({"precedents": [
            {"case_id": 17, "relevance_score": 1.4, "reasoning": "Same statute"},
            {"reasoning": "no id"}
        ]}))
        .unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].case_id, "17");
        assert_eq!(parsed[0].relevance_score, 1.0);
    }

    #[test]
    fn test_prediction_requires_outcome() {
        assert!(prediction(json!({"confidence": 0.5})).is_err());
        let parsed = prediction(json!({
            "predicted_outcome": "Appeal likely allowed",
            "confidence": 0.7,
            "key_factors": ["Strong documentary evidence"],
            "risk_assessment": {"level": "low"}
        }))
        .unwrap();
        assert_eq!(parsed.confidence, 0.7);
        assert!(!parsed.fallback_used);
        assert_eq!(parsed.risk_assessment["level"], "low");
    }
}
