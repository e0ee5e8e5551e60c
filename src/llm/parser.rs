use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::llm::provider::RawResult;
use crate::models::{Dimension, DimensionScore};

#[derive(Deserialize)]
struct ScorePayload {
    scores: Vec<RawScore>,
    #[serde(default)]
    patterns: Option<Value>,
    #[serde(default)]
    functions: Option<Value>,
    #[serde(default)]
    classes: Option<Value>,
}

/// A validated reply for one chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedReply {
    /// One per expected dimension, ordered by dimension.
    pub scores: Vec<DimensionScore>,
    /// Design patterns named by the model, trimmed and de-duplicated.
    pub patterns: Vec<String>,
    pub function_count: Option<usize>,
    pub class_count: Option<usize>,
}

#[derive(Deserialize)]
struct RawScore {
    dimension: String,
    value: Value,
    #[serde(default)]
    rationale: String,
}

/// Validates a model reply and returns one score per expected dimension,
/// ordered by dimension. Dimensions that were not asked for are ignored.
pub fn parse_dimension_scores(
    raw: &RawResult,
    expected: &[Dimension],
) -> Result<Vec<DimensionScore>> {
    parse_reply(raw, expected).map(|reply| reply.scores)
}

/// Like [`parse_dimension_scores`], also keeping the optional pattern list
/// and definition counts. Those are advisory: a missing or ill-typed value
/// is dropped instead of rejecting the reply.
pub fn parse_reply(raw: &RawResult, expected: &[Dimension]) -> Result<ParsedReply> {
    let payload = match &raw.structured {
        Some(value) => value.clone(),
        None => {
            let json_str = extract_json(&raw.text)
                .ok_or_else(|| Error::malformed("no JSON object found", &raw.text))?;
            serde_json::from_str(&json_str)
                .map_err(|e| Error::malformed(format!("invalid JSON: {}", e), &raw.text))?
        }
    };

    let payload: ScorePayload = serde_json::from_value(payload)
        .map_err(|e| Error::malformed(format!("unexpected shape: {}", e), &raw.text))?;

    let mut found: BTreeMap<Dimension, DimensionScore> = BTreeMap::new();
    for score in payload.scores {
        let Ok(dimension) = score.dimension.parse::<Dimension>() else {
            tracing::debug!("Ignoring unknown dimension '{}'", score.dimension);
            continue;
        };
        if !expected.contains(&dimension) {
            continue;
        }

        let value = score
            .value
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                Error::malformed(
                    format!("{} value is not a number: {}", dimension, score.value),
                    &raw.text,
                )
            })?;
        if !(0.0..=100.0).contains(&value) {
            return Err(Error::malformed(
                format!("{} value {} outside 0-100", dimension, value),
                &raw.text,
            ));
        }

        let rationale = score.rationale.trim();
        if rationale.is_empty() {
            return Err(Error::malformed(
                format!("{} rationale is empty", dimension),
                &raw.text,
            ));
        }

        let entry = DimensionScore {
            dimension,
            value,
            rationale: rationale.to_string(),
        };
        if found.insert(dimension, entry).is_some() {
            return Err(Error::malformed(
                format!("{} scored more than once", dimension),
                &raw.text,
            ));
        }
    }

    let mut missing: Vec<_> = expected.iter().filter(|d| !found.contains_key(d)).collect();
    if !missing.is_empty() {
        missing.dedup();
        let names: Vec<_> = missing.iter().map(|d| d.as_str()).collect();
        return Err(Error::malformed(
            format!("missing dimensions: {}", names.join(", ")),
            &raw.text,
        ));
    }

    Ok(ParsedReply {
        scores: found.into_values().collect(),
        patterns: pattern_list(payload.patterns.as_ref()),
        function_count: count(payload.functions.as_ref(), "functions"),
        class_count: count(payload.classes.as_ref(), "classes"),
    })
}

fn pattern_list(value: Option<&Value>) -> Vec<String> {
    let Some(items) = value.and_then(Value::as_array) else {
        if value.is_some_and(|v| !v.is_null()) {
            tracing::debug!("Ignoring non-list patterns field");
        }
        return Vec::new();
    };

    let mut patterns: Vec<String> = Vec::new();
    for name in items.iter().filter_map(Value::as_str).map(str::trim) {
        if !name.is_empty() && !patterns.iter().any(|p| p.eq_ignore_ascii_case(name)) {
            patterns.push(name.to_string());
        }
    }
    patterns
}

fn count(value: Option<&Value>, field: &str) -> Option<usize> {
    let value = value.filter(|v| !v.is_null())?;
    let parsed = value.as_u64().and_then(|n| usize::try_from(n).ok());
    if parsed.is_none() {
        tracing::debug!("Ignoring {} count {}", field, value);
    }
    parsed
}

/// Pulls the first JSON object out of free-form model output.
pub fn extract_json(text: &str) -> Option<String> {
    // Fenced ```json block
    if let Some(start) = text.find("```json") {
        let start = start + 7;
        if let Some(end) = text[start..].find("```") {
            return Some(text[start..start + end].trim().to_string());
        }
    }

    // Plain fence
    if let Some(start) = text.find("```") {
        let start = start + 3;
        // Skip any language identifier on the same line
        let start = text[start..]
            .find('\n')
            .map(|i| start + i + 1)
            .unwrap_or(start);
        if let Some(end) = text[start..].find("```") {
            let content = text[start..start + end].trim();
            if content.starts_with('{') {
                return Some(content.to_string());
            }
        }
    }

    // Balanced raw object
    let start = text.find('{')?;
    let mut depth = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (offset, c) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + c.len_utf8();
                    return Some(text[start..end].to_string());
                }
            }
            _ => {}
        }
    }

    None
}
