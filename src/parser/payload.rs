//! Post-hoc validation of the model's extraction payload
//!
//! Nothing the model returns is trusted on parse. Every field is read as a
//! raw JSON value and checked against the shape the pipeline needs; bad
//! fields are dropped one at a time, a bad document drops them all.

use serde::Deserialize;
use serde_json::Value;

use crate::llm::extract_json_object;
use crate::telemetry::Degradation;
use crate::types::{FilterField, Predicate, StructuredQuery};

/// Placeholder strings models emit instead of null
const ABSENT_MARKERS: &[&str] = &["", "null", "none", "n/a", "na", "any", "unknown", "unspecified"];

/// Fields the extraction schema defines. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExtractionPayload {
    search_phrase: Option<Value>,
    /// Older schema key for the phrase; used when `search_phrase` is unusable
    rewrite: Option<Value>,
    category: Option<Value>,
    color: Option<Value>,
    brand: Option<Value>,
    gender: Option<Value>,
    price_min: Option<Value>,
    price_max: Option<Value>,
}

/// Outcome of interpreting one completion
#[derive(Debug, Clone)]
pub struct Interpretation {
    pub query: StructuredQuery,
    pub degradations: Vec<Degradation>,
}

impl Interpretation {
    /// Raw-text fallback with the reason recorded
    pub fn fallback(raw: &str, reason: impl Into<String>) -> Self {
        Self {
            query: StructuredQuery::raw(raw),
            degradations: vec![Degradation::ParseDegraded {
                reason: reason.into(),
            }],
        }
    }
}

/// Turn a completion into a structured query. Never fails.
pub fn interpret(raw: &str, completion: &str) -> Interpretation {
    let Some(object) = extract_json_object(completion) else {
        return Interpretation::fallback(raw, "completion contained no JSON object");
    };

    let payload: ExtractionPayload = match serde_json::from_str(object) {
        Ok(payload) => payload,
        Err(e) => return Interpretation::fallback(raw, format!("malformed JSON: {}", e)),
    };

    let mut degradations = Vec::new();
    let mut filters = Vec::new();

    let text_fields = [
        (FilterField::Category, &payload.category),
        (FilterField::Color, &payload.color),
        (FilterField::Brand, &payload.brand),
        (FilterField::Gender, &payload.gender),
    ];
    for (field, value) in text_fields {
        match text_predicate(field, value.as_ref()) {
            Ok(Some(predicate)) => filters.push(predicate),
            Ok(None) => {}
            Err(reason) => degradations.push(Degradation::FilterRejected { field, reason }),
        }
    }

    let mut price_min = numeric_bound(FilterField::PriceMin, payload.price_min.as_ref(), &mut degradations);
    let price_max = numeric_bound(FilterField::PriceMax, payload.price_max.as_ref(), &mut degradations);

    if let (Some(min), Some(max)) = (price_min, price_max) {
        if min > max {
            degradations.push(Degradation::FilterRejected {
                field: FilterField::PriceMin,
                reason: format!("price_min {} exceeds price_max {}", min, max),
            });
            price_min = None;
        }
    }
    filters.extend(price_min.map(Predicate::price_min));
    filters.extend(price_max.map(Predicate::price_max));

    let phrase = [&payload.search_phrase, &payload.rewrite]
        .into_iter()
        .find_map(|value| match value {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        })
        .unwrap_or("");

    Interpretation {
        query: StructuredQuery::new(phrase, raw, filters),
        degradations,
    }
}

fn is_absent(s: &str) -> bool {
    ABSENT_MARKERS.contains(&s.trim().to_lowercase().as_str())
}

fn text_predicate(field: FilterField, value: Option<&Value>) -> Result<Option<Predicate>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if is_absent(s) => Ok(None),
        Some(Value::String(s)) => Ok(Some(Predicate::text(field, s.trim()))),
        Some(Value::Array(items)) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) if !is_absent(s) => values.push(s.trim().to_string()),
                    Value::String(_) | Value::Null => {}
                    other => return Err(format!("expected text values, got {}", other)),
                }
            }
            Ok(match values.len() {
                0 => None,
                1 => values.pop().map(|v| Predicate::text(field, v)),
                _ => Some(Predicate::any_of(field, values)),
            })
        }
        Some(other) => Err(format!("expected text, got {}", other)),
    }
}

/// Parse a numeric bound; strings are accepted only if they parse as a number
/// once currency symbols and thousands separators are removed.
fn parse_amount(value: &Value) -> Result<Option<f64>, String> {
    let amount = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("unrepresentable number {}", n))?,
        Value::String(s) if is_absent(s) => return Ok(None),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_start_matches(['$', '€', '£'])
                .chars()
                .filter(|c| *c != ',')
                .collect();
            cleaned
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", s))?
        }
        other => return Err(format!("expected a number, got {}", other)),
    };

    if !amount.is_finite() || amount < 0.0 {
        return Err(format!("{} is not a valid price", amount));
    }
    Ok(Some(amount))
}

fn numeric_bound(
    field: FilterField,
    value: Option<&Value>,
    degradations: &mut Vec<Degradation>,
) -> Option<f64> {
    let value = value?;
    match parse_amount(value) {
        Ok(amount) => amount,
        Err(reason) => {
            degradations.push(Degradation::FilterRejected { field, reason });
            None
        }
    }
}
