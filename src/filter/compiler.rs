//! Predicate validation and compilation to a store-neutral filter
//!
//! The compiled form is a conjunction of clauses. Stores translate it to
//! their native syntax (`store::qdrant`) or evaluate it directly
//! (`store::memory`).

use serde_json::Value;
use std::collections::HashSet;

use crate::telemetry::Degradation;
use crate::types::{FilterField, FilterValue, Metadata, Predicate};

/// One conjunct of a compiled filter. Text operands are lower-cased.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Case-insensitive equality with any of `values`
    Exact { key: &'static str, values: Vec<String> },
    /// Case-insensitive substring match with any of `needles`
    Contains { key: &'static str, needles: Vec<String> },
    /// Inclusive numeric range; `None` bound is open
    Range {
        key: &'static str,
        gte: Option<f64>,
        lte: Option<f64>,
    },
}

impl Clause {
    pub fn key(&self) -> &'static str {
        match self {
            Clause::Exact { key, .. } | Clause::Contains { key, .. } | Clause::Range { key, .. } => *key,
        }
    }

    /// Evaluate against catalog metadata
    pub fn matches(&self, metadata: &Metadata) -> bool {
        let Some(value) = metadata.get(self.key()) else {
            return false;
        };

        match self {
            Clause::Exact { values, .. } => text_values(value)
                .iter()
                .any(|text| values.iter().any(|v| v == text)),
            Clause::Contains { needles, .. } => text_values(value)
                .iter()
                .any(|text| needles.iter().any(|n| text.contains(n.as_str()))),
            Clause::Range { gte, lte, .. } => match number_value(value) {
                Some(n) => gte.map_or(true, |min| n >= min) && lte.map_or(true, |max| n <= max),
                None => false,
            },
        }
    }
}

fn text_values(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.to_lowercase()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_lowercase)
            .collect(),
        _ => Vec::new(),
    }
}

fn number_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Conjunction of clauses. Empty means "no filter".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterExpr {
    pub clauses: Vec<Clause>,
}

impl FilterExpr {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.clauses.iter().all(|clause| clause.matches(metadata))
    }

    /// `None` for the pass-through filter, as stores expect
    pub fn as_option(&self) -> Option<&FilterExpr> {
        (!self.is_empty()).then_some(self)
    }

    /// Build from predicates already accepted by `FilterCompiler::validate`
    pub fn from_valid(predicates: &[Predicate]) -> Self {
        let mut clauses = Vec::new();
        let mut price_min = None;
        let mut price_max = None;

        for predicate in predicates {
            match predicate.field {
                FilterField::PriceMin => price_min = predicate.value.as_number(),
                FilterField::PriceMax => price_max = predicate.value.as_number(),
                FilterField::Category => clauses.push(Clause::Exact {
                    key: predicate.field.payload_key(),
                    values: lowered(&predicate.value),
                }),
                FilterField::Color | FilterField::Brand | FilterField::Gender => {
                    clauses.push(Clause::Contains {
                        key: predicate.field.payload_key(),
                        needles: lowered(&predicate.value),
                    })
                }
            }
        }

        // Only an upper bound gives [0, max]; only a lower bound gives [min, inf)
        match (price_min, price_max) {
            (None, None) => {}
            (min, max) => clauses.push(Clause::Range {
                key: FilterField::PriceMax.payload_key(),
                gte: Some(min.unwrap_or(0.0)),
                lte: max,
            }),
        }

        Self { clauses }
    }
}

fn lowered(value: &FilterValue) -> Vec<String> {
    match value {
        FilterValue::Text(s) => vec![s.to_lowercase()],
        FilterValue::List(items) => items.iter().map(|s| s.to_lowercase()).collect(),
        FilterValue::Number(n) => vec![n.to_string()],
    }
}

/// Result of compiling one predicate set
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    /// Predicates that survived validation, normalized
    pub accepted: Vec<Predicate>,
    pub expr: FilterExpr,
    pub rejected: Vec<Degradation>,
}

/// Validates predicates and compiles them
#[derive(Debug, Clone, Default)]
pub struct FilterCompiler {
    /// Controlled category vocabulary; empty accepts any value
    categories: Vec<String>,
}

impl FilterCompiler {
    pub fn new(categories: Vec<String>) -> Self {
        Self { categories }
    }

    pub fn compile(&self, predicates: &[Predicate]) -> CompiledFilter {
        let (accepted, rejected) = self.validate(predicates);
        let expr = FilterExpr::from_valid(&accepted);
        CompiledFilter {
            accepted,
            expr,
            rejected,
        }
    }

    /// Drop invalid predicates one at a time, keeping the rest intact
    pub fn validate(&self, predicates: &[Predicate]) -> (Vec<Predicate>, Vec<Degradation>) {
        let mut accepted: Vec<Predicate> = Vec::with_capacity(predicates.len());
        let mut rejected = Vec::new();
        let mut seen = HashSet::new();

        for predicate in predicates {
            let field = predicate.field;
            if !seen.insert(field) {
                rejected.push(Degradation::FilterRejected {
                    field,
                    reason: "duplicate predicate".to_string(),
                });
                continue;
            }
            match self.normalize(predicate) {
                Ok(p) => accepted.push(p),
                Err(reason) => rejected.push(Degradation::FilterRejected { field, reason }),
            }
        }

        let bound = |field: FilterField| {
            accepted
                .iter()
                .find(|p: &&Predicate| p.field == field)
                .and_then(|p| p.value.as_number())
        };
        if let (Some(min), Some(max)) = (bound(FilterField::PriceMin), bound(FilterField::PriceMax)) {
            if min > max {
                accepted.retain(|p| p.field != FilterField::PriceMin);
                rejected.push(Degradation::FilterRejected {
                    field: FilterField::PriceMin,
                    reason: format!("price_min {} exceeds price_max {}", min, max),
                });
            }
        }

        (accepted, rejected)
    }

    fn normalize(&self, predicate: &Predicate) -> Result<Predicate, String> {
        let field = predicate.field;

        if field.is_numeric() {
            return match predicate.value {
                FilterValue::Number(n) if n.is_finite() && n >= 0.0 => Ok(match field {
                    FilterField::PriceMin => Predicate::price_min(n),
                    _ => Predicate::price_max(n),
                }),
                FilterValue::Number(n) => Err(format!("{} is not a valid price", n)),
                _ => Err("non-numeric value for numeric field".to_string()),
            };
        }

        let values: Vec<String> = match &predicate.value {
            FilterValue::Text(s) => vec![s.trim().to_string()],
            FilterValue::List(items) => items.iter().map(|s| s.trim().to_string()).collect(),
            FilterValue::Number(_) => return Err("numeric value for text field".to_string()),
        };
        let mut values: Vec<String> = values.into_iter().filter(|v| !v.is_empty()).collect();
        if values.is_empty() {
            return Err("empty value".to_string());
        }

        if field == FilterField::Category {
            for value in values.iter_mut() {
                if let Some(canonical) = self.canonical_category(value) {
                    *value = canonical.to_string();
                }
            }
        }

        Ok(match values.len() {
            1 => Predicate::text(field, values.remove(0)),
            _ => Predicate::any_of(field, values),
        })
    }

    fn canonical_category(&self, value: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.eq_ignore_ascii_case(value))
            .map(String::as_str)
    }
}
