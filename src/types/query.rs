//! Structured query representation produced by the parser
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phrase used when neither the model nor the raw text yields one.
/// Only reachable when the parser is driven directly with blank input;
/// the pipeline rejects blank queries before parsing.
pub const CATCH_ALL_PHRASE: &str = "products";

/// Catalog attribute a predicate constrains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    Category,
    Color,
    Brand,
    Gender,
    PriceMin,
    PriceMax,
}

impl FilterField {
    /// Numeric fields accept `FilterValue::Number` only
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::PriceMin | Self::PriceMax)
    }

    /// Metadata key the field is matched against in the catalog
    pub fn payload_key(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Color => "color",
            Self::Brand => "brand",
            Self::Gender => "gender",
            Self::PriceMin | Self::PriceMax => "price",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Color => "color",
            Self::Brand => "brand",
            Self::Gender => "gender",
            Self::PriceMin => "price_min",
            Self::PriceMax => "price_max",
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison applied by a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    /// Upper bound, inclusive
    Lt,
    /// Lower bound, inclusive
    Gt,
    In,
}

/// Predicate operand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl FilterValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FilterValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FilterValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// A single filter constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: FilterField,
    pub operator: Operator,
    pub value: FilterValue,
}

impl Predicate {
    /// Equality on a text attribute
    pub fn text(field: FilterField, value: impl Into<String>) -> Self {
        Self {
            field,
            operator: Operator::Eq,
            value: FilterValue::Text(value.into()),
        }
    }

    /// Membership in a set of text values
    pub fn any_of(field: FilterField, values: Vec<String>) -> Self {
        Self {
            field,
            operator: Operator::In,
            value: FilterValue::List(values),
        }
    }

    /// Inclusive lower price bound
    pub fn price_min(value: f64) -> Self {
        Self {
            field: FilterField::PriceMin,
            operator: Operator::Gt,
            value: FilterValue::Number(value),
        }
    }

    /// Inclusive upper price bound
    pub fn price_max(value: f64) -> Self {
        Self {
            field: FilterField::PriceMax,
            operator: Operator::Lt,
            value: FilterValue::Number(value),
        }
    }
}

/// Parsed, machine-usable representation of a shopping query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredQuery {
    /// Never empty
    pub search_phrase: String,
    pub filters: Vec<Predicate>,
}

impl StructuredQuery {
    /// Build a query, falling back to `raw` when `phrase` is blank.
    pub fn new(phrase: &str, raw: &str, filters: Vec<Predicate>) -> Self {
        let search_phrase = [phrase.trim(), raw.trim()]
            .into_iter()
            .find(|p| !p.is_empty())
            .unwrap_or(CATCH_ALL_PHRASE)
            .to_string();

        Self {
            search_phrase,
            filters,
        }
    }

    /// The deterministic fallback: raw text, no filters
    pub fn raw(raw: &str) -> Self {
        Self::new(raw, raw, Vec::new())
    }

    pub fn predicate(&self, field: FilterField) -> Option<&Predicate> {
        self.filters.iter().find(|p| p.field == field)
    }

    pub fn price_max(&self) -> Option<f64> {
        self.predicate(FilterField::PriceMax)
            .and_then(|p| p.value.as_number())
    }

    pub fn is_filtered(&self) -> bool {
        !self.filters.is_empty()
    }
}
