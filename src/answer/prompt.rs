//! Answer prompt assembly
//!
//! Only the fields the model needs are passed along, for the top-N
//! candidates. Every candidate carries its id so the model can cite it.

use serde_json::{json, Map, Value};

use crate::types::{Candidate, Predicate};

pub(crate) const SYSTEM_PROMPT: &str = "You are a concise shopping assistant. \
You will receive a user query, parsed filters, and candidate products. \
Only mention products from the candidate list and only facts present in it. \
Do NOT invent price, color, or availability. \
Cite every product you mention by its id in square brackets, e.g. [B07RUN1]; \
an answer without at least one citation is discarded. \
Return a short conversational recommendation of at most 3-5 items, including titles.";

/// Candidate trimmed to what generation needs
pub(crate) fn slim_candidate(candidate: &Candidate) -> Value {
    let mut slim = Map::new();
    slim.insert("id".to_string(), json!(candidate.item_id));
    slim.insert("title".to_string(), json!(candidate.title));
    if let Some(product_type) = &candidate.product_type {
        slim.insert("product_type".to_string(), json!(product_type));
    }
    for key in ["brand", "color"] {
        if let Some(value) = candidate.attributes.get(key) {
            slim.insert(key.to_string(), value.clone());
        }
    }
    if let Some(price) = candidate.price {
        slim.insert("price".to_string(), json!(price));
    }
    if let Some(url) = &candidate.image_url {
        slim.insert("url".to_string(), json!(url));
    }
    Value::Object(slim)
}

fn filters_json(filters: &[Predicate]) -> Value {
    let map: Map<String, Value> = filters
        .iter()
        .map(|p| (p.field.as_str().to_string(), json!(p.value)))
        .collect();
    Value::Object(map)
}

pub(crate) fn user_prompt(raw_query: &str, filters: &[Predicate], top: &[Candidate]) -> String {
    let candidates: Vec<Value> = top.iter().map(slim_candidate).collect();
    format!(
        "User query: {}\nParsed filters: {}\nCandidates (JSON list of objects with id, title, product_type, brand, color, price, url):\n{}\n",
        raw_query,
        filters_json(filters),
        Value::Array(candidates)
    )
}
