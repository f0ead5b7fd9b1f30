//! Extraction prompt and response schema
use serde_json::{json, Value};

pub(crate) const SYSTEM_PROMPT: &str = r#"You are a shopping query parser.
Extract constraints from the user's query and rewrite it for product search.
Return STRICT JSON (no prose, no markdown) with exactly these keys:
  "search_phrase": short, search-friendly description of the product, without price or constraint words
  "category": product category or null
  "color": color or null
  "brand": brand name or null
  "gender": "men", "women", "unisex" or null
  "price_min": number or null
  "price_max": number or null

Guidelines:
- If no value for a field, use null.
- price_min and price_max must be plain numbers (e.g., 120), never strings or ranges.
- "under $X" means price_max = X; "over $X" or "at least $X" means price_min = X.
- Normalize color synonyms (e.g., maroon -> red, navy -> blue).
- Do not invent constraints the user did not state.

Example:
Query: "red running shoes under $100"
{"search_phrase": "running shoes", "category": null, "color": "red", "brand": null, "gender": null, "price_min": null, "price_max": 100}"#;

pub(crate) fn user_prompt(raw: &str) -> String {
    format!("Query: \"{}\"", raw.replace('"', "'"))
}

pub(crate) fn response_schema() -> Value {
    let nullable_text = json!({ "type": ["string", "null"] });
    let nullable_number = json!({ "type": ["number", "null"] });

    json!({
        "type": "object",
        "properties": {
            "search_phrase": { "type": "string" },
            "category": nullable_text,
            "color": nullable_text,
            "brand": nullable_text,
            "gender": nullable_text,
            "price_min": nullable_number,
            "price_max": nullable_number,
        },
        "required": ["search_phrase"],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_prompt_escapes_quotes() {
        assert_eq!(user_prompt(r#"the "best" shoes"#), "Query: \"the 'best' shoes\"");
    }

    #[test]
    fn test_schema_requires_phrase() {
        let schema = response_schema();
        assert_eq!(schema["required"][0], "search_phrase");
        assert!(schema["properties"]["price_max"].is_object());
    }
}
