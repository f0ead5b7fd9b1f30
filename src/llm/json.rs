//! JSON object extraction from free-form completions
//!
//! Models wrap JSON in code fences or chatter even in JSON mode. A single
//! bracket-matching pass that ignores braces inside strings finds the first
//! complete top-level object.
//!
//! ```text
//! depth ← 0, start ← None
//! for each byte bᵢ outside a string literal:
//!   '{': if depth = 0 then start ← i; depth ← depth + 1
//!   '}': depth ← depth - 1; if depth = 0 and start ≠ None: return B[start..=i]
//! return None
//! ```

/// Return the first complete top-level JSON object in `text`, if any.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut depth: usize = 0;
    let mut start: Option<usize> = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, &byte) in bytes.iter().enumerate() {
        if escape_next {
            escape_next = false;
            continue;
        }

        if in_string {
            match byte {
                b'\\' => escape_next = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' if start.is_some() => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        return Some(&text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        let text = r#"{"search_phrase": "running shoes"}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn test_code_fence_and_preamble() {
        let text = "Sure! Here is the JSON:\n```json\n{\"color\": \"red\", \"price_max\": 100}\n```";
        assert_eq!(
            extract_json_object(text),
            Some("{\"color\": \"red\", \"price_max\": 100}")
        );
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let text = r#"{"search_phrase": "shoes {size 10}", "brand": "a\"}b"}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn test_nested_object() {
        let text = r#"prefix {"a": {"b": 1}} suffix {"c": 2}"#;
        assert_eq!(extract_json_object(text), Some(r#"{"a": {"b": 1}}"#));
    }

    #[test]
    fn test_incomplete_object() {
        assert_eq!(extract_json_object(r#"{"search_phrase": "shoes""#), None);
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} stray {"), None);
    }
}
