//! Post-hoc grounding check for generated answers
//!
//! The model is asked to cite products as `[id]`. A bracketed token with no
//! whitespace is treated as a citation; bracketed phrases such as
//! `[2 Pack]` and markdown link text `[label](url)` are not. An answer must
//! cite at least one supplied product, so an uncited answer is rejected.

use std::collections::HashSet;

const MAX_ID_LEN: usize = 64;

/// Ids cited in `text`, in order of appearance
pub fn cited_ids(text: &str) -> Vec<&str> {
    let mut ids = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            break;
        };
        let inner = after[..close].trim();
        rest = &after[close + 1..];
        if rest.starts_with('(') {
            continue;
        }
        if !inner.is_empty()
            && inner.len() <= MAX_ID_LEN
            && !inner.chars().any(char::is_whitespace)
            && !inner.contains('[')
        {
            ids.push(inner);
        }
    }
    ids
}

/// Why an answer was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    Empty,
    /// No supplied product is cited
    Uncited,
    UnknownItem(String),
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::Empty => write!(f, "empty answer"),
            Violation::Uncited => write!(f, "answer cites no retrieved item"),
            Violation::UnknownItem(id) => write!(f, "answer cites unknown item '{}'", id),
        }
    }
}

/// At least one id must be cited, and every cited id must be one of `allowed`
pub fn validate_answer(text: &str, allowed: &HashSet<&str>) -> Result<(), Violation> {
    if text.trim().is_empty() {
        return Err(Violation::Empty);
    }
    let cited = cited_ids(text);
    if let Some(unknown) = cited.iter().find(|id| !allowed.contains(*id)) {
        return Err(Violation::UnknownItem(unknown.to_string()));
    }
    if cited.is_empty() {
        return Err(Violation::Uncited);
    }
    Ok(())
}
