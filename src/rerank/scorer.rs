//! Score-based ordering and the local keyword scorer

use async_trait::async_trait;
use std::collections::HashSet;

use crate::errors::Result;
use crate::rerank::RelevanceScorer;
use crate::types::Candidate;

/// Attach scores and sort descending. The sort is stable, so tied
/// candidates keep their incoming (vector-similarity) order. NaN sorts last.
pub fn order_by_scores(candidates: Vec<Candidate>, scores: &[f32]) -> Vec<Candidate> {
    let mut scored: Vec<Candidate> = candidates
        .into_iter()
        .zip(scores)
        .map(|(mut candidate, score)| {
            candidate.rerank_score = Some(*score);
            candidate
        })
        .collect();

    let key = |c: &Candidate| match c.rerank_score {
        Some(s) if !s.is_nan() => s,
        _ => f32::NEG_INFINITY,
    };
    scored.sort_by(|a, b| key(b).total_cmp(&key(a)));
    scored
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_lowercase)
}

/// Fraction of query words found in the candidate text
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordScorer;

impl KeywordScorer {
    pub fn score_one(query: &str, text: &str) -> f32 {
        let query_words: HashSet<String> = tokens(query).collect();
        if query_words.is_empty() {
            return 0.0;
        }
        let text_words: HashSet<String> = tokens(text).collect();
        let matches = query_words.iter().filter(|w| text_words.contains(*w)).count();
        matches as f32 / query_words.len() as f32
    }
}

#[async_trait]
impl RelevanceScorer for KeywordScorer {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        Ok(texts.iter().map(|text| Self::score_one(query, text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StoreHit;
    use quickcheck_macros::quickcheck;

    fn candidate(id: usize) -> Candidate {
        Candidate::from_hit(StoreHit {
            id: id.to_string(),
            similarity: 0.0,
            metadata: Default::default(),
        })
    }

    #[test]
    fn test_ties_keep_input_order() {
        let candidates = (0..4).map(candidate).collect();
        let ranked = order_by_scores(candidates, &[0.5, 0.9, 0.5, 0.9]);
        let ids: Vec<_> = ranked.iter().map(|c| c.item_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3", "0", "2"]);
    }

    #[test]
    fn test_nan_sorts_last() {
        let candidates = (0..3).map(candidate).collect();
        let ranked = order_by_scores(candidates, &[f32::NAN, -2.0, 1.0]);
        let ids: Vec<_> = ranked.iter().map(|c| c.item_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "0"]);
    }

    #[test]
    fn test_keyword_overlap() {
        assert_eq!(KeywordScorer::score_one("red running shoes", "Running Shoes (SHOES)"), 2.0 / 3.0);
        assert_eq!(KeywordScorer::score_one("red running shoes", "Coffee mug"), 0.0);
        assert_eq!(KeywordScorer::score_one("", "anything"), 0.0);
    }

    /// Scores drawn from a tiny set force ties; tied items must stay in
    /// input order.
    #[quickcheck]
    fn prop_rerank_stable_under_ties(raw: Vec<u8>) -> bool {
        let scores: Vec<f32> = raw.iter().map(|b| (b % 3) as f32).collect();
        let candidates = (0..scores.len()).map(candidate).collect();
        let ranked = order_by_scores(candidates, &scores);

        ranked.windows(2).all(|pair| {
            let (a, b) = (&pair[0], &pair[1]);
            let (sa, sb) = (a.rerank_score.unwrap_or_default(), b.rerank_score.unwrap_or_default());
            let ia: usize = a.item_id.parse().unwrap_or_default();
            let ib: usize = b.item_id.parse().unwrap_or_default();
            sa > sb || (sa == sb && ia < ib)
        })
    }
}
