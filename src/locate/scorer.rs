//! Lexical scoring of element text against a query

use crate::page::NodeRef;
use serde::Serialize;

/// Points for each query token found inside the text
pub const TOKEN_POINTS: u32 = 3;

/// Bonus when the whole text equals the query
pub const EXACT_BONUS: u32 = 6;

/// How well `text` matches `query`, case-insensitively
pub fn score(query: &str, text: &str) -> u32 {
    let query = query.to_lowercase();
    let text = text.to_lowercase();

    let mut total: u32 = query
        .split_whitespace()
        .filter(|token| text.contains(token))
        .map(|_| TOKEN_POINTS)
        .sum();
    if text == query {
        total += EXACT_BONUS;
    }
    total
}

/// An element considered during resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCandidate {
    pub node: NodeRef,
    pub text: String,
    pub score: u32,
}

/// Score every `(node, text)` pair and order best first. The sort is stable,
/// so equal scores keep their input (document) order.
pub fn rank<I>(query: &str, candidates: I) -> Vec<ScoredCandidate>
where
    I: IntoIterator<Item = (NodeRef, String)>,
{
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|(node, text)| ScoredCandidate {
            score: score(query, &text),
            node,
            text,
        })
        .collect();
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored
}
