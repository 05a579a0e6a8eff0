//! Reranking of deduplicated candidates.

use crate::rag::dedup::ScoredCandidate;
use crate::rag::query::{NormalizedQuery, tokenize};
use crate::rag::types::Candidate;

/// Weight of each expanded phrase query found in a candidate.
pub const PHRASE_WEIGHT: u32 = 10;
/// Weight of each query token present in a candidate.
pub const TOKEN_WEIGHT: u32 = 1;

/// A candidate in final order, with both its retrieval and rerank scores.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    pub retrieval_score: Option<f32>,
    pub lexical_score: u32,
}

/// Reranker trait.
pub trait Reranker: Send + Sync {
    fn rerank(
        &self,
        query: &NormalizedQuery,
        candidates: Vec<ScoredCandidate>,
        top_k: usize,
    ) -> Vec<RankedCandidate>;
}

/// Phrase- and token-overlap reranker.
///
/// Candidates with no lexical overlap at all are dropped, so a query that
/// shares nothing with the corpus ends with an empty set.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalReranker;

impl LexicalReranker {
    pub fn score(&self, query: &NormalizedQuery, content: &str) -> u32 {
        let lowered = content.to_lowercase();
        let phrase_hits = query
            .expanded_phrase_queries
            .iter()
            .filter(|p| lowered.contains(&p.to_lowercase()))
            .count() as u32;

        let content_tokens = tokenize(content);
        let token_hits = query
            .tokens
            .iter()
            .filter(|t| content_tokens.contains(*t))
            .count() as u32;

        phrase_hits * PHRASE_WEIGHT + token_hits * TOKEN_WEIGHT
    }
}

impl Reranker for LexicalReranker {
    fn rerank(
        &self,
        query: &NormalizedQuery,
        candidates: Vec<ScoredCandidate>,
        top_k: usize,
    ) -> Vec<RankedCandidate> {
        let mut ranked: Vec<RankedCandidate> = candidates
            .into_iter()
            .map(|sc| RankedCandidate {
                lexical_score: self.score(query, &sc.candidate.content),
                retrieval_score: sc.score,
                candidate: sc.candidate,
            })
            .filter(|r| r.lexical_score > 0)
            .collect();
        // `sort_by` is stable: equal scores keep their retrieval order.
        ranked.sort_by(|a, b| b.lexical_score.cmp(&a.lexical_score));
        ranked.truncate(top_k);
        ranked
    }
}
