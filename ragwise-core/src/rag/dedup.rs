//! Content-addressed deduplication of merged retrieval results.

use crate::rag::types::{Candidate, CandidateKey};
use std::collections::HashSet;

/// A candidate that survived deduplication, with its retrieval score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: Option<f32>,
}

/// Drop blank candidates, then keep the first occurrence of each identity key.
///
/// Input order is preserved, so primary results (which come first) win over
/// supplemental duplicates. Running this on its own output is a no-op.
pub fn deduplicate(candidates: impl IntoIterator<Item = Candidate>) -> Vec<ScoredCandidate> {
    let mut seen: HashSet<CandidateKey> = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| !c.is_blank())
        .filter(|c| seen.insert(c.key()))
        .map(|candidate| ScoredCandidate {
            score: candidate.score,
            candidate,
        })
        .collect()
}
