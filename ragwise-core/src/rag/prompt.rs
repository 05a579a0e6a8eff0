//! Grounding prompt construction and source attribution.

use crate::rag::context::GroundingContext;
use crate::rag::reranker::RankedCandidate;
use crate::rag::subject::Subject;
use crate::rag::types::Metadata;
use std::collections::HashSet;

/// Fixed instruction at the head of every prompt.
pub const INSTRUCTION: &str = "You are a helpful assistant.\n\
Answer the question using the following context only.\n\
If you don't know, say you don't know.";

/// Build the prompt sent to the generation backend.
pub fn build_prompt(query: &str, context: &GroundingContext, subject: Option<&Subject>) -> String {
    let mut prompt = String::from(INSTRUCTION);
    if let Some(subject) = subject {
        prompt.push('\n');
        prompt.push_str(&subject.disambiguation());
    }
    prompt.push_str("\n\nContext:\n");
    prompt.push_str(context.as_str());
    prompt.push_str("\n\nQuestion:\n");
    prompt.push_str(query);
    prompt.push_str("\n\nAnswer:\n");
    prompt
}

/// Metadata of the final candidates for the response's `sources` list.
///
/// A named source is listed once, at its first occurrence. Candidates without
/// a `source` are listed every time.
pub fn build_sources(ranked: &[RankedCandidate]) -> Vec<Metadata> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut sources = Vec::new();
    for r in ranked {
        if let Some(source) = r.candidate.source() {
            if !seen.insert(source) {
                continue;
            }
        }
        sources.push(r.candidate.metadata.clone());
    }
    sources
}
