//! Grounding context assembly.

use crate::rag::reranker::RankedCandidate;

/// Separator between passages in the grounding context.
pub const PASSAGE_SEPARATOR: &str = "\n\n";

/// The final passages' text in final order, used for the entity check, the
/// rule shortcut, subject inference, and the prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundingContext {
    text: String,
}

impl GroundingContext {
    pub fn assemble(ranked: &[RankedCandidate]) -> Self {
        let text = ranked
            .iter()
            .map(|r| r.candidate.content.as_str())
            .collect::<Vec<_>>()
            .join(PASSAGE_SEPARATOR);
        Self { text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Case-insensitive substring test.
    pub fn contains_ignore_case(&self, needle: &str) -> bool {
        self.text.to_lowercase().contains(&needle.to_lowercase())
    }

    /// Non-empty trimmed lines, in order.
    pub fn non_empty_lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines().map(str::trim).filter(|l| !l.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::types::{Candidate, Metadata};

    fn ranked(content: &str) -> RankedCandidate {
        RankedCandidate {
            candidate: Candidate::new(content, Metadata::new()),
            retrieval_score: None,
            lexical_score: 1,
        }
    }

    #[test]
    fn test_assemble_joins_with_blank_line() {
        let ctx = GroundingContext::assemble(&[ranked("first"), ranked("second")]);
        assert_eq!(ctx.as_str(), "first\n\nsecond");
    }

    #[test]
    fn test_empty() {
        assert!(GroundingContext::assemble(&[]).is_empty());
    }

    #[test]
    fn test_contains_ignore_case() {
        let ctx = GroundingContext::assemble(&[ranked("Worked with JANE DOE at Acme")]);
        assert!(ctx.contains_ignore_case("Jane Doe"));
        assert!(!ctx.contains_ignore_case("John Smith"));
    }

    #[test]
    fn test_non_empty_lines() {
        let ctx = GroundingContext::assemble(&[ranked("  Jane Doe \n\n  \nEngineer"), ranked("x")]);
        let lines: Vec<_> = ctx.non_empty_lines().collect();
        assert_eq!(lines, vec!["Jane Doe", "Engineer", "x"]);
    }
}
