//! Core data types shared by the retrieval and answer stages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The canonical abstention answer.
pub const ABSTAIN_ANSWER: &str = "I don't know.";

/// Number of leading content characters that participate in a candidate's identity.
pub const IDENTITY_PREFIX_CHARS: usize = 200;

/// Passage metadata as stored by the index (`source`, `page`, `section`, ...).
pub type Metadata = serde_json::Map<String, Value>;

/// A retrieved passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Relevance score; absent for diversity search and bare similarity search.
    #[serde(default)]
    pub score: Option<f32>,
}

/// Content-addressed identity: `(source, page, section, content prefix)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateKey {
    pub source: Option<String>,
    pub page: Option<String>,
    pub section: Option<String>,
    pub prefix: String,
}

impl Candidate {
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            content: content.into(),
            metadata,
            score: None,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    /// Whether the content is empty or whitespace-only.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// The `source` metadata value, if it is a non-empty string.
    pub fn source(&self) -> Option<&str> {
        self.metadata
            .get("source")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn key(&self) -> CandidateKey {
        CandidateKey {
            source: metadata_key_part(&self.metadata, "source"),
            page: metadata_key_part(&self.metadata, "page"),
            section: metadata_key_part(&self.metadata, "section"),
            prefix: self.content.chars().take(IDENTITY_PREFIX_CHARS).collect(),
        }
    }
}

// Non-string values (numeric pages) are keyed by their JSON rendering.
fn metadata_key_part(metadata: &Metadata, field: &str) -> Option<String> {
    metadata.get(field).and_then(|v| match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    })
}

/// The pipeline's answer to one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    pub sources: Vec<Metadata>,
    pub abstained: bool,
}

impl AnswerResult {
    pub fn abstain() -> Self {
        Self {
            answer: ABSTAIN_ANSWER.to_string(),
            sources: Vec::new(),
            abstained: true,
        }
    }
}

/// Build a metadata map from `(key, value)` pairs.
pub fn metadata<I, K, V>(pairs: I) -> Metadata
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_uses_content_prefix_only() {
        let head = "a".repeat(IDENTITY_PREFIX_CHARS);
        let one = Candidate::new(format!("{head} tail one"), metadata([("source", "cv.pdf")]));
        let two = Candidate::new(format!("{head} tail two"), metadata([("source", "cv.pdf")]));
        assert_eq!(one.key(), two.key());
    }

    #[test]
    fn test_key_prefix_counts_characters() {
        let content = "é".repeat(300);
        let key = Candidate::new(content, Metadata::new()).key();
        assert_eq!(key.prefix.chars().count(), IDENTITY_PREFIX_CHARS);
    }

    #[test]
    fn test_key_distinguishes_pages() {
        let one = Candidate::new("text", metadata([("source", json!("cv.pdf")), ("page", json!(1))]));
        let two = Candidate::new("text", metadata([("source", json!("cv.pdf")), ("page", json!(2))]));
        assert_ne!(one.key(), two.key());
    }

    #[test]
    fn test_blank_and_source() {
        assert!(Candidate::new(" \n\t", Metadata::new()).is_blank());
        let c = Candidate::new("x", metadata([("source", "")]));
        assert_eq!(c.source(), None);
        let c = Candidate::new("x", metadata([("source", "a.txt")]));
        assert_eq!(c.source(), Some("a.txt"));
    }

    #[test]
    fn test_abstain_result() {
        let r = AnswerResult::abstain();
        assert_eq!(r.answer, "I don't know.");
        assert!(r.sources.is_empty());
        assert!(r.abstained);
    }
}
