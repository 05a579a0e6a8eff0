//! Generation backend trait, tolerant response parsing, and a scripted mock.

pub mod ollama;

pub use ollama::OllamaClient;

use crate::error::{RagwiseError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// A text-generation service that answers a prompt.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Model identifier recorded in the event log.
    fn model(&self) -> &str;

    /// Generate an answer for `prompt`. The returned text is untrimmed.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Response body layouts, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// One JSON object carrying the whole answer.
    SingleObject,
    /// Newline-delimited JSON chunks, each carrying part of the answer.
    Ndjson,
}

impl ResponseFormat {
    pub const ORDER: [ResponseFormat; 2] = [ResponseFormat::SingleObject, ResponseFormat::Ndjson];

    /// Extract the answer text, or `None` if the body is not in this format.
    pub fn extract(self, body: &str, field: &str) -> Option<String> {
        match self {
            ResponseFormat::SingleObject => serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| answer_field(&v, field).map(str::to_string)),
            ResponseFormat::Ndjson => {
                let mut found = false;
                let mut text = String::new();
                for line in body.lines() {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let Ok(chunk) = serde_json::from_str::<Value>(line) else {
                        continue;
                    };
                    if let Some(part) = answer_field(&chunk, field) {
                        found = true;
                        text.push_str(part);
                    }
                }
                found.then_some(text)
            }
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseFormat::SingleObject => write!(f, "single-object"),
            ResponseFormat::Ndjson => write!(f, "ndjson"),
        }
    }
}

fn answer_field<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.as_object()?.get(field)?.as_str()
}

/// Answer text recovered from a backend response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub text: String,
    pub format: ResponseFormat,
}

/// Parse a backend body, trying each [`ResponseFormat`] in order.
///
/// Fails with `MalformedUpstreamResponse` when no format yields an answer field.
pub fn parse_generation_body(body: &str, field: &str) -> Result<ParsedResponse> {
    for format in ResponseFormat::ORDER {
        if let Some(text) = format.extract(body, field) {
            return Ok(ParsedResponse { text, format });
        }
    }
    let upstream_error = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string));
    Err(RagwiseError::malformed_upstream(match upstream_error {
        Some(err) => format!("backend reported an error: {err}"),
        None => format!("no '{field}' field in response body ({} bytes)", body.len()),
    }))
}

/// A scripted generation backend for tests and offline runs.
///
/// Queued replies are returned first, in order; after that every call gets
/// the default response.
pub struct MockGenerationBackend {
    model: String,
    default_response: String,
    queued: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self::with_response("mock answer")
    }

    /// A backend that always answers `text`.
    pub fn with_response(text: &str) -> Self {
        Self {
            model: "mock-model".to_string(),
            default_response: text.to_string(),
            queued: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_response(&self, text: &str) {
        self.lock_queue().push_back(Ok(text.to_string()));
    }

    pub fn queue_error(&self, err: RagwiseError) {
        self.lock_queue().push_back(Err(err));
    }

    /// Number of `generate` calls so far.
    pub fn call_count(&self) -> usize {
        self.prompts().len()
    }

    /// Every prompt received, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String>>> {
        self.queued.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        match self.lock_queue().pop_front() {
            Some(reply) => reply,
            None => Ok(self.default_response.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_object() {
        let parsed = parse_generation_body(
            r#"{"model":"llama3","response":"Jane knows Rust.","done":true}"#,
            "response",
        )
        .unwrap();
        assert_eq!(parsed.text, "Jane knows Rust.");
        assert_eq!(parsed.format, ResponseFormat::SingleObject);
    }

    #[test]
    fn test_ndjson_chunks_concatenate_in_order() {
        let body = concat!(
            "{\"response\":\"Jane \",\"done\":false}\n",
            "{\"response\":\"knows \",\"done\":false}\n",
            "{\"response\":\"Rust.\",\"done\":false}\n",
            "{\"done\":true}\n",
        );
        let parsed = parse_generation_body(body, "response").unwrap();
        assert_eq!(parsed.text, "Jane knows Rust.");
        assert_eq!(parsed.format, ResponseFormat::Ndjson);
    }

    #[test]
    fn test_ndjson_skips_unparsable_lines() {
        let body = "{\"response\":\"a\"}\n<html>oops\n\n{\"response\":\"b\"}";
        assert_eq!(parse_generation_body(body, "response").unwrap().text, "ab");
    }

    #[test]
    fn test_custom_answer_field() {
        let parsed = parse_generation_body(r#"{"answer":"42"}"#, "answer").unwrap();
        assert_eq!(parsed.text, "42");
    }

    #[test]
    fn test_empty_answer_is_still_text() {
        let parsed = parse_generation_body(r#"{"response":""}"#, "response").unwrap();
        assert_eq!(parsed.text, "");
    }

    #[test]
    fn test_no_answer_field_is_malformed() {
        let err = parse_generation_body("<html>bad gateway</html>", "response").unwrap_err();
        assert!(matches!(err, RagwiseError::MalformedUpstreamResponse { .. }));

        let err = parse_generation_body(r#"{"done":true}"#, "response").unwrap_err();
        assert!(matches!(err, RagwiseError::MalformedUpstreamResponse { .. }));
    }

    #[test]
    fn test_backend_error_message_is_surfaced() {
        let err =
            parse_generation_body(r#"{"error":"model 'llama9' not found"}"#, "response").unwrap_err();
        assert!(err.to_string().contains("model 'llama9' not found"));
    }

    #[tokio::test]
    async fn test_mock_backend_queue_then_default() {
        let mock = MockGenerationBackend::with_response("default");
        mock.queue_response("first");
        mock.queue_error(RagwiseError::upstream_unavailable("down"));

        assert_eq!(mock.generate("p1").await.unwrap(), "first");
        assert!(mock.generate("p2").await.unwrap_err().is_upstream());
        assert_eq!(mock.generate("p3").await.unwrap(), "default");
        assert_eq!(mock.prompts(), vec!["p1", "p2", "p3"]);
        assert_eq!(mock.call_count(), 3);
    }
}
