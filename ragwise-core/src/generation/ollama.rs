//! Ollama generation backend over the `/api/generate` HTTP endpoint.

use super::{GenerationBackend, parse_generation_body};
use crate::config::GenerationConfig;
use crate::error::{RagwiseError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Longest slice of an error body kept in error messages.
const ERROR_BODY_PREVIEW: usize = 200;

pub struct OllamaClient {
    client: Client,
    endpoint: String,
    model: String,
    answer_field: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagwiseError::Config {
                message: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            answer_field: config.answer_field.clone(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GenerationBackend for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        debug!(url = %self.endpoint, model = %self.model, prompt_chars = prompt.len(), "Sending generate request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RagwiseError::upstream_unavailable(format!(
                        "Request timed out after {}s",
                        self.timeout.as_secs()
                    ))
                } else {
                    RagwiseError::upstream_unavailable(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let response_body = response.text().await.map_err(|e| {
            RagwiseError::upstream_unavailable(format!("Failed to read response body: {e}"))
        })?;

        if !status.is_success() {
            let preview: String = response_body.chars().take(ERROR_BODY_PREVIEW).collect();
            return Err(RagwiseError::upstream_unavailable(format!(
                "HTTP {status}: {preview}"
            )));
        }

        let parsed = parse_generation_body(&response_body, &self.answer_field)?;
        debug!(format = %parsed.format, answer_chars = parsed.text.len(), "Generate response parsed");
        Ok(parsed.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn config(base_url: &str) -> GenerationConfig {
        GenerationConfig {
            base_url: base_url.to_string(),
            model: "llama3".into(),
            timeout_secs: 5,
            answer_field: "response".into(),
        }
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = OllamaClient::new(&config("http://localhost:11434/")).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:11434/api/generate");
    }

    #[tokio::test]
    async fn test_generate_sends_model_prompt_and_no_stream() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let captured = seen.clone();
        let app = Router::new().route(
            "/api/generate",
            post(move |Json(body): Json<Value>| {
                let captured = captured.clone();
                async move {
                    *captured.lock().unwrap() = Some(body);
                    Json(json!({"model": "llama3", "response": " Rust and Go. ", "done": true}))
                }
            }),
        );
        let base = serve(app).await;

        let client = OllamaClient::new(&config(&base)).unwrap();
        let answer = client.generate("What languages?").await.unwrap();
        assert_eq!(answer, " Rust and Go. ");

        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["model"], "llama3");
        assert_eq!(body["prompt"], "What languages?");
        assert_eq!(body["stream"], false);
    }

    #[tokio::test]
    async fn test_generate_accepts_ndjson_body() {
        let app = Router::new().route(
            "/api/generate",
            post(|| async { "{\"response\":\"Hel\"}\n{\"response\":\"lo\"}\n{\"done\":true}\n" }),
        );
        let base = serve(app).await;
        let client = OllamaClient::new(&config(&base)).unwrap();
        assert_eq!(client.generate("hi").await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn test_server_error_is_upstream_unavailable() {
        let app = Router::new().route(
            "/api/generate",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model crashed") }),
        );
        let base = serve(app).await;
        let client = OllamaClient::new(&config(&base)).unwrap();
        let err = client.generate("hi").await.unwrap_err();
        assert!(matches!(err, RagwiseError::UpstreamUnavailable { .. }));
        assert!(err.to_string().contains("model crashed"));
    }

    #[tokio::test]
    async fn test_missing_answer_field_is_malformed() {
        let app = Router::new().route(
            "/api/generate",
            post(|| async { Json(json!({"done": true})) }),
        );
        let base = serve(app).await;
        let client = OllamaClient::new(&config(&base)).unwrap();
        let err = client.generate("hi").await.unwrap_err();
        assert!(matches!(err, RagwiseError::MalformedUpstreamResponse { .. }));
    }

    #[tokio::test]
    async fn test_connection_refused_is_upstream_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = OllamaClient::new(&config(&format!("http://{addr}"))).unwrap();
        let err = client.generate("hi").await.unwrap_err();
        assert!(err.is_upstream());
    }
}
