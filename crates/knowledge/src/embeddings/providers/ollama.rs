//! Ollama embedding backend.
//!
//! Uses the batch endpoint `POST /api/embed`, which accepts a list of
//! inputs and returns one vector per input in order.
//!
//! Requests are bounded by the configured timeout and never retried here:
//! an unreachable or timed-out server is reported as
//! `AppError::ServiceUnavailable` and the caller decides what to do.

use crate::embeddings::config::EmbeddingConfig;
use crate::embeddings::provider::EmbeddingBackend;
use async_trait::async_trait;
use grounded_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const EMBED_ENDPOINT: &str = "/api/embed";
const SERVICE: &str = "ollama-embeddings";

/// Ollama embedding backend using the local API.
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaBackend {
    /// Build the client. No request is made until the first embedding.
    pub fn new(config: &EmbeddingConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                AppError::Embedding(format!("Failed to create HTTP client for Ollama: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let url = format!("{}{}", self.base_url, EMBED_ENDPOINT);
        debug!("Sending embedding request to {}", url);

        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| AppError::from_request_error(SERVICE, e, AppError::Embedding))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|e| e.error)
                .unwrap_or(error_text);
            let message = format!("Ollama API error ({}): {}", status, message);

            return Err(if status.is_server_error() {
                AppError::unavailable(SERVICE, message)
            } else {
                AppError::Embedding(message)
            });
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| AppError::from_request_error(SERVICE, e, AppError::Embedding))?;

        if body.embeddings.len() != texts.len() {
            return Err(AppError::Embedding(format!(
                "Ollama returned {} embeddings for {} inputs",
                body.embeddings.len(),
                texts.len()
            )));
        }

        debug!("Generated {} embeddings", body.embeddings.len());
        Ok(body.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "ollama".to_string(),
            model: "e5-base-v2".to_string(),
            endpoint: endpoint.to_string(),
            dimensions: 3,
            batch_size: 32,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_embed_batch_sends_all_inputs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_json(serde_json::json!({
                "model": "e5-base-v2",
                "input": ["passage: one", "passage: two"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "e5-base-v2",
                "embeddings": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = OllamaBackend::new(&config(&server.uri())).unwrap();
        let out = backend
            .embed_batch(&["passage: one".to_string(), "passage: two".to_string()])
            .await
            .unwrap();

        assert_eq!(out, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let backend = OllamaBackend::new(&config(&server.uri())).unwrap();
        assert!(backend.embed_batch(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_model_is_embedding_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({"error": "model \"e5-base-v2\" not found"})),
            )
            .mount(&server)
            .await;

        let backend = OllamaBackend::new(&config(&server.uri())).unwrap();
        let err = backend.embed_batch(&["x".to_string()]).await.unwrap_err();

        assert!(matches!(err, AppError::Embedding(_)));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(503).set_body_string("loading model"))
            .expect(1)
            .mount(&server)
            .await;

        let backend = OllamaBackend::new(&config(&server.uri())).unwrap();
        let err = backend.embed_batch(&["x".to_string()]).await.unwrap_err();

        // One request only: no internal retry.
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_count_mismatch_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[1.0, 0.0, 0.0]]
            })))
            .mount(&server)
            .await;

        let backend = OllamaBackend::new(&config(&server.uri())).unwrap();
        let err = backend
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("1 embeddings for 2 inputs"));
    }
}
