// src/embedding/openai.rs
//! Embeddings client for OpenAI-compatible `/embeddings` endpoints.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{EmbeddingService, EmbeddingServiceError};

#[derive(Clone)]
pub struct OpenAiEmbeddingService {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_retries: usize,
}

impl OpenAiEmbeddingService {
    pub fn new(
        api_key: String,
        base_url: &str,
        model: &str,
        timeout: Duration,
        max_retries: usize,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing OpenAI API key");
        anyhow::ensure!(!model.trim().is_empty(), "missing OpenAI embedding model name");
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| anyhow::anyhow!("invalid OpenAI API key"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .user_agent("finance-term-explainer/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            max_retries: max_retries.max(1),
        })
    }

    fn should_retry(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn retry_backoff(attempt: usize) -> Duration {
        let capped = attempt.min(4) as u32;
        Duration::from_millis(250 * (1 << capped))
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingService for OpenAiEmbeddingService {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingServiceError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let mut attempt = 0usize;
        loop {
            let request = EmbeddingRequest {
                model: &self.model,
                input: inputs,
            };
            let sent = self.client.post(&self.endpoint).json(&request).send().await;
            let resp = match sent {
                Ok(resp) => resp,
                Err(err) => {
                    let retryable = err.is_timeout() || err.is_connect();
                    if retryable && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tokio::time::sleep(Self::retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(err.into());
                }
            };

            let status = resp.status();
            if status.is_success() {
                let mut parsed: EmbeddingResponse = resp
                    .json()
                    .await
                    .map_err(|e| EmbeddingServiceError::Malformed(e.to_string()))?;
                parsed.data.sort_by_key(|d| d.index);
                if parsed.data.len() != inputs.len() {
                    return Err(EmbeddingServiceError::Malformed(format!(
                        "{} embeddings for {} inputs",
                        parsed.data.len(),
                        inputs.len()
                    )));
                }
                return Ok(parsed.data.into_iter().map(|d| d.embedding).collect());
            }

            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            if Self::should_retry(status) && attempt + 1 < self.max_retries {
                attempt += 1;
                debug!(target: "explain", %status, attempt, "retrying embeddings request");
                tokio::time::sleep(Self::retry_backoff(attempt)).await;
                continue;
            }
            return Err(EmbeddingServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
