// src/completion/openai.rs
//! OpenAI-compatible chat completions (plain and streamed).

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::sse::completion_events;
use super::{
    ChatMessage, Completion, CompletionRequest, CompletionService, CompletionStream,
    GenerationError, TokenUsage,
};

pub struct OpenAiCompletionService {
    http: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OpenAiCompletionService {
    /// `timeout` bounds connection setup and each read; the generator enforces the overall deadline.
    pub fn new(
        api_key: String,
        base_url: &str,
        model: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing OpenAI API key");
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
                .map_err(|_| anyhow::anyhow!("invalid OpenAI API key"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .user_agent("finance-term-explainer/0.1")
            .connect_timeout(Duration::from_secs(4))
            .read_timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest, stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
            response_format: request.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        }
    }

    async fn send(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response, GenerationError> {
        let resp = self.http.post(&self.endpoint).json(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: TokenUsage,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionService for OpenAiCompletionService {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, GenerationError> {
        let resp = self.send(&self.body(request, false)).await?;
        let parsed: ChatResponse = resp.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(GenerationError::Empty)?;
        Ok(Completion {
            text,
            usage: parsed.usage,
        })
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<CompletionStream, GenerationError> {
        let resp = self.send(&self.body(request, true)).await?;
        Ok(completion_events(resp.bytes_stream(), self.model.clone()))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
