// src/completion/mod.rs
//! Chat-completion service abstraction.
//!
//! `complete` returns the whole text; `stream` returns a lazy, finite sequence of
//! text deltas terminated by a single [`StreamEvent::Finished`] packet.

pub mod mock;
pub mod openai;
pub mod sse;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::explainer::{test_mode_mock, ExplainerConfig};

pub use mock::{DisabledCompletionService, MockCompletionService};
pub use openai::OpenAiCompletionService;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("completion service is disabled")]
    Disabled,
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion timed out after {0:?}")]
    Timeout(Duration),
    #[error("completion response was empty")]
    Empty,
    #[error("completion stream interrupted: {0}")]
    Stream(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the service for a single JSON object.
    pub json_mode: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// Terminal packet of a streamed completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamMetadata {
    pub latency_ms: u64,
    pub usage: TokenUsage,
    /// Whether `usage` came from the service (otherwise counted locally from deltas).
    pub usage_reported: bool,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Delta(String),
    Finished(StreamMetadata),
}

pub type CompletionStream =
    Pin<Box<dyn Stream<Item = Result<StreamEvent, GenerationError>> + Send + 'static>>;

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, GenerationError>;

    async fn stream(&self, request: &CompletionRequest) -> Result<CompletionStream, GenerationError>;

    /// Provider name for diagnostics/headers.
    fn name(&self) -> &'static str;
}

pub type DynCompletionService = Arc<dyn CompletionService>;

/// Factory: build a completion service according to config and environment variables.
///
/// * If `EXPLAINER_TEST_MODE=mock`, returns a deterministic mock service.
/// * Else if generation is disabled, returns a disabled service (callers fall back locally).
/// * Else builds the OpenAI client; a missing API key also disables it.
pub fn build_completion_service(cfg: &ExplainerConfig) -> DynCompletionService {
    if test_mode_mock() {
        return Arc::new(MockCompletionService::default());
    }
    if !cfg.generation.enabled {
        return Arc::new(DisabledCompletionService);
    }
    let key = cfg.resolved_api_key();
    match OpenAiCompletionService::new(
        key,
        &cfg.openai.base_url,
        &cfg.generation.model,
        cfg.generation_timeout(),
    ) {
        Ok(svc) => Arc::new(svc),
        Err(e) => {
            warn!(error = %e, "openai completions unavailable; explanations will use local fallback");
            Arc::new(DisabledCompletionService)
        }
    }
}
