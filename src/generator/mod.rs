// src/generator/mod.rs
//! Explanation generation: one consolidated completion call, lenient parsing,
//! deterministic local fallback. `generate` never fails outward.

pub mod fallback;
pub mod parse;
pub mod prompt;

use metrics::{counter, histogram};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::completion::{CompletionRequest, DynCompletionService, GenerationError};
use crate::config::explainer::GenerationSection;
use crate::logging::{anon_id, dev_logging_enabled};
use crate::metrics::ensure_metrics_described;
use crate::payload::{ExplanationPayload, ExplanationRequest};
use crate::streaming::ExplanationStream;

pub use parse::{parse_structured, ParseError, StructuredFields};

#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        GenerationSettings::from(&GenerationSection::default())
    }
}

impl From<&GenerationSection> for GenerationSettings {
    fn from(s: &GenerationSection) -> Self {
        Self {
            temperature: s.temperature,
            max_tokens: s.max_tokens,
            timeout: Duration::from_millis(s.timeout_ms.max(1)),
        }
    }
}

/// Why a generation fell back to local text; used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    Disabled,
    Timeout,
    Service,
    Empty,
    Parse,
    Stream,
}

impl FallbackReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FallbackReason::Disabled => "disabled",
            FallbackReason::Timeout => "timeout",
            FallbackReason::Service => "service",
            FallbackReason::Empty => "empty",
            FallbackReason::Parse => "parse",
            FallbackReason::Stream => "stream",
        }
    }

    fn of(err: &GenerationError) -> Self {
        match err {
            GenerationError::Disabled => FallbackReason::Disabled,
            GenerationError::Timeout(_) => FallbackReason::Timeout,
            GenerationError::Empty => FallbackReason::Empty,
            GenerationError::Stream(_) => FallbackReason::Stream,
            GenerationError::Transport(_) | GenerationError::Status { .. } => {
                FallbackReason::Service
            }
        }
    }
}

pub(crate) fn record_fallback(reason: FallbackReason) {
    counter!("explain_generation_fallbacks_total", "reason" => reason.as_str()).increment(1);
}

pub struct ExplanationGenerator {
    service: DynCompletionService,
    settings: GenerationSettings,
}

impl ExplanationGenerator {
    pub fn new(service: DynCompletionService, settings: GenerationSettings) -> Self {
        ensure_metrics_described();
        Self { service, settings }
    }

    pub fn settings(&self) -> GenerationSettings {
        self.settings
    }

    pub fn service_name(&self) -> &'static str {
        self.service.name()
    }

    pub(crate) fn completion_request(&self, request: &ExplanationRequest) -> CompletionRequest {
        let (messages, json_mode) = match request.entry.as_deref() {
            Some(entry) => (
                prompt::structured_messages(
                    entry,
                    &request.raw_user_input,
                    request.context_snippet.as_deref(),
                ),
                true,
            ),
            None => (prompt::conversational_messages(&request.raw_user_input), false),
        };
        CompletionRequest {
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            json_mode,
        }
    }

    /// Produce a payload for `request`. Any service, timeout or parse failure
    /// yields the deterministic fallback instead.
    pub async fn generate(&self, request: &ExplanationRequest) -> ExplanationPayload {
        let started = Instant::now();
        let completion = self.completion_request(request);
        let outcome =
            match tokio::time::timeout(self.settings.timeout, self.service.complete(&completion))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(GenerationError::Timeout(self.settings.timeout)),
            };
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        histogram!("explain_generation_ms").record(elapsed_ms);

        match outcome {
            Ok(c) => {
                if dev_logging_enabled() {
                    info!(
                        target: "explain",
                        input = %anon_id(&request.raw_user_input),
                        term = request.term().unwrap_or("-"),
                        prompt_tokens = c.usage.prompt_tokens,
                        completion_tokens = c.usage.completion_tokens,
                        elapsed_ms = elapsed_ms as u64,
                        "completion received"
                    );
                }
                interpret(request, &c.text)
            }
            Err(e) => {
                let reason = FallbackReason::of(&e);
                record_fallback(reason);
                warn!(
                    target: "explain",
                    error = %e,
                    reason = reason.as_str(),
                    provider = self.service.name(),
                    "generation failed; using local fallback"
                );
                fallback_for(request)
            }
        }
    }

    /// Streamed variant. Setup failures still produce a stream that yields the
    /// fallback on `finish`. The whole stream, setup included, is bounded by
    /// the generation timeout.
    pub async fn stream(&self, request: &ExplanationRequest) -> ExplanationStream {
        let deadline = tokio::time::Instant::now() + self.settings.timeout;
        let completion = self.completion_request(request);
        let opened =
            match tokio::time::timeout_at(deadline, self.service.stream(&completion)).await {
                Ok(result) => result,
                Err(_) => Err(GenerationError::Timeout(self.settings.timeout)),
            };
        match opened {
            Ok(events) => {
                ExplanationStream::live(request.clone(), events, self.settings.timeout, deadline)
            }
            Err(e) => {
                let reason = FallbackReason::of(&e);
                record_fallback(reason);
                warn!(target: "explain", error = %e, reason = reason.as_str(), "stream setup failed; using local fallback");
                ExplanationStream::failed(request.clone())
            }
        }
    }
}

/// Turn raw model text into a payload of the request's shape.
pub(crate) fn interpret(request: &ExplanationRequest, text: &str) -> ExplanationPayload {
    match request.entry.as_deref() {
        Some(entry) => match parse_structured(text) {
            Ok(fields) => fallback::backfill(entry, fields),
            Err(e) => {
                record_fallback(FallbackReason::Parse);
                debug!(target: "explain", error = %e, "structured output unusable");
                fallback::structured_fallback(entry)
            }
        },
        None => {
            let reply = text.trim();
            if reply.is_empty() {
                record_fallback(FallbackReason::Empty);
                fallback::conversational_fallback()
            } else {
                ExplanationPayload::Conversational {
                    reply: reply.to_string(),
                }
            }
        }
    }
}

pub(crate) fn fallback_for(request: &ExplanationRequest) -> ExplanationPayload {
    match request.entry.as_deref() {
        Some(entry) => fallback::structured_fallback(entry),
        None => fallback::conversational_fallback(),
    }
}
