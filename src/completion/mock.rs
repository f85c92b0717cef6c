// src/completion/mock.rs
use async_trait::async_trait;
use std::time::Instant;

use super::{
    Completion, CompletionRequest, CompletionService, CompletionStream, GenerationError,
    StreamEvent, StreamMetadata, TokenUsage,
};

const MOCK_STRUCTURED: &str = r#"{"definition":"테스트용 정의입니다.","impact":"테스트용 영향 설명입니다.","analogy":"테스트용 비유입니다."}"#;
const MOCK_REPLY: &str = "테스트 응답입니다. 궁금한 금융 용어를 물어보세요.";

/// Deterministic offline service used when `EXPLAINER_TEST_MODE=mock`.
#[derive(Debug, Clone)]
pub struct MockCompletionService {
    structured: String,
    reply: String,
    chunk_chars: usize,
}

impl Default for MockCompletionService {
    fn default() -> Self {
        Self {
            structured: MOCK_STRUCTURED.to_string(),
            reply: MOCK_REPLY.to_string(),
            chunk_chars: 8,
        }
    }
}

impl MockCompletionService {
    pub fn with_structured(mut self, json: impl Into<String>) -> Self {
        self.structured = json.into();
        self
    }

    pub fn with_reply(mut self, text: impl Into<String>) -> Self {
        self.reply = text.into();
        self
    }

    fn text_for(&self, request: &CompletionRequest) -> &str {
        if request.json_mode {
            &self.structured
        } else {
            &self.reply
        }
    }

    fn usage_for(text: &str) -> TokenUsage {
        let n = text.chars().count() as u32;
        TokenUsage {
            prompt_tokens: 0,
            completion_tokens: n,
            total_tokens: n,
        }
    }
}

#[async_trait]
impl CompletionService for MockCompletionService {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, GenerationError> {
        let text = self.text_for(request).to_string();
        let usage = Self::usage_for(&text);
        Ok(Completion { text, usage })
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<CompletionStream, GenerationError> {
        let started = Instant::now();
        let text = self.text_for(request);
        let chars: Vec<char> = text.chars().collect();
        let mut events: Vec<Result<StreamEvent, GenerationError>> = chars
            .chunks(self.chunk_chars.max(1))
            .map(|c| Ok(StreamEvent::Delta(c.iter().collect())))
            .collect();
        events.push(Ok(StreamEvent::Finished(StreamMetadata {
            latency_ms: started.elapsed().as_millis() as u64,
            usage: Self::usage_for(text),
            usage_reported: true,
            model: "mock".to_string(),
        })));
        Ok(Box::pin(futures::stream::iter(events)))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Always errors; the generator answers from local fallbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCompletionService;

#[async_trait]
impl CompletionService for DisabledCompletionService {
    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, GenerationError> {
        Err(GenerationError::Disabled)
    }

    async fn stream(&self, _request: &CompletionRequest) -> Result<CompletionStream, GenerationError> {
        Err(GenerationError::Disabled)
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}
