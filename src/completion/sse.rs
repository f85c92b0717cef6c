// src/completion/sse.rs
//! Server-Sent Events decoding for streamed chat completions.
//!
//! Input is a raw byte stream (chunk boundaries may split lines or UTF-8
//! sequences); output is delta events followed by exactly one `Finished`.

use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::time::Instant;
use tracing::debug;

use super::{CompletionStream, GenerationError, StreamEvent, StreamMetadata, TokenUsage};

#[derive(Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

struct SseState<S> {
    inner: Pin<Box<S>>,
    buf: Vec<u8>,
    queue: VecDeque<Result<StreamEvent, GenerationError>>,
    finished: bool,
    started: Instant,
    usage: Option<TokenUsage>,
    deltas: u32,
    model: String,
}

impl<S> SseState<S> {
    fn drain_lines(&mut self) {
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            self.handle_line(line.trim_end_matches(['\r', '\n']));
        }
    }

    fn handle_line(&mut self, line: &str) {
        if self.finished {
            return;
        }
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim();
        if data == "[DONE]" {
            self.finish();
            return;
        }
        match serde_json::from_str::<ChunkPayload>(data) {
            Ok(chunk) => {
                if let Some(u) = chunk.usage {
                    self.usage = Some(u);
                }
                for choice in chunk.choices {
                    if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                        self.deltas = self.deltas.saturating_add(1);
                        self.queue.push_back(Ok(StreamEvent::Delta(text)));
                    }
                }
            }
            Err(e) => debug!(target: "explain", error = %e, "skipping malformed stream chunk"),
        }
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let (usage, usage_reported) = match self.usage {
            Some(u) => (u, true),
            None => (
                TokenUsage {
                    completion_tokens: self.deltas,
                    total_tokens: self.deltas,
                    ..TokenUsage::default()
                },
                false,
            ),
        };
        self.queue.push_back(Ok(StreamEvent::Finished(StreamMetadata {
            latency_ms: self.started.elapsed().as_millis() as u64,
            usage,
            usage_reported,
            model: self.model.clone(),
        })));
    }
}

/// Decode an SSE byte stream into completion events.
///
/// A stream that ends without `[DONE]` still yields a final `Finished`; a transport
/// error yields one `Err` and ends the stream.
pub fn completion_events<S, B, E>(bytes: S, model: String) -> CompletionStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = SseState {
        inner: Box::pin(bytes),
        buf: Vec::new(),
        queue: VecDeque::new(),
        finished: false,
        started: Instant::now(),
        usage: None,
        deltas: 0,
        model,
    };

    let stream = futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(ev) = st.queue.pop_front() {
                return Some((ev, st));
            }
            if st.finished {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(chunk)) => {
                    st.buf.extend_from_slice(chunk.as_ref());
                    st.drain_lines();
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(GenerationError::Stream(e.to_string())), st));
                }
                None => {
                    if !st.buf.is_empty() {
                        st.buf.push(b'\n');
                        st.drain_lines();
                    }
                    st.finish();
                }
            }
        }
    });
    Box::pin(stream)
}
