// src/streaming.rs
//! Incremental consumption of streamed completions.
//!
//! An [`ExplanationStream`] is lazy and single-use. Dropping it drops the
//! underlying completion stream, which closes the network response, and
//! releases any cache slot it holds without storing anything.

use futures::StreamExt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::SlotLease;
use crate::completion::{CompletionStream, StreamEvent, StreamMetadata};
use crate::generator::{fallback_for, interpret, record_fallback, FallbackReason};
use crate::payload::{ExplanationPayload, ExplanationRequest};

/// Accumulates deltas until the terminal metadata packet arrives.
#[derive(Debug, Default, Clone)]
pub struct StreamingCollector {
    text: String,
    deltas: usize,
    metadata: Option<StreamMetadata>,
}

impl StreamingCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one event. Deltas after `Finished` are ignored.
    pub fn push(&mut self, event: StreamEvent) {
        if self.metadata.is_some() {
            return;
        }
        match event {
            StreamEvent::Delta(d) => {
                self.deltas += 1;
                self.text.push_str(&d);
            }
            StreamEvent::Finished(meta) => self.metadata = Some(meta),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn delta_count(&self) -> usize {
        self.deltas
    }

    pub fn metadata(&self) -> Option<&StreamMetadata> {
        self.metadata.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.metadata.is_some()
    }
}

pub struct ExplanationStream {
    request: ExplanationRequest,
    events: Option<CompletionStream>,
    collector: StreamingCollector,
    idle_timeout: Duration,
    deadline: Instant,
    failure: Option<FallbackReason>,
    lease: Option<SlotLease>,
}

impl ExplanationStream {
    /// `deadline` bounds the whole generation; `idle_timeout` bounds each wait.
    pub(crate) fn live(
        request: ExplanationRequest,
        events: CompletionStream,
        idle_timeout: Duration,
        deadline: Instant,
    ) -> Self {
        Self {
            request,
            events: Some(events),
            collector: StreamingCollector::new(),
            idle_timeout,
            deadline,
            failure: None,
            lease: None,
        }
    }

    /// A stream whose setup already failed; `finish` yields the fallback.
    pub(crate) fn failed(request: ExplanationRequest) -> Self {
        Self {
            request,
            events: None,
            collector: StreamingCollector::new(),
            idle_timeout: Duration::ZERO,
            deadline: Instant::now(),
            failure: Some(FallbackReason::Service),
            lease: None,
        }
    }

    /// Keep the cache slot locked until `finish` stores the payload into it.
    pub(crate) fn holding(mut self, lease: SlotLease) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn request(&self) -> &ExplanationRequest {
        &self.request
    }

    pub fn metadata(&self) -> Option<&StreamMetadata> {
        self.collector.metadata()
    }

    pub fn collected_text(&self) -> &str {
        self.collector.text()
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Next text delta, or `None` once the stream has ended (normally or not).
    /// Waiting longer than the idle timeout for an event, or running past the
    /// generation deadline, ends the stream as failed.
    pub async fn next_delta(&mut self) -> Option<String> {
        let events = self.events.as_mut()?;
        let wait_until = self.deadline.min(Instant::now() + self.idle_timeout);
        match tokio::time::timeout_at(wait_until, events.next()).await {
            Ok(Some(Ok(StreamEvent::Delta(d)))) => {
                self.collector.push(StreamEvent::Delta(d.clone()));
                Some(d)
            }
            Ok(Some(Ok(ev @ StreamEvent::Finished(_)))) => {
                self.collector.push(ev);
                self.events = None;
                None
            }
            Ok(Some(Err(e))) => {
                warn!(target: "explain", error = %e, received = self.collector.delta_count(), "completion stream failed");
                self.fail(FallbackReason::Stream);
                None
            }
            Ok(None) => {
                debug!(target: "explain", "completion stream ended without metadata");
                self.events = None;
                if !self.collector.is_finished() && self.collector.text().trim().is_empty() {
                    self.fail(FallbackReason::Empty);
                }
                None
            }
            Err(_) if Instant::now() >= self.deadline => {
                warn!(target: "explain", received = self.collector.delta_count(), "completion stream past deadline; giving up");
                self.fail(FallbackReason::Timeout);
                None
            }
            Err(_) => {
                warn!(target: "explain", idle_ms = self.idle_timeout.as_millis() as u64, "completion stream idle; giving up");
                self.fail(FallbackReason::Timeout);
                None
            }
        }
    }

    fn fail(&mut self, reason: FallbackReason) {
        self.events = None;
        if self.failure.is_none() {
            record_fallback(reason);
            self.failure = Some(reason);
        }
    }

    /// Drain the remaining deltas and build the payload through the same parse
    /// step as non-streamed generation. A failed stream yields the fallback.
    /// A held cache slot is filled with the payload and released.
    pub async fn finish(mut self) -> (ExplanationPayload, Option<StreamMetadata>) {
        while self.next_delta().await.is_some() {}
        let payload = if self.failure.is_some() {
            fallback_for(&self.request)
        } else {
            interpret(&self.request, self.collector.text())
        };
        if let Some(lease) = self.lease.take() {
            lease.fill(payload.clone());
        }
        (payload, self.collector.metadata().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{GenerationError, TokenUsage};

    fn meta() -> StreamMetadata {
        StreamMetadata {
            latency_ms: 3,
            usage: TokenUsage::default(),
            usage_reported: false,
            model: "t".into(),
        }
    }

    #[test]
    fn collector_ignores_deltas_after_finish() {
        let mut c = StreamingCollector::new();
        c.push(StreamEvent::Delta("안".into()));
        c.push(StreamEvent::Delta("녕".into()));
        c.push(StreamEvent::Finished(meta()));
        c.push(StreamEvent::Delta("!".into()));
        assert_eq!(c.text(), "안녕");
        assert_eq!(c.delta_count(), 2);
        assert!(c.is_finished());
    }

    #[tokio::test]
    async fn conversational_stream_collects_reply() {
        let events: CompletionStream = Box::pin(futures::stream::iter(vec![
            Ok(StreamEvent::Delta("반가".into())),
            Ok(StreamEvent::Delta("워".into())),
            Ok(StreamEvent::Finished(meta())),
        ]));
        let mut s = ExplanationStream::live(
            ExplanationRequest::new(None, "안녕", None),
            events,
            Duration::from_secs(1),
            Instant::now() + Duration::from_secs(5),
        );
        assert_eq!(s.next_delta().await.as_deref(), Some("반가"));
        let (payload, metadata) = s.finish().await;
        assert_eq!(
            payload,
            ExplanationPayload::Conversational {
                reply: "반가워".into()
            }
        );
        assert_eq!(metadata.map(|m| m.latency_ms), Some(3));
    }

    #[tokio::test]
    async fn mid_stream_error_yields_fallback() {
        let events: CompletionStream = Box::pin(futures::stream::iter(vec![
            Ok(StreamEvent::Delta("부분".into())),
            Err(GenerationError::Stream("reset".into())),
        ]));
        let s = ExplanationStream::live(
            ExplanationRequest::new(None, "안녕", None),
            events,
            Duration::from_secs(1),
            Instant::now() + Duration::from_secs(5),
        );
        let (payload, metadata) = s.finish().await;
        assert_eq!(payload, crate::generator::fallback::conversational_fallback());
        assert!(metadata.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_stream_times_out() {
        let events: CompletionStream = Box::pin(futures::stream::pending());
        let mut s = ExplanationStream::live(
            ExplanationRequest::new(None, "안녕", None),
            events,
            Duration::from_millis(50),
            Instant::now() + Duration::from_secs(5),
        );
        assert!(s.next_delta().await.is_none());
        assert!(s.is_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn trickling_stream_stops_at_deadline() {
        let events: CompletionStream = Box::pin(futures::stream::unfold(0u32, |n| async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            Some((Ok(StreamEvent::Delta(format!("{n}"))), n + 1))
        }));
        let started = Instant::now();
        let mut s = ExplanationStream::live(
            ExplanationRequest::new(None, "안녕", None),
            events,
            Duration::from_millis(50),
            started + Duration::from_millis(300),
        );
        let mut received = 0;
        while s.next_delta().await.is_some() {
            received += 1;
        }
        assert!(s.is_failed());
        assert!((5..=8).contains(&received), "{received}");
        assert!(started.elapsed() <= Duration::from_millis(350));
        let (payload, _) = s.finish().await;
        assert_eq!(payload, crate::generator::fallback::conversational_fallback());
    }
}
