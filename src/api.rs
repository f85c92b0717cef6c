// src/api.rs
//! HTTP surface: JSON explain, SSE streaming, highlighting and glossary lookup.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::debug;

use crate::cache::CacheStatus;
use crate::completion::StreamMetadata;
use crate::disambiguate::{render_marked_html, HighlightDecision};
use crate::fingerprint::Fingerprint;
use crate::glossary::GlossaryEntry;
use crate::payload::ExplanationPayload;
use crate::resolver::ResolutionSummary;
use crate::service::{Explainer, StreamBody};
use crate::streaming::ExplanationStream;

type EventStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

pub const CACHE_HEADER: &str = "x-explain-cache";

#[derive(Clone)]
pub struct AppState {
    pub explainer: Arc<Explainer>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/explain", post(explain))
        .route("/explain/stream", post(explain_stream))
        .route("/highlight", post(highlight))
        .route("/glossary/{term}", get(glossary_entry))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct ExplainReq {
    text: String,
    #[serde(default)]
    context: Option<String>,
}

#[derive(Serialize)]
struct ExplainResp {
    resolution: ResolutionSummary,
    payload: ExplanationPayload,
    cache: CacheStatus,
}

fn cache_headers(status: CacheStatus) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_HEADER, HeaderValue::from_static(status.as_header()));
    headers
}

fn bad_request(msg: &'static str) -> Response {
    (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": msg }))).into_response()
}

async fn explain(State(state): State<AppState>, Json(body): Json<ExplainReq>) -> Response {
    if body.text.trim().is_empty() {
        return bad_request("text must not be empty");
    }
    let out = state
        .explainer
        .explain(&body.text, body.context.as_deref())
        .await;
    let headers = cache_headers(out.cache);
    let resp = ExplainResp {
        resolution: out.resolution.summary(),
        payload: out.payload,
        cache: out.cache,
    };
    (headers, Json(resp)).into_response()
}

#[derive(Serialize)]
struct StreamDone<'a> {
    resolution: &'a ResolutionSummary,
    payload: &'a ExplanationPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a StreamMetadata>,
}

fn json_event(name: &'static str, value: &impl Serialize) -> Event {
    match Event::default().event(name).json_data(value) {
        Ok(ev) => ev,
        Err(e) => Event::default().event("error").data(e.to_string()),
    }
}

/// SSE: `delta` events with raw text, then one `payload` event with the parsed result.
async fn explain_stream(State(state): State<AppState>, Json(body): Json<ExplainReq>) -> Response {
    if body.text.trim().is_empty() {
        return bad_request("text must not be empty");
    }
    let start = state
        .explainer
        .explain_stream(&body.text, body.context.as_deref())
        .await;
    let summary = start.resolution.summary();
    let fingerprint = start.fingerprint;

    let (status, events): (CacheStatus, EventStream) = match start.body {
        StreamBody::Cached(payload) => {
            let done = json_event(
                "payload",
                &StreamDone {
                    resolution: &summary,
                    payload: &payload,
                    metadata: None,
                },
            );
            (
                CacheStatus::Hit,
                Box::pin(futures::stream::once(async move { Ok(done) })),
            )
        }
        StreamBody::Live(stream) => {
            (
                CacheStatus::Miss,
                Box::pin(live_events(stream, summary, fingerprint)),
            )
        }
    };

    (
        cache_headers(status),
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
        .into_response()
}

enum Phase {
    Streaming(ExplanationStream),
    Done,
}

/// Deltas while the generation runs; `finish` caches the payload before the final event.
fn live_events(
    stream: ExplanationStream,
    summary: ResolutionSummary,
    fingerprint: Fingerprint,
) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    futures::stream::unfold(Phase::Streaming(stream), move |phase| {
        let summary = summary.clone();
        async move {
            let Phase::Streaming(mut stream) = phase else {
                return None;
            };
            if let Some(delta) = stream.next_delta().await {
                let ev = Event::default().event("delta").data(delta);
                return Some((Ok(ev), Phase::Streaming(stream)));
            }
            let (payload, metadata) = stream.finish().await;
            debug!(target: "explain", fingerprint = %fingerprint.short(), "streamed payload cached");
            let done = json_event(
                "payload",
                &StreamDone {
                    resolution: &summary,
                    payload: &payload,
                    metadata: metadata.as_ref(),
                },
            );
            Some((Ok(done), Phase::Done))
        }
    })
}

#[derive(Deserialize)]
struct HighlightReq {
    text: String,
}

#[derive(Serialize)]
struct HighlightResp {
    html: String,
    decisions: Vec<HighlightDecision>,
}

async fn highlight(State(state): State<AppState>, Json(body): Json<HighlightReq>) -> Json<HighlightResp> {
    let decisions = state.explainer.highlight(&body.text);
    let html = render_marked_html(&body.text, &decisions);
    Json(HighlightResp { html, decisions })
}

async fn glossary_entry(
    State(state): State<AppState>,
    Path(term): Path<String>,
) -> Result<Json<GlossaryEntry>, StatusCode> {
    state
        .explainer
        .glossary_entry(&term)
        .map(|e| Json(GlossaryEntry::clone(&e)))
        .ok_or(StatusCode::NOT_FOUND)
}
