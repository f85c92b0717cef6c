// tests/api_http.rs
//
// In-process HTTP tests against the full router (mock mode, no network).
//
// Covered:
// - GET /health
// - POST /explain: resolution summary, MISS -> HIT via `x-explain-cache`, 400 on empty text
// - POST /explain/stream: SSE deltas then a final `payload` event; repeat is a cached HIT
// - POST /highlight, GET /glossary/{term}

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

const CACHE_HEADER: &str = "x-explain-cache";

async fn build_app() -> Router {
    std::env::set_var("EXPLAINER_TEST_MODE", "mock");
    std::env::remove_var("EXPLAINER_CONFIG_PATH");
    std::env::remove_var("EXPLAINER_APPROX_THRESHOLD");
    finance_term_explainer::app()
        .await
        .expect("app() should build Router in tests")
}

async fn post_json(app: &Router, uri: &str, payload: Value) -> axum::response::Response {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::to_vec(&payload).expect("serialize payload"),
        ))
        .expect("build request");
    app.clone().oneshot(req).await.expect("request failed")
}

async fn body_text(resp: axum::response::Response) -> String {
    let bytes = body::to_bytes(resp.into_body(), 1_048_576)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(resp).await).expect("json body")
}

fn cache_header(resp: &axum::response::Response) -> String {
    resp.headers()
        .get(CACHE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
#[serial_test::serial]
async fn health_is_ok() {
    let app = build_app().await;
    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "ok");
}

#[tokio::test]
#[serial_test::serial]
async fn explain_reports_resolution_and_caches() {
    let app = build_app().await;

    let first = post_json(&app, "/explain", json!({ "text": "금리가 올랐대" })).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(cache_header(&first), "MISS");
    let v = body_json(first).await;
    assert_eq!(v["resolution"]["kind"], "exact");
    assert_eq!(v["resolution"]["term"], "금리");
    assert_eq!(v["payload"]["kind"], "structured");
    for field in ["definition", "impact", "analogy"] {
        assert!(
            v["payload"][field].as_str().is_some_and(|s| !s.is_empty()),
            "missing {field}: {v}"
        );
    }

    let second = post_json(&app, "/explain", json!({ "text": "금리가  올랐대 " })).await;
    assert_eq!(cache_header(&second), "HIT");
    assert_eq!(body_json(second).await["cache"], "HIT");
}

#[tokio::test]
#[serial_test::serial]
async fn explain_unresolved_question_is_conversational() {
    let app = build_app().await;
    let resp = post_json(&app, "/explain", json!({ "text": "안녕하세요" })).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["resolution"]["kind"], "unresolved");
    assert_eq!(v["payload"]["kind"], "conversational");
    assert!(v["payload"]["reply"].as_str().is_some_and(|s| !s.is_empty()));
}

#[tokio::test]
#[serial_test::serial]
async fn explain_rejects_empty_text() {
    let app = build_app().await;
    let resp = post_json(&app, "/explain", json!({ "text": "   " })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(resp).await["error"].is_string());
}

#[tokio::test]
#[serial_test::serial]
async fn stream_sends_deltas_then_payload_and_caches() {
    let app = build_app().await;

    let resp = post_json(&app, "/explain/stream", json!({ "text": "금리 인상" })).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(cache_header(&resp), "MISS");
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"), "{content_type}");

    let text = body_text(resp).await;
    let delta_at = text.find("event: delta").expect("delta event");
    let payload_at = text.find("event: payload").expect("payload event");
    assert!(delta_at < payload_at, "payload comes last");
    assert!(text.contains("\"kind\":\"approximate\""));
    assert!(text.contains("\"metadata\""));

    let again = post_json(&app, "/explain/stream", json!({ "text": "금리 인상" })).await;
    assert_eq!(cache_header(&again), "HIT");
    let text = body_text(again).await;
    assert!(!text.contains("event: delta"));
    assert!(text.contains("event: payload"));

    let plain = post_json(&app, "/explain", json!({ "text": "금리 인상" })).await;
    assert_eq!(cache_header(&plain), "HIT", "streamed result is shared with /explain");
}

#[tokio::test]
#[serial_test::serial]
async fn highlight_marks_financial_terms_only() {
    let app = build_app().await;
    let resp = post_json(
        &app,
        "/highlight",
        json!({ "text": "금리가 올랐대. 김금리 씨는 몰랐대" }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    let html = v["html"].as_str().expect("html");
    assert_eq!(html.matches("<mark").count(), 1);
    assert!(html.starts_with("<mark class=\"financial-term\" data-term=\"금리\">금리</mark>가"));
    assert!(v["decisions"].as_array().is_some_and(|d| !d.is_empty()));
}

#[tokio::test]
#[serial_test::serial]
async fn glossary_lookup_by_term_and_unknown() {
    let app = build_app().await;

    let ok = app
        .clone()
        .oneshot(
            Request::get("/glossary/%EA%B8%88%EB%A6%AC")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("request failed");
    assert_eq!(ok.status(), StatusCode::OK);
    let v = body_json(ok).await;
    assert_eq!(v["term"], "금리");
    assert!(v["definition_metadata"].is_string());
    assert!(v.get("context_keywords").is_none());

    let missing = app
        .oneshot(
            Request::get("/glossary/unknown-term")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("request failed");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
