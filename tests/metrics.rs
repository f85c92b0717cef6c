// tests/metrics.rs
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

// Full in-process app with the Prometheus recorder installed.
async fn build_app() -> Router {
    std::env::set_var("EXPLAINER_TEST_MODE", "mock");
    std::env::remove_var("EXPLAINER_CONFIG_PATH");
    finance_term_explainer::app()
        .await
        .expect("app() should build Router in tests")
}

async fn explain(app: &Router, text: &str) -> StatusCode {
    let req = Request::builder()
        .method("POST")
        .uri("/explain")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::to_vec(&serde_json::json!({ "text": text })).expect("serialize"),
        ))
        .expect("build request");
    app.clone().oneshot(req).await.expect("request failed").status()
}

async fn scrape(app: &Router) -> String {
    let resp = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).expect("request"))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), 1_048_576)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8")
}

#[tokio::test]
#[serial_test::serial]
async fn metrics_endpoint_contains_expected_series() {
    let app = build_app().await;

    // series only render once touched: one miss, one hit, one unresolved
    assert_eq!(explain(&app, "금리가 올랐대").await, StatusCode::OK);
    assert_eq!(explain(&app, "금리가 올랐대").await, StatusCode::OK);
    assert_eq!(explain(&app, "오늘 점심 뭐 먹지").await, StatusCode::OK);

    let text = scrape(&app).await;
    for needle in [
        "explain_requests_total",
        "explain_resolution_total",
        "explain_cache_hits_total",
        "explain_cache_misses_total",
        "explain_generation_ms",
        "explain_cache_ttl_secs",
    ] {
        assert!(text.contains(needle), "missing {needle} in /metrics:\n{text}");
    }
    assert!(text.contains("kind=\"exact\""));
    assert!(text.contains("kind=\"unresolved\""));
}

#[tokio::test]
#[serial_test::serial]
async fn building_the_app_twice_reuses_the_recorder() {
    let first = build_app().await;
    let second = build_app().await;
    assert_eq!(explain(&second, "환율이 뭐야").await, StatusCode::OK);
    assert!(scrape(&first).await.contains("explain_requests_total"));
}
