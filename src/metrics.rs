// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Duration;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("explain_requests_total", "Explain requests handled.");
        describe_counter!(
            "explain_resolution_total",
            "Term resolutions by kind (exact, approximate, unresolved)."
        );
        describe_counter!(
            "explain_embedding_errors_total",
            "Query embeddings that failed and degraded to unresolved."
        );
        describe_counter!("explain_cache_hits_total", "Explanation cache hits.");
        describe_counter!(
            "explain_cache_misses_total",
            "Explanation cache misses (generation triggered)."
        );
        describe_counter!(
            "explain_generation_fallbacks_total",
            "Generations answered from local fallback, by reason."
        );
        describe_histogram!(
            "explain_generation_ms",
            "Completion call time in milliseconds."
        );
        describe_gauge!(
            "explain_cache_ttl_secs",
            "Absolute TTL of cached explanations."
        );
    });
}

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder once per process and publish the cache TTL.
    /// Later calls reuse the first handle.
    pub fn global(cache_ttl: Duration) -> anyhow::Result<Self> {
        static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();
        let handle = HANDLE
            .get_or_try_init(|| PrometheusBuilder::new().install_recorder())?
            .clone();
        ensure_metrics_described();
        gauge!("explain_cache_ttl_secs").set(cache_ttl.as_secs_f64());
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
