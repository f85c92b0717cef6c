// src/lib.rs
// Public library surface for the server binary, demos and integration tests.

pub mod api;
pub mod bootstrap;
pub mod cache;
pub mod completion;
pub mod config;
pub mod disambiguate;
pub mod embedding;
pub mod fingerprint;
pub mod generator;
pub mod glossary;
pub mod logging;
pub mod metrics;
pub mod payload;
pub mod resolver;
pub mod service;
pub mod streaming;

// ---- Re-exports for stable public API ----
pub use crate::cache::{CacheStatus, ExplanationCache};
pub use crate::config::ExplainerConfig;
pub use crate::disambiguate::{Disambiguator, HighlightDecision, MatchSpan};
pub use crate::glossary::{DatasetError, GlossaryEntry, GlossaryStore};
pub use crate::payload::{ExplanationPayload, ExplanationRequest};
pub use crate::resolver::{ResolvedTerm, TermResolver};
pub use crate::service::{ExplainOutcome, Explainer};

use axum::Router;

use crate::api::AppState;
use crate::bootstrap::ExplainerRuntime;
use crate::metrics::Metrics;

/// Env flag: run the one-off probe at startup when set to "1".
pub const ENV_QUICK_PROBE: &str = "EXPLAINER_QUICK_PROBE";

/// Build the full HTTP app (API routes + `/metrics`) from config and environment.
pub async fn app() -> anyhow::Result<Router> {
    Ok(build_app().await?.0)
}

/// Like [`app`], also returning the runtime so the caller can start background tasks.
pub async fn build_app() -> anyhow::Result<(Router, ExplainerRuntime)> {
    let cfg = ExplainerConfig::load()?;
    // Recorder first so every component's metric descriptions land in it.
    let metrics = Metrics::global(cfg.cache_ttl())?;
    let runtime = ExplainerRuntime::from_config(cfg).await?;
    let state = AppState {
        explainer: runtime.explainer.clone(),
    };
    let router = api::create_router(state).merge(metrics.router());
    Ok((router, runtime))
}
