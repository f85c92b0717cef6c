// src/bootstrap.rs
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::explainer::test_mode_mock;
use crate::config::ExplainerConfig;
use crate::service::Explainer;

/// Safe diagnostics: only providers, flags and key length. Warns once when a
/// remote provider is configured without a key.
pub fn log_config_loaded(cfg: &ExplainerConfig) {
    let api_key = cfg.resolved_api_key();
    if api_key.is_empty() && cfg.wants_remote() {
        warn!("OPENAI_API_KEY not set; remote services will be disabled");
    }
    info!(
        glossary = %cfg.glossary.path,
        generation_enabled = cfg.generation.enabled,
        embedding_provider = %cfg.embedding.provider,
        mock = test_mode_mock(),
        key_len = api_key.len(),
        "explainer cfg loaded"
    );
}

/// Loaded configuration plus the explainer built from it.
pub struct ExplainerRuntime {
    pub cfg: ExplainerConfig,
    pub explainer: Arc<Explainer>,
}

impl ExplainerRuntime {
    pub async fn from_env() -> anyhow::Result<Self> {
        Self::from_config(ExplainerConfig::load()?).await
    }

    pub async fn from_config(cfg: ExplainerConfig) -> anyhow::Result<Self> {
        log_config_loaded(&cfg);
        let explainer = Arc::new(Explainer::from_config(cfg.clone()).await?);
        Ok(Self { cfg, explainer })
    }

    /// One-off smoke test of resolution and generation. Logs, never panics.
    pub async fn quick_probe(&self) {
        if !self.cfg.generation.enabled && !test_mode_mock() {
            warn!("explainer quick_probe skipped: generation is disabled in config");
            return;
        }
        let out = self.explainer.explain("기준금리가 뭐야?", None).await;
        info!(
            resolution = out.resolution.kind(),
            term = out.resolution.entry().map(|e| e.term.as_str()).unwrap_or("-"),
            structured = out.payload.is_structured(),
            cache = out.cache.as_header(),
            "explainer quick_probe finished"
        );
    }
}
