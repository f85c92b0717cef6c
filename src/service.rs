// src/service.rs
//! Caller-facing facade wiring glossary, disambiguation, resolution, cache and generation.

use anyhow::Context;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

use crate::cache::{CacheStatus, ExplanationCache, Reservation};
use crate::completion::{build_completion_service, DynCompletionService};
use crate::config::ExplainerConfig;
use crate::disambiguate::{render_marked_html, Disambiguator, HighlightDecision};
use crate::embedding::{build_embedding_service, DynEmbeddingService, EmbeddingIndex};
use crate::fingerprint::Fingerprint;
use crate::generator::{ExplanationGenerator, GenerationSettings};
use crate::glossary::{GlossaryEntry, GlossaryOptions, GlossaryStore};
use crate::logging::anon_id;
use crate::payload::{ExplanationPayload, ExplanationRequest};
use crate::resolver::{ResolvedTerm, TermResolver};
use crate::streaming::ExplanationStream;

#[derive(Debug, Clone)]
pub struct ExplainOutcome {
    pub resolution: ResolvedTerm,
    pub payload: ExplanationPayload,
    pub cache: CacheStatus,
    pub fingerprint: Fingerprint,
}

pub enum StreamBody {
    /// A fresh cached payload; nothing to stream.
    Cached(ExplanationPayload),
    Live(ExplanationStream),
}

pub struct StreamStart {
    pub resolution: ResolvedTerm,
    pub fingerprint: Fingerprint,
    pub body: StreamBody,
}

pub struct Explainer {
    store: Arc<GlossaryStore>,
    disambiguator: Disambiguator,
    resolver: TermResolver,
    cache: Arc<ExplanationCache>,
    generator: ExplanationGenerator,
    janitor_every: Duration,
}

pub struct ExplainerBuilder {
    store: Arc<GlossaryStore>,
    config: ExplainerConfig,
    embedder: Option<DynEmbeddingService>,
    completion: Option<DynCompletionService>,
}

impl ExplainerBuilder {
    pub fn with_config(mut self, config: ExplainerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_embedder(mut self, embedder: DynEmbeddingService) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_completion(mut self, completion: DynCompletionService) -> Self {
        self.completion = Some(completion);
        self
    }

    /// Embeds the glossary; an unavailable embedder leaves vector search disabled.
    pub async fn build(self) -> anyhow::Result<Explainer> {
        let cfg = self.config;
        let embedder = self
            .embedder
            .unwrap_or_else(|| build_embedding_service(&cfg));
        let completion = self
            .completion
            .unwrap_or_else(|| build_completion_service(&cfg));

        let index = Arc::new(
            EmbeddingIndex::build_or_empty(&self.store, embedder.as_ref(), cfg.embedding.batch_size)
                .await,
        );
        let disambiguator = Disambiguator::new(self.store.clone(), (&cfg.disambiguation).into())
            .context("building glossary scanner")?;
        let resolver = TermResolver::new(self.store.clone(), index, embedder, &cfg.resolver);
        let generator =
            ExplanationGenerator::new(completion, GenerationSettings::from(&cfg.generation));

        Ok(Explainer {
            store: self.store,
            disambiguator,
            resolver,
            cache: Arc::new(ExplanationCache::with_ttl(cfg.cache_ttl())),
            generator,
            janitor_every: Duration::from_secs(cfg.cache.janitor_interval_secs),
        })
    }
}

impl Explainer {
    pub fn builder(store: Arc<GlossaryStore>) -> ExplainerBuilder {
        ExplainerBuilder {
            store,
            config: ExplainerConfig::default(),
            embedder: None,
            completion: None,
        }
    }

    /// Load the glossary named by `cfg` and build every service from it.
    /// Only a dataset failure is fatal.
    pub async fn from_config(cfg: ExplainerConfig) -> anyhow::Result<Self> {
        let store = GlossaryStore::load_with(
            &cfg.glossary.path,
            GlossaryOptions {
                include_builtin: cfg.glossary.include_builtin,
            },
        )
        .with_context(|| format!("loading glossary from {}", cfg.glossary.path))?;
        let explainer = Self::builder(Arc::new(store))
            .with_config(cfg)
            .build()
            .await?;
        info!(
            target: "explain",
            terms = explainer.store.len(),
            generator = explainer.generator.service_name(),
            accept_distance = explainer.resolver.accept_distance(),
            "explainer ready"
        );
        Ok(explainer)
    }

    pub fn store(&self) -> &Arc<GlossaryStore> {
        &self.store
    }

    pub fn disambiguator(&self) -> &Disambiguator {
        &self.disambiguator
    }

    pub fn resolver(&self) -> &TermResolver {
        &self.resolver
    }

    pub fn cache(&self) -> &Arc<ExplanationCache> {
        &self.cache
    }

    pub fn generator(&self) -> &ExplanationGenerator {
        &self.generator
    }

    pub fn spawn_cache_janitor(&self) -> JoinHandle<()> {
        self.cache.spawn_janitor(self.janitor_every)
    }

    /// Resolve `input`, then serve the cached payload or generate one.
    #[instrument(level = "debug", skip_all, fields(input = %anon_id(input)))]
    pub async fn explain(&self, input: &str, context: Option<&str>) -> ExplainOutcome {
        counter!("explain_requests_total").increment(1);
        let resolution = self.resolver.resolve(input).await;
        let request = self.request_for(&resolution, input, context);
        let fingerprint = request.fingerprint();
        let (payload, cache) = self
            .cache
            .get_or_create_with_status(&request, || self.generator.generate(&request))
            .await;
        ExplainOutcome {
            resolution,
            payload,
            cache,
            fingerprint,
        }
    }

    /// Like [`Self::explain`] but streams a fresh generation. A live stream holds
    /// the fingerprint's cache slot until it is finished (which stores the payload)
    /// or dropped, so identical requests wait instead of generating again.
    /// Do not request the same input again on one task while holding its stream.
    pub async fn explain_stream(&self, input: &str, context: Option<&str>) -> StreamStart {
        counter!("explain_requests_total").increment(1);
        let resolution = self.resolver.resolve(input).await;
        let request = self.request_for(&resolution, input, context);
        let fingerprint = request.fingerprint();
        let body = match self.cache.reserve(fingerprint).await {
            Reservation::Fresh(payload) => StreamBody::Cached(payload),
            Reservation::Vacant(lease) => {
                StreamBody::Live(self.generator.stream(&request).await.holding(lease))
            }
        };
        StreamStart {
            resolution,
            fingerprint,
            body,
        }
    }

    pub fn highlight(&self, text: &str) -> Vec<HighlightDecision> {
        self.disambiguator.highlight(text)
    }

    pub fn render_highlight(&self, text: &str) -> String {
        render_marked_html(text, &self.highlight(text))
    }

    pub fn glossary_entry(&self, term: &str) -> Option<Arc<GlossaryEntry>> {
        self.store.lookup(term).cloned()
    }

    fn request_for(
        &self,
        resolution: &ResolvedTerm,
        input: &str,
        context: Option<&str>,
    ) -> ExplanationRequest {
        ExplanationRequest::new(
            resolution.entry().cloned(),
            input,
            context.map(str::to_string),
        )
    }
}
