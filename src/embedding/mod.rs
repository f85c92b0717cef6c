// src/embedding/mod.rs
//! Embedding service abstraction, the glossary vector index and the query cache.

pub mod hashing;
pub mod openai;

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::config::explainer::{test_mode_mock, ExplainerConfig};
use crate::glossary::{GlossaryEntry, GlossaryStore};

pub use hashing::HashingEmbedder;
pub use openai::OpenAiEmbeddingService;

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingServiceError {
    #[error("embedding service is disabled")]
    Disabled,
    #[error("embedding request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("embedding service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("embedding response malformed: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// One vector per input, in input order.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingServiceError>;

    async fn embed(&self, input: &str) -> Result<Vec<f32>, EmbeddingServiceError> {
        let mut out = self.embed_batch(&[input.to_string()]).await?;
        out.pop()
            .ok_or_else(|| EmbeddingServiceError::Malformed("empty embedding batch".into()))
    }

    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Always fails; vector search degrades to "no match".
pub struct DisabledEmbeddingService;

#[async_trait]
impl EmbeddingService for DisabledEmbeddingService {
    async fn embed_batch(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingServiceError> {
        Err(EmbeddingServiceError::Disabled)
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

pub type DynEmbeddingService = Arc<dyn EmbeddingService>;

/// Factory: build an embedding service according to config and environment variables.
///
/// * If `EXPLAINER_TEST_MODE=mock`, returns the offline hashing embedder.
/// * Else if embeddings are disabled, returns a disabled service.
/// * Else builds the configured provider; a missing API key disables OpenAI.
pub fn build_embedding_service(cfg: &ExplainerConfig) -> DynEmbeddingService {
    let section = &cfg.embedding;
    let provider = section.provider.trim().to_ascii_lowercase();
    if test_mode_mock() || provider == "hashing" {
        return Arc::new(HashingEmbedder::new(section.hashing_dimensions));
    }
    if !section.enabled {
        return Arc::new(DisabledEmbeddingService);
    }
    match provider.as_str() {
        "openai" => {
            let key = cfg.resolved_api_key();
            match OpenAiEmbeddingService::new(
                key,
                &cfg.openai.base_url,
                &section.model,
                cfg.embedding_timeout(),
                section.max_retries,
            ) {
                Ok(svc) => Arc::new(svc),
                Err(e) => {
                    warn!(error = %e, "openai embeddings unavailable; vector search disabled");
                    Arc::new(DisabledEmbeddingService)
                }
            }
        }
        other => {
            warn!(provider = other, "unsupported embedding provider; vector search disabled");
            Arc::new(DisabledEmbeddingService)
        }
    }
}

/// Cosine distance `1 - cos(a, b)`, in 0..=2. Mismatched or zero vectors are maximally distant.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 2.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 2.0;
    }
    (1.0 - dot / (na.sqrt() * nb.sqrt())).clamp(0.0, 2.0)
}

#[derive(Debug, Clone)]
pub struct Neighbor {
    pub entry: Arc<GlossaryEntry>,
    pub distance: f32,
}

/// Term vectors for every glossary entry. Read-only after construction.
#[derive(Default)]
pub struct EmbeddingIndex {
    rows: Vec<(Arc<GlossaryEntry>, Vec<f32>)>,
}

impl EmbeddingIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Embed every term in batches of `batch_size`.
    pub async fn build(
        store: &GlossaryStore,
        service: &dyn EmbeddingService,
        batch_size: usize,
    ) -> Result<Self, EmbeddingServiceError> {
        let entries = store.all();
        let mut rows = Vec::with_capacity(entries.len());
        for chunk in entries.chunks(batch_size.max(1)) {
            let inputs: Vec<String> = chunk.iter().map(|e| e.term.clone()).collect();
            let vectors = service.embed_batch(&inputs).await?;
            if vectors.len() != inputs.len() {
                return Err(EmbeddingServiceError::Malformed(format!(
                    "{} embeddings for {} inputs",
                    vectors.len(),
                    inputs.len()
                )));
            }
            rows.extend(chunk.iter().cloned().zip(vectors));
        }
        info!(
            target: "explain",
            provider = service.name(),
            rows = rows.len(),
            "embedding index built"
        );
        Ok(Self { rows })
    }

    /// Build, or fall back to an empty index when the service is unavailable.
    pub async fn build_or_empty(
        store: &GlossaryStore,
        service: &dyn EmbeddingService,
        batch_size: usize,
    ) -> Self {
        match Self::build(store, service, batch_size).await {
            Ok(index) => index,
            Err(e) => {
                warn!(target: "explain", error = %e, "embedding index unavailable; approximate matches disabled");
                Self::empty()
            }
        }
    }

    /// The `k` closest entries, nearest first.
    pub fn nearest(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let mut scored: Vec<Neighbor> = self
            .rows
            .iter()
            .map(|(entry, v)| Neighbor {
                entry: entry.clone(),
                distance: cosine_distance(query, v),
            })
            .collect();
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(k);
        scored
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Bounded query → vector cache; oldest insertions are evicted first.
pub struct QueryEmbeddingCache {
    capacity: usize,
    inner: Mutex<(HashMap<String, Arc<Vec<f32>>>, VecDeque<String>)>,
}

impl QueryEmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new((HashMap::new(), VecDeque::new())),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<Vec<f32>>> {
        let g = match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        g.0.get(key).cloned()
    }

    pub fn insert(&self, key: String, vector: Arc<Vec<f32>>) {
        let mut g = match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        let (map, order) = &mut *g;
        if map.insert(key.clone(), vector).is_none() {
            order.push_back(key);
        }
        while order.len() > self.capacity {
            if let Some(old) = order.pop_front() {
                map.remove(&old);
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(g) => g.0.len(),
            Err(poison) => poison.into_inner().0.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glossary::{GlossaryOptions, GlossaryStore};

    #[test]
    fn cosine_distance_bounds() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[1.0], &[1.0, 2.0]), 2.0);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 2.0);
    }

    #[test]
    fn query_cache_evicts_oldest() {
        let c = QueryEmbeddingCache::new(2);
        c.insert("a".into(), Arc::new(vec![1.0]));
        c.insert("b".into(), Arc::new(vec![2.0]));
        c.insert("a".into(), Arc::new(vec![3.0]));
        c.insert("c".into(), Arc::new(vec![4.0]));
        assert_eq!(c.len(), 2);
        assert!(c.get("a").is_none());
        assert_eq!(c.get("c").as_deref(), Some(&vec![4.0]));
    }

    #[tokio::test]
    async fn index_nearest_returns_closest_term() {
        let store = GlossaryStore::from_reader(
            "term,category,definition\n금리,a,x\n환율,b,y\n".as_bytes(),
            GlossaryOptions {
                include_builtin: false,
            },
        )
        .expect("load");
        let embedder = HashingEmbedder::new(512);
        let index = EmbeddingIndex::build(&store, &embedder, 1)
            .await
            .expect("index");
        assert_eq!(index.len(), 2);

        let q = embedder.embed("금리").await.expect("embed");
        let best = index.nearest(&q, 1);
        assert_eq!(best.len(), 1);
        assert_eq!(best[0].entry.term, "금리");
        assert!(best[0].distance < 1e-4);
    }

    #[tokio::test]
    async fn disabled_service_yields_empty_index() {
        let store = GlossaryStore::from_reader(
            "term,category,definition\n금리,a,x\n".as_bytes(),
            GlossaryOptions::default(),
        )
        .expect("load");
        let index = EmbeddingIndex::build_or_empty(&store, &DisabledEmbeddingService, 8).await;
        assert!(index.is_empty());
    }
}
