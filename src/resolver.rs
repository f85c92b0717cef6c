// src/resolver.rs
//! Query → glossary entry resolution: exact match, then nearest-neighbor search.

use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::config::explainer::ResolverSection;
use crate::embedding::{DynEmbeddingService, EmbeddingIndex, QueryEmbeddingCache};
use crate::fingerprint::normalize_input;
use crate::glossary::{GlossaryEntry, GlossaryStore};
use crate::logging::anon_id;
use crate::metrics::ensure_metrics_described;

/// Case particles and copula endings stripped from a token before lookup.
/// Longest first so "으로" is tried before "로".
const PARTICLES: &[&str] = &[
    "이라는", "에서는", "으로는", "이에요", "이란", "이라", "라는", "에서", "으로", "에게",
    "까지", "부터", "처럼", "보다", "이야", "예요", "가", "이", "은", "는", "을", "를",
    "의", "에", "로", "와", "과", "도", "만", "란", "야",
];

const TRAILING_PUNCT: &[char] = &['?', '!', '.', ',', '~', '…', '？', '！'];

#[derive(Debug, Clone)]
pub enum ResolvedTerm {
    Exact(Arc<GlossaryEntry>),
    Approximate {
        entry: Arc<GlossaryEntry>,
        distance: f32,
    },
    Unresolved,
}

impl ResolvedTerm {
    pub fn entry(&self) -> Option<&Arc<GlossaryEntry>> {
        match self {
            ResolvedTerm::Exact(e) | ResolvedTerm::Approximate { entry: e, .. } => Some(e),
            ResolvedTerm::Unresolved => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResolvedTerm::Exact(_) => "exact",
            ResolvedTerm::Approximate { .. } => "approximate",
            ResolvedTerm::Unresolved => "unresolved",
        }
    }

    pub fn summary(&self) -> ResolutionSummary {
        ResolutionSummary {
            kind: self.kind(),
            term: self.entry().map(|e| e.term.clone()),
            distance: match self {
                ResolvedTerm::Approximate { distance, .. } => Some(*distance),
                _ => None,
            },
        }
    }
}

/// Serializable view of a resolution for API responses.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResolutionSummary {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

pub struct TermResolver {
    store: Arc<GlossaryStore>,
    index: Arc<EmbeddingIndex>,
    embedder: DynEmbeddingService,
    query_cache: QueryEmbeddingCache,
    accept_distance: f32,
    top_k: usize,
}

impl TermResolver {
    pub fn new(
        store: Arc<GlossaryStore>,
        index: Arc<EmbeddingIndex>,
        embedder: DynEmbeddingService,
        settings: &ResolverSection,
    ) -> Self {
        ensure_metrics_described();
        Self {
            store,
            index,
            embedder,
            query_cache: QueryEmbeddingCache::new(settings.query_cache_capacity),
            accept_distance: settings.accept_distance,
            top_k: settings.top_k.max(1),
        }
    }

    pub fn accept_distance(&self) -> f32 {
        self.accept_distance
    }

    /// Ordered fallback: exact lookup, then vector search, else `Unresolved`.
    #[instrument(level = "debug", skip_all, fields(query = %anon_id(query)))]
    pub async fn resolve(&self, query: &str) -> ResolvedTerm {
        let resolved = match self.resolve_exact(query) {
            Some(entry) => ResolvedTerm::Exact(entry),
            None => self.resolve_approximate(query).await,
        };
        counter!("explain_resolution_total", "kind" => resolved.kind()).increment(1);
        resolved
    }

    /// In-memory only. Tries the whole query, the query without a trailing particle,
    /// then each token that is a glossary term followed by a particle ("금리가").
    pub fn resolve_exact(&self, query: &str) -> Option<Arc<GlossaryEntry>> {
        let trimmed = query.trim().trim_end_matches(TRAILING_PUNCT).trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Some(e) = self.store.lookup(trimmed) {
            return Some(e.clone());
        }
        if let Some(e) = self.lookup_stripped(trimmed) {
            return Some(e);
        }
        trimmed
            .split_whitespace()
            .map(|tok| tok.trim_end_matches(TRAILING_PUNCT))
            .find_map(|tok| self.lookup_stripped(tok))
    }

    fn lookup_stripped(&self, token: &str) -> Option<Arc<GlossaryEntry>> {
        PARTICLES.iter().find_map(|p| {
            let stem = token.strip_suffix(p)?.trim_end();
            if stem.is_empty() {
                return None;
            }
            self.store.lookup(stem).cloned()
        })
    }

    async fn resolve_approximate(&self, query: &str) -> ResolvedTerm {
        if self.index.is_empty() {
            return ResolvedTerm::Unresolved;
        }
        let key = normalize_input(query);
        if key.is_empty() {
            return ResolvedTerm::Unresolved;
        }

        let vector = match self.query_cache.get(&key) {
            Some(v) => v,
            None => match self.embedder.embed(&key).await {
                Ok(v) => {
                    let v = Arc::new(v);
                    self.query_cache.insert(key, v.clone());
                    v
                }
                Err(e) => {
                    counter!("explain_embedding_errors_total").increment(1);
                    warn!(target: "explain", error = %e, provider = self.embedder.name(), "query embedding failed; treating as unresolved");
                    return ResolvedTerm::Unresolved;
                }
            },
        };

        let best = self.index.nearest(&vector, self.top_k).into_iter().next();
        match best {
            Some(n) if n.distance <= self.accept_distance => {
                debug!(target: "explain", term = %n.entry.term, distance = n.distance, "approximate match");
                ResolvedTerm::Approximate {
                    entry: n.entry,
                    distance: n.distance,
                }
            }
            Some(n) => {
                debug!(target: "explain", distance = n.distance, threshold = self.accept_distance, "nearest term too far");
                ResolvedTerm::Unresolved
            }
            None => ResolvedTerm::Unresolved,
        }
    }
}
