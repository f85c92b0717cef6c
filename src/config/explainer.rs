// src/config/explainer.rs
//! Runtime configuration loaded from TOML, with environment overrides.
//!
//! Every section is optional; a missing file at the default path yields the
//! built-in defaults, so a bare checkout boots with only a glossary CSV.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use std::{env, fs};
use tracing::info;

use crate::glossary::keywords;

// --- env defaults & names ---
pub const DEFAULT_EXPLAINER_CONFIG_PATH: &str = "config/explainer.toml";

pub const ENV_EXPLAINER_CONFIG_PATH: &str = "EXPLAINER_CONFIG_PATH";
pub const ENV_GLOSSARY_PATH: &str = "EXPLAINER_GLOSSARY_PATH";
pub const ENV_APPROX_THRESHOLD: &str = "EXPLAINER_APPROX_THRESHOLD";
pub const ENV_CACHE_TTL_SECS: &str = "EXPLAINER_CACHE_TTL_SECS";
pub const ENV_TEST_MODE: &str = "EXPLAINER_TEST_MODE";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

pub const DEFAULT_APPROX_THRESHOLD: f32 = 0.38;
pub const DEFAULT_WINDOW_RADIUS: usize = 100;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

fn default_glossary_path() -> String {
    "data/glossary.csv".to_string()
}
fn default_true() -> bool {
    true
}
fn default_window_radius() -> usize {
    DEFAULT_WINDOW_RADIUS
}
fn default_self_sufficient() -> Vec<String> {
    to_owned_list(keywords::SELF_SUFFICIENT_KEYWORDS)
}
fn default_brand_blockers() -> Vec<String> {
    to_owned_list(keywords::BRAND_BLOCKER_KEYWORDS)
}
fn default_strong_keywords() -> Vec<String> {
    to_owned_list(keywords::STRONG_MARKET_KEYWORDS)
}
fn default_accept_distance() -> f32 {
    DEFAULT_APPROX_THRESHOLD
}
fn default_top_k() -> usize {
    1
}
fn default_query_cache_capacity() -> usize {
    512
}
fn default_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}
fn default_janitor_secs() -> u64 {
    600
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    550
}
fn default_generation_timeout_ms() -> u64 {
    12_000
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_hashing_dimensions() -> usize {
    512
}
fn default_embedding_timeout_ms() -> u64 {
    8_000
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> usize {
    3
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExplainerConfig {
    #[serde(default)]
    pub glossary: GlossarySection,
    #[serde(default)]
    pub disambiguation: DisambiguationSection,
    #[serde(default)]
    pub resolver: ResolverSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub openai: OpenAiSection,
    #[serde(default)]
    pub generation: GenerationSection,
    #[serde(default)]
    pub embedding: EmbeddingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlossarySection {
    #[serde(default = "default_glossary_path")]
    pub path: String,
    /// Append the built-in seed terms that the dataset does not define itself.
    #[serde(default = "default_true")]
    pub include_builtin: bool,
}

impl Default for GlossarySection {
    fn default() -> Self {
        Self {
            path: default_glossary_path(),
            include_builtin: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisambiguationSection {
    /// Context radius in characters on each side of a match.
    #[serde(default = "default_window_radius")]
    pub window_radius: usize,
    #[serde(default = "default_self_sufficient")]
    pub self_sufficient: Vec<String>,
    #[serde(default = "default_brand_blockers")]
    pub brand_blockers: Vec<String>,
    #[serde(default = "default_strong_keywords")]
    pub strong_keywords: Vec<String>,
}

impl Default for DisambiguationSection {
    fn default() -> Self {
        Self {
            window_radius: default_window_radius(),
            self_sufficient: default_self_sufficient(),
            brand_blockers: default_brand_blockers(),
            strong_keywords: default_strong_keywords(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSection {
    /// Maximum cosine distance (0..=2) accepted for an approximate match.
    #[serde(default = "default_accept_distance")]
    pub accept_distance: f32,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_query_cache_capacity")]
    pub query_cache_capacity: usize,
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            accept_distance: default_accept_distance(),
            top_k: default_top_k(),
            query_cache_capacity: default_query_cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_janitor_secs")]
    pub janitor_interval_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            janitor_interval_secs: default_janitor_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiSection {
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for OpenAiSection {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_generation_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_chat_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_ms: default_generation_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// "openai" | "hashing" (case-insensitive)
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Vector width of the offline hashing embedder.
    #[serde(default = "default_hashing_dimensions")]
    pub hashing_dimensions: usize,
    #[serde(default = "default_embedding_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            hashing_dimensions: default_hashing_dimensions(),
            timeout_ms: default_embedding_timeout_ms(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
        }
    }
}

// parse optional float env and clamp to <0.0..=2.0> (cosine distance range)
fn parse_threshold_env(raw: Option<String>) -> Option<f32> {
    raw.and_then(|s| s.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 2.0))
}

fn parse_secs_env(raw: Option<String>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
}

/// True when `EXPLAINER_TEST_MODE=mock`: offline embedder + mock completions.
pub fn test_mode_mock() -> bool {
    env::var(ENV_TEST_MODE)
        .map(|v| v.trim().eq_ignore_ascii_case("mock"))
        .unwrap_or(false)
}

impl ExplainerConfig {
    /// Load from EXPLAINER_CONFIG_PATH or "config/explainer.toml", then apply env overrides.
    ///
    /// An explicitly configured path must exist; the default path may be absent.
    pub fn load() -> anyhow::Result<Self> {
        let explicit = env::var(ENV_EXPLAINER_CONFIG_PATH).ok().map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPLAINER_CONFIG_PATH));

        let mut cfg = match fs::read_to_string(&path) {
            Ok(content) => Self::from_toml_str(&content).map_err(|e| {
                anyhow::anyhow!("Failed to parse explainer config at {}: {}", path.display(), e)
            })?,
            Err(e) if explicit.is_some() => {
                anyhow::bail!(
                    "Failed to read explainer config at {}: {}",
                    path.display(),
                    e
                )
            }
            Err(_) => {
                info!(path = %path.display(), "explainer config not found, using defaults");
                Self::default()
            }
        };

        cfg.apply_env_overrides();
        cfg.sanitize();
        Ok(cfg)
    }

    /// Parse from a TOML string (no env overrides, sanitized).
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let mut cfg: ExplainerConfig = toml::from_str(toml_str)?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = env::var(ENV_GLOSSARY_PATH) {
            if !path.trim().is_empty() {
                self.glossary.path = path.trim().to_string();
            }
        }
        if let Some(t) = parse_threshold_env(env::var(ENV_APPROX_THRESHOLD).ok()) {
            self.resolver.accept_distance = t;
        }
        if let Some(secs) = parse_secs_env(env::var(ENV_CACHE_TTL_SECS).ok()) {
            self.cache.ttl_secs = secs;
        }
    }

    fn sanitize(&mut self) {
        let d = self.resolver.accept_distance;
        if !d.is_finite() || !(0.0..=2.0).contains(&d) {
            self.resolver.accept_distance = DEFAULT_APPROX_THRESHOLD;
        }
        self.resolver.top_k = self.resolver.top_k.max(1);
        self.resolver.query_cache_capacity = self.resolver.query_cache_capacity.max(1);
        self.disambiguation.window_radius = self.disambiguation.window_radius.max(1);
        if self.cache.ttl_secs == 0 {
            self.cache.ttl_secs = DEFAULT_CACHE_TTL_SECS;
        }
        self.cache.janitor_interval_secs = self.cache.janitor_interval_secs.max(1);
        if !self.generation.temperature.is_finite() {
            self.generation.temperature = default_temperature();
        }
        self.generation.temperature = self.generation.temperature.clamp(0.0, 2.0);
        self.generation.max_tokens = self.generation.max_tokens.max(16);
        self.generation.timeout_ms = self.generation.timeout_ms.max(1);
        self.embedding.provider = self.embedding.provider.trim().to_ascii_lowercase();
        self.embedding.hashing_dimensions = self.embedding.hashing_dimensions.max(8);
        self.embedding.batch_size = self.embedding.batch_size.max(1);
        self.embedding.max_retries = self.embedding.max_retries.max(1);
    }

    /// Resolve the API key: "ENV" reads OPENAI_API_KEY. Missing keys yield an
    /// empty string; callers decide whether that deserves a warning.
    pub fn resolved_api_key(&self) -> String {
        let raw = self.openai.api_key.trim();
        if raw.eq_ignore_ascii_case("env") {
            env::var(ENV_OPENAI_API_KEY)
                .map(|k| k.trim().to_string())
                .unwrap_or_default()
        } else {
            raw.to_string()
        }
    }

    /// True when some configured provider would call the OpenAI API.
    pub fn wants_remote(&self) -> bool {
        !test_mode_mock() && (self.generation.enabled || self.embedding.provider == "openai")
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation.timeout_ms)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_millis(self.embedding.timeout_ms)
    }
}
