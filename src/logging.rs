// src/logging.rs
//! Tracing setup and the anonymized dev logger.
//!
//! Raw user text never reaches the logs; events carry a short SHA-256 prefix instead.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_DEV_LOG: &str = "EXPLAINER_DEV_LOG";
pub const ENV_LOG_JSON: &str = "EXPLAINER_LOG_JSON";

fn is_dev_env() -> bool {
    cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        )
}

/// Dev logging gate: EXPLAINER_DEV_LOG=1 AND dev env (debug or SHUTTLE_ENV in {local,development,dev})
pub(crate) fn dev_logging_enabled() -> bool {
    let on = std::env::var(ENV_DEV_LOG).ok().as_deref() == Some("1");
    on && is_dev_env()
}

/// Install the global subscriber. JSON output when EXPLAINER_LOG_JSON=1, compact otherwise.
/// Safe to call twice; the second call is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,explain=info,disambiguate=info"));

    let json = std::env::var(ENV_LOG_JSON).ok().as_deref() == Some("1");
    let result = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Short, stable, non-reversible id for a piece of user text.
pub(crate) fn anon_id(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
