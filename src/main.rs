//! Financial term explainer: binary entrypoint.
//! Boots the Axum HTTP server with the explainer wired into shared state.

use shuttle_axum::ShuttleAxum;
use tracing::warn;

use finance_term_explainer::{build_app, logging, ENV_QUICK_PROBE};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    logging::init_tracing();

    let (router, runtime) = build_app()
        .await
        .map_err(shuttle_runtime::Error::Custom)?;

    runtime.explainer.spawn_cache_janitor();

    if std::env::var(ENV_QUICK_PROBE).ok().as_deref() == Some("1") {
        runtime.quick_probe().await;
    } else if runtime.explainer.store().is_empty() {
        warn!("glossary is empty; every query will be conversational");
    }

    Ok(router.into())
}
