//! grant-match server entrypoint.
//! Boots the Axum HTTP server: config, generative service, listing sources, metrics.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use grant_match::config::MatchConfig;
use grant_match::metrics::Metrics;

/// Compact logs; `GRANTMATCH_LOG` wins over `RUST_LOG`.
fn init_tracing() {
    let filter = std::env::var("GRANTMATCH_LOG")
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("grant_match=info,warn"));

    // Shuttle may already have installed a subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = MatchConfig::load_default()?;
    let metrics = Metrics::init(config.ranking.fit_threshold)?;

    let router = grant_match::app().await?.merge(metrics.router());
    Ok(router.into())
}
