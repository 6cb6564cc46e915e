// src/lib.rs
// Public library surface for the server binary and integration tests.

pub mod api;
pub mod config;
pub mod draft;
pub mod fallback;
pub mod listing;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod profile;
pub mod ranker;
pub mod recency;
pub mod snapshot;
pub mod sources;
pub mod text;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::listing::Listing;
pub use crate::pipeline::{Engine, MatchError};
pub use crate::profile::{Profile, ProfileBuilder};
pub use crate::ranker::{MatchRanker, RankMode, RankOutcome, RankReport, RankedListing};

use axum::Router;
use tracing::info;

use crate::config::{AiConfig, MatchConfig, DEFAULT_AI_CONFIG_PATH};

/// Build the full application router from on-disk config and the environment.
///
/// Does not install the metrics recorder; the binary merges [`metrics::Metrics::router`]
/// on top so tests can build many apps per process.
pub async fn app() -> anyhow::Result<Router> {
    let config = MatchConfig::load_default()?;
    let ai = AiConfig::load_or_disabled(DEFAULT_AI_CONFIG_PATH);
    let service = llm::build_service_from_config(&ai);
    let sources = sources::default_sources(&config.sources)?;

    info!(
        provider = service.provider_name(),
        sources = sources.len(),
        fit_threshold = config.ranking.fit_threshold,
        "grant-match configured"
    );

    let engine = Engine::from_configs(config, &ai);
    Ok(create_router(AppState::new(engine, service, sources)))
}
