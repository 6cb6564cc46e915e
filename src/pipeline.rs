// src/pipeline.rs
//! Preconditions that need user action, and the shared engine handle used by the API.

use crate::config::{AiConfig, MatchConfig};
use crate::listing::Listing;
use crate::llm::RetryPolicy;
use crate::profile::ProfileBuilder;
use crate::ranker::MatchRanker;

/// At or below this many chars the publication list is probably a failed scrape.
pub const MIN_USEFUL_PUBLICATION_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("no publication text provided; paste a publication list or upload a CV")]
    NoPublications,
    #[error("no funding calls to rank; fetch or paste listings first")]
    NoListings,
}

pub fn require_publications(text: &str) -> Result<(), MatchError> {
    if text.trim().is_empty() {
        return Err(MatchError::NoPublications);
    }
    Ok(())
}

pub fn require_listings(listings: &[Listing]) -> Result<(), MatchError> {
    if listings.is_empty() {
        return Err(MatchError::NoListings);
    }
    Ok(())
}

/// Hint for the UI: ask for a pasted list / CV instead of relying on a scrape.
pub fn publications_need_more_text(text: &str) -> bool {
    text.trim().chars().count() <= MIN_USEFUL_PUBLICATION_CHARS
}

/// Profile builder and ranker wired from one config pair.
#[derive(Debug, Clone)]
pub struct Engine {
    pub config: MatchConfig,
    pub profiles: ProfileBuilder,
    pub ranker: MatchRanker,
}

impl Engine {
    pub fn new(config: MatchConfig, retry: RetryPolicy) -> Self {
        let profiles = ProfileBuilder::new(
            config.profile.clone(),
            config.recency.clone(),
            retry.clone(),
        );
        let ranker = MatchRanker::new(config.ranking.clone(), config.scoring.clone(), retry);
        Self {
            config,
            profiles,
            ranker,
        }
    }

    pub fn from_configs(config: MatchConfig, ai: &AiConfig) -> Self {
        Self::new(config, RetryPolicy::from_config(ai))
    }
}
