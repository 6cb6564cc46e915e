// src/sources/mod.rs
//! Upstream funding-call sources. Each source yields loosely-typed records; a failing
//! source becomes a warning string and the run continues with the others.

pub mod grants_gov;
pub mod rss;

use anyhow::Result;
use metrics::counter;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::SourcesConfig;
use crate::listing::{ensure_non_empty, normalize_batch, Listing};

pub use grants_gov::GrantsGovSource;
pub use rss::RssSource;

pub type RawRecord = Map<String, Value>;

#[async_trait::async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch(&self, keywords: &[String], limit: usize) -> Result<Vec<RawRecord>>;
    fn name(&self) -> &str;
}

/// Normalized listings plus human-readable warnings for sources that failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchOutcome {
    pub listings: Vec<Listing>,
    pub warnings: Vec<String>,
}

/// Fetch from every source, normalize, filter, and never return an empty list.
pub async fn collect(
    sources: &[Box<dyn ListingSource>],
    keywords: &[String],
    limit_each: usize,
) -> FetchOutcome {
    let mut raw: Vec<Value> = Vec::new();
    let mut warnings = Vec::new();

    for s in sources {
        match s.fetch(keywords, limit_each).await {
            Ok(records) => {
                tracing::debug!(source = s.name(), records = records.len(), "source fetched");
                raw.extend(records.into_iter().map(Value::Object));
            }
            Err(e) => {
                tracing::warn!(error = ?e, source = s.name(), "source error");
                counter!("source_errors_total").increment(1);
                warnings.push(format!("{} failed: {e:#}", s.name()));
            }
        }
    }

    let mut listings = normalize_batch(&raw);
    ensure_non_empty(&mut listings, &mut warnings);
    FetchOutcome { listings, warnings }
}

/// NSF and DOE feeds plus Grants.gov, per config. Sources without a URL are skipped.
pub fn default_sources(cfg: &SourcesConfig) -> Result<Vec<Box<dyn ListingSource>>> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("grant-match/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .build()?;

    let mut out: Vec<Box<dyn ListingSource>> = Vec::new();
    if let Some(url) = &cfg.nsf_rss_url {
        out.push(Box::new(RssSource::from_url("NSF", url, client.clone())));
    }
    if let Some(url) = &cfg.doe_rss_url {
        out.push(Box::new(RssSource::from_url("DOE", url, client.clone())));
    }
    if let Some(url) = &cfg.grants_gov_url {
        out.push(Box::new(GrantsGovSource::new(url, client)));
    }
    Ok(out)
}
