// src/config/matching.rs
//! Matching constants loaded from `config/matching.toml`.
//!
//! Every field has a default, so a missing file (or a partial one) still yields a
//! usable config. Components receive the section they need instead of reading globals.
//!
//! ```toml
//! [recency]
//! half_life_years = 5.0
//!
//! [scoring]
//! fallback_bonus_cap = 20.0
//!
//! [ranking]
//! fit_threshold = 50
//! merge_policy = "lenient"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MATCH_CONFIG_PATH: &str = "config/matching.toml";
pub const ENV_MATCH_CONFIG_PATH: &str = "GRANTMATCH_CONFIG_PATH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub recency: RecencyConfig,
    pub scoring: ScoringConfig,
    pub ranking: RankingConfig,
    pub profile: ProfileConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecencyConfig {
    /// Age (years) at which a publication counts half as much as a current one.
    pub half_life_years: f64,
    /// Weight of a publication line without a recognizable year.
    pub unknown_year_weight: f64,
}

impl Default for RecencyConfig {
    fn default() -> Self {
        Self {
            half_life_years: 5.0,
            unknown_year_weight: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub min_token_len: usize,
    /// Base score when either token set is empty.
    pub empty_base_score: f64,
    pub overlap_floor: f64,
    pub overlap_step: f64,
    pub bonus_scale: f64,
    /// Recency bonus cap on the fallback path.
    pub fallback_bonus_cap: f64,
    /// Recency bonus cap on top of a service-provided score.
    pub service_bonus_cap: f64,
    pub max_overlap_terms: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_token_len: 3,
            empty_base_score: 5.0,
            overlap_floor: 10.0,
            overlap_step: 6.0,
            bonus_scale: 6.0,
            fallback_bonus_cap: 20.0,
            service_bonus_cap: 10.0,
            max_overlap_terms: 8,
        }
    }
}

/// What to do with malformed entries in the service's ranked list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Drop bad entries, keep the rest.
    #[default]
    Lenient,
    /// Any bad entry fails the whole response.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub fit_threshold: u8,
    pub max_listings: usize,
    pub summary_chars: usize,
    pub max_themes: usize,
    pub max_methods: usize,
    pub max_domains: usize,
    pub merge_policy: MergePolicy,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            fit_threshold: 50,
            max_listings: 50,
            summary_chars: 800,
            max_themes: 10,
            max_methods: 25,
            max_domains: 10,
            merge_policy: MergePolicy::Lenient,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub max_publication_chars: usize,
    pub max_proposal_chars: usize,
    /// Pin the "current year" for recency decay; system clock when absent.
    pub current_year: Option<i32>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            max_publication_chars: 12_000,
            max_proposal_chars: 8_000,
            current_year: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub nsf_rss_url: Option<String>,
    pub doe_rss_url: Option<String>,
    pub grants_gov_url: Option<String>,
    pub limit_each: usize,
    pub timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            nsf_rss_url: Some("https://www.nsf.gov/rss/rss_www_funding.xml".into()),
            doe_rss_url: Some("https://science.osti.gov/rss/foa.xml".into()),
            grants_gov_url: Some("https://api.grants.gov/v1/api/search2".into()),
            limit_each: 50,
            timeout_secs: 20,
        }
    }
}

impl MatchConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: Self = toml::from_str(s).context("parsing matching config")?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Reset values that would make the recency decay meaningless.
    fn sanitize(&mut self) {
        let defaults = RecencyConfig::default();
        let r = &mut self.recency;
        if !(r.half_life_years.is_finite() && r.half_life_years > 0.0) {
            tracing::warn!(value = r.half_life_years, "invalid half_life_years; using default");
            r.half_life_years = defaults.half_life_years;
        }
        if !(r.unknown_year_weight.is_finite() && r.unknown_year_weight >= 0.0) {
            tracing::warn!(value = r.unknown_year_weight, "invalid unknown_year_weight; using default");
            r.unknown_year_weight = defaults.unknown_year_weight;
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading matching config from {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    /// 1) $GRANTMATCH_CONFIG_PATH (must exist)
    /// 2) config/matching.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_MATCH_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                anyhow::bail!("{ENV_MATCH_CONFIG_PATH} points to non-existent path");
            }
            return Self::load_from_file(&pb);
        }
        let default_path = PathBuf::from(DEFAULT_MATCH_CONFIG_PATH);
        if default_path.exists() {
            return Self::load_from_file(&default_path);
        }
        Ok(Self::default())
    }
}
