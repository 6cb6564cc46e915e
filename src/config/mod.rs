// src/config/mod.rs
pub mod ai;
pub mod matching;

pub use ai::{AiConfig, DEFAULT_AI_CONFIG_PATH};
pub use matching::{
    MatchConfig, MergePolicy, ProfileConfig, RankingConfig, RecencyConfig, ScoringConfig,
    SourcesConfig, DEFAULT_MATCH_CONFIG_PATH, ENV_MATCH_CONFIG_PATH,
};
