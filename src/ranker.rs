// src/ranker.rs
//! Match ranking.
//!
//! States: `NotStarted → ServiceAttempt → {Merged | FallbackAll} → Done`.
//!
//! The service path sends a compact request (capped profile, first N listings with
//! truncated summaries tagged by `idx`), validates the answer, and merges it back onto
//! the *original* listings. Any irrecoverable failure scores the whole batch with the
//! deterministic fallback instead. Output is always a fresh copy; inputs are untouched.

use std::collections::HashSet;

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::{MergePolicy, RankingConfig, ScoringConfig};
use crate::fallback::{self, bounded_score, recency_bonus, recency_note};
use crate::listing::Listing;
use crate::llm::{request_json, GenerativeService, RetryPolicy, ServiceRequest};
use crate::profile::Profile;
use crate::text::truncate_chars;

/// Which scoring path produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankMode {
    Llm,
    Fallback,
}

/// A listing copy annotated with ranking metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedListing {
    #[serde(flatten)]
    pub listing: Listing,
    /// 0..=100
    pub fit_score: u8,
    pub why_fit: Vec<String>,
    pub recommended_pitch: String,
    pub rank_mode: RankMode,
}

/// How a ranking run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RankOutcome {
    /// No listings; nothing was called.
    Empty,
    /// Service answer merged; `discarded` malformed entries were dropped.
    Merged { discarded: usize },
    /// Service path failed; every listing scored by the fallback.
    FallbackAll { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankReport {
    pub entries: Vec<RankedListing>,
    pub outcome: RankOutcome,
}

pub const FAILURE_PREFIX: &str = "Generative ranking failed";

/// Fallback reason when the profile carries no themes, methods, domains or recency keywords.
pub const EMPTY_PROFILE_REASON: &str = "profile is empty (extraction degraded)";

#[derive(Debug, Clone)]
pub struct MatchRanker {
    pub ranking: RankingConfig,
    pub scoring: ScoringConfig,
    pub retry: RetryPolicy,
}

/// Result of merging the service's entries onto the input listings.
#[derive(Debug)]
struct Merge {
    /// (original index, entry)
    entries: Vec<(usize, RankedListing)>,
    discarded: usize,
}

impl MatchRanker {
    pub fn new(ranking: RankingConfig, scoring: ScoringConfig, retry: RetryPolicy) -> Self {
        Self {
            ranking,
            scoring,
            retry,
        }
    }

    /// Ranked entries only. See [`MatchRanker::rank_detailed`].
    pub async fn rank(
        &self,
        service: &dyn GenerativeService,
        profile: &Profile,
        listings: &[Listing],
        attempt_id: u64,
    ) -> Vec<RankedListing> {
        self.rank_detailed(service, profile, listings, attempt_id)
            .await
            .entries
    }

    /// Rank `listings` against `profile`. `attempt_id` only seeds the service's sampling.
    pub async fn rank_detailed(
        &self,
        service: &dyn GenerativeService,
        profile: &Profile,
        listings: &[Listing],
        attempt_id: u64,
    ) -> RankReport {
        if listings.is_empty() {
            debug!("nothing to rank");
            return RankReport {
                entries: Vec::new(),
                outcome: RankOutcome::Empty,
            };
        }
        if profile.is_empty() {
            // degraded extraction: nothing worth sending, score locally
            return self.fallback_report(profile, listings, EMPTY_PROFILE_REASON.to_string());
        }

        debug!(state = "service_attempt", provider = service.provider_name(), attempt_id);
        let report = match self.service_path(service, profile, listings, attempt_id).await {
            Ok(merge) => {
                info!(
                    state = "merged",
                    kept = merge.entries.len(),
                    discarded = merge.discarded,
                    "generative ranking merged"
                );
                counter!("rank_runs_total", "mode" => "llm").increment(1);
                RankReport {
                    entries: self.finish_merged(merge.entries),
                    outcome: RankOutcome::Merged {
                        discarded: merge.discarded,
                    },
                }
            }
            Err(reason) => self.fallback_report(profile, listings, reason),
        };
        debug!(state = "done", entries = report.entries.len());
        report
    }

    /// Score every listing with the fallback, best first, ties in input order.
    /// The failure reason is prefixed to the top entry.
    pub fn fallback_all(
        &self,
        profile: &Profile,
        listings: &[Listing],
        reason: &str,
    ) -> Vec<RankedListing> {
        let mut scored: Vec<RankedListing> = listings
            .iter()
            .map(|l| fallback::score(profile, l, &self.scoring))
            .collect();
        // stable: equal scores keep input order
        scored.sort_by(|a, b| b.fit_score.cmp(&a.fit_score));
        if let Some(top) = scored.first_mut() {
            top.why_fit.insert(0, format!("{FAILURE_PREFIX}: {reason}"));
        }
        scored
    }

    fn fallback_report(&self, profile: &Profile, listings: &[Listing], reason: String) -> RankReport {
        warn!(state = "fallback_all", %reason, listings = listings.len(), "falling back to keyword ranking");
        counter!("rank_runs_total", "mode" => "fallback").increment(1);
        RankReport {
            entries: self.fallback_all(profile, listings, &reason),
            outcome: RankOutcome::FallbackAll { reason },
        }
    }

    fn finish_merged(&self, mut entries: Vec<(usize, RankedListing)>) -> Vec<RankedListing> {
        entries.sort_by(|(ia, a), (ib, b)| b.fit_score.cmp(&a.fit_score).then(ia.cmp(ib)));
        entries
            .into_iter()
            .map(|(_, e)| e)
            .filter(|e| e.fit_score >= self.ranking.fit_threshold)
            .collect()
    }

    async fn service_path(
        &self,
        service: &dyn GenerativeService,
        profile: &Profile,
        listings: &[Listing],
        attempt_id: u64,
    ) -> Result<Merge, String> {
        let submitted = listings.len().min(self.ranking.max_listings);
        let req = ServiceRequest::new(self.ranking_prompt(profile, &listings[..submitted]))
            .seed(attempt_id);

        let ranked = request_json(service, req, &self.retry, |v| match v {
            Value::Object(mut m) => match m.remove("ranked") {
                Some(Value::Array(items)) => Ok(items),
                _ => Err("response has no \"ranked\" list".to_string()),
            },
            _ => Err("response is not a JSON object".to_string()),
        })
        .await
        .map_err(|e| e.to_string())?;

        let was_empty = ranked.is_empty();
        let merge = self.merge(profile, listings, submitted, ranked)?;
        if merge.entries.is_empty() && !was_empty {
            return Err("generative ranked list could not be merged".to_string());
        }
        Ok(merge)
    }

    fn merge(
        &self,
        profile: &Profile,
        listings: &[Listing],
        submitted: usize,
        ranked: Vec<Value>,
    ) -> Result<Merge, String> {
        let strict = self.ranking.merge_policy == MergePolicy::Strict;
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(ranked.len());
        let mut discarded = 0usize;

        for (pos, item) in ranked.into_iter().enumerate() {
            let idx = match entry_index(&item, submitted) {
                Some(i) if seen.insert(i) => i,
                _ => {
                    if strict {
                        return Err(format!("ranked entry #{pos} is malformed or out of range"));
                    }
                    discarded += 1;
                    continue;
                }
            };

            let original = &listings[idx];
            let bonus = recency_bonus(
                profile,
                original,
                self.scoring.service_bonus_cap,
                self.scoring.bonus_scale,
            );
            let mut why = Vec::new();
            if bonus > 0.0 {
                why.push(recency_note(bonus));
            }
            why.extend(loose_strings(item.get("why_fit")));

            entries.push((
                idx,
                RankedListing {
                    listing: original.clone(),
                    fit_score: bounded_score(loose_score(item.get("fit_score")) + bonus),
                    why_fit: why,
                    recommended_pitch: item
                        .get("recommended_pitch")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    rank_mode: RankMode::Llm,
                },
            ));
        }

        if discarded > 0 {
            debug!(discarded, "dropped malformed ranked entries");
        }
        Ok(Merge { entries, discarded })
    }

    fn ranking_prompt(&self, profile: &Profile, batch: &[Listing]) -> String {
        let r = &self.ranking;
        let compact_profile = json!({
            "themes": &profile.themes[..profile.themes.len().min(r.max_themes)],
            "methods_keywords": &profile.methods_keywords[..profile.methods_keywords.len().min(r.max_methods)],
            "application_domains": &profile.application_domains[..profile.application_domains.len().min(r.max_domains)],
        });
        let compact_listings: Vec<Value> = batch
            .iter()
            .enumerate()
            .map(|(i, l)| {
                json!({
                    "idx": i,
                    "agency": l.agency,
                    "title": l.title,
                    "summary": truncate_chars(&l.summary, r.summary_chars),
                    "deadline": l.deadline,
                    "link": l.link,
                    "source": l.source,
                })
            })
            .collect();

        format!(
            r#"You are ranking funding calls for research fit.

Return JSON with this exact schema:
{{
  "ranked": [
    {{
      "idx": 0,
      "fit_score": 0,
      "why_fit": ["...", "..."],
      "recommended_pitch": "..."
    }}
  ]
}}

Rules:
- fit_score is an integer 0..100 (higher is better).
- idx must match an input call idx.
- ONLY include calls with fit_score >= {threshold}.
- why_fit must be a short list of 2-5 bullets.
- If none qualify, return: {{"ranked": []}}

Professor profile:
{profile}

Calls:
{calls}"#,
            threshold = r.fit_threshold,
            profile = compact_profile,
            calls = Value::Array(compact_listings),
        )
    }
}

/// In-range integer `idx` of an object entry.
fn entry_index(item: &Value, submitted: usize) -> Option<usize> {
    let idx = item.as_object()?.get("idx")?.as_u64()?;
    usize::try_from(idx).ok().filter(|i| *i < submitted)
}

/// Integer, float or numeric string; anything else is 0.
fn loose_score(v: Option<&Value>) -> f64 {
    match v {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn loose_strings(v: Option<&Value>) -> Vec<String> {
    match v {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}
