// src/recency.rs
//! Keyword recency weights.
//!
//! Each non-empty line of the publication text is one record. A record's weight decays
//! with its age (exponential half-life); records without a year get a small flat weight.
//! A keyword's score is the sum of the weights of the records that mention it, rescaled
//! so the strongest keyword is exactly `1.0`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};

use crate::config::RecencyConfig;

static RE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("year regex"));

/// First 19xx/20xx token on the line, if any.
pub fn extract_year(line: &str) -> Option<i32> {
    RE_YEAR
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Decayed weight of one record. Future years clamp to age 0.
pub fn year_weight(year: Option<i32>, current_year: i32, cfg: &RecencyConfig) -> f64 {
    match year {
        None => cfg.unknown_year_weight,
        Some(y) => {
            let age = (current_year - y).max(0) as f64;
            0.5_f64.powf(age / cfg.half_life_years)
        }
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Compute normalized recency weights for `keywords` over `pub_text`.
///
/// Returns an empty map when no keyword matched any line; that means "no recency
/// signal", not an error.
pub fn keyword_recency_weights(
    pub_text: &str,
    keywords: &[String],
    current_year: i32,
    cfg: &RecencyConfig,
) -> BTreeMap<String, f64> {
    // (original casing, lowercased) in first-seen order; exact repeats counted once
    let mut seen = HashSet::new();
    let kws: Vec<(&str, String)> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty() && seen.insert(*k))
        .map(|k| (k, k.to_lowercase()))
        .collect();

    if kws.is_empty() {
        return BTreeMap::new();
    }

    let mut scores: BTreeMap<String, f64> = BTreeMap::new();
    for line in pub_text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let line_l = line.to_lowercase();
        let w = year_weight(extract_year(line), current_year, cfg);
        for (orig, kw_l) in &kws {
            if line_l.contains(kw_l.as_str()) {
                *scores.entry((*orig).to_string()).or_insert(0.0) += w;
            }
        }
    }

    let max = scores.values().copied().fold(0.0_f64, f64::max);
    if scores.is_empty() || max <= 0.0 {
        return BTreeMap::new();
    }

    scores
        .into_iter()
        .map(|(k, v)| (k, round4(v / max)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kws(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn year_extraction_takes_first_match() {
        assert_eq!(extract_year("Foo (2019), reprinted 2021"), Some(2019));
        assert_eq!(extract_year("Proc. 1998 workshop"), Some(1998));
        assert_eq!(extract_year("no year here, 12345 or 2101x"), None);
        assert_eq!(extract_year("arXiv 21003"), None);
    }

    #[test]
    fn half_life_line_counts_half() {
        let cfg = RecencyConfig::default();
        let text = "Graph learning for robots, 2026\nStochastic control methods, 2021";
        let w = keyword_recency_weights(text, &kws(&["graph learning", "stochastic control"]), 2026, &cfg);
        assert_eq!(w["graph learning"], 1.0);
        assert_eq!(w["stochastic control"], 0.5);
    }

    #[test]
    fn unknown_year_gets_flat_weight() {
        let cfg = RecencyConfig::default();
        let text = "robotics survey (undated)\ncontrol paper 2026";
        let w = keyword_recency_weights(text, &kws(&["robotics", "control"]), 2026, &cfg);
        assert_eq!(w["control"], 1.0);
        assert_eq!(w["robotics"], 0.25);
    }

    #[test]
    fn future_years_clamp_to_zero_age() {
        let cfg = RecencyConfig::default();
        assert_eq!(year_weight(Some(2030), 2026, &cfg), 1.0);
    }

    #[test]
    fn no_match_is_empty() {
        let cfg = RecencyConfig::default();
        assert!(keyword_recency_weights("one line 2020", &kws(&["absent"]), 2026, &cfg).is_empty());
        assert!(keyword_recency_weights("", &kws(&["x"]), 2026, &cfg).is_empty());
        assert!(keyword_recency_weights("text", &kws(&["  ", ""]), 2026, &cfg).is_empty());
    }

    #[test]
    fn case_variants_are_distinct_and_duplicates_count_once() {
        let cfg = RecencyConfig::default();
        let text = "Robotics 2026\nrobotics and vision 2016";
        let w = keyword_recency_weights(
            text,
            &kws(&["Robotics", "robotics", "Robotics", "vision"]),
            2026,
            &cfg,
        );
        assert_eq!(w.len(), 3);
        assert_eq!(w["Robotics"], 1.0);
        assert_eq!(w["robotics"], 1.0);
        // 0.25 / 1.25
        assert_eq!(w["vision"], 0.2);
    }

    #[test]
    fn values_are_bounded_with_exact_max() {
        let cfg = RecencyConfig::default();
        let text = "alpha beta 1999\nbeta gamma 2011\ngamma 2024\nalpha\nbeta 2025";
        let w = keyword_recency_weights(text, &kws(&["alpha", "beta", "gamma", "delta"]), 2026, &cfg);
        assert!(w.values().all(|v| (0.0..=1.0).contains(v)));
        let max = w.values().copied().fold(0.0, f64::max);
        assert_eq!(max, 1.0);
        assert!(!w.contains_key("delta"));
    }
}
