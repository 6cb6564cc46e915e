// src/fallback.rs
//! Deterministic fallback scoring: token overlap plus a recency bonus.
//! Pure; no I/O, no service calls.

use crate::config::ScoringConfig;
use crate::listing::Listing;
use crate::profile::Profile;
use crate::ranker::{RankMode, RankedListing};
use crate::text::overlap_tokens;

pub const FALLBACK_TRAILER: &str = "Scored with fallback keyword matcher (generative ranking unavailable).";

pub const FALLBACK_PITCH: &str = "Angle: connect the professor's core methods/themes to the call's focus. \
Propose 2-3 aims, identify datasets/testbeds, and highlight prior results.";

/// Explanation line for a nonzero recency bonus.
pub fn recency_note(bonus: f64) -> String {
    format!("Recent-publication bonus applied (+{bonus:.1})")
}

/// Sum of recency weights of profile keywords found in the listing's
/// title/summary/agency, scaled and capped.
pub fn recency_bonus(profile: &Profile, listing: &Listing, cap: f64, scale: f64) -> f64 {
    if profile.keyword_recency_weights.is_empty() {
        return 0.0;
    }
    let text = format!("{} {} {}", listing.title, listing.summary, listing.agency).to_lowercase();

    let acc: f64 = profile
        .keyword_recency_weights
        .iter()
        .filter(|(kw, _)| !kw.is_empty() && text.contains(kw.to_lowercase().as_str()))
        .map(|(_, w)| *w)
        .sum();

    (acc * scale).min(cap)
}

/// Clamp to [0,100] and round.
pub(crate) fn bounded_score(raw: f64) -> u8 {
    raw.clamp(0.0, 100.0).round() as u8
}

/// Score one listing against the profile without the generative service.
pub fn score(profile: &Profile, listing: &Listing, cfg: &ScoringConfig) -> RankedListing {
    let profile_blob = profile
        .methods_keywords
        .iter()
        .chain(profile.themes.iter())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");
    let listing_blob = [
        listing.agency.as_str(),
        listing.title.as_str(),
        listing.summary.as_str(),
        listing.deadline.as_str(),
    ]
    .join(" ");

    let a = overlap_tokens(&profile_blob, cfg.min_token_len);
    let b = overlap_tokens(&listing_blob, cfg.min_token_len);

    let overlap: Vec<&String> = a.intersection(&b).collect();
    let base = if a.is_empty() || b.is_empty() {
        cfg.empty_base_score
    } else {
        (cfg.overlap_floor + cfg.overlap_step * overlap.len() as f64).min(100.0)
    };

    let bonus = recency_bonus(profile, listing, cfg.fallback_bonus_cap, cfg.bonus_scale);

    let mut why = Vec::new();
    if !overlap.is_empty() {
        let hits: Vec<&str> = overlap
            .iter()
            .take(cfg.max_overlap_terms)
            .map(|s| s.as_str())
            .collect();
        why.push(format!("Keyword overlap: {}", hits.join(", ")));
    }
    if bonus > 0.0 {
        why.push(recency_note(bonus));
    }
    why.push(FALLBACK_TRAILER.to_string());

    RankedListing {
        listing: listing.clone(),
        fit_score: bounded_score(base + bonus),
        why_fit: why,
        recommended_pitch: FALLBACK_PITCH.to_string(),
        rank_mode: RankMode::Fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(methods: &[&str], themes: &[&str]) -> Profile {
        Profile {
            methods_keywords: methods.iter().map(|s| s.to_string()).collect(),
            themes: themes.iter().map(|s| s.to_string()).collect(),
            ..Profile::default()
        }
    }

    fn robotics_listing() -> Listing {
        Listing {
            agency: "NSF".into(),
            title: "Robotics Control Grant".into(),
            summary: "advanced control systems".into(),
            ..Listing::default()
        }
    }

    #[test]
    fn robotics_control_scores_22() {
        let p = profile(&["robotics", "control"], &[]);
        let r = score(&p, &robotics_listing(), &ScoringConfig::default());
        assert_eq!(r.fit_score, 22);
        assert_eq!(r.rank_mode, RankMode::Fallback);
        assert_eq!(r.why_fit[0], "Keyword overlap: control, robotics");
        assert_eq!(r.why_fit.last().unwrap(), FALLBACK_TRAILER);
        assert_eq!(r.listing, robotics_listing());
    }

    #[test]
    fn empty_profile_tokens_score_5() {
        let p = profile(&[], &[]);
        let r = score(&p, &robotics_listing(), &ScoringConfig::default());
        assert_eq!(r.fit_score, 5);
        assert_eq!(r.why_fit, vec![FALLBACK_TRAILER.to_string()]);
    }

    #[test]
    fn overlap_is_capped_at_100() {
        let words: Vec<String> = (0..30).map(|i| format!("term{i:02}")).collect();
        let p = Profile {
            methods_keywords: words.clone(),
            ..Profile::default()
        };
        let l = Listing {
            title: words.join(" "),
            ..Listing::default()
        };
        let r = score(&p, &l, &ScoringConfig::default());
        assert_eq!(r.fit_score, 100);
        // at most 8 terms listed
        assert_eq!(r.why_fit[0].matches(", ").count(), 7);
    }

    #[test]
    fn recency_bonus_scales_and_caps() {
        let mut p = profile(&["robotics", "control"], &[]);
        p.keyword_recency_weights.insert("Robotics".into(), 1.0);
        p.keyword_recency_weights.insert("control".into(), 0.5);
        p.keyword_recency_weights.insert("absent".into(), 1.0);
        let l = robotics_listing();

        assert_eq!(recency_bonus(&p, &l, 20.0, 6.0), 9.0);
        assert_eq!(recency_bonus(&p, &l, 5.0, 6.0), 5.0);

        let r = score(&p, &l, &ScoringConfig::default());
        assert_eq!(r.fit_score, 31);
        assert!(r.why_fit.contains(&"Recent-publication bonus applied (+9.0)".to_string()));
    }

    #[test]
    fn deadline_counts_for_overlap_but_not_recency() {
        let mut p = profile(&["2026-05-01"], &[]);
        p.keyword_recency_weights.insert("2026-05-01".into(), 1.0);
        let l = Listing {
            title: "call".into(),
            deadline: "2026-05-01".into(),
            ..Listing::default()
        };
        let r = score(&p, &l, &ScoringConfig::default());
        assert_eq!(r.fit_score, 16);
    }

    #[test]
    fn scoring_is_pure() {
        let mut p = profile(&["graph", "learning"], &["networks"]);
        p.keyword_recency_weights.insert("graph".into(), 0.7);
        let l = Listing {
            title: "Graph learning for networks".into(),
            summary: "learning on graphs".into(),
            ..Listing::default()
        };
        let cfg = ScoringConfig::default();
        assert_eq!(score(&p, &l, &cfg), score(&p, &l, &cfg));
    }

    #[test]
    fn bounded_score_clamps_and_rounds() {
        assert_eq!(bounded_score(-3.0), 0);
        assert_eq!(bounded_score(49.5), 50);
        assert_eq!(bounded_score(130.0), 100);
    }
}
