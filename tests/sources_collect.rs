// tests/sources_collect.rs
//
// Stored feed -> raw records -> normalized listings, with one failing source
// reported as a warning.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;

use grant_match::sources::{collect, GrantsGovSource, ListingSource, RawRecord, RssSource};

const NSF_FEED: &str = include_str!("fixtures/nsf_rss.xml");

struct Offline;

#[async_trait]
impl ListingSource for Offline {
    async fn fetch(&self, _keywords: &[String], _limit: usize) -> Result<Vec<RawRecord>> {
        Err(anyhow!("dns lookup failed"))
    }

    fn name(&self) -> &str {
        "DOE RSS"
    }
}

#[tokio::test]
async fn fixture_feed_normalizes_and_failures_become_warnings() {
    let sources: Vec<Box<dyn ListingSource>> = vec![
        Box::new(RssSource::from_fixture_str("NSF", NSF_FEED)),
        Box::new(Offline),
    ];

    let out = collect(&sources, &["robotics".to_string()], 50).await;

    assert_eq!(out.listings.len(), 2, "item without title and link is dropped");
    let frr = &out.listings[0];
    assert_eq!(frr.title, "Foundational Research in Robotics (FRR)");
    assert_eq!(frr.agency, "NSF");
    assert_eq!(frr.source, "nsf_rss");
    assert_eq!(frr.link, "https://www.nsf.gov/funding/opportunities/frr");
    assert_eq!(frr.published, "Tue, 14 Jan 2025 15:00:00 EST");
    assert_eq!(
        frr.summary,
        "Supports research on robotic systems that sense, plan & act."
    );
    assert_eq!(
        out.listings[1].summary,
        "Community-engaged research - integrative projects."
    );

    assert_eq!(out.warnings, vec!["DOE RSS failed: dns lookup failed".to_string()]);
}

#[tokio::test]
async fn per_source_limit_is_applied_before_normalization() {
    let sources: Vec<Box<dyn ListingSource>> =
        vec![Box::new(RssSource::from_fixture_str("NSF", NSF_FEED))];
    let out = collect(&sources, &[], 1).await;
    assert_eq!(out.listings.len(), 1);
    assert!(out.warnings.is_empty());
}

#[test]
fn grants_gov_records_normalize_like_any_other() {
    let data = json!({
        "opportunities": [
            {"title": "Coastal Resilience", "agency": "NOAA", "opportunityNumber": "NOAA-OAR-2026",
             "closeDate": "2026-05-01", "description": "Nature-based solutions"}
        ]
    });
    let records = grant_match::sources::grants_gov::records_from_response(&data, 10);
    let listing = grant_match::listing::normalize(&records[0]);
    assert_eq!(listing.agency, "NOAA");
    assert_eq!(listing.link, "NOAA-OAR-2026");
    assert_eq!(listing.source, "grants.gov");
    assert_eq!(listing.summary, "Nature-based solutions");

    // constructing the live source needs no network
    let src = GrantsGovSource::new("http://127.0.0.1:9/search", reqwest::Client::new());
    assert_eq!(src.name(), "Grants.gov");
}
