// src/listing.rs
//! Canonical funding-call listing and the normalizer that maps heterogeneous
//! upstream records onto it.

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One funding call. Unknown fields are empty strings, never absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Listing {
    pub agency: String,
    pub title: String,
    pub deadline: String,
    pub published: String,
    pub link: String,
    pub summary: String,
    /// Provenance tag, e.g. "nsf_rss" or "grants.gov".
    pub source: String,
}

impl Listing {
    /// A listing without title and link cannot be shown or followed.
    pub fn is_usable(&self) -> bool {
        !self.title.is_empty() || !self.link.is_empty()
    }

    /// Stand-in used when every source came back empty.
    pub fn placeholder() -> Self {
        Self {
            agency: "NSF".into(),
            title: "DEMO: Placeholder call (check RSS/API connectivity)".into(),
            deadline: String::new(),
            published: String::new(),
            link: "https://www.nsf.gov/funding/".into(),
            summary: "This is a fallback item so the rest of the pipeline can be tested.".into(),
            source: "fallback".into(),
        }
    }
}

const AGENCY_KEYS: &[&str] = &["agency", "agencyName", "agencyCode"];
const TITLE_KEYS: &[&str] = &["title", "opportunityTitle", "name"];
const DEADLINE_KEYS: &[&str] = &["deadline", "closeDate", "dueDate"];
const PUBLISHED_KEYS: &[&str] = &["published", "postDate", "publishDate"];
const LINK_KEYS: &[&str] = &["link", "url", "opportunityURL", "href"];
const SUMMARY_KEYS: &[&str] = &["summary", "synopsis", "description"];
const SOURCE_KEYS: &[&str] = &["source"];

/// First non-empty value among `keys`. Strings are trimmed, numbers rendered;
/// other types are skipped.
fn first_of(raw: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        let s = match raw.get(*k)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!s.is_empty()).then_some(s)
    })
}

/// Defaults applied when a record carries no agency or source of its own.
#[derive(Debug, Clone, Default)]
pub struct NormalizeDefaults {
    pub agency: String,
    pub source: String,
}

/// Map one raw record onto the canonical schema.
pub fn normalize(raw: &Map<String, Value>) -> Listing {
    normalize_with(raw, &NormalizeDefaults::default())
}

pub fn normalize_with(raw: &Map<String, Value>, defaults: &NormalizeDefaults) -> Listing {
    Listing {
        agency: first_of(raw, AGENCY_KEYS).unwrap_or_else(|| defaults.agency.clone()),
        title: first_of(raw, TITLE_KEYS).unwrap_or_default(),
        deadline: first_of(raw, DEADLINE_KEYS).unwrap_or_default(),
        published: first_of(raw, PUBLISHED_KEYS).unwrap_or_default(),
        link: first_of(raw, LINK_KEYS).unwrap_or_default(),
        summary: first_of(raw, SUMMARY_KEYS).unwrap_or_default(),
        source: first_of(raw, SOURCE_KEYS).unwrap_or_else(|| defaults.source.clone()),
    }
}

/// Normalize a batch: non-object records are skipped, records without title and link
/// are dropped. Order is preserved.
pub fn normalize_batch(raw: &[Value]) -> Vec<Listing> {
    let mut dropped = 0usize;
    let out: Vec<Listing> = raw
        .iter()
        .filter_map(|v| {
            let listing = v.as_object().map(normalize);
            match listing {
                Some(l) if l.is_usable() => Some(l),
                _ => {
                    dropped += 1;
                    None
                }
            }
        })
        .collect();
    if dropped > 0 {
        counter!("listings_dropped_total").increment(dropped as u64);
        tracing::debug!(dropped, kept = out.len(), "listing batch normalized");
    }
    out
}

/// Substitute one placeholder when a batch ended up empty, and say so in `warnings`.
pub fn ensure_non_empty(listings: &mut Vec<Listing>, warnings: &mut Vec<String>) {
    if listings.is_empty() {
        warnings.push("No calls found from sources. Using fallback demo call.".to_string());
        listings.push(Listing::placeholder());
    }
}
