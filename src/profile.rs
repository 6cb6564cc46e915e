// src/profile.rs
//! Research profile: extracted by the generative service, augmented locally with
//! keyword recency weights.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::config::{ProfileConfig, RecencyConfig};
use crate::llm::{request_json, GenerativeService, RetryPolicy, ServiceRequest};
use crate::recency::keyword_recency_weights;
use crate::text::{anon_hash, truncate_chars};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgencyFit {
    pub agency: String,
    #[serde(default)]
    pub why: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub themes: Vec<String>,
    pub methods_keywords: Vec<String>,
    #[serde(alias = "domains")]
    pub application_domains: Vec<String>,
    pub strongest_prior_results: Vec<String>,
    pub agencies_fit: Vec<AgencyFit>,
    /// keyword → weight in [0,1]; max is exactly 1.0 when non-empty.
    pub keyword_recency_weights: BTreeMap<String, f64>,
}

impl Profile {
    /// Nothing to rank against.
    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
            && self.methods_keywords.is_empty()
            && self.application_domains.is_empty()
            && self.keyword_recency_weights.is_empty()
    }

    /// Lenient read of a service response. Missing or mistyped fields become empty;
    /// never fails.
    pub fn from_loose_json(v: &Value) -> Self {
        let domains = if v.get("application_domains").is_some() {
            string_list(v.get("application_domains"))
        } else {
            string_list(v.get("domains"))
        };
        Self {
            themes: string_list(v.get("themes")),
            methods_keywords: string_list(v.get("methods_keywords")),
            application_domains: domains,
            strongest_prior_results: string_list(v.get("strongest_prior_results")),
            agencies_fit: agency_list(v.get("agencies_fit")),
            keyword_recency_weights: BTreeMap::new(),
        }
    }
}

fn string_list(v: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = v else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn agency_list(v: Option<&Value>) -> Vec<AgencyFit> {
    let Some(Value::Array(items)) = v else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|it| match it {
            Value::String(s) if !s.trim().is_empty() => Some(AgencyFit {
                agency: s.trim().to_string(),
                why: String::new(),
            }),
            Value::Object(m) => {
                let agency = m.get("agency").and_then(Value::as_str)?.trim();
                if agency.is_empty() {
                    return None;
                }
                Some(AgencyFit {
                    agency: agency.to_string(),
                    why: m
                        .get("why")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .trim()
                        .to_string(),
                })
            }
            _ => None,
        })
        .collect()
}

fn extraction_prompt(pubs: &str, props: &str) -> String {
    format!(
        r#"You are extracting a research profile for a professor for grant matching.

Return JSON with EXACT keys:
{{
  "themes": [string],
  "methods_keywords": [string],
  "application_domains": [string],
  "strongest_prior_results": [string],
  "agencies_fit": [{{"agency": string, "why": string}}]
}}

Rules:
- Use 5-10 themes, 20-40 methods_keywords, 5-10 application_domains.

Publications (raw text):
{pubs}

Prior proposals (raw text):
{props}"#
    )
}

/// Builds profiles. Holds only config; the service is passed per call.
#[derive(Debug, Clone)]
pub struct ProfileBuilder {
    pub profile: ProfileConfig,
    pub recency: RecencyConfig,
    pub retry: RetryPolicy,
}

impl ProfileBuilder {
    pub fn new(profile: ProfileConfig, recency: RecencyConfig, retry: RetryPolicy) -> Self {
        Self {
            profile,
            recency,
            retry,
        }
    }

    fn current_year(&self) -> i32 {
        self.profile
            .current_year
            .unwrap_or_else(|| chrono::Local::now().year())
    }

    /// Build a profile. A failed or malformed extraction yields a degraded profile;
    /// recency weights are computed regardless.
    pub async fn build(
        &self,
        service: &dyn GenerativeService,
        pub_text: &str,
        proposal_text: &str,
    ) -> Profile {
        let pubs = truncate_chars(pub_text, self.profile.max_publication_chars);
        let props = truncate_chars(proposal_text, self.profile.max_proposal_chars);

        let req = ServiceRequest::new(extraction_prompt(pubs, props));
        let extracted = request_json(service, req, &self.retry, |v| {
            if v.is_object() {
                Ok(Profile::from_loose_json(&v))
            } else {
                Err("profile must be a JSON object".to_string())
            }
        })
        .await;

        let mut profile = match extracted {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, pubs_id = %anon_hash(pub_text), "profile extraction degraded to empty fields");
                Profile::default()
            }
        };

        // Always from the untruncated text.
        profile.keyword_recency_weights = keyword_recency_weights(
            pub_text,
            &profile.methods_keywords,
            self.current_year(),
            &self.recency,
        );

        info!(
            themes = profile.themes.len(),
            methods = profile.methods_keywords.len(),
            recency_keywords = profile.keyword_recency_weights.len(),
            "profile built"
        );
        profile
    }
}
