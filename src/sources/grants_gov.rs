// src/sources/grants_gov.rs
//! Grants.gov search. The response schema varies; treat it as best-effort.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{ListingSource, RawRecord};

pub struct GrantsGovSource {
    url: String,
    client: reqwest::Client,
}

impl GrantsGovSource {
    pub fn new(url: &str, client: reqwest::Client) -> Self {
        Self {
            url: url.to_string(),
            client,
        }
    }
}

fn str_field<'a>(it: &'a serde_json::Map<String, Value>, key: &str) -> &'a str {
    it.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Map a search response onto raw records. Items live under `opportunities` or `data`.
pub fn records_from_response(data: &Value, limit: usize) -> Vec<RawRecord> {
    let items = data
        .get("opportunities")
        .or_else(|| data.get("data"))
        .and_then(Value::as_array);
    let Some(items) = items else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .take(limit)
        .filter_map(|it| {
            let agency = match str_field(it, "agency") {
                "" => "Grants.gov",
                a => a,
            };
            let record = json!({
                "agency": agency,
                "title": str_field(it, "title"),
                // opportunity number until a detail URL is available
                "link": str_field(it, "opportunityNumber"),
                "published": str_field(it, "postDate"),
                "summary": str_field(it, "description"),
                "deadline": str_field(it, "closeDate"),
                "source": "grants.gov",
            });
            match record {
                Value::Object(m) => Some(m),
                _ => None,
            }
        })
        .collect()
}

#[async_trait]
impl ListingSource for GrantsGovSource {
    async fn fetch(&self, keywords: &[String], limit: usize) -> Result<Vec<RawRecord>> {
        let rows = limit.min(50);
        let payload = json!({
            "keyword": keywords.iter().take(10).cloned().collect::<Vec<_>>().join(" "),
            "rows": rows,
        });
        let data: Value = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .context("grants.gov http post()")?
            .error_for_status()?
            .json()
            .await
            .context("grants.gov response json")?;
        Ok(records_from_response(&data, rows))
    }

    fn name(&self) -> &str {
        "Grants.gov"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_opportunities_and_defaults_agency() {
        let data = json!({
            "opportunities": [
                {"title": "Ocean Sensing", "opportunityNumber": "NOAA-1", "closeDate": "2026-06-30",
                 "postDate": "2026-01-02", "description": "buoys"},
                {"title": "AI Safety", "agency": "DOD"},
                "junk"
            ]
        });
        let recs = records_from_response(&data, 10);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0]["agency"], "Grants.gov");
        assert_eq!(recs[0]["link"], "NOAA-1");
        assert_eq!(recs[0]["deadline"], "2026-06-30");
        assert_eq!(recs[1]["agency"], "DOD");
        assert_eq!(recs[1]["source"], "grants.gov");
    }

    #[test]
    fn falls_back_to_data_key_and_tolerates_missing_list() {
        let recs = records_from_response(&json!({"data": [{"title": "x"}]}), 10);
        assert_eq!(recs.len(), 1);
        assert!(records_from_response(&json!({"hits": 3}), 10).is_empty());
    }
}
