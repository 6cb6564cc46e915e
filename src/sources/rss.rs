// src/sources/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ListingSource, RawRecord};
use crate::text::clean_markup;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// RSS 2.0 feed of funding opportunities from one agency.
pub struct RssSource {
    agency: String,
    name: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssSource {
    pub fn from_url(agency: &str, url: &str, client: reqwest::Client) -> Self {
        Self {
            agency: agency.to_string(),
            name: format!("{agency} RSS"),
            mode: Mode::Http {
                url: url.to_string(),
                client,
            },
        }
    }

    /// Parse a stored feed instead of fetching one.
    pub fn from_fixture_str(agency: &str, xml: &str) -> Self {
        Self {
            agency: agency.to_string(),
            name: format!("{agency} RSS"),
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    fn source_tag(&self) -> String {
        format!("{}_rss", self.agency.to_lowercase())
    }

    fn parse_items_from_str(&self, s: &str, limit: usize) -> Result<Vec<RawRecord>> {
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean)
            .with_context(|| format!("parsing {} xml", self.name))?;

        let tag = self.source_tag();
        let out = rss
            .channel
            .item
            .into_iter()
            .take(limit)
            .filter_map(|it| {
                let record = json!({
                    "agency": self.agency,
                    "title": clean_markup(it.title.as_deref().unwrap_or_default()),
                    "link": it.link.unwrap_or_default().trim(),
                    "published": it.pub_date.unwrap_or_default().trim(),
                    // feeds rarely carry one
                    "deadline": "",
                    "summary": clean_markup(it.description.as_deref().unwrap_or_default()),
                    "source": tag,
                });
                match record {
                    Value::Object(m) => Some(m),
                    _ => None,
                }
            })
            .collect();
        Ok(out)
    }
}

#[async_trait]
impl ListingSource for RssSource {
    async fn fetch(&self, _keywords: &[String], limit: usize) -> Result<Vec<RawRecord>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s, limit),
            Mode::Http { url, client } => {
                let body = client
                    .get(url)
                    .send()
                    .await
                    .with_context(|| format!("{} http get()", self.name))?
                    .error_for_status()?
                    .text()
                    .await
                    .with_context(|| format!("{} http .text()", self.name))?;
                self.parse_items_from_str(&body, limit)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// HTML entities that are not valid XML would abort the whole parse.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
