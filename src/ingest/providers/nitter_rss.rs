use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use quick_xml::de::from_str;
use rand::seq::{IndexedRandom, SliceRandom};
use reqwest::{header, Client, Url};
use serde::Deserialize;
use std::time::Duration;

use crate::ingest::types::{Fetcher, Item, Source};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
];

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}
#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    description: Option<String>,
}

/// Polls Nitter mirrors' per-user RSS feeds, rotating through mirrors until one answers.
pub struct NitterRssFetcher {
    instances: Vec<String>,
    client: Client,
}

impl NitterRssFetcher {
    pub fn new(instances: Vec<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building mirror http client")?;
        let instances = instances
            .into_iter()
            .map(|i| i.trim().trim_end_matches('/').to_string())
            .filter(|i| !i.is_empty())
            .collect();
        Ok(Self { instances, client })
    }

    pub fn instances(&self) -> &[String] {
        &self.instances
    }

    async fn fetch_from(&self, instance: &str, source: &Source) -> Result<String> {
        let url = format!("{instance}/{source}/rss");
        let ua = USER_AGENTS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);
        tracing::info!(%source, %url, "fetching feed");

        let resp = self
            .client
            .get(&url)
            .header(header::USER_AGENT, ua)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        let status = resp.status();
        let body = resp.text().await.with_context(|| format!("reading {url}"))?;
        if !status.is_success() {
            bail!("{url} answered {status}");
        }
        Ok(body)
    }
}

/// Parse a Nitter RSS document into at most `max_items` items, in feed order.
pub fn parse_feed(xml: &str, max_items: usize) -> Result<Vec<Item>> {
    let rss: Rss = from_str(xml).context("parsing nitter rss xml")?;

    let mut out = Vec::with_capacity(max_items.min(rss.channel.item.len()));
    for it in rss.channel.item {
        if out.len() >= max_items {
            break;
        }
        let text = it
            .title
            .as_deref()
            .map(crate::ingest::normalize_text)
            .filter(|t| !t.is_empty())
            .or_else(|| {
                it.description
                    .as_deref()
                    .map(crate::ingest::normalize_text)
                    .filter(|t| !t.is_empty())
            });
        let id = it
            .link
            .as_deref()
            .or(it.guid.as_deref())
            .and_then(item_id_from_link);

        let (Some(text), Some(id)) = (text, id) else {
            continue;
        };
        let mut item = Item::new(id, text);
        item.url = it.link;
        out.push(item);
    }
    Ok(out)
}

/// Stable id for a post: the URL path without host or fragment, so that
/// the same post fetched through two mirrors compares equal.
pub fn item_id_from_link(link: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }
    match Url::parse(link) {
        Ok(u) => Some(u.path().to_string()).filter(|p| p.len() > 1),
        // Relative hrefs and bare guids are already host independent.
        Err(_) => Some(link.split('#').next().unwrap_or(link).to_string()),
    }
}

#[async_trait]
impl Fetcher for NitterRssFetcher {
    async fn fetch(&self, source: &Source, max_items: usize) -> Result<Vec<Item>> {
        let mut order = self.instances.clone();
        order.shuffle(&mut rand::rng());

        for instance in &order {
            let body = match self.fetch_from(instance, source).await {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(%source, instance = %instance, error = %e, "mirror fetch failed");
                    continue;
                }
            };
            match parse_feed(&body, max_items) {
                Ok(items) if !items.is_empty() => {
                    tracing::info!(%source, instance = %instance, newest = %items[0].id, "feed fetched");
                    return Ok(items);
                }
                Ok(_) => {
                    tracing::warn!(%source, instance = %instance, "feed has no usable items");
                }
                Err(e) => {
                    tracing::warn!(%source, instance = %instance, error = %e, "mirror returned unparsable feed");
                }
            }
        }

        tracing::error!(%source, mirrors = order.len(), "all mirrors failed");
        Ok(Vec::new())
    }
}
