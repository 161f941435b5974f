// src/sources/page.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

use crate::config::SourceDescriptor;
use crate::sources::types::{Item, PollOutcome, SourceAdapter};
use crate::sources::{normalize_title, retry_after, DEFAULT_COOL_DOWN};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_SELECTOR: &str = "a[href]";

/// Adapter for `page-scrape` descriptors: fetch one page, select anchors,
/// and use each anchor's absolute URL as both identifier and location.
pub struct PageAdapter {
    client: Client,
    page_url: Url,
    selector: Selector,
    source_key: String,
}

impl PageAdapter {
    pub fn new(descriptor: &SourceDescriptor) -> Result<Self> {
        let page_url = Url::parse(&descriptor.target)
            .with_context(|| format!("page-scrape target is not a URL: {}", descriptor.target))?;
        let raw_selector = descriptor.selector.as_deref().unwrap_or(DEFAULT_SELECTOR);
        let selector = Selector::parse(raw_selector)
            .map_err(|e| anyhow!("invalid selector {raw_selector:?}: {e}"))?;
        let source_key = format!("page:{}", page_url.host_str().unwrap_or("unknown"));
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building page http client")?;
        Ok(Self {
            client,
            page_url,
            selector,
            source_key,
        })
    }
}

/// Pull candidate links out of a fetched document. Relative hrefs resolve
/// against the page URL; non-HTTP schemes and fragments are skipped.
fn extract_links(source_key: &str, body: &str, base: &Url, selector: &Selector) -> Vec<Item> {
    let document = Html::parse_document(body);
    let mut items = Vec::new();
    for element in document.select(selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let Ok(absolute) = base.join(href) else {
            tracing::debug!(source = %source_key, href = %href, "unresolvable href, skipping");
            continue;
        };
        if !matches!(absolute.scheme(), "http" | "https") {
            continue;
        }
        let title = normalize_title(&element.text().collect::<String>());
        let absolute = absolute.to_string();
        items.push(Item {
            source: source_key.to_string(),
            external_id: absolute.clone(),
            url: absolute,
            title: if title.is_empty() { None } else { Some(title) },
            published_at: None,
        });
    }
    items
}

#[async_trait]
impl SourceAdapter for PageAdapter {
    async fn poll(&self) -> Result<PollOutcome> {
        let response = self
            .client
            .get(self.page_url.clone())
            .send()
            .await
            .with_context(|| format!("fetching {}", self.page_url))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let cool_down = retry_after(response.headers()).unwrap_or(DEFAULT_COOL_DOWN);
            tracing::warn!(
                source = %self.source_key,
                cool_down_secs = cool_down.as_secs(),
                "page rate limit"
            );
            return Ok(PollOutcome::RateLimited { cool_down });
        }
        if response.status() == StatusCode::NOT_FOUND {
            tracing::warn!(source = %self.source_key, "page returned 404, treating as empty cycle");
            return Ok(PollOutcome::Items(Vec::new()));
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("reading {}", self.page_url))?;
        Ok(PollOutcome::Items(extract_links(
            &self.source_key,
            &body,
            &self.page_url,
            &self.selector,
        )))
    }

    fn source_key(&self) -> &str {
        &self.source_key
    }
}
