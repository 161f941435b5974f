// src/sources/timeline.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

use crate::config::{SourceDescriptor, SourceKind};
use crate::sources::types::{Item, PollOutcome, SourceAdapter};
use crate::sources::{extract, normalize_title, retry_after, DebugSink, DEFAULT_COOL_DOWN};

const PAGE_SIZE: u32 = 10;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Adapter for timeline-style JSON listing endpoints.
///
/// `user-timeline` descriptors hit the provider's last-tweets endpoint for
/// one handle and filter candidates to that author. `api-stream` descriptors
/// fetch their target URL verbatim, no author semantics.
pub struct TimelineAdapter {
    client: Client,
    kind: SourceKind,
    target: String,
    api_key: String,
    endpoint: String,
    source_key: String,
    debug_sink: Option<DebugSink>,
}

impl TimelineAdapter {
    pub fn new(
        descriptor: &SourceDescriptor,
        api_key: &str,
        api_base_url: &str,
        debug_sink: Option<DebugSink>,
    ) -> Result<Self> {
        let (endpoint, source_key) = match descriptor.kind {
            SourceKind::UserTimeline => (
                format!("{}/user/last_tweets", api_base_url.trim_end_matches('/')),
                format!("x:{}", descriptor.target.to_lowercase()),
            ),
            SourceKind::ApiStream => {
                let parsed = url::Url::parse(&descriptor.target).with_context(|| {
                    format!("api-stream target is not a URL: {}", descriptor.target)
                })?;
                let host = parsed.host_str().unwrap_or("stream").to_string();
                (descriptor.target.clone(), format!("stream:{host}"))
            }
            SourceKind::PageScrape => {
                anyhow::bail!("page-scrape descriptors use the page adapter")
            }
        };
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building timeline http client")?;
        Ok(Self {
            client,
            kind: descriptor.kind,
            target: descriptor.target.clone(),
            api_key: api_key.to_string(),
            endpoint,
            source_key,
            debug_sink,
        })
    }

    fn request(&self) -> reqwest::RequestBuilder {
        let req = self
            .client
            .get(&self.endpoint)
            .header("X-API-Key", &self.api_key);
        match self.kind {
            SourceKind::UserTimeline => {
                let page_size = PAGE_SIZE.to_string();
                req.query(&[
                    ("userName", self.target.as_str()),
                    ("pageSize", page_size.as_str()),
                    ("includeReplies", "false"),
                ])
            }
            _ => req,
        }
    }

    /// Normalize candidate records into items, dropping anything without a
    /// stable id and (for user timelines) anything not authored by the
    /// watched handle. Both drops are routine, not errors.
    fn items_from(&self, body: &Value) -> Vec<Item> {
        let records = extract::candidate_records(body);
        if records.is_empty() {
            tracing::info!(source = %self.source_key, "no candidate records this cycle");
            return Vec::new();
        }

        let mut items = Vec::new();
        for record in &records {
            let Some(id) = extract::record_id(record) else {
                tracing::debug!(source = %self.source_key, "skipping candidate without a stable id");
                continue;
            };

            if self.kind == SourceKind::UserTimeline {
                match extract::record_author(record) {
                    None => {
                        tracing::warn!(
                            source = %self.source_key,
                            id = %id,
                            "candidate has no resolvable author, skipping"
                        );
                        continue;
                    }
                    Some(author) if !author.eq_ignore_ascii_case(&self.target) => {
                        tracing::info!(
                            source = %self.source_key,
                            id = %id,
                            author = %author,
                            "author does not match the watched handle, skipping"
                        );
                        continue;
                    }
                    Some(_) => {}
                }
            }

            let url = match extract::record_url(record) {
                Some(url) => url,
                None if self.kind == SourceKind::UserTimeline => {
                    format!("https://x.com/{}/status/{}", self.target, id)
                }
                None => {
                    tracing::debug!(source = %self.source_key, id = %id, "candidate has no URL, skipping");
                    continue;
                }
            };

            let title = extract::record_text(record)
                .map(|text| normalize_title(&text))
                .filter(|text| !text.is_empty());

            items.push(Item {
                source: self.source_key.clone(),
                external_id: id,
                url,
                title,
                published_at: extract::record_published_at(record),
            });
        }
        items
    }
}

#[async_trait]
impl SourceAdapter for TimelineAdapter {
    async fn poll(&self) -> Result<PollOutcome> {
        let response = self
            .request()
            .send()
            .await
            .with_context(|| format!("querying {}", self.endpoint))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let cool_down = retry_after(response.headers()).unwrap_or(DEFAULT_COOL_DOWN);
            tracing::warn!(
                source = %self.source_key,
                cool_down_secs = cool_down.as_secs(),
                "provider rate limit"
            );
            return Ok(PollOutcome::RateLimited { cool_down });
        }
        if response.status() == StatusCode::NOT_FOUND {
            tracing::warn!(source = %self.source_key, "provider returned 404, treating as empty cycle");
            return Ok(PollOutcome::Items(Vec::new()));
        }

        let raw = response
            .text()
            .await
            .with_context(|| format!("reading body from {}", self.endpoint))?;
        let body: Value = match serde_json::from_str(&raw) {
            Ok(body) => body,
            Err(e) => {
                counter!("watch_poll_errors_total").increment(1);
                tracing::warn!(
                    source = %self.source_key,
                    error = %e,
                    "malformed provider body, treating as empty cycle"
                );
                if let Some(sink) = &self.debug_sink {
                    sink.write(&format!("{}.txt", self.source_key), &raw);
                }
                return Ok(PollOutcome::Items(Vec::new()));
            }
        };

        Ok(PollOutcome::Items(self.items_from(&body)))
    }

    fn source_key(&self) -> &str {
        &self.source_key
    }
}
