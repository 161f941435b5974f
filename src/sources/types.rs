// src/sources/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// One piece of content observed from a source, canonicalized for admission.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Item {
    /// Stable source key, e.g. "x:paradevsai" or "page:blog.example.com".
    pub source: String,
    /// The adapter's best-effort stable identifier for the content.
    pub external_id: String,
    pub url: String,
    pub title: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Result of one poll against a single source.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// Bounded batch of candidates for this cycle (possibly empty).
    Items(Vec<Item>),
    /// The provider asked for a cool-down; no items this cycle.
    RateLimited { cool_down: Duration },
}

/// Per-source-kind strategy that fetches raw data and normalizes it into
/// candidate items, one bounded batch per invocation.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Fetch and normalize one batch.
    ///
    /// Upstream 404s and malformed bodies degrade to an empty batch; a 429
    /// surfaces as `RateLimited`. `Err` is reserved for transport failures,
    /// and the scheduler absorbs those too, so no outcome here is
    /// process-fatal.
    async fn poll(&self) -> Result<PollOutcome>;

    /// Stable ledger key for this source (e.g. "x:acme").
    fn source_key(&self) -> &str;
}
