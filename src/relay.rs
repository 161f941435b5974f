// src/relay.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::auth;
use crate::scheduler::ItemSink;
use crate::sources::types::Item;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// HTTP client for the publisher's ingress endpoint. Mints a fresh
/// short-lived token per call; tokens are never reused.
pub struct RelayClient {
    client: Client,
    endpoint: String,
    secret: String,
}

#[derive(Serialize)]
struct OutgoingItem<'a> {
    source: &'a str,
    url: &'a str,
    title: Option<&'a str>,
    published_at: Option<String>,
}

impl RelayClient {
    pub fn new(endpoint: impl Into<String>, secret: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building relay http client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            secret: secret.into(),
        })
    }
}

#[async_trait]
impl ItemSink for RelayClient {
    async fn forward(&self, item: &Item) -> Result<()> {
        let token = auth::mint_token(&self.secret, Some(&item.source))?;
        let payload = OutgoingItem {
            source: &item.source,
            url: &item.url,
            title: item.title.as_deref(),
            published_at: item.published_at.map(|t| t.to_rfc3339()),
        };
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, format!("bearer {token}"))
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("posting to {}", self.endpoint))?
            .error_for_status()
            .context("publisher rejected the item")?;

        let body: Value = response.json().await.context("reading publisher response")?;
        match body.get("status").and_then(Value::as_str) {
            Some("posted") => {
                tracing::info!(source = %item.source, url = %item.url, "relayed to publisher")
            }
            Some("ignored") => {
                tracing::debug!(source = %item.source, url = %item.url, "publisher already had this URL")
            }
            other => {
                tracing::warn!(source = %item.source, status = ?other, "unexpected publisher response")
            }
        }
        Ok(())
    }
}
