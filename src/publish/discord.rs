// src/publish/discord.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::publish::dispatch::{ChannelClient, ChannelHandle, SendOutcome};
use crate::sources::retry_after;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Discord REST implementation of the destination channel seam.
pub struct DiscordChannelClient {
    client: Client,
    api_base: String,
    bot_token: String,
}

#[derive(Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct ChannelPayload {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

impl DiscordChannelClient {
    pub fn new(bot_token: impl Into<String>, api_base: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building discord http client")?;
        Ok(Self {
            client,
            api_base: api_base.into(),
            bot_token: bot_token.into(),
        })
    }

    fn auth_value(&self) -> String {
        format!("Bot {}", self.bot_token)
    }
}

#[async_trait]
impl ChannelClient for DiscordChannelClient {
    async fn resolve(&self, channel_id: u64) -> Result<ChannelHandle> {
        let url = format!("{}/channels/{}", self.api_base, channel_id);
        let payload: ChannelPayload = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth_value())
            .send()
            .await
            .with_context(|| format!("fetching channel {channel_id}"))?
            .error_for_status()
            .with_context(|| format!("channel {channel_id} not accessible"))?
            .json()
            .await
            .context("decoding channel payload")?;
        let id = payload.id.parse().unwrap_or(channel_id);
        Ok(ChannelHandle {
            id,
            name: payload.name,
        })
    }

    async fn send(&self, channel: &ChannelHandle, text: &str) -> SendOutcome {
        let url = format!("{}/channels/{}/messages", self.api_base, channel.id);
        let response = match self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth_value())
            .json(&CreateMessage { content: text })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return SendOutcome::Failed {
                    reason: format!("transport: {e}"),
                }
            }
        };

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            // Discord reports the wait in the JSON body; the header is the
            // fallback.
            let from_header = retry_after(response.headers());
            let retry_after = match response.json::<Value>().await {
                Ok(body) => body
                    .get("retry_after")
                    .and_then(Value::as_f64)
                    .filter(|secs| secs.is_finite() && *secs >= 0.0)
                    .map(Duration::from_secs_f64)
                    .or(from_header),
                Err(_) => from_header,
            };
            return SendOutcome::RateLimited { retry_after };
        }
        if let Err(e) = response.error_for_status_ref() {
            return SendOutcome::Failed {
                reason: e.to_string(),
            };
        }
        SendOutcome::Delivered
    }
}
