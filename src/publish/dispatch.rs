// src/publish/dispatch.rs
//
// Single logical consumer of the delivery queue. Rate limiting is a
// wait-and-retry signal and never counts against the message; every other
// delivery error is permanent for that message so the queue keeps moving.

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::publish::{RelayMessage, RelayReceiver};

/// Fallback wait when a rate-limit response carries no retry-after signal.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Resolved destination for deliveries.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    pub id: u64,
    pub name: Option<String>,
}

/// Result of one delivery attempt.
#[derive(Debug)]
pub enum SendOutcome {
    Delivered,
    RateLimited { retry_after: Option<Duration> },
    Failed { reason: String },
}

/// Destination channel seam; the production implementation speaks Discord
/// REST.
#[async_trait]
pub trait ChannelClient: Send + Sync {
    async fn resolve(&self, channel_id: u64) -> Result<ChannelHandle>;
    async fn send(&self, channel: &ChannelHandle, text: &str) -> SendOutcome;
}

pub struct Dispatcher {
    client: Arc<dyn ChannelClient>,
    channel_id: u64,
    cached: Option<ChannelHandle>,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn ChannelClient>, channel_id: u64) -> Self {
        Self {
            client,
            channel_id,
            cached: None,
        }
    }

    /// Drain the queue until every sender is gone.
    pub async fn run(mut self, mut queue: RelayReceiver) {
        tracing::info!(channel_id = self.channel_id, "dispatcher started");
        while let Some(message) = queue.next().await {
            self.deliver(&message).await;
        }
        tracing::info!("delivery queue closed, dispatcher stopping");
    }

    /// Deliver one message: wait out rate limits indefinitely, drop on
    /// anything permanent.
    pub async fn deliver(&mut self, message: &RelayMessage) {
        let text = format_message(message);
        loop {
            let channel = match self.channel().await {
                Ok(channel) => channel,
                Err(e) => {
                    counter!("relay_dropped_total").increment(1);
                    tracing::error!(
                        error = ?e,
                        source = %message.source,
                        url = %message.url,
                        title = %message.title,
                        "channel resolution failed, dropping message"
                    );
                    return;
                }
            };
            match self.client.send(&channel, &text).await {
                SendOutcome::Delivered => {
                    counter!("relay_delivered_total").increment(1);
                    tracing::info!(source = %message.source, url = %message.url, "delivered");
                    return;
                }
                SendOutcome::RateLimited { retry_after } => {
                    let wait = retry_after.unwrap_or(DEFAULT_RETRY_AFTER);
                    counter!("relay_rate_limited_total").increment(1);
                    tracing::warn!(
                        wait_secs = wait.as_secs_f64(),
                        "destination rate limited, retrying same message"
                    );
                    sleep(wait).await;
                }
                SendOutcome::Failed { reason } => {
                    counter!("relay_dropped_total").increment(1);
                    tracing::error!(
                        reason = %reason,
                        source = %message.source,
                        url = %message.url,
                        title = %message.title,
                        "permanent delivery error, dropping message"
                    );
                    return;
                }
            }
        }
    }

    /// Cached handle when available; resolve fresh after a cache miss or a
    /// prior resolution failure.
    async fn channel(&mut self) -> Result<ChannelHandle> {
        if let Some(channel) = &self.cached {
            return Ok(channel.clone());
        }
        let channel = self.client.resolve(self.channel_id).await?;
        tracing::info!(channel_id = channel.id, name = ?channel.name, "resolved destination channel");
        self.cached = Some(channel.clone());
        Ok(channel)
    }
}

pub fn format_message(message: &RelayMessage) -> String {
    format!(
        "🔔 New link from **{}**\n{}\n{}",
        message.source, message.title, message.url
    )
}
