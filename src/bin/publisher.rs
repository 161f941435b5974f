//! Publisher process: authenticated ingress endpoint in front of the
//! delivery queue, plus the dispatcher draining it into Discord.

use anyhow::{Context, Result};
use std::sync::Arc;

use linkrelay::config::PublisherConfig;
use linkrelay::publish::discord::DiscordChannelClient;
use linkrelay::publish::dispatch::Dispatcher;
use linkrelay::publish::gateway::{router, GatewayState};
use linkrelay::publish::relay_queue;
use linkrelay::store::SeenLedger;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    linkrelay::init_tracing();
    linkrelay::describe_metrics();

    let config = PublisherConfig::from_env().context("loading publisher configuration")?;
    let ledger = Arc::new(SeenLedger::open(&config.db_path)?);
    let (queue_tx, queue_rx) = relay_queue();

    let discord = Arc::new(DiscordChannelClient::new(
        config.bot_token.clone(),
        config.discord_api_base.clone(),
    )?);
    let dispatcher = Dispatcher::new(discord, config.channel_id);
    tokio::spawn(dispatcher.run(queue_rx));

    let state = GatewayState {
        ledger,
        queue: queue_tx,
        relay_secret: config.relay_secret.clone().into(),
    };
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(addr = %addr, channel_id = config.channel_id, "publisher listening");
    axum::serve(listener, router(state))
        .await
        .context("serving ingress gateway")?;
    Ok(())
}
