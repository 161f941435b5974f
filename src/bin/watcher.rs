//! Watcher process: polls the configured sources, admits new items into the
//! seen ledger, and forwards each one to the publisher's ingress endpoint.

use anyhow::{Context, Result};
use std::sync::Arc;

use linkrelay::config::WatcherConfig;
use linkrelay::relay::RelayClient;
use linkrelay::scheduler::PollScheduler;
use linkrelay::sources::{adapter_for, DebugSink};
use linkrelay::store::SeenLedger;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    linkrelay::init_tracing();
    linkrelay::describe_metrics();

    let config = WatcherConfig::from_env().context("loading watcher configuration")?;
    let ledger = Arc::new(SeenLedger::open(&config.db_path)?);
    let sink = Arc::new(RelayClient::new(
        config.publisher_url.clone(),
        config.relay_secret.clone(),
    )?);

    let debug_sink = config.debug_dir.clone().map(DebugSink::new);
    let mut adapters = Vec::with_capacity(config.sources.len());
    for descriptor in &config.sources {
        adapters.push(adapter_for(
            descriptor,
            &config.api_key,
            &config.api_base_url,
            debug_sink.clone(),
        )?);
    }

    let scheduler = PollScheduler::new(
        adapters,
        ledger,
        sink,
        config.check_interval,
        config.stagger,
    );
    scheduler.run().await;
    Ok(())
}
