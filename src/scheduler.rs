// src/scheduler.rs
//
// Drives each configured source on a shared cadence with a fixed
// inter-source stagger. Rate-limited sources back off individually; a source
// in backoff is skipped, never slept on, so the rest of the fleet stays on
// schedule. Admission strictly precedes forwarding: a crash between the two
// loses at most one notification and can never re-deliver.

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::sources::types::{Item, PollOutcome, SourceAdapter};
use crate::store::SeenLedger;

/// Pause between consecutive forwards within one cycle.
const FORWARD_PACING: Duration = Duration::from_millis(300);

/// Downstream hand-off for newly admitted items.
#[async_trait]
pub trait ItemSink: Send + Sync {
    async fn forward(&self, item: &Item) -> Result<()>;
}

/// Per-source lifecycle, visible for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Idle,
    Fetching,
    Emitting,
    Backoff,
}

struct SourceTask {
    adapter: Box<dyn SourceAdapter>,
    state: SourceState,
    backoff_until: Option<Instant>,
}

impl SourceTask {
    fn in_backoff(&self, now: Instant) -> bool {
        self.backoff_until.is_some_and(|until| now < until)
    }
}

/// What one cycle did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub attempted: usize,
    pub skipped_backoff: usize,
    pub admitted: usize,
    pub forwarded: usize,
    pub rate_limited: usize,
    pub errors: usize,
}

pub struct PollScheduler {
    tasks: Vec<SourceTask>,
    ledger: Arc<SeenLedger>,
    sink: Arc<dyn ItemSink>,
    base_interval: Duration,
    stagger: Duration,
}

impl PollScheduler {
    pub fn new(
        adapters: Vec<Box<dyn SourceAdapter>>,
        ledger: Arc<SeenLedger>,
        sink: Arc<dyn ItemSink>,
        base_interval: Duration,
        stagger: Duration,
    ) -> Self {
        let tasks = adapters
            .into_iter()
            .map(|adapter| SourceTask {
                adapter,
                state: SourceState::Idle,
                backoff_until: None,
            })
            .collect();
        Self {
            tasks,
            ledger,
            sink,
            base_interval,
            stagger,
        }
    }

    /// Run forever: one cycle, then rest for whatever is left of the base
    /// interval so slow cycles never compound.
    pub async fn run(mut self) {
        tracing::info!(
            sources = self.tasks.len(),
            interval_secs = self.base_interval.as_secs(),
            "watcher started"
        );
        loop {
            let started = Instant::now();
            let report = self.run_cycle().await;
            let rest = self.base_interval.saturating_sub(started.elapsed());
            tracing::info!(?report, rest_secs = rest.as_secs(), "cycle finished");
            sleep(rest).await;
        }
    }

    /// Poll every source once (honoring per-source backoff), admitting and
    /// forwarding new items in adapter order.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();
        for i in 0..self.tasks.len() {
            let source = self.tasks[i].adapter.source_key().to_string();
            if self.tasks[i].in_backoff(Instant::now()) {
                self.tasks[i].state = SourceState::Backoff;
                report.skipped_backoff += 1;
                counter!("watch_source_backoff_total").increment(1);
                tracing::debug!(source = %source, "in backoff, skipping this cycle");
                continue;
            }
            self.tasks[i].backoff_until = None;
            self.tasks[i].state = SourceState::Fetching;
            report.attempted += 1;

            let outcome = self.tasks[i].adapter.poll().await;
            match outcome {
                Ok(PollOutcome::RateLimited { cool_down }) => {
                    self.tasks[i].backoff_until = Some(Instant::now() + cool_down);
                    report.rate_limited += 1;
                    tracing::warn!(
                        source = %source,
                        cool_down_secs = cool_down.as_secs(),
                        "source rate limited, backing off"
                    );
                }
                Ok(PollOutcome::Items(items)) => {
                    self.tasks[i].state = SourceState::Emitting;
                    self.emit(&mut report, items).await;
                }
                Err(e) => {
                    report.errors += 1;
                    counter!("watch_poll_errors_total").increment(1);
                    tracing::warn!(source = %source, error = ?e, "poll failed");
                }
            }

            self.tasks[i].state = if self.tasks[i].backoff_until.is_some() {
                SourceState::Backoff
            } else {
                SourceState::Idle
            };
            sleep(self.stagger).await;
        }
        report
    }

    async fn emit(&self, report: &mut CycleReport, items: Vec<Item>) {
        for item in items {
            match self
                .ledger
                .admit(&item.source, &item.external_id, Some(&item.url))
            {
                Ok(true) => {
                    report.admitted += 1;
                    counter!("watch_items_admitted_total").increment(1);
                    tracing::info!(source = %item.source, id = %item.external_id, "new item admitted");
                    match self.sink.forward(&item).await {
                        Ok(()) => {
                            report.forwarded += 1;
                            sleep(FORWARD_PACING).await;
                        }
                        Err(e) => tracing::error!(
                            source = %item.source,
                            id = %item.external_id,
                            url = %item.url,
                            error = ?e,
                            "forward failed, item will not be retried"
                        ),
                    }
                }
                Ok(false) => {
                    tracing::debug!(source = %item.source, id = %item.external_id, "already seen")
                }
                Err(e) => {
                    tracing::error!(source = %item.source, error = ?e, "ledger admission failed")
                }
            }
        }
    }

    /// Current state of each source, in configuration order.
    pub fn source_states(&self) -> Vec<(String, SourceState)> {
        self.tasks
            .iter()
            .map(|task| (task.adapter.source_key().to_string(), task.state))
            .collect()
    }
}
