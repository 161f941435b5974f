// src/lib.rs
// Public library surface for the two binaries and the integration tests.

pub mod auth;
pub mod config;
pub mod relay;
pub mod scheduler;
pub mod sources;
pub mod store;

// Publisher side: ingress gateway, delivery queue, dispatcher
pub mod publish;

// ---- Re-exports for stable public API ----
pub use crate::publish::{relay_queue, RelayMessage, RelayReceiver, RelaySender};
pub use crate::sources::types::{Item, PollOutcome, SourceAdapter};
pub use crate::store::SeenLedger;

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the process-wide tracing subscriber. Call once per binary, before
/// anything logs.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("linkrelay=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

/// One-time metrics registration (so series show up on whatever exporter the
/// host wires in).
pub fn describe_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        metrics::describe_counter!("watch_poll_errors_total", "Adapter fetch/parse errors.");
        metrics::describe_counter!(
            "watch_items_admitted_total",
            "Items newly admitted into the watcher ledger."
        );
        metrics::describe_counter!(
            "watch_source_backoff_total",
            "Poll attempts skipped because the source is cooling down."
        );
        metrics::describe_gauge!("relay_queue_depth", "Messages waiting in the delivery queue.");
        metrics::describe_counter!(
            "relay_delivered_total",
            "Messages delivered to the destination channel."
        );
        metrics::describe_counter!(
            "relay_rate_limited_total",
            "Delivery attempts deferred by destination rate limiting."
        );
        metrics::describe_counter!(
            "relay_dropped_total",
            "Messages dropped after a permanent delivery error."
        );
    });
}
