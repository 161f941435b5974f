// src/publish/mod.rs
pub mod discord;
pub mod dispatch;
pub mod gateway;

use metrics::gauge;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// In-flight message bound for the destination channel. Created at
/// admission, destroyed when the dispatcher delivers it or gives up on it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RelayMessage {
    pub source: String,
    pub url: String,
    pub title: String,
}

/// FIFO hand-off between the gateway and the dispatcher. Unbounded, so the
/// depth is tracked to keep growth at least visible.
pub fn relay_queue() -> (RelaySender, RelayReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    (
        RelaySender {
            tx,
            depth: depth.clone(),
        },
        RelayReceiver { rx, depth },
    )
}

#[derive(Clone)]
pub struct RelaySender {
    tx: mpsc::UnboundedSender<RelayMessage>,
    depth: Arc<AtomicUsize>,
}

impl RelaySender {
    /// Enqueue for delivery. Fails only when the dispatcher is gone.
    pub fn push(&self, message: RelayMessage) -> anyhow::Result<()> {
        self.tx
            .send(message)
            .map_err(|_| anyhow::anyhow!("delivery queue closed"))?;
        let depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        gauge!("relay_queue_depth").set(depth as f64);
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}

pub struct RelayReceiver {
    rx: mpsc::UnboundedReceiver<RelayMessage>,
    depth: Arc<AtomicUsize>,
}

impl RelayReceiver {
    /// Block until the next message; `None` once all senders are gone.
    pub async fn next(&mut self) -> Option<RelayMessage> {
        let message = self.rx.recv().await?;
        let depth = self.depth.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        gauge!("relay_queue_depth").set(depth as f64);
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(url: &str) -> RelayMessage {
        RelayMessage {
            source: "x:acme".into(),
            url: url.into(),
            title: url.into(),
        }
    }

    #[tokio::test]
    async fn queue_preserves_admission_order() {
        let (tx, mut rx) = relay_queue();
        tx.push(message("https://a")).unwrap();
        tx.push(message("https://b")).unwrap();
        assert_eq!(tx.depth(), 2);
        assert_eq!(rx.next().await.unwrap().url, "https://a");
        assert_eq!(rx.next().await.unwrap().url, "https://b");
        assert_eq!(tx.depth(), 0);
    }

    #[tokio::test]
    async fn receiver_sees_closed_queue() {
        let (tx, mut rx) = relay_queue();
        tx.push(message("https://a")).unwrap();
        drop(tx);
        assert!(rx.next().await.is_some());
        assert!(rx.next().await.is_none());
    }
}
