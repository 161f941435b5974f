// tests/dispatch_retry.rs
//
// Dispatcher retry policy against a scripted channel client, with the tokio
// clock paused so the rate-limit waits are measured, not endured.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use linkrelay::publish::dispatch::{
    ChannelClient, ChannelHandle, Dispatcher, SendOutcome, DEFAULT_RETRY_AFTER,
};
use linkrelay::publish::{relay_queue, RelayMessage};

const CHANNEL_ID: u64 = 4242;

enum Step {
    Ok,
    RateLimited(Option<u64>),
    Fail(&'static str),
}

struct ScriptedChannel {
    steps: Mutex<VecDeque<Step>>,
    /// Every send attempt, in order, as (message text, delivered?).
    attempts: Mutex<Vec<(String, bool)>>,
    resolves: AtomicUsize,
    failing_resolves: AtomicUsize,
}

impl ScriptedChannel {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            attempts: Mutex::new(Vec::new()),
            resolves: AtomicUsize::new(0),
            failing_resolves: AtomicUsize::new(0),
        })
    }

    fn delivered(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, ok)| *ok)
            .map(|(text, _)| text.clone())
            .collect()
    }

    fn attempts(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .map(|(text, _)| text.clone())
            .collect()
    }
}

#[async_trait]
impl ChannelClient for ScriptedChannel {
    async fn resolve(&self, channel_id: u64) -> Result<ChannelHandle> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        if self.failing_resolves.load(Ordering::SeqCst) > 0 {
            self.failing_resolves.fetch_sub(1, Ordering::SeqCst);
            return Err(anyhow!("channel lookup failed"));
        }
        Ok(ChannelHandle {
            id: channel_id,
            name: Some("announcements".into()),
        })
    }

    async fn send(&self, _channel: &ChannelHandle, text: &str) -> SendOutcome {
        let step = self.steps.lock().unwrap().pop_front();
        let outcome = match step {
            Some(Step::Ok) | None => SendOutcome::Delivered,
            Some(Step::RateLimited(secs)) => SendOutcome::RateLimited {
                retry_after: secs.map(Duration::from_secs),
            },
            Some(Step::Fail(reason)) => SendOutcome::Failed {
                reason: reason.to_string(),
            },
        };
        let delivered = matches!(outcome, SendOutcome::Delivered);
        self.attempts.lock().unwrap().push((text.to_string(), delivered));
        outcome
    }
}

fn message(id: &str) -> RelayMessage {
    RelayMessage {
        source: "x:acme".into(),
        url: format!("https://x.com/acme/status/{id}"),
        title: format!("post {id}"),
    }
}

#[tokio::test(start_paused = true)]
async fn rate_limited_send_retries_same_message_after_wait() {
    let channel = ScriptedChannel::new(vec![Step::RateLimited(Some(2)), Step::Ok]);
    let mut dispatcher = Dispatcher::new(channel.clone(), CHANNEL_ID);

    let started = tokio::time::Instant::now();
    dispatcher.deliver(&message("1")).await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(2), "waited {elapsed:?}");
    assert_eq!(channel.delivered().len(), 1, "exactly one successful send");
    assert_eq!(channel.attempts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn missing_retry_after_uses_the_default_wait() {
    let channel = ScriptedChannel::new(vec![Step::RateLimited(None), Step::Ok]);
    let mut dispatcher = Dispatcher::new(channel.clone(), CHANNEL_ID);

    let started = tokio::time::Instant::now();
    dispatcher.deliver(&message("1")).await;

    assert!(started.elapsed() >= DEFAULT_RETRY_AFTER);
    assert_eq!(channel.delivered().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn no_message_overtakes_a_rate_limited_one() {
    let channel = ScriptedChannel::new(vec![Step::RateLimited(Some(5)), Step::Ok, Step::Ok]);
    let dispatcher = Dispatcher::new(channel.clone(), CHANNEL_ID);

    let (tx, rx) = relay_queue();
    tx.push(message("first")).unwrap();
    tx.push(message("second")).unwrap();
    drop(tx);

    dispatcher.run(rx).await;

    let attempts = channel.attempts();
    assert_eq!(attempts.len(), 3);
    assert!(attempts[0].contains("first"));
    assert!(attempts[1].contains("first"), "retry targets the same message");
    assert!(attempts[2].contains("second"));
}

#[tokio::test(start_paused = true)]
async fn permanent_error_drops_the_message_and_continues() {
    let channel = ScriptedChannel::new(vec![Step::Fail("403 missing permissions"), Step::Ok]);
    let dispatcher = Dispatcher::new(channel.clone(), CHANNEL_ID);

    let (tx, rx) = relay_queue();
    tx.push(message("doomed")).unwrap();
    tx.push(message("fine")).unwrap();
    drop(tx);

    dispatcher.run(rx).await;

    let delivered = channel.delivered();
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].contains("fine"));
}

#[tokio::test(start_paused = true)]
async fn channel_resolution_is_cached_across_messages() {
    let channel = ScriptedChannel::new(vec![Step::Ok, Step::Ok]);
    let dispatcher = Dispatcher::new(channel.clone(), CHANNEL_ID);

    let (tx, rx) = relay_queue();
    tx.push(message("1")).unwrap();
    tx.push(message("2")).unwrap();
    drop(tx);

    dispatcher.run(rx).await;

    assert_eq!(channel.delivered().len(), 2);
    assert_eq!(channel.resolves.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_resolution_drops_the_message_then_recovers() {
    let channel = ScriptedChannel::new(vec![Step::Ok]);
    channel.failing_resolves.store(1, Ordering::SeqCst);
    let dispatcher = Dispatcher::new(channel.clone(), CHANNEL_ID);

    let (tx, rx) = relay_queue();
    tx.push(message("dropped")).unwrap();
    tx.push(message("delivered")).unwrap();
    drop(tx);

    dispatcher.run(rx).await;

    let delivered = channel.delivered();
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].contains("delivered"));
    assert_eq!(channel.resolves.load(Ordering::SeqCst), 2);
}
