use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::sync::{watch, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::PublishError;
use crate::schema::{upgrade_legacy_event, EVENT_SCHEMA_VERSION};

const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Running counters exposed for the status endpoint's bookkeeping (§10.2).
/// No exporter reads these yet; they're tracked so one can later.
#[derive(Default)]
pub struct PublisherCounters {
    pub queue_overflow: AtomicU64,
    pub dropped_batches: AtomicU64,
}

struct Shared {
    queue: Mutex<VecDeque<Value>>,
    capacity: usize,
    credential: RwLock<String>,
    events_uri: String,
    client: Client,
    flush_notify: Notify,
    overflow_warned: AtomicBool,
    counters: PublisherCounters,
}

/// The bounded-queue, batched-POST event relay described in §4.4. One
/// instance per environment.
pub struct EventPublisher {
    shared: Arc<Shared>,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl EventPublisher {
    pub fn spawn(client: Client, events_uri: impl Into<String>, credential: impl Into<String>, capacity: usize, flush_interval: Duration) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
            credential: RwLock::new(credential.into()),
            events_uri: events_uri.into(),
            client,
            flush_notify: Notify::new(),
            overflow_warned: AtomicBool::new(false),
            counters: PublisherCounters::default(),
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(flush_loop(shared.clone(), flush_interval, shutdown_rx));

        EventPublisher { shared, shutdown_tx, handle }
    }

    /// Enqueue one pre-built event, upgrading it to the current schema if
    /// it's in a legacy shape. Drops silently on overflow, logging a single
    /// warning per overflow episode.
    pub async fn publish(&self, event: Value) {
        self.publish_batch(vec![event]).await;
    }

    pub async fn publish_batch(&self, events: Vec<Value>) {
        let mut queue = self.shared.queue.lock().await;
        for event in events {
            if queue.len() >= self.shared.capacity {
                if !self.shared.overflow_warned.swap(true, Ordering::Relaxed) {
                    warn!(capacity = self.shared.capacity, "event queue full, dropping events");
                }
                self.shared.counters.queue_overflow.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            queue.push_back(upgrade_legacy_event(event));
        }
    }

    /// Request an out-of-band flush; returns once the request has been
    /// observed by the flush loop, not once delivery completes.
    pub fn request_flush(&self) {
        self.shared.flush_notify.notify_one();
    }

    /// Swap the outbound `Authorization` header, used during SDK-key
    /// rotation so events already queued are delivered under the new key.
    pub async fn replace_credential(&self, credential: impl Into<String>) {
        *self.shared.credential.write().await = credential.into();
    }

    pub fn counters(&self) -> &PublisherCounters {
        &self.shared.counters
    }

    /// Flush once more and wait for the background task to exit.
    pub async fn close(self) {
        self.shared.flush_notify.notify_one();
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

async fn flush_loop(shared: Arc<Shared>, flush_interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                deliver_pending(&shared).await;
            }
            _ = shared.flush_notify.notified() => {
                deliver_pending(&shared).await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    deliver_pending(&shared).await;
                    return;
                }
            }
        }
    }
}

async fn deliver_pending(shared: &Arc<Shared>) {
    let batch: Vec<Value> = {
        let mut queue = shared.queue.lock().await;
        if queue.is_empty() {
            return;
        }
        let drained = queue.drain(..).collect();
        shared.overflow_warned.store(false, Ordering::Relaxed);
        drained
    };

    if let Err(e) = deliver_batch(shared, &batch).await {
        warn!(error = %e, count = batch.len(), "dropping undelivered event batch");
        shared.counters.dropped_batches.fetch_add(1, Ordering::Relaxed);
    }
}

async fn deliver_batch(shared: &Arc<Shared>, batch: &[Value]) -> Result<(), PublishError> {
    match post_once(shared, batch).await {
        Ok(()) => Ok(()),
        Err(DeliveryOutcome::Terminal) => Ok(()),
        Err(DeliveryOutcome::Retriable(_)) => {
            tokio::time::sleep(RETRY_DELAY).await;
            match post_once(shared, batch).await {
                Ok(()) => Ok(()),
                Err(DeliveryOutcome::Terminal) => Ok(()),
                Err(DeliveryOutcome::Retriable(e)) => Err(e),
            }
        }
    }
}

enum DeliveryOutcome {
    /// 401/403/404/429 — stop retrying, drop the batch, no error surfaced.
    Terminal,
    Retriable(PublishError),
}

async fn post_once(shared: &Arc<Shared>, batch: &[Value]) -> Result<(), DeliveryOutcome> {
    let url = format!("{}/bulk", shared.events_uri.trim_end_matches('/'));
    let credential = shared.credential.read().await.clone();

    let response = shared
        .client
        .post(&url)
        .header("Authorization", credential)
        .header("Content-Type", "application/json")
        .header("X-LaunchDarkly-Event-Schema", EVENT_SCHEMA_VERSION)
        .json(batch)
        .send()
        .await
        .map_err(|e| DeliveryOutcome::Retriable(PublishError::Transport(e)))?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND | StatusCode::TOO_MANY_REQUESTS) {
        return Err(DeliveryOutcome::Terminal);
    }
    Err(DeliveryOutcome::Retriable(PublishError::Transport(
        response.error_for_status().unwrap_err(),
    )))
}
