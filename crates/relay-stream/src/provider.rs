use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::Event;
use relay_domain::DataKind;
use relay_store::{ChangeNotification, DataStore, Dataset, Item};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Instant, MissedTickBehavior};

use crate::dialect::Dialect;
use crate::error::StreamError;
use crate::payload::{item_path, DeletePayload, PatchPayload, PutPayload};

/// How often a heartbeat comment is sent, and how long a connection may
/// live before being forced to close (§4.6, §5).
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    pub heartbeat_interval: Duration,
    pub max_connection_time: Option<Duration>,
}

impl StreamConfig {
    pub fn new(heartbeat_interval: Duration, max_connection_time: Option<Duration>) -> Self {
        StreamConfig { heartbeat_interval, max_connection_time }
    }
}

/// Snapshot the store's current live items into the dataset shape a `put`
/// frame carries.
pub async fn snapshot_dataset(store: &dyn DataStore, dialect: Dialect) -> Result<Dataset, StreamError> {
    let flags = store
        .all(DataKind::Flags)
        .await?
        .into_iter()
        .filter_map(|(k, item)| match item {
            Item::Flag(f) => Some((k, f)),
            Item::Segment(_) => None,
        })
        .collect();

    let segments = if dialect.includes(DataKind::Segments) {
        store
            .all(DataKind::Segments)
            .await?
            .into_iter()
            .filter_map(|(k, item)| match item {
                Item::Segment(s) => Some((k, s)),
                Item::Flag(_) => None,
            })
            .collect()
    } else {
        Default::default()
    };

    Ok(Dataset { flags, segments })
}

/// Build the initial replay frame sent immediately on connect: a full `put`
/// for the server dialects, a content-less `ping` for the mobile/JS
/// dialects.
pub async fn initial_frame(store: &dyn DataStore, dialect: Dialect) -> Result<Event, StreamError> {
    if dialect.is_ping() {
        return Ok(Event::default().event("ping"));
    }
    let dataset = snapshot_dataset(store, dialect).await?;
    let payload = PutPayload::full(dataset);
    Ok(Event::default().event("put").json_data(&payload)?)
}

/// Translate one change notification into this dialect's SSE frame, or
/// `None` if the dialect doesn't forward this kind (e.g. `/flags` ignores
/// segment changes).
pub fn frame_for_change(dialect: Dialect, change: &ChangeNotification) -> Option<Result<Event, StreamError>> {
    if !dialect.includes(change.kind) {
        return None;
    }
    if dialect.is_ping() {
        return Some(Ok(Event::default().event("ping")));
    }
    let path = item_path(change.kind, &change.key);
    let event = match &change.item {
        Some(item) => Event::default().event("patch").json_data(&PatchPayload { path, data: item.clone() }),
        None => Event::default().event("delete").json_data(&DeletePayload { path, version: change.version }),
    };
    Some(event.map_err(StreamError::from))
}

/// Drive one subscriber: replay the initial frame, then forward store
/// changes and heartbeat comments until the store's broadcast channel
/// closes, the optional max connection time elapses, or the subscriber
/// falls far enough behind to be disconnected explicitly (a lagged
/// receiver resubscribes implicitly by skipping the missed notifications
/// and continuing from the next one — it does not see a stale replay).
pub struct SubscriberStream {
    store: Arc<dyn DataStore>,
    dialect: Dialect,
    rx: tokio::sync::broadcast::Receiver<ChangeNotification>,
    heartbeat: tokio::time::Interval,
    deadline: Option<Instant>,
    replayed: bool,
    shutdown: tokio::sync::watch::Receiver<bool>,
}

impl SubscriberStream {
    /// `shutdown` is the owning environment's removal signal (§4.1
    /// `RemoveEnvironment`): when it flips to `true` every subscriber of
    /// that environment observes end-of-stream on its next poll, same as a
    /// closed store.
    pub fn new(
        store: Arc<dyn DataStore>,
        dialect: Dialect,
        config: StreamConfig,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> Self {
        let rx = store.subscribe();
        let mut heartbeat = tokio::time::interval(config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let deadline = config.max_connection_time.map(|d| Instant::now() + d);
        SubscriberStream { store, dialect, rx, heartbeat, deadline, replayed: false, shutdown }
    }

    /// Produce the next frame, or `None` when the stream should end.
    pub async fn next(&mut self) -> Option<Result<Event, StreamError>> {
        if *self.shutdown.borrow() {
            return None;
        }
        if !self.replayed {
            self.replayed = true;
            return Some(initial_frame(self.store.as_ref(), self.dialect).await);
        }

        loop {
            let deadline_elapsed = async {
                match self.deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = deadline_elapsed => return None,
                changed = self.shutdown.changed() => {
                    match changed {
                        Ok(()) if *self.shutdown.borrow() => return None,
                        Ok(()) => continue,
                        Err(_) => continue,
                    }
                }
                _ = self.heartbeat.tick() => return Some(Ok(Event::default().comment(""))),
                received = self.rx.recv() => {
                    match received {
                        Ok(change) => {
                            if let Some(frame) = frame_for_change(self.dialect, &change) {
                                return Some(frame);
                            }
                            continue;
                        }
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_store::InMemoryStore;

    #[tokio::test]
    async fn shutdown_signal_ends_the_stream_after_replay() {
        let store: Arc<dyn DataStore> = Arc::new(InMemoryStore::new());
        let (tx, rx) = tokio::sync::watch::channel(false);
        let mut sub = SubscriberStream::new(
            store,
            Dialect::MobilePing,
            StreamConfig::new(Duration::from_secs(300), None),
            rx,
        );
        assert!(sub.next().await.is_some()); // initial ping
        tx.send(true).unwrap();
        assert!(sub.next().await.is_none());
    }
}
