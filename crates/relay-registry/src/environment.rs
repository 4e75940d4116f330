use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use relay_events::EventPublisher;
use relay_ingest::{ConnectionState, ConnectionStatus, IngestMode, IngestSettings, Ingester};
use relay_store::{DataStore, InMemoryStore};
use relay_stream::StreamConfig;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::{watch, Mutex};

/// The credential set and display name that identify one environment, and
/// the mutable pieces of it that SDK-key rotation can replace in place
/// (§4.1 `AddedEnvironmentCredential`/`RemovingEnvironmentCredential`).
#[derive(Debug, Clone)]
pub struct EnvironmentIdentifiers {
    pub name: String,
    pub sdk_key: String,
    pub mobile_key: Option<String>,
    pub env_id: Option<String>,
    pub expiring_sdk_key: Option<String>,
}

/// Everything [`Environment::spawn`] needs to bring one environment's
/// background tasks up: upstream locations, ingestion mode, event-queue
/// sizing, and the per-connection stream behavior. `base_uri`/`stream_uri`/
/// `events_uri` are the process-wide defaults from `[Main]`; only the
/// credentials vary per environment in the common deployment shape.
pub struct EnvironmentSettings {
    pub identifiers: EnvironmentIdentifiers,
    pub base_uri: String,
    pub stream_uri: String,
    pub events_uri: String,
    pub mode: IngestMode,
    pub events_capacity: usize,
    pub events_flush_interval: Duration,
    pub secure_mode: bool,
    pub ttl: Option<Duration>,
    pub stream_config: StreamConfig,
}

/// One environment's data engine and fan-out/evaluation/event plane (§2
/// row F): the store, the upstream ingester that drives it, the event
/// publisher, and enough bookkeeping for the registry's lifecycle and
/// status operations. Owned by [`crate::Registry`] behind an `Arc`, looked
/// up by any of its credentials.
pub struct Environment {
    identifiers: Mutex<EnvironmentIdentifiers>,
    store: Arc<dyn DataStore>,
    ingester: Mutex<Option<Ingester>>,
    publisher: Mutex<Option<EventPublisher>>,
    pub secure_mode: bool,
    pub ttl: Option<Duration>,
    pub stream_config: StreamConfig,
    pub creation_time: DateTime<Utc>,
    shutdown_tx: watch::Sender<bool>,
}

impl Environment {
    /// Construct eagerly and start the ingester in the background; the
    /// returned handle is usable immediately even though the first dataset
    /// hasn't arrived yet (`store.initialized()` is `false` until it does).
    pub fn spawn(client: Client, settings: EnvironmentSettings) -> Arc<Environment> {
        let store: Arc<dyn DataStore> = Arc::new(InMemoryStore::new());

        let ingest_settings = IngestSettings {
            sdk_key: settings.identifiers.sdk_key.clone(),
            base_uri: settings.base_uri,
            stream_uri: settings.stream_uri,
            mode: settings.mode,
        };
        let ingester = Ingester::spawn(client.clone(), ingest_settings, store.clone());

        let publisher = EventPublisher::spawn(
            client,
            settings.events_uri,
            settings.identifiers.sdk_key.clone(),
            settings.events_capacity,
            settings.events_flush_interval,
        );

        let (shutdown_tx, _) = watch::channel(false);

        Arc::new(Environment {
            identifiers: Mutex::new(settings.identifiers),
            store,
            ingester: Mutex::new(Some(ingester)),
            publisher: Mutex::new(Some(publisher)),
            secure_mode: settings.secure_mode,
            ttl: settings.ttl,
            stream_config: settings.stream_config,
            creation_time: Utc::now(),
            shutdown_tx,
        })
    }

    pub async fn identifiers(&self) -> EnvironmentIdentifiers {
        self.identifiers.lock().await.clone()
    }

    pub fn store(&self) -> Arc<dyn DataStore> {
        self.store.clone()
    }

    /// A receiver that flips to `true` when this environment is removed —
    /// handed to every [`relay_stream::SubscriberStream`] built from this
    /// environment so live subscribers disconnect on removal.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub async fn publish_batch(&self, events: Vec<Value>) {
        if let Some(publisher) = self.publisher.lock().await.as_ref() {
            publisher.publish_batch(events).await;
        }
    }

    pub async fn request_flush(&self) {
        if let Some(publisher) = self.publisher.lock().await.as_ref() {
            publisher.request_flush();
        }
    }

    /// Swap both the ingester's and the publisher's in-flight credential —
    /// used by `relay-cli`/auto-config during SDK-key rotation. The store
    /// and its subscribers are untouched; only outbound authorization
    /// changes.
    pub async fn rotate_sdk_key(&self, new_key: String) {
        self.identifiers.lock().await.sdk_key = new_key.clone();
        if let Some(publisher) = self.publisher.lock().await.as_ref() {
            publisher.replace_credential(new_key).await;
        }
    }

    pub async fn connection_status(&self) -> Option<ConnectionStatus> {
        match self.ingester.lock().await.as_ref() {
            Some(ingester) => Some(ingester.status()),
            None => None,
        }
    }

    /// Block until this environment's ingester has transitioned out of
    /// `Initializing` — either `Connected` or `Failed`. Returns immediately
    /// if the environment has already been closed.
    pub async fn wait_ready(&self) {
        let mut status_rx = {
            let guard = self.ingester.lock().await;
            match guard.as_ref() {
                Some(ingester) => ingester.status_receiver(),
                None => return,
            }
        };
        loop {
            if status_rx.borrow().state.is_ready() {
                return;
            }
            if status_rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub async fn has_failed(&self) -> bool {
        matches!(self.connection_status().await, Some(status) if status.state == ConnectionState::Failed)
    }

    /// Cascading shutdown per §4.1 `RemoveEnvironment`: cancel the
    /// ingester, flush and close the publisher, then flip the shutdown
    /// signal so every live SSE subscriber observes end-of-stream.
    pub async fn close(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(ingester) = self.ingester.lock().await.take() {
            ingester.close().await;
        }
        if let Some(publisher) = self.publisher.lock().await.take() {
            publisher.close().await;
        }
    }
}
