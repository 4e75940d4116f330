pub mod backoff;
pub mod error;
pub mod payload;
mod polling;
pub mod rest;
mod streaming;
pub mod status;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use relay_store::DataStore;
use reqwest::Client;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub use error::IngestError;
pub use rest::RestClient;
pub use status::{ConnectionState, ConnectionStatus};

/// How the ingester talks to upstream (§4.2). Streaming is the default; the
/// polling fallback is selected per environment config.
#[derive(Debug, Clone)]
pub enum IngestMode {
    Streaming,
    Polling { interval: Duration },
}

#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub sdk_key: String,
    pub base_uri: String,
    pub stream_uri: String,
    pub mode: IngestMode,
}

/// Owns one environment's background upstream connection. Dropping this does
/// not stop the task — call [`Ingester::close`] to cancel it and wait for
/// exit.
pub struct Ingester {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
    status_rx: watch::Receiver<ConnectionStatus>,
}

impl Ingester {
    /// Spawn the background ingestion task described by `settings`, writing
    /// into `store`. Returns immediately; the first dataset (or terminal
    /// failure) arrives asynchronously and is observable via
    /// [`Ingester::status`].
    pub fn spawn(client: Client, settings: IngestSettings, store: Arc<dyn DataStore>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::initializing(Utc::now()));

        let rest = RestClient::new(client.clone(), settings.base_uri.clone(), settings.sdk_key.clone());

        let handle = match settings.mode {
            IngestMode::Streaming => tokio::spawn(streaming::run(
                client,
                settings.stream_uri,
                settings.sdk_key,
                rest,
                store,
                status_tx,
                shutdown_rx,
            )),
            IngestMode::Polling { interval } => {
                tokio::spawn(polling::run(rest, store, interval, status_tx, shutdown_rx))
            }
        };

        Ingester { handle, shutdown_tx, status_rx }
    }

    /// Current connection status; cloned out so callers don't hold the
    /// watch's internal lock.
    pub fn status(&self) -> ConnectionStatus {
        self.status_rx.borrow().clone()
    }

    /// A receiver that resolves on every status transition — used by the
    /// registry's `WaitForAllClients` to wait for the first transition out
    /// of `Initializing`.
    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Cancel the background task and wait for it to exit.
    pub async fn close(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use relay_store::InMemoryStore;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn polling_ingester_reaches_connected_on_first_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sdk/latest-all"))
            .and(header("Authorization", "sdk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"flags": {}, "segments": {}})))
            .mount(&server)
            .await;

        let store: Arc<dyn DataStore> = Arc::new(InMemoryStore::new());
        let settings = IngestSettings {
            sdk_key: "sdk-test".into(),
            base_uri: server.uri(),
            stream_uri: server.uri(),
            mode: IngestMode::Polling { interval: Duration::from_secs(60) },
        };
        let ingester = Ingester::spawn(Client::new(), settings, store.clone());

        let mut status_rx = ingester.status_receiver();
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if status_rx.borrow().state.is_ready() {
                    break;
                }
                status_rx.changed().await.unwrap();
            }
        })
        .await
        .expect("expected ready within timeout");

        assert_eq!(ingester.status().state, ConnectionState::Connected);
        assert!(store.initialized().await);
        ingester.close().await;
    }

    #[tokio::test]
    async fn polling_ingester_fails_terminally_on_401() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sdk/latest-all"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let store: Arc<dyn DataStore> = Arc::new(InMemoryStore::new());
        let settings = IngestSettings {
            sdk_key: "sdk-bad".into(),
            base_uri: server.uri(),
            stream_uri: server.uri(),
            mode: IngestMode::Polling { interval: Duration::from_secs(60) },
        };
        let ingester = Ingester::spawn(Client::new(), settings, store);

        let mut status_rx = ingester.status_receiver();
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if status_rx.borrow().state.is_ready() {
                    break;
                }
                status_rx.changed().await.unwrap();
            }
        })
        .await
        .expect("expected ready within timeout");

        assert_eq!(ingester.status().state, ConnectionState::Failed);
        ingester.close().await;
    }
}
