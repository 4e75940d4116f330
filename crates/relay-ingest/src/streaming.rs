use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use relay_store::DataStore;
use reqwest::{Client, StatusCode};
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::backoff::Backoff;
use crate::payload::{decode_patch_item, parse_item_path, DeleteBody, PatchBody, PutBody};
use crate::rest::RestClient;
use crate::status::{ConnectionState, ConnectionStatus};

/// Drives one environment's store from the upstream streaming endpoint.
/// Runs until `shutdown` is signalled or the connection fails terminally
/// (401/403).
pub async fn run(
    client: Client,
    stream_uri: String,
    sdk_key: String,
    rest: RestClient,
    store: Arc<dyn DataStore>,
    status_tx: watch::Sender<ConnectionStatus>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut backoff = Backoff::new();

    loop {
        if *shutdown.borrow() {
            return;
        }

        let connected_at = Instant::now();
        match connect_and_consume(&client, &stream_uri, &sdk_key, &rest, &store, &status_tx, &mut shutdown).await {
            Ok(ShutdownRequested) => return,
            Err(StreamOutcome::Terminal(err)) => {
                error!(error = %err, "bad key, stopping reconnect attempts");
                status_tx.send_modify(|s| s.transition(ConnectionState::Failed, Utc::now(), Some(err.to_string())));
                return;
            }
            Err(StreamOutcome::Retriable(err)) => {
                warn!(error = %err, "upstream stream error, reconnecting");
                status_tx.send_modify(|s| s.transition(ConnectionState::Interrupted, Utc::now(), Some(err.to_string())));
                backoff.note_connection_duration(connected_at.elapsed());
            }
        }

        let delay = backoff.next_delay();
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

struct ShutdownRequested;

enum StreamOutcome {
    Terminal(crate::error::IngestError),
    Retriable(crate::error::IngestError),
}

async fn connect_and_consume(
    client: &Client,
    stream_uri: &str,
    sdk_key: &str,
    rest: &RestClient,
    store: &Arc<dyn DataStore>,
    status_tx: &watch::Sender<ConnectionStatus>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<ShutdownRequested, StreamOutcome> {
    let url = format!("{}/all", stream_uri.trim_end_matches('/'));
    let response = client
        .get(&url)
        .header("Authorization", sdk_key)
        .send()
        .await
        .map_err(|e| StreamOutcome::Retriable(e.into()))?;

    if response.status() == StatusCode::UNAUTHORIZED || response.status() == StatusCode::FORBIDDEN {
        return Err(StreamOutcome::Terminal(crate::error::IngestError::Unauthorized));
    }
    if !response.status().is_success() {
        return Err(StreamOutcome::Retriable(crate::error::IngestError::UnexpectedStatus(response.status())));
    }

    let mut events = response.bytes_stream().eventsource();

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return Ok(ShutdownRequested);
                }
            }
            next = events.next() => {
                match next {
                    None => return Err(StreamOutcome::Retriable(crate::error::IngestError::MalformedEvent("stream ended".into()))),
                    Some(Err(e)) => return Err(StreamOutcome::Retriable(crate::error::IngestError::MalformedEvent(e.to_string()))),
                    Some(Ok(event)) => {
                        if let Err(e) = handle_event(&event.event, &event.data, rest, store, status_tx).await {
                            error!(error = %e, "malformed event, restarting stream");
                            return Err(StreamOutcome::Retriable(e));
                        }
                    }
                }
            }
        }
    }
}

async fn handle_event(
    event_name: &str,
    data: &str,
    rest: &RestClient,
    store: &Arc<dyn DataStore>,
    status_tx: &watch::Sender<ConnectionStatus>,
) -> Result<(), crate::error::IngestError> {
    match event_name {
        "put" => {
            let body: PutBody = serde_json::from_str(data).map_err(|e| crate::error::IngestError::MalformedEvent(e.to_string()))?;
            if body.path != "/" {
                debug!(path = %body.path, "ignoring put with non-root path");
                return Ok(());
            }
            store.init(body.data).await?;
            status_tx.send_modify(|s| {
                if s.state != ConnectionState::Connected {
                    s.transition(ConnectionState::Connected, Utc::now(), None);
                }
            });
            Ok(())
        }
        "patch" => {
            let body: PatchBody = serde_json::from_str(data).map_err(|e| crate::error::IngestError::MalformedEvent(e.to_string()))?;
            let (kind, _key) = parse_item_path(&body.path)?;
            let item = decode_patch_item(kind, body.data)?;
            store.upsert(item).await?;
            Ok(())
        }
        "delete" => {
            let body: DeleteBody = serde_json::from_str(data).map_err(|e| crate::error::IngestError::MalformedEvent(e.to_string()))?;
            let (kind, key) = parse_item_path(&body.path)?;
            store.delete(kind, key, body.version).await?;
            Ok(())
        }
        "indirect/put" => {
            let dataset = rest.fetch_all().await?;
            store.init(dataset).await?;
            status_tx.send_modify(|s| {
                if s.state != ConnectionState::Connected {
                    s.transition(ConnectionState::Connected, Utc::now(), None);
                }
            });
            Ok(())
        }
        "indirect/patch" => {
            let path = data.trim().trim_matches('"');
            let (kind, key) = parse_item_path(path)?;
            if let Some(item) = rest.fetch_item(kind, key).await? {
                store.upsert(item).await?;
            }
            Ok(())
        }
        other => {
            debug!(event = other, "ignoring unknown event name");
            Ok(())
        }
    }
}
