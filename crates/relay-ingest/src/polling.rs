use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use relay_store::DataStore;
use tokio::sync::watch;
use tracing::{error, warn};

use crate::rest::RestClient;
use crate::status::{ConnectionState, ConnectionStatus};

const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polling fallback ingester (§4.2): repeatedly fetches the full dataset and
/// applies it as a `put`, sleeping for the remainder of `poll_interval`
/// after each round trip.
pub async fn run(
    rest: RestClient,
    store: Arc<dyn DataStore>,
    poll_interval: Duration,
    status_tx: watch::Sender<ConnectionStatus>,
    mut shutdown: watch::Receiver<bool>,
) {
    let interval = poll_interval.max(MIN_POLL_INTERVAL);

    loop {
        if *shutdown.borrow() {
            return;
        }

        let started = Instant::now();
        match rest.fetch_all().await {
            Ok(dataset) => {
                if let Err(e) = store.init(dataset).await {
                    error!(error = %e, "failed to apply polled dataset");
                } else {
                    status_tx.send_modify(|s| {
                        if s.state != ConnectionState::Connected {
                            s.transition(ConnectionState::Connected, Utc::now(), None);
                        }
                    });
                }
            }
            Err(e) if e.is_terminal() => {
                error!(error = %e, "bad key, stopping polling");
                status_tx.send_modify(|s| s.transition(ConnectionState::Failed, Utc::now(), Some(e.to_string())));
                return;
            }
            Err(e) => {
                warn!(error = %e, "poll cycle failed, will retry next interval");
                status_tx.send_modify(|s| s.transition(ConnectionState::Interrupted, Utc::now(), Some(e.to_string())));
            }
        }

        let elapsed = started.elapsed();
        let remaining = interval.saturating_sub(elapsed);
        tokio::select! {
            _ = tokio::time::sleep(remaining) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}
