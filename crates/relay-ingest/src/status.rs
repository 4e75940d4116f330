use chrono::{DateTime, Utc};

/// Lifecycle state of one environment's upstream connection. Surfaced on the
/// `/status` endpoint's `connectionStatus` (§7) and used by the registry's
/// `WaitForAllClients` to decide when an environment has "signalled ready":
/// the first successful sync or a terminal failure, never a transient
/// `Interrupted` retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Initializing,
    Connected,
    /// Lost connection, currently retrying with backoff.
    Interrupted,
    /// Terminal: 401/403 from upstream. No further reconnect attempts.
    Failed,
}

impl ConnectionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Failed)
    }

    pub fn as_status_str(&self) -> &'static str {
        match self {
            ConnectionState::Connected => "connected",
            _ => "disconnected",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub state_since: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl ConnectionStatus {
    pub fn initializing(now: DateTime<Utc>) -> Self {
        ConnectionStatus { state: ConnectionState::Initializing, state_since: now, last_error: None }
    }

    pub fn transition(&mut self, state: ConnectionState, now: DateTime<Utc>, last_error: Option<String>) {
        self.state = state;
        self.state_since = now;
        if last_error.is_some() {
            self.last_error = last_error;
        }
    }
}
