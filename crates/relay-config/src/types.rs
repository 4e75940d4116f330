use std::collections::HashMap;
use std::time::Duration;

/// Top-level configuration record assembled by [`crate::loader::load`]. Mirrors
/// the `[Main]` / `[Events]` / `[Redis]` / `[Environment "name"]` sections of
/// the INI file, overlaid with environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub main: MainConfig,
    pub events: EventsConfig,
    pub persistence: Option<PersistenceConfig>,
    /// Keyed by the environment's display name (the `"name"` in `[Environment "name"]`).
    pub environments: HashMap<String, EnvironmentConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MainConfig {
    pub port: u16,
    pub base_uri: String,
    pub stream_uri: String,
    pub events_uri: String,
    pub heartbeat_interval_secs: u64,
    pub max_client_connection_time_secs: Option<u64>,
    pub tls: Option<TlsConfig>,
    pub log_level: String,
    pub ignore_connection_errors: bool,
    /// When set, every environment's ingester uses the polling fallback
    /// (§4.2) at this interval instead of the default streaming connection.
    pub poll_interval_secs: Option<u64>,
}

impl MainConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TlsConfig {
    pub cert: Option<String>,
    pub key: Option<String>,
    pub min_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventsConfig {
    pub capacity: usize,
    pub flush_interval_secs: u64,
    pub send_events: bool,
    pub sampling_interval: Option<u32>,
}

impl EventsConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersistenceConfig {
    pub backend: PersistenceBackend,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub url: Option<String>,
    pub local_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceBackend {
    Redis,
    Consul,
    DynamoDb,
}

/// One `[Environment "name"]` section — the per-environment credential and
/// behavior set consumed by the registry in `relay-registry`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentConfig {
    pub name: String,
    pub sdk_key: String,
    pub mobile_key: Option<String>,
    pub env_id: Option<String>,
    pub prefix: Option<String>,
    pub table_name: Option<String>,
    pub secure_mode: bool,
    pub ttl_minutes: Option<u32>,
}

impl Default for MainConfig {
    fn default() -> Self {
        MainConfig {
            port: 8030,
            base_uri: "https://app.launchdarkly.com".to_string(),
            stream_uri: "https://stream.launchdarkly.com".to_string(),
            events_uri: "https://events.launchdarkly.com".to_string(),
            heartbeat_interval_secs: 180,
            max_client_connection_time_secs: None,
            tls: None,
            log_level: "info".to_string(),
            ignore_connection_errors: false,
            poll_interval_secs: None,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        EventsConfig {
            capacity: 1000,
            flush_interval_secs: 60,
            send_events: true,
            sampling_interval: None,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            main: MainConfig::default(),
            events: EventsConfig::default(),
            persistence: None,
            environments: HashMap::new(),
        }
    }
}
