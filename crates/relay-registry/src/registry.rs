use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use tokio::sync::RwLock;

use crate::credential::Credential;
use crate::environment::{Environment, EnvironmentSettings};
use crate::error::RegistryError;
use crate::status::{
    connection_state_label, is_healthy, obscure_key, ConnectionStatusJson, EnvironmentStatus, StatusReport,
};

/// The process-wide `credential -> environment` map of §4.1, plus the
/// bookkeeping `WaitForAllClients` needs to know which environments existed
/// at startup. A reader-preferring lock backs both maps; lookups (the hot
/// path, one per downstream request) only ever take the shared lock.
pub struct Registry {
    client: Client,
    environments: RwLock<HashMap<Credential, Arc<Environment>>>,
    all: RwLock<Vec<Arc<Environment>>>,
    closed: AtomicBool,
}

impl Registry {
    pub fn new(client: Client) -> Arc<Registry> {
        Arc::new(Registry {
            client,
            environments: RwLock::new(HashMap::new()),
            all: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Construct an environment eagerly, start its ingester in the
    /// background, and register it under every credential it carries.
    /// Returns before the first dataset arrives — callers that need to
    /// know when it's ready use [`Environment::wait_ready`] or
    /// [`Registry::wait_for_all_clients`].
    pub async fn add_environment(&self, settings: EnvironmentSettings) -> Result<Arc<Environment>, RegistryError> {
        if self.is_closed() {
            return Err(RegistryError::AlreadyClosed);
        }

        let sdk_key = settings.identifiers.sdk_key.clone();
        let mobile_key = settings.identifiers.mobile_key.clone();
        let env_id = settings.identifiers.env_id.clone();

        let env = Environment::spawn(self.client.clone(), settings);

        {
            let mut map = self.environments.write().await;
            map.insert(Credential::SdkKey(sdk_key), env.clone());
            if let Some(mobile_key) = mobile_key {
                map.insert(Credential::MobileKey(mobile_key), env.clone());
            }
            if let Some(env_id) = env_id {
                map.insert(Credential::EnvironmentId(env_id), env.clone());
            }
        }
        self.all.write().await.push(env.clone());

        Ok(env)
    }

    /// O(1) lookup under any of an environment's credentials.
    pub async fn get_environment(&self, credential: &Credential) -> Option<Arc<Environment>> {
        self.environments.read().await.get(credential).cloned()
    }

    /// Idempotent: returns `false` if `env` was already removed (or never
    /// present). Drops every credential mapping to `env` before closing it,
    /// so in-flight requests start failing the credential lookup
    /// immediately, ahead of the ingester/publisher/stream teardown.
    pub async fn remove_environment(&self, env: &Arc<Environment>) -> bool {
        let removed = {
            let mut map = self.environments.write().await;
            let before = map.len();
            map.retain(|_, v| !Arc::ptr_eq(v, env));
            map.len() != before
        };
        {
            let mut all = self.all.write().await;
            all.retain(|e| !Arc::ptr_eq(e, env));
        }
        if removed {
            env.close().await;
        }
        removed
    }

    /// SDK-key rotation, step 1: insert the new credential before traffic
    /// using it is expected. Safe to call more than once with the same
    /// credential.
    pub async fn add_environment_credential(&self, env: Arc<Environment>, credential: Credential) {
        self.environments.write().await.insert(credential, env);
    }

    /// SDK-key rotation, step 2: remove the retiring credential so
    /// subsequent requests carrying it are rejected.
    pub async fn remove_environment_credential(&self, credential: &Credential) {
        self.environments.write().await.remove(credential);
    }

    /// Blocks until every environment present at construction time has
    /// either signalled ready (first successful dataset) or failed
    /// terminally, or `timeout` elapses first.
    pub async fn wait_for_all_clients(&self, timeout: Duration) -> Result<(), RegistryError> {
        let envs: Vec<Arc<Environment>> = self.all.read().await.clone();

        let wait_all = async {
            for env in &envs {
                env.wait_ready().await;
            }
        };
        if tokio::time::timeout(timeout, wait_all).await.is_err() {
            return Err(RegistryError::InitializationTimeout);
        }

        let mut failed_names = Vec::new();
        for env in &envs {
            if env.has_failed().await {
                failed_names.push(env.identifiers().await.name);
            }
        }
        if !failed_names.is_empty() {
            return Err(RegistryError::SomeEnvironmentFailed(failed_names));
        }

        Ok(())
    }

    /// Process shutdown: mark the registry closed so no further mutator
    /// calls succeed, then cascade-close every environment.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let envs: Vec<Arc<Environment>> = self.all.write().await.drain(..).collect();
        self.environments.write().await.clear();
        for env in envs {
            env.close().await;
        }
    }

    /// Build the `/status` response body (§7): healthy iff every known
    /// environment is connected and initialized.
    pub async fn status_report(&self, version: impl Into<String>, client_version: impl Into<String>) -> StatusReport {
        let envs: Vec<Arc<Environment>> = self.all.read().await.clone();
        let mut environments = HashMap::new();
        let mut healthy = true;

        for env in &envs {
            let ids = env.identifiers().await;
            let initialized = env.store().initialized().await;
            let connection = env.connection_status().await;
            let (state, state_since, last_error) = match connection {
                Some(status) => (status.state, status.state_since, status.last_error),
                None => (relay_ingest::ConnectionState::Failed, Utc::now(), Some("environment closed".to_string())),
            };

            if !is_healthy(state, initialized) {
                healthy = false;
            }

            environments.insert(
                ids.name.clone(),
                EnvironmentStatus {
                    sdk_key: Some(obscure_key(&ids.sdk_key)),
                    mobile_key: ids.mobile_key.as_deref().map(obscure_key),
                    env_id: ids.env_id.clone(),
                    status: if is_healthy(state, initialized) { "connected" } else { "disconnected" },
                    connection_status: ConnectionStatusJson {
                        state: connection_state_label(state),
                        state_since,
                        last_error,
                    },
                },
            );
        }

        StatusReport {
            status: if healthy { "healthy" } else { "degraded" },
            version: version.into(),
            client_version: client_version.into(),
            environments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvironmentIdentifiers;
    use relay_ingest::IngestMode;
    use relay_stream::StreamConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(name: &str, sdk_key: &str, base_uri: String) -> EnvironmentSettings {
        EnvironmentSettings {
            identifiers: EnvironmentIdentifiers {
                name: name.to_string(),
                sdk_key: sdk_key.to_string(),
                mobile_key: None,
                env_id: None,
                expiring_sdk_key: None,
            },
            base_uri: base_uri.clone(),
            stream_uri: base_uri,
            events_uri: "http://events.invalid".to_string(),
            mode: IngestMode::Polling { interval: Duration::from_secs(60) },
            events_capacity: 1000,
            events_flush_interval: Duration::from_secs(60),
            secure_mode: false,
            ttl: None,
            stream_config: StreamConfig::new(Duration::from_secs(180), None),
        }
    }

    #[tokio::test]
    async fn get_environment_resolves_by_sdk_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sdk/latest-all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"flags": {}, "segments": {}})))
            .mount(&server)
            .await;

        let registry = Registry::new(Client::new());
        let env = registry.add_environment(settings("prod", "sdk-abc", server.uri())).await.unwrap();

        let found = registry.get_environment(&Credential::SdkKey("sdk-abc".to_string())).await;
        assert!(found.is_some());
        assert!(Arc::ptr_eq(&found.unwrap(), &env));

        registry.close().await;
    }

    #[tokio::test]
    async fn remove_environment_is_idempotent_and_drops_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sdk/latest-all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"flags": {}, "segments": {}})))
            .mount(&server)
            .await;

        let registry = Registry::new(Client::new());
        let env = registry.add_environment(settings("prod", "sdk-abc", server.uri())).await.unwrap();

        assert!(registry.remove_environment(&env).await);
        assert!(!registry.remove_environment(&env).await);
        assert!(registry.get_environment(&Credential::SdkKey("sdk-abc".to_string())).await.is_none());
    }

    #[tokio::test]
    async fn add_environment_after_close_is_rejected() {
        let registry = Registry::new(Client::new());
        registry.close().await;
        let result = registry.add_environment(settings("prod", "sdk-abc", "http://example.invalid".to_string())).await;
        assert!(matches!(result, Err(RegistryError::AlreadyClosed)));
    }

    #[tokio::test]
    async fn wait_for_all_clients_succeeds_once_every_environment_is_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sdk/latest-all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"flags": {}, "segments": {}})))
            .mount(&server)
            .await;

        let registry = Registry::new(Client::new());
        registry.add_environment(settings("prod", "sdk-abc", server.uri())).await.unwrap();

        registry.wait_for_all_clients(Duration::from_secs(5)).await.unwrap();
        let report = registry.status_report("1.0.0", "1.0.0").await;
        assert_eq!(report.status, "healthy");
        registry.close().await;
    }

    #[tokio::test]
    async fn wait_for_all_clients_reports_failure_on_terminal_401() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sdk/latest-all"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let registry = Registry::new(Client::new());
        registry.add_environment(settings("prod", "sdk-bad", server.uri())).await.unwrap();

        let result = registry.wait_for_all_clients(Duration::from_secs(5)).await;
        assert!(matches!(result, Err(RegistryError::SomeEnvironmentFailed(_))));
        registry.close().await;
    }
}
