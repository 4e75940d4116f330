use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use relay_config::RelayConfig;
use relay_registry::{EnvironmentIdentifiers, EnvironmentSettings, Registry};
use relay_stream::StreamConfig;
use reqwest::Client;

/// Load configuration from `path` (or built-in defaults plus the process
/// environment if none is given) and report the outcome. Used by both
/// `validate-config` and as the first step of `serve`.
pub fn load_config(path: Option<&PathBuf>) -> Result<RelayConfig> {
    relay_config::load(path.map(|p| p.as_path())).context("failed to load configuration")
}

pub async fn validate_config(path: Option<PathBuf>) -> Result<()> {
    let config = load_config(path.as_ref())?;
    println!("configuration OK: {} environment(s) configured", config.environments.len());
    for env in config.environments.values() {
        println!("  - {} (secureMode={})", env.name, env.secure_mode);
    }
    Ok(())
}

fn ingest_mode(config: &RelayConfig) -> relay_ingest::IngestMode {
    match config.main.poll_interval_secs {
        Some(secs) => relay_ingest::IngestMode::Polling { interval: Duration::from_secs(secs) },
        None => relay_ingest::IngestMode::Streaming,
    }
}

async fn build_registry(config: &RelayConfig) -> Result<std::sync::Arc<Registry>> {
    let registry = Registry::new(Client::new());
    let mode = ingest_mode(config);
    let stream_config = StreamConfig::new(
        config.main.heartbeat_interval(),
        config.main.max_client_connection_time_secs.map(Duration::from_secs),
    );

    for env in config.environments.values() {
        let settings = EnvironmentSettings {
            identifiers: EnvironmentIdentifiers {
                name: env.name.clone(),
                sdk_key: env.sdk_key.clone(),
                mobile_key: env.mobile_key.clone(),
                env_id: env.env_id.clone(),
                expiring_sdk_key: None,
            },
            base_uri: config.main.base_uri.clone(),
            stream_uri: config.main.stream_uri.clone(),
            events_uri: config.main.events_uri.clone(),
            mode: mode.clone(),
            events_capacity: config.events.capacity,
            events_flush_interval: config.events.flush_interval(),
            secure_mode: env.secure_mode,
            ttl: env.ttl_minutes.map(|m| Duration::from_secs(u64::from(m) * 60)),
            stream_config,
        };
        registry.add_environment(settings).await.context("failed to register environment")?;
    }

    Ok(registry)
}

pub async fn serve(path: Option<PathBuf>, startup_timeout_secs: u64) -> Result<()> {
    let config = load_config(path.as_ref())?;
    let registry = build_registry(&config).await?;

    tracing::info!(environments = config.environments.len(), port = config.main.port, "starting relay");

    let startup_timeout = Duration::from_secs(startup_timeout_secs);
    if let Err(error) = registry.wait_for_all_clients(startup_timeout).await {
        tracing::error!(%error, "one or more environments failed to initialize within the startup timeout");
        registry.close().await;
        anyhow::bail!(error);
    }
    tracing::info!("all environments ready");

    let app = relay_api::build_app(registry.clone(), env!("CARGO_PKG_VERSION"), env!("CARGO_PKG_VERSION"));
    let addr = format!("0.0.0.0:{}", config.main.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.context("server error")?;

    tracing::info!("shutting down, closing every environment");
    registry.close().await;

    Ok(())
}

/// Waits for Ctrl+C or, on unix, `SIGTERM` — whichever arrives first.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
