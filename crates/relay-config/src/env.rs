use std::collections::HashMap;
use std::env;

use crate::error::ConfigError;
use crate::types::{
    EnvironmentConfig, EventsConfig, MainConfig, PersistenceBackend, PersistenceConfig, RelayConfig,
    TlsConfig,
};

/// Overlays environment variables onto `config`, the highest-priority layer
/// per §10.1. A bare `SDK_KEY` describes a single default-named environment,
/// the common single-tenant deployment shape; a file with `[Environment "x"]`
/// sections is used for the multi-tenant case and is left untouched here
/// unless the corresponding var is set.
pub fn apply_env_overrides(mut config: RelayConfig, vars: &HashMap<String, String>) -> Result<RelayConfig, ConfigError> {
    apply_main(&mut config.main, vars)?;
    apply_events(&mut config.events, vars)?;
    apply_persistence(&mut config, vars)?;
    apply_default_environment(&mut config, vars)?;
    Ok(config)
}

pub fn from_process_env() -> HashMap<String, String> {
    env::vars().collect()
}

fn apply_main(main: &mut MainConfig, vars: &HashMap<String, String>) -> Result<(), ConfigError> {
    if let Some(v) = vars.get("PORT") {
        main.port = parse_field("PORT", v)?;
    }
    if let Some(v) = vars.get("BASE_URI") {
        main.base_uri = v.clone();
    }
    if let Some(v) = vars.get("STREAM_URI") {
        main.stream_uri = v.clone();
    }
    if let Some(v) = vars.get("EVENTS_URI") {
        main.events_uri = v.clone();
    }
    if let Some(v) = vars.get("HEARTBEAT_INTERVAL") {
        main.heartbeat_interval_secs = parse_field("HEARTBEAT_INTERVAL", v)?;
    }
    if let Some(v) = vars.get("LOG_LEVEL") {
        main.log_level = v.clone();
    }
    if let Some(v) = vars.get("IGNORE_CONNECTION_ERRORS") {
        main.ignore_connection_errors = parse_bool("IGNORE_CONNECTION_ERRORS", v)?;
    }
    if let Some(v) = vars.get("POLL_INTERVAL") {
        main.poll_interval_secs = Some(parse_field("POLL_INTERVAL", v)?);
    }

    let tls_enabled = vars.get("TLS_ENABLED").map(|v| parse_bool("TLS_ENABLED", v)).transpose()?;
    if tls_enabled == Some(true) || vars.contains_key("TLS_CERT") || vars.contains_key("TLS_KEY") {
        let mut tls = main.tls.clone().unwrap_or(TlsConfig { cert: None, key: None, min_version: None });
        if let Some(v) = vars.get("TLS_CERT") {
            tls.cert = Some(v.clone());
        }
        if let Some(v) = vars.get("TLS_KEY") {
            tls.key = Some(v.clone());
        }
        if let Some(v) = vars.get("TLS_MIN_VERSION") {
            tls.min_version = Some(v.clone());
        }
        main.tls = Some(tls);
    } else if tls_enabled == Some(false) {
        main.tls = None;
    }

    Ok(())
}

fn apply_events(events: &mut EventsConfig, vars: &HashMap<String, String>) -> Result<(), ConfigError> {
    if let Some(v) = vars.get("EVENTS_CAPACITY") {
        events.capacity = parse_field("EVENTS_CAPACITY", v)?;
    }
    if let Some(v) = vars.get("EVENTS_FLUSH_INTERVAL") {
        events.flush_interval_secs = parse_field("EVENTS_FLUSH_INTERVAL", v)?;
    }
    if let Some(v) = vars.get("USE_EVENTS") {
        events.send_events = parse_bool("USE_EVENTS", v)?;
    }
    Ok(())
}

fn apply_persistence(config: &mut RelayConfig, vars: &HashMap<String, String>) -> Result<(), ConfigError> {
    let use_redis = vars.get("USE_REDIS").map(|v| parse_bool("USE_REDIS", v)).transpose()?.unwrap_or(false);
    if !use_redis {
        return Ok(());
    }
    if let Some(existing) = &config.persistence {
        if existing.backend != PersistenceBackend::Redis {
            return Err(ConfigError::MultiplePersistenceBackends(vec![
                format!("{:?}", existing.backend),
                "Redis".to_string(),
            ]));
        }
    }
    config.persistence = Some(PersistenceConfig {
        backend: PersistenceBackend::Redis,
        host: vars.get("REDIS_HOST").cloned(),
        port: vars.get("REDIS_PORT").map(|v| parse_field("REDIS_PORT", v)).transpose()?,
        url: vars.get("REDIS_URL").cloned(),
        local_ttl_secs: vars.get("REDIS_LOCAL_TTL").map(|v| parse_field("REDIS_LOCAL_TTL", v)).transpose()?,
    });
    Ok(())
}

fn apply_default_environment(config: &mut RelayConfig, vars: &HashMap<String, String>) -> Result<(), ConfigError> {
    let Some(sdk_key) = vars.get("SDK_KEY") else {
        return Ok(());
    };
    let name = vars.get("ENVIRONMENT_NAME").cloned().unwrap_or_else(|| "default".to_string());
    let secure_mode = vars.get("SECURE_MODE").map(|v| parse_bool("SECURE_MODE", v)).transpose()?.unwrap_or(false);
    config.environments.insert(
        name.clone(),
        EnvironmentConfig {
            name,
            sdk_key: sdk_key.clone(),
            mobile_key: vars.get("MOBILE_KEY").cloned(),
            env_id: vars.get("ENV_ID").cloned(),
            prefix: vars.get("REDIS_PREFIX").cloned(),
            table_name: vars.get("DYNAMODB_TABLE").cloned(),
            secure_mode,
            ttl_minutes: vars.get("TTL_MINUTES").map(|v| parse_field("TTL_MINUTES", v)).transpose()?,
        },
    );
    Ok(())
}

fn parse_field<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("'{value}' is not a valid value"),
    })
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { field: field.to_string(), message: format!("'{value}' is not a boolean") }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn bare_sdk_key_creates_a_default_environment() {
        let config = apply_env_overrides(RelayConfig::default(), &vars(&[("SDK_KEY", "sdk-abc")])).unwrap();
        let env = config.environments.get("default").unwrap();
        assert_eq!(env.sdk_key, "sdk-abc");
    }

    #[test]
    fn port_and_log_level_are_overridden() {
        let config = apply_env_overrides(
            RelayConfig::default(),
            &vars(&[("PORT", "9999"), ("LOG_LEVEL", "debug")]),
        )
        .unwrap();
        assert_eq!(config.main.port, 9999);
        assert_eq!(config.main.log_level, "debug");
    }

    #[test]
    fn invalid_port_is_rejected() {
        assert!(apply_env_overrides(RelayConfig::default(), &vars(&[("PORT", "not-a-number")])).is_err());
    }

    #[test]
    fn use_redis_conflicting_with_an_existing_backend_is_rejected() {
        let mut config = RelayConfig::default();
        config.persistence = Some(crate::types::PersistenceConfig {
            backend: PersistenceBackend::Consul,
            host: None,
            port: None,
            url: None,
            local_ttl_secs: None,
        });
        let result = apply_env_overrides(config, &vars(&[("USE_REDIS", "true")]));
        assert!(matches!(result, Err(ConfigError::MultiplePersistenceBackends(_))));
    }

    #[test]
    fn use_redis_populates_persistence() {
        let config = apply_env_overrides(
            RelayConfig::default(),
            &vars(&[("USE_REDIS", "true"), ("REDIS_HOST", "localhost"), ("REDIS_PORT", "6379")]),
        )
        .unwrap();
        let p = config.persistence.unwrap();
        assert_eq!(p.backend, PersistenceBackend::Redis);
        assert_eq!(p.host.as_deref(), Some("localhost"));
    }
}
