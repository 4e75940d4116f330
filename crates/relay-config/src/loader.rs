use std::path::Path;

use crate::env::{apply_env_overrides, from_process_env};
use crate::error::ConfigError;
use crate::ini::{self, IniDocument, IniSection};
use crate::types::{
    EnvironmentConfig, EventsConfig, MainConfig, PersistenceBackend, PersistenceConfig, RelayConfig,
    TlsConfig,
};

/// Load the full configuration: built-in defaults, optionally overlaid by an
/// INI file, then overlaid by the process environment. See §10.1.
pub fn load(ini_path: Option<&Path>) -> Result<RelayConfig, ConfigError> {
    let config = match ini_path {
        Some(path) => load_from_file(path)?,
        None => RelayConfig::default(),
    };
    let config = apply_env_overrides(config, &from_process_env())?;
    validate(&config)?;
    Ok(config)
}

/// Same as [`load`], but built from INI text directly with no environment
/// overlay — used by `relay validate-config` on an explicit file and by
/// tests that want a config built from text alone.
pub fn load_from_str(ini_source: &str) -> Result<RelayConfig, ConfigError> {
    let doc = ini::parse(ini_source)?;
    let config = from_document(&doc)?;
    validate(&config)?;
    Ok(config)
}

fn load_from_file(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io { path: path.display().to_string(), source: e })?;
    let doc = ini::parse(&content)?;
    from_document(&doc)
}

fn from_document(doc: &IniDocument) -> Result<RelayConfig, ConfigError> {
    let mut config = RelayConfig::default();

    if let Some(main) = doc.section("Main") {
        config.main = convert_main(main)?;
    }
    if let Some(events) = doc.section("Events") {
        config.events = convert_events(events)?;
    }
    let mut backends_seen = Vec::new();
    if let Some(redis) = doc.section("Redis") {
        config.persistence = Some(convert_persistence(redis, PersistenceBackend::Redis)?);
        backends_seen.push("Redis".to_string());
    }
    if let Some(consul) = doc.section("Consul") {
        config.persistence = Some(convert_persistence(consul, PersistenceBackend::Consul)?);
        backends_seen.push("Consul".to_string());
    }
    if let Some(dynamodb) = doc.section("DynamoDB") {
        config.persistence = Some(convert_persistence(dynamodb, PersistenceBackend::DynamoDb)?);
        backends_seen.push("DynamoDB".to_string());
    }
    if backends_seen.len() > 1 {
        return Err(ConfigError::MultiplePersistenceBackends(backends_seen));
    }

    for env_section in doc.subsections("Environment") {
        let name = env_section.subsection.clone().unwrap_or_default();
        let env_config = convert_environment(&name, env_section)?;
        config.environments.insert(name, env_config);
    }

    Ok(config)
}

fn convert_main(section: &IniSection) -> Result<MainConfig, ConfigError> {
    let mut main = MainConfig::default();
    if let Some(v) = section.entries.get("port") {
        main.port = parse("port", v)?;
    }
    if let Some(v) = section.entries.get("baseUri") {
        main.base_uri = v.clone();
    }
    if let Some(v) = section.entries.get("streamUri") {
        main.stream_uri = v.clone();
    }
    if let Some(v) = section.entries.get("eventsUri") {
        main.events_uri = v.clone();
    }
    if let Some(v) = section.entries.get("heartbeatIntervalSecs") {
        main.heartbeat_interval_secs = parse("heartbeatIntervalSecs", v)?;
    }
    if let Some(v) = section.entries.get("maxClientConnectionTimeSecs") {
        main.max_client_connection_time_secs = Some(parse("maxClientConnectionTimeSecs", v)?);
    }
    if let Some(v) = section.entries.get("logLevel") {
        main.log_level = v.clone();
    }
    if let Some(v) = section.entries.get("ignoreConnectionErrors") {
        main.ignore_connection_errors = parse_bool("ignoreConnectionErrors", v)?;
    }
    if let Some(v) = section.entries.get("pollIntervalSecs") {
        main.poll_interval_secs = Some(parse("pollIntervalSecs", v)?);
    }

    let tls_enabled = section.entries.get("tlsEnabled").map(|v| parse_bool("tlsEnabled", v)).transpose()?.unwrap_or(false);
    if tls_enabled {
        main.tls = Some(TlsConfig {
            cert: section.entries.get("tlsCert").cloned(),
            key: section.entries.get("tlsKey").cloned(),
            min_version: section.entries.get("tlsMinVersion").cloned(),
        });
    }

    Ok(main)
}

fn convert_events(section: &IniSection) -> Result<EventsConfig, ConfigError> {
    let mut events = EventsConfig::default();
    if let Some(v) = section.entries.get("eventsCapacity") {
        events.capacity = parse("eventsCapacity", v)?;
    }
    if let Some(v) = section.entries.get("eventsFlushIntervalSecs") {
        events.flush_interval_secs = parse("eventsFlushIntervalSecs", v)?;
    }
    if let Some(v) = section.entries.get("sendEvents") {
        events.send_events = parse_bool("sendEvents", v)?;
    }
    if let Some(v) = section.entries.get("samplingInterval") {
        events.sampling_interval = Some(parse("samplingInterval", v)?);
    }
    Ok(events)
}

fn convert_persistence(section: &IniSection, backend: PersistenceBackend) -> Result<PersistenceConfig, ConfigError> {
    Ok(PersistenceConfig {
        backend,
        host: section.entries.get("host").cloned(),
        port: section.entries.get("port").map(|v| parse("port", v)).transpose()?,
        url: section.entries.get("url").cloned(),
        local_ttl_secs: section.entries.get("localTtlSecs").map(|v| parse("localTtlSecs", v)).transpose()?,
    })
}

fn convert_environment(name: &str, section: &IniSection) -> Result<EnvironmentConfig, ConfigError> {
    let sdk_key = section
        .entries
        .get("sdkKey")
        .cloned()
        .ok_or_else(|| ConfigError::MissingSdkKey(name.to_string()))?;

    Ok(EnvironmentConfig {
        name: name.to_string(),
        sdk_key,
        mobile_key: section.entries.get("mobileKey").cloned(),
        env_id: section.entries.get("envId").cloned(),
        prefix: section.entries.get("prefix").cloned(),
        table_name: section.entries.get("tableName").cloned(),
        secure_mode: section.entries.get("secureMode").map(|v| parse_bool("secureMode", v)).transpose()?.unwrap_or(false),
        ttl_minutes: section.entries.get("ttlMinutes").map(|v| parse("ttlMinutes", v)).transpose()?,
    })
}

/// Cross-field validation per §10.1: a missing SDK key or TLS enabled
/// without a complete cert/key pair are startup-time configuration errors.
/// Persistence-backend conflicts are caught earlier, where each backend is
/// parsed (`from_document`, `apply_persistence`), since that's where both
/// candidate backend names are still in hand.
fn validate(config: &RelayConfig) -> Result<(), ConfigError> {
    if let Some(tls) = &config.main.tls {
        if tls.cert.is_none() || tls.key.is_none() {
            return Err(ConfigError::IncompleteTls);
        }
    }

    for env in config.environments.values() {
        if env.sdk_key.trim().is_empty() {
            return Err(ConfigError::MissingSdkKey(env.name.clone()));
        }
    }

    Ok(())
}

fn parse<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue { field: field.to_string(), message: format!("'{value}' is not valid") })
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

    const SAMPLE: &str = r#"
[Main]
port = 9000
streamUri = "https://stream.example.com"

[Events]
eventsCapacity = 500

[Environment "prod"]
sdkKey = sdk-prod-key
secureMode = true

[Environment "staging"]
sdkKey = sdk-staging-key
mobileKey = mob-staging-key
"#;

    #[test]
    fn loads_main_events_and_environments_from_ini() {
        let config = load_from_str(SAMPLE).unwrap();
        assert_eq!(config.main.port, 9000);
        assert_eq!(config.main.stream_uri, "https://stream.example.com");
        assert_eq!(config.events.capacity, 500);

        let prod = config.environments.get("prod").unwrap();
        assert_eq!(prod.sdk_key, "sdk-prod-key");
        assert!(prod.secure_mode);

        let staging = config.environments.get("staging").unwrap();
        assert_eq!(staging.mobile_key.as_deref(), Some("mob-staging-key"));
    }

    #[test]
    fn missing_sdk_key_is_a_config_error() {
        let source = "[Environment \"x\"]\nmobileKey = mob-1\n";
        assert!(matches!(load_from_str(source), Err(ConfigError::MissingSdkKey(_))));
    }

    #[test]
    fn tls_enabled_without_cert_and_key_is_rejected() {
        let source = "[Main]\ntlsEnabled = true\n";
        assert!(matches!(load_from_str(source), Err(ConfigError::IncompleteTls)));
    }

    #[test]
    fn tls_enabled_with_cert_and_key_is_accepted() {
        let source = "[Main]\ntlsEnabled = true\ntlsCert = /cert.pem\ntlsKey = /key.pem\n";
        let config = load_from_str(source).unwrap();
        assert!(config.main.tls.is_some());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = Path::new("/nonexistent/path/relay.conf");
        assert!(matches!(load_from_file(path), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn two_persistence_backends_at_once_is_rejected() {
        let source = "[Redis]\nhost = localhost\n[Consul]\nhost = localhost\n";
        assert!(matches!(load_from_str(source), Err(ConfigError::MultiplePersistenceBackends(_))));
    }

    #[test]
    fn one_persistence_backend_is_accepted() {
        let config = load_from_str("[Redis]\nhost = localhost\n").unwrap();
        assert_eq!(config.persistence.unwrap().backend, PersistenceBackend::Redis);
    }

    #[test]
    fn poll_interval_secs_switches_on_polling_mode() {
        let source = "[Main]\npollIntervalSecs = 30\n[Environment \"only\"]\nsdkKey = sdk-1\n";
        let config = load_from_str(source).unwrap();
        assert_eq!(config.main.poll_interval_secs, Some(30));
    }

    #[test]
    fn defaults_apply_when_main_section_is_absent() {
        let config = load_from_str("[Environment \"only\"]\nsdkKey = sdk-1\n").unwrap();
        assert_eq!(config.main.port, 8030);
        assert_eq!(config.events.flush_interval_secs, 60);
    }
}
