use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config syntax error on line {line}: {message}")]
    IniSyntax { line: usize, message: String },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("environment '{0}' is missing a required sdkKey")]
    MissingSdkKey(String),

    #[error("TLS is enabled but tlsCert and tlsKey must both be set")]
    IncompleteTls,

    #[error("at most one persistent data store backend may be configured, found: {0:?}")]
    MultiplePersistenceBackends(Vec<String>),

    #[error("no environments configured")]
    NoEnvironments,
}
