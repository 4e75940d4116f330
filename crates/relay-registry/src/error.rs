use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry has already been shut down")]
    AlreadyClosed,

    #[error("timed out waiting for all environments to initialize")]
    InitializationTimeout,

    #[error("one or more environments failed to initialize: {0:?}")]
    SomeEnvironmentFailed(Vec<String>),
}
