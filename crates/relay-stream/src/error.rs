use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("store error: {0}")]
    Store(#[from] relay_store::StoreError),

    #[error("event serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
