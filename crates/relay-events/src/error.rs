use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("event serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("publisher has already been closed")]
    Closed,
}
