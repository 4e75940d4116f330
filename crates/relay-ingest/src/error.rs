use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream rejected credentials (401/403)")]
    Unauthorized,

    #[error("malformed event payload: {0}")]
    MalformedEvent(String),

    #[error("store error: {0}")]
    Store(#[from] relay_store::StoreError),

    #[error("upstream returned an unexpected status: {0}")]
    UnexpectedStatus(reqwest::StatusCode),
}

impl IngestError {
    /// 401/403 are terminal for the environment (§4.2); everything else is
    /// retried with backoff.
    pub fn is_terminal(&self) -> bool {
        matches!(self, IngestError::Unauthorized)
    }
}
