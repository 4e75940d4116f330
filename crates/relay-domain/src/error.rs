use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid flag key: {0}")]
    InvalidFlagKey(String),

    #[error("invalid segment key: {0}")]
    InvalidSegmentKey(String),

    #[error("user key must not be empty")]
    EmptyUserKey,

    #[error("unknown clause operator: {0}")]
    InvalidOperator(String),

    #[error("rollout weights sum to {0}, expected 100000")]
    InvalidRolloutWeights(u64),
}
