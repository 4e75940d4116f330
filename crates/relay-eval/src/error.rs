use thiserror::Error;

/// The `errorKind` surfaced in an evalx `reason` when something about the
/// flag, rule or user made evaluation impossible to complete cleanly.
/// Distinct from the off-variation path taken for `PREREQUISITE_FAILED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("flag is malformed")]
    MalformedFlag,

    #[error("user key is missing")]
    UserNotSpecified,

    #[error("flag not found")]
    FlagNotFound,

    #[error("client not ready")]
    ClientNotReady,
}
