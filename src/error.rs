use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by the relay. All variants except `InvariantViolation`
/// are recoverable: their message is rendered back to the user verbatim.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Message must not be empty.")]
    InvalidInput,

    #[error("The model backend did not respond within {}s. Please try again.", .0.as_secs())]
    BackendTimeout(Duration),

    #[error("The model backend failed: {0}")]
    Backend(String),

    #[error("conversation invariant violated: {0}")]
    InvariantViolation(String),
}
