//! Error types for key pool and rotation operations

use generation::BackendError;

/// Errors surfaced by the key pool and `KeyRotator::with_key_rotation`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No API keys configured. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Every key is cooling down at the moment of acquisition.
    #[error("all API keys are rate limited")]
    AllCredentialsExhausted,

    /// Rate-limit failures consumed the whole retry budget.
    #[error("retry budget exhausted after {attempts} attempts: {last}")]
    RetryBudgetExhausted {
        attempts: u32,
        #[source]
        last: BackendError,
    },

    /// Non-rate-limit backend failure, passed through unchanged.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl Error {
    /// Whether the caller should answer "temporarily unavailable, retry later".
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            Error::AllCredentialsExhausted | Error::RetryBudgetExhausted { .. }
        )
    }
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
