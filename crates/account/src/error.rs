use thiserror::Error;

use crate::keys::KeyVariant;

/// Result type for account container operations
pub type Result<T> = std::result::Result<T, AccountError>;

/// Errors that can occur while sealing or unsealing the account container
#[derive(Error, Debug)]
pub enum AccountError {
    /// No root secret is available for the requested key
    #[error("Root secret {key_id:#x} ({variant}) is not available")]
    MissingKey { key_id: u32, variant: KeyVariant },

    /// Recomputed integrity tag does not match the stored one
    #[error("Account container failed integrity check")]
    IntegrityFailure,

    /// Blob or record has the wrong size
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Gamertag cannot be stored in the fixed-width field
    #[error("Invalid gamertag: {0}")]
    InvalidGamertag(String),

    /// Random confounder could not be generated
    #[error("Random source error: {0}")]
    Random(String),
}

impl AccountError {
    /// Create an invalid gamertag error
    pub fn invalid_gamertag(msg: impl Into<String>) -> Self {
        Self::InvalidGamertag(msg.into())
    }

    /// Whether retrying with another key variant could succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::IntegrityFailure | Self::MissingKey { .. })
    }
}
