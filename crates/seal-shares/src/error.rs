//! Error types for the shares module.

use thiserror::Error;

/// Errors that can occur while sealing content or handling key shares.
#[derive(Debug, Error)]
pub enum SharesError {
    /// Split or combine called with unusable parameters.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Fewer distinct shares than the quorum.
    #[error("insufficient shares: need {needed}, got {got}")]
    InsufficientShares { needed: usize, got: usize },

    /// Shares that cannot belong to the same split.
    #[error("inconsistent share: {0}")]
    InconsistentShare(String),

    /// Authenticated decryption failed: wrong key or corrupted ciphertext.
    #[error("integrity check failed: {0}")]
    IntegrityError(String),

    /// Encryption error.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for share operations.
pub type Result<T> = std::result::Result<T, SharesError>;
