//! Error types for the store module.

use thiserror::Error;

use seal_core::{AllowlistId, Identity, ServiceId};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding in-memory state was poisoned.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// A blocking database task failed to complete.
    #[error("blocking task failed: {0}")]
    Task(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors returned by a policy ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("allowlist not found: {0}")]
    AllowlistNotFound(AllowlistId),

    #[error("subscription service not found: {0}")]
    ServiceNotFound(ServiceId),

    /// Only the owner of a policy object may modify it.
    #[error("{caller} is not the owner")]
    NotOwner { caller: Identity },

    #[error("insufficient payment: price {price}, paid {paid}")]
    InsufficientPayment { price: u64, paid: u64 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The ledger could not be read or written.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
