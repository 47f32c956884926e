//! Error types for the key-release service.

use thiserror::Error;

use seal_core::CustodianId;

/// Errors that can occur inside a custodian.
#[derive(Debug, Error)]
pub enum KeyServerError {
    /// Protocol version mismatch with the caller.
    #[error("protocol version mismatch: local={local}, peer={peer}")]
    VersionMismatch { local: u8, peer: u8 },

    /// Frame exceeds the configured size limit.
    #[error("frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// Message could not be decoded or encoded.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] seal_store::StoreError),

    /// Policy ledger read failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] seal_store::LedgerError),

    /// Share wrapping failed.
    #[error("share error: {0}")]
    Shares(#[from] seal_shares::SharesError),
}

/// Result type for custodian operations.
pub type Result<T> = std::result::Result<T, KeyServerError>;

/// Errors reaching a custodian.
///
/// These never carry a policy decision: a request that fails in transit
/// tells the caller nothing about whether access would have been granted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The custodian could not be reached or dropped the request.
    #[error("custodian {0} unreachable")]
    Unreachable(CustodianId),

    /// The custodian did not answer within the deadline.
    #[error("custodian {0} timed out")]
    Timeout(CustodianId),

    /// Request or response frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),
}
