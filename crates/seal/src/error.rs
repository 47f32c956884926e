//! Error types for the Seal client.

use seal_core::{ContentId, CoreError, CustodianId};
use seal_keyserver::DenyReason;
use seal_shares::SharesError;
use seal_store::{LedgerError, StoreError};
use thiserror::Error;

/// Errors that can occur during upload or access.
///
/// Access failures keep three outcomes apart: the content does not exist,
/// the policy does not admit the caller, or too many custodians could not
/// be reached to tell.
#[derive(Debug, Error)]
pub enum SealError {
    /// Configuration does not fit the custodian set.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No content record with this id.
    #[error("content not found: {0}")]
    ContentNotFound(ContentId),

    /// The upload named a policy object the ledger does not know.
    #[error("policy not found: {0}")]
    PolicyNotFound(String),

    /// Custodians evaluated the policy and too few granted.
    #[error("access denied to {content_id}: {granted} of {needed} required grants")]
    AccessDenied {
        content_id: ContentId,
        granted: usize,
        needed: usize,
        /// Each refusing custodian and its reason.
        denials: Vec<(CustodianId, DenyReason)>,
    },

    /// Custodians refused to evaluate the proof we presented.
    #[error("identity proof rejected for {content_id}: {reasons:?}")]
    ProofRejected {
        content_id: ContentId,
        reasons: Vec<(CustodianId, String)>,
    },

    /// Too few grants, and enough custodians failed that the outcome is
    /// unknown.
    #[error(
        "partial infrastructure failure for {content_id}: {granted} of {needed} grants, {} custodian(s) unreachable",
        .unreachable.len()
    )]
    PartialInfrastructureFailure {
        content_id: ContentId,
        granted: usize,
        needed: usize,
        unreachable: Vec<(CustodianId, String)>,
    },

    /// Upload could not place every share; accepted shares were discarded.
    #[error("upload of {content_id} failed: {failures:?}")]
    UploadFailed {
        content_id: ContentId,
        failures: Vec<(CustodianId, String)>,
        /// Custodians that may still hold a share and could not be told
        /// to discard it.
        orphaned: Vec<CustodianId>,
    },

    /// Every share was placed but the record could not be published;
    /// shares were discarded.
    #[error("publishing {content_id} failed: {source}")]
    PublishFailed {
        content_id: ContentId,
        source: Box<SealError>,
        /// Custodians that could not be told to discard their share.
        orphaned: Vec<CustodianId>,
    },

    /// Share combination, unwrapping or decryption failed.
    #[error("share error: {0}")]
    Shares(#[from] SharesError),

    /// Signing or encoding failed.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Content store failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Policy ledger call failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl SealError {
    /// Whether retrying the same call later may succeed.
    ///
    /// Policy refusals and cryptographic failures are final; infrastructure
    /// trouble is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            SealError::PartialInfrastructureFailure { .. } | SealError::UploadFailed { .. } => true,
            SealError::Ledger(LedgerError::Unavailable(_)) => true,
            SealError::Store(_) => true,
            SealError::PublishFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, SealError>;
