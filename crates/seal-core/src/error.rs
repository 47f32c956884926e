//! Error types for Seal core.

use thiserror::Error;

/// Core errors that can occur while handling identities and encodings.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Reasons an [`IdentityProof`](crate::IdentityProof) is rejected.
///
/// Every variant maps to the `BadProof` outcome at the custodian. A proof
/// rejected for any of these reasons must never be retried unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    #[error("signature does not verify under the claimed identity")]
    SignatureFailed,

    #[error("malformed proof message: {0}")]
    MalformedMessage(String),

    #[error("proof message is signed for a different identity")]
    IdentityMismatch,

    #[error("proof message is bound to a different content item")]
    ContentMismatch,

    #[error("proof message was issued for {found:?}, expected {expected:?}")]
    WrongPurpose {
        expected: crate::proof::ProofPurpose,
        found: crate::proof::ProofPurpose,
    },

    #[error("proof is stale: issued at {issued_at}, now {now}, max age {max_age}s")]
    Stale { issued_at: u64, now: u64, max_age: u64 },

    #[error("proof is issued in the future: issued at {issued_at}, now {now}")]
    FromFuture { issued_at: u64, now: u64 },

    #[error("unsupported proof version: {0}")]
    UnsupportedVersion(u8),
}
