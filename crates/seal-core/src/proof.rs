//! Identity proofs.
//!
//! A requester proves control of an identity by signing a short message
//! binding that identity to one content item, one purpose, a timestamp, a
//! nonce, and the X25519 session key custodians should wrap shares to.
//!
//! Message format (canonical CBOR map, integer keys):
//!
//! | key | field       | type          |
//! |-----|-------------|---------------|
//! | 0   | version     | uint          |
//! | 1   | content_id  | bytes(32)     |
//! | 2   | identity    | bytes(32)     |
//! | 3   | issued_at   | uint (secs)   |
//! | 4   | nonce       | bytes(16)     |
//! | 5   | session_key | bytes(32)     |
//! | 6   | purpose     | uint          |
//!
//! The signature covers `SIGN_DOMAIN || message`. Custodians verify the
//! signature over the exact received bytes before decoding anything.
//!
//! There is no replay cache. A replayed proof only ever yields shares
//! wrapped to the original requester's session key, which the replayer
//! cannot open.

use ciborium::value::Value;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_encode, entry, CanonicalMap};
use crate::crypto::{Identity, Signature, Wallet};
use crate::error::{CoreError, ProofError};
use crate::types::ContentId;

/// Current proof message version.
pub const PROOF_VERSION: u64 = 1;

/// Domain separation prefix for proof signatures.
pub const SIGN_DOMAIN: &[u8] = b"seal-identity-proof-v1\x00";

/// What a proof authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProofPurpose {
    /// Release of a key share.
    Access,
    /// Deletion of a stored key share by its owner.
    Discard,
}

impl ProofPurpose {
    fn to_code(self) -> u64 {
        match self {
            ProofPurpose::Access => 0,
            ProofPurpose::Discard => 1,
        }
    }

    fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(ProofPurpose::Access),
            1 => Some(ProofPurpose::Discard),
            _ => None,
        }
    }
}

/// Freshness window for proofs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofConfig {
    /// Maximum age of a proof in seconds.
    pub max_age: u64,
    /// Tolerated clock skew for proofs stamped slightly ahead of `now`.
    pub max_future_skew: u64,
}

impl Default for ProofConfig {
    fn default() -> Self {
        Self {
            max_age: 300,
            max_future_skew: 30,
        }
    }
}

/// The decoded contents of a proof message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofMessage {
    pub version: u64,
    pub content_id: ContentId,
    pub identity: Identity,
    /// Unix seconds.
    pub issued_at: u64,
    pub nonce: [u8; 16],
    /// X25519 public key the custodian wraps its share to.
    pub session_key: [u8; 32],
    pub purpose: ProofPurpose,
}

impl ProofMessage {
    /// Encode to canonical CBOR.
    pub fn encode(&self) -> Result<Vec<u8>, CoreError> {
        let value = Value::Map(vec![
            entry(0, Value::Integer(self.version.into())),
            entry(1, Value::Bytes(self.content_id.0.to_vec())),
            entry(2, Value::Bytes(self.identity.0.to_vec())),
            entry(3, Value::Integer(self.issued_at.into())),
            entry(4, Value::Bytes(self.nonce.to_vec())),
            entry(5, Value::Bytes(self.session_key.to_vec())),
            entry(6, Value::Integer(self.purpose.to_code().into())),
        ]);
        canonical_encode(&value)
    }

    /// Decode from canonical CBOR. Non-canonical input is rejected.
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let map = CanonicalMap::decode(bytes)?;
        if map.len() != 7 {
            return Err(CoreError::DecodingError(format!(
                "expected 7 fields, found {}",
                map.len()
            )));
        }

        let purpose_code = map.uint(6, "purpose")?;
        let purpose = ProofPurpose::from_code(purpose_code)
            .ok_or_else(|| CoreError::DecodingError(format!("unknown purpose {}", purpose_code)))?;

        Ok(Self {
            version: map.uint(0, "version")?,
            content_id: ContentId(map.fixed(1, "content_id")?),
            identity: Identity(map.fixed(2, "identity")?),
            issued_at: map.uint(3, "issued_at")?,
            nonce: map.fixed(4, "nonce")?,
            session_key: map.fixed(5, "session_key")?,
            purpose,
        })
    }
}

/// Bytes the wallet actually signs.
fn signing_bytes(message: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SIGN_DOMAIN.len() + message.len());
    buf.extend_from_slice(SIGN_DOMAIN);
    buf.extend_from_slice(message);
    buf
}

/// A signed statement that `identity` requests `purpose` on one content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProof {
    pub identity: Identity,
    /// Canonical CBOR [`ProofMessage`] bytes, exactly as signed.
    pub message: Vec<u8>,
    pub signature: Signature,
}

impl IdentityProof {
    /// Build and sign a fresh proof with a random nonce.
    pub fn create(
        wallet: &dyn Wallet,
        content_id: ContentId,
        purpose: ProofPurpose,
        now: u64,
        session_key: [u8; 32],
    ) -> Result<Self, CoreError> {
        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);

        let identity = wallet.address();
        let message = ProofMessage {
            version: PROOF_VERSION,
            content_id,
            identity,
            issued_at: now,
            nonce,
            session_key,
            purpose,
        }
        .encode()?;

        let signature = wallet.sign(&signing_bytes(&message));
        Ok(Self {
            identity,
            message,
            signature,
        })
    }

    /// Verify the proof for `content_id` and `purpose` at time `now`.
    ///
    /// Checks run in a fixed order: signature over the exact message
    /// bytes, strict decode, version, identity binding, content binding,
    /// purpose, then freshness. Returns the decoded message on success.
    pub fn verify(
        &self,
        content_id: &ContentId,
        purpose: ProofPurpose,
        now: u64,
        config: &ProofConfig,
    ) -> Result<ProofMessage, ProofError> {
        self.identity
            .verify(&signing_bytes(&self.message), &self.signature)
            .map_err(|_| ProofError::SignatureFailed)?;

        let msg = ProofMessage::decode(&self.message)
            .map_err(|e| ProofError::MalformedMessage(e.to_string()))?;

        if msg.version != PROOF_VERSION {
            return Err(ProofError::UnsupportedVersion(
                u8::try_from(msg.version).unwrap_or(u8::MAX),
            ));
        }
        if msg.identity != self.identity {
            return Err(ProofError::IdentityMismatch);
        }
        if msg.content_id != *content_id {
            return Err(ProofError::ContentMismatch);
        }
        if msg.purpose != purpose {
            return Err(ProofError::WrongPurpose {
                expected: purpose,
                found: msg.purpose,
            });
        }

        if msg.issued_at > now.saturating_add(config.max_future_skew) {
            return Err(ProofError::FromFuture {
                issued_at: msg.issued_at,
                now,
            });
        }
        if msg.issued_at < now.saturating_sub(config.max_age) {
            return Err(ProofError::Stale {
                issued_at: msg.issued_at,
                now,
                max_age: config.max_age,
            });
        }

        Ok(msg)
    }
}
