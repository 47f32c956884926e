//! Content records: the stored half of an uploaded item.
//!
//! A record holds the ciphertext and the pointer to the policy gating it.
//! The symmetric key is never part of the record; it exists only as shares
//! held by custodians.

use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_encode, entry};
use crate::crypto::Identity;
use crate::error::CoreError;
use crate::policy::AccessPolicyRef;
use crate::types::{ContentId, CustodianId};

/// Domain separation for content id derivation.
const CONTENT_ID_DOMAIN: &str = "seal-content-id-v0";

/// An uploaded, encrypted content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: ContentId,
    /// Opaque sealed ciphertext (see `seal_shares::SealedContent`).
    pub ciphertext: Vec<u8>,
    pub mime_type: String,
    /// Plaintext size in bytes.
    pub size_bytes: u64,
    pub owner: Identity,
    /// Unix seconds.
    pub created_at: u64,
    pub policy: AccessPolicyRef,
    pub title: String,
    pub description: String,
    /// Custodians holding one share each, in share-index order.
    pub custodians: Vec<CustodianId>,
    /// Number of shares needed to rebuild the key.
    pub threshold: u8,
}

impl ContentRecord {
    /// Derive the id for a record with these fields.
    ///
    /// The ciphertext is encrypted under a fresh random key per upload, so
    /// two uploads never collide even for identical plaintexts.
    pub fn derive_id(
        owner: &Identity,
        created_at: u64,
        policy: &AccessPolicyRef,
        ciphertext: &[u8],
    ) -> Result<ContentId, CoreError> {
        let (policy_kind, policy_id) = match policy {
            AccessPolicyRef::Allowlist(id) => (0u64, id.0),
            AccessPolicyRef::Subscription(id) => (1u64, id.0),
        };

        let value = Value::Map(vec![
            entry(0, Value::Bytes(owner.0.to_vec())),
            entry(1, Value::Integer(created_at.into())),
            entry(2, Value::Integer(policy_kind.into())),
            entry(3, Value::Bytes(policy_id.to_vec())),
            entry(4, Value::Bytes(blake3::hash(ciphertext).as_bytes().to_vec())),
        ]);
        let encoded = canonical_encode(&value)?;

        let mut hasher = blake3::Hasher::new_derive_key(CONTENT_ID_DOMAIN);
        hasher.update(&encoded);
        Ok(ContentId(*hasher.finalize().as_bytes()))
    }

    /// Check that `id` matches the other fields.
    pub fn verify_id(&self) -> Result<bool, CoreError> {
        let expected =
            Self::derive_id(&self.owner, self.created_at, &self.policy, &self.ciphertext)?;
        Ok(expected == self.id)
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CoreError::EncodingError(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
    }
}
