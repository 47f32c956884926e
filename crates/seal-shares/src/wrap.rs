//! Share wrapping for transit.
//!
//! A custodian never returns a share in the clear. It encrypts the share
//! to the requester's session key (carried inside the signed identity
//! proof) using X25519 with a fresh ephemeral key, so only the holder of
//! the session secret can open the response.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use seal_core::ContentId;

use crate::crypto::{EncryptionNonce, EphemeralKeyPair, SessionSecret, X25519PublicKey};
use crate::error::{Result, SharesError};
use crate::shamir::Share;

/// A share encrypted to one requester's session key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedShare {
    /// Ephemeral X25519 public key (custodian's side of ECDH).
    pub ephemeral_public: X25519PublicKey,

    /// The CBOR-encoded share, encrypted with the derived wrap key.
    pub ciphertext: Vec<u8>,

    /// Nonce used for encryption.
    pub nonce: EncryptionNonce,
}

impl WrappedShare {
    /// Encrypt `share` for the holder of `recipient`'s secret.
    ///
    /// The wrap key is bound to `content_id`, so a wrapped share cannot be
    /// passed off as belonging to a different content item.
    pub fn wrap(share: &Share, recipient: &X25519PublicKey, content_id: &ContentId) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();
        let wrap_key = ephemeral
            .diffie_hellman(recipient)
            .derive_wrap_key(content_id.as_bytes());

        let mut plaintext = Zeroizing::new(Vec::new());
        ciborium::into_writer(share, &mut *plaintext)
            .map_err(|e| SharesError::SerializationError(e.to_string()))?;

        let nonce = EncryptionNonce::generate();
        let ciphertext = wrap_key.encrypt(&plaintext, &nonce)?;

        Ok(Self {
            ephemeral_public,
            ciphertext,
            nonce,
        })
    }

    /// Decrypt the share with the session secret it was wrapped to.
    pub fn unwrap(&self, session: &SessionSecret, content_id: &ContentId) -> Result<Share> {
        let wrap_key = session
            .diffie_hellman(&self.ephemeral_public)
            .derive_wrap_key(content_id.as_bytes());

        let plaintext = Zeroizing::new(wrap_key.decrypt(&self.ciphertext, &self.nonce)?);
        ciborium::from_reader(&plaintext[..])
            .map_err(|e| SharesError::IntegrityError(format!("malformed share: {}", e)))
    }
}
