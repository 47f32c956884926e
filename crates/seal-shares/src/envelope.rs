//! Sealed content envelope.
//!
//! Uploaded plaintext is encrypted under a fresh [`ContentKey`] and wrapped
//! in a [`SealedContent`] envelope carrying the nonce and format. The
//! envelope's CBOR bytes are what a content record stores as ciphertext.

use serde::{Deserialize, Serialize};

use crate::crypto::{ContentKey, EncryptionNonce};
use crate::error::{Result, SharesError};

/// Format identifier for sealed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncryptionFormat {
    /// ChaCha20-Poly1305 with 256-bit key.
    ChaCha20Poly1305 = 1,
}

/// An encrypted content envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedContent {
    /// Encryption algorithm used.
    pub format: EncryptionFormat,

    /// Nonce used for encryption (unique per encryption).
    pub nonce: EncryptionNonce,

    /// The encrypted data (includes authentication tag).
    pub ciphertext: Vec<u8>,
}

impl SealedContent {
    /// Encrypt plaintext with the given key.
    pub fn seal(plaintext: &[u8], key: &ContentKey) -> Result<Self> {
        let nonce = EncryptionNonce::generate();
        let ciphertext = key.encrypt(plaintext, &nonce)?;

        Ok(Self {
            format: EncryptionFormat::ChaCha20Poly1305,
            nonce,
            ciphertext,
        })
    }

    /// Decrypt with the given key.
    pub fn open(&self, key: &ContentKey) -> Result<Vec<u8>> {
        match self.format {
            EncryptionFormat::ChaCha20Poly1305 => key.decrypt(&self.ciphertext, &self.nonce),
        }
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| SharesError::SerializationError(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| SharesError::SerializationError(e.to_string()))
    }
}

/// Encrypt `plaintext` and return the envelope bytes.
pub fn seal_content(plaintext: &[u8], key: &ContentKey) -> Result<Vec<u8>> {
    SealedContent::seal(plaintext, key)?.to_bytes()
}

/// Decrypt envelope bytes produced by [`seal_content`].
///
/// Unparseable envelopes are reported as integrity failures: from the
/// reader's side, corrupted bytes and a wrong key are indistinguishable.
pub fn open_content(sealed: &[u8], key: &ContentKey) -> Result<Vec<u8>> {
    let envelope = SealedContent::from_bytes(sealed)
        .map_err(|e| SharesError::IntegrityError(format!("malformed envelope: {}", e)))?;
    envelope.open(key)
}
