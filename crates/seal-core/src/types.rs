//! Strong type definitions for Seal.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Defines a 32-byte identifier newtype with hex helpers.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Get the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Generate a random identifier.
            pub fn random() -> Self {
                use rand::Rng;
                Self(rand::thread_rng().gen())
            }

            /// Convert to hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex string.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| hex::FromHexError::InvalidStringLength)?;
                Ok(Self(arr))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $label, &self.to_hex()[..16])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", &self.to_hex()[..16])
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = std::array::TryFromSliceError;

            fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
                let arr: [u8; 32] = slice.try_into()?;
                Ok(Self(arr))
            }
        }
    };
}

define_id!(
    /// Identifier of a content item, derived from its owner, creation time
    /// and ciphertext (see [`ContentRecord`](crate::ContentRecord)).
    ContentId,
    "ContentId"
);

define_id!(
    /// Identifier of an allowlist object on the policy ledger.
    AllowlistId,
    "AllowlistId"
);

define_id!(
    /// Identifier of a subscription service object on the policy ledger.
    ServiceId,
    "ServiceId"
);

/// Name of a key-release service (custodian).
///
/// Custodians are addressed by name; the orchestrator records the list of
/// custodians that hold shares for a content item in its record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CustodianId(pub String);

impl CustodianId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustodianId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CustodianId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_hex_roundtrip() {
        let id = ContentId::from_bytes([0x42; 32]);
        let hex = id.to_hex();
        let recovered = ContentId::from_hex(&hex).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_content_id_display() {
        let id = ContentId::from_bytes([0xab; 32]);
        assert_eq!(format!("{}", id), "abababababababab");
    }

    #[test]
    fn test_ids_debug_carry_label() {
        let id = AllowlistId::from_bytes([0xcd; 32]);
        assert!(format!("{:?}", id).starts_with("AllowlistId("));
        let id = ServiceId::from_bytes([0xcd; 32]);
        assert!(format!("{:?}", id).starts_with("ServiceId("));
    }

    #[test]
    fn test_from_hex_rejects_wrong_length() {
        assert!(ContentId::from_hex("abcd").is_err());
    }

    #[test]
    fn test_random_ids_differ() {
        assert_ne!(AllowlistId::random(), AllowlistId::random());
    }
}
