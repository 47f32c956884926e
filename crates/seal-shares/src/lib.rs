//! # Seal Shares
//!
//! Content encryption and threshold key sharing.
//!
//! ## Overview
//!
//! Every uploaded item is encrypted under its own random key. That key is
//! never stored anywhere: it is split into shares, one per custodian, and
//! rebuilt on the reading side only once a quorum of custodians has
//! released their shares.
//!
//! ## Key Concepts
//!
//! - **ContentKey**: A fresh ChaCha20-Poly1305 key per content item
//! - **SealedContent**: The authenticated ciphertext envelope
//! - **Share**: One GF(2^8) Shamir share of a content key
//! - **WrappedShare**: A share encrypted to a requester's session key
//!
//! ## Usage
//!
//! ```rust
//! use seal_shares::{combine, open_content, seal_content, split, ContentKey};
//!
//! let key = ContentKey::generate();
//! let sealed = seal_content(b"hello", &key).unwrap();
//!
//! let shares = split(&key, 3, 2).unwrap();
//! let rebuilt = combine(&shares[1..], 2).unwrap();
//! assert_eq!(open_content(&sealed, &rebuilt).unwrap(), b"hello");
//! ```

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod shamir;
pub mod wrap;

pub use crypto::{ContentKey, EncryptionNonce, EphemeralKeyPair, SessionSecret, SharedKey, X25519PublicKey};
pub use envelope::{open_content, seal_content, EncryptionFormat, SealedContent};
pub use error::{Result, SharesError};
pub use shamir::{combine, split, Share, MAX_SHARES};
pub use wrap::WrappedShare;
