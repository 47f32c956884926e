//! # Seal Core
//!
//! Pure primitives for Seal: identities, access policies, content records
//! and identity proofs.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over the data structures every other Seal crate exchanges.
//!
//! ## Key Types
//!
//! - [`Identity`] - A requester's Ed25519 public address
//! - [`Wallet`] - Anything that can sign on behalf of an identity
//! - [`AccessPolicyRef`] - The allowlist or subscription gating a content item
//! - [`ContentRecord`] - Ciphertext plus policy pointer, never the key
//! - [`IdentityProof`] - Signed, fresh, content-bound proof of identity
//!
//! ## Canonicalization
//!
//! Signed and hashed structures use deterministic CBOR. See [`canonical`].

pub mod canonical;
pub mod clock;
pub mod content;
pub mod crypto;
pub mod error;
pub mod policy;
pub mod proof;
pub mod types;

pub use clock::{ManualClock, SystemClock, TimeProvider};
pub use content::ContentRecord;
pub use crypto::{Identity, Keypair, Signature, Wallet};
pub use error::{CoreError, ProofError};
pub use policy::{AccessPolicy, AccessPolicyRef, Allowlist, SubscriptionGrant, SubscriptionService};
pub use proof::{IdentityProof, ProofConfig, ProofMessage, ProofPurpose};
pub use types::{AllowlistId, ContentId, CustodianId, ServiceId};
