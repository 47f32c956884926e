//! # Seal
//!
//! Policy-gated content encryption with threshold key release.
//!
//! ## Overview
//!
//! Content is encrypted under a fresh symmetric key. The key is split into
//! Shamir shares, one per custodian, and never stored whole. A reader
//! recovers it only when a quorum of custodians has independently checked
//! the reader's signed identity proof against the content's policy:
//!
//! - **Allowlist**: the reader is the owner or a member.
//! - **Subscription**: the reader holds a grant active at request time.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use seal::{ClientConfig, ContentMeta, SealClient};
//! use seal::core::{AccessPolicyRef, Keypair, SystemClock};
//! use seal::keyserver::CustodianClient;
//! use seal::store::{MemoryLedger, MemoryStore};
//!
//! async fn example(custodians: Vec<Arc<dyn CustodianClient>>) -> seal::Result<()> {
//!     let client = SealClient::new(
//!         Arc::new(Keypair::generate()),
//!         custodians,
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(MemoryLedger::new()),
//!         Arc::new(SystemClock::new()),
//!         ClientConfig::default(),
//!     )?;
//!
//!     let list = client.create_allowlist("friends").await?;
//!     let record = client
//!         .upload(b"hello", AccessPolicyRef::Allowlist(list.id), ContentMeta::titled("greeting"))
//!         .await?;
//!     let plaintext = client.access(&record.id).await?;
//!     assert_eq!(plaintext, b"hello");
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `seal::core` - identities, proofs, policies, content records
//! - `seal::shares` - cipher engine and key splitting
//! - `seal::store` - content, share and audit storage; the policy ledger
//! - `seal::keyserver` - the custodian service and its transport

pub mod client;
pub mod config;
pub mod error;

pub use seal_core as core;
pub use seal_keyserver as keyserver;
pub use seal_shares as shares;
pub use seal_store as store;

pub use client::{ContentMeta, SealClient};
pub use config::ClientConfig;
pub use error::{Result, SealError};

pub use seal_core::{
    AccessPolicyRef, AllowlistId, ContentId, ContentRecord, CustodianId, Identity, Keypair,
    ServiceId, Wallet,
};
