//! # Seal Testkit
//!
//! Testing utilities for Seal.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: an in-process custodian network with a shared ledger
//!   and a manual clock
//! - **Faults**: custodian clients that drop, delay or tamper with calls,
//!   and a content store that refuses writes
//! - **Generators**: proptest strategies for keys, plaintexts and split
//!   parameters
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use seal::core::{AccessPolicyRef, Keypair};
//! use seal::ContentMeta;
//! use seal_testkit::TestNetwork;
//!
//! # async fn example() -> seal::Result<()> {
//! let net = TestNetwork::new(2).await;
//! let owner = net.client(Keypair::generate())?;
//! let list = owner.create_allowlist("team").await?;
//! let record = owner
//!     .upload(b"secret", AccessPolicyRef::Allowlist(list.id), ContentMeta::default())
//!     .await?;
//! assert_eq!(owner.access(&record.id).await?, b"secret");
//! # Ok(())
//! # }
//! ```

pub mod faults;
pub mod fixtures;
pub mod generators;

pub use faults::{BrokenContentStore, Fault, FaultyCustodian};
pub use fixtures::{wallets, TestCustodian, TestNetwork};
pub use generators::SplitParams;
