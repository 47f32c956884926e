//! # Seal Store
//!
//! Storage abstraction for Seal. Provides trait-based interfaces for
//! content records, custodian key shares and audit logs, with SQLite and
//! in-memory implementations, plus the policy ledger interface.
//!
//! ## Key Types
//!
//! - [`ContentStore`] - Content records, as kept by an orchestrator
//! - [`ShareStore`] - One custodian's key shares
//! - [`AuditLog`] - Append-only record of custodian decisions
//! - [`PolicyLedger`] - Allowlists and subscriptions
//! - [`SqliteStore`] - Persistent storage implementing all three stores
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`MemoryLedger`] - In-memory policy ledger
//!
//! ## Usage
//!
//! ```rust,no_run
//! use seal_store::{ContentStore, SqliteStore};
//! use seal_core::ContentId;
//!
//! async fn example() {
//!     let store = SqliteStore::open("seal.db").unwrap();
//!     let missing = store.get(&ContentId::random()).await.unwrap();
//!     assert!(missing.is_none());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent inserts**: Storing the same record or share twice returns `AlreadyExists`
//! - **Conflict detection**: Different data under an existing id returns `Conflict`
//! - **One share per content id** per custodian

pub mod error;
pub mod ledger;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{LedgerError, LedgerResult, Result, StoreError};
pub use ledger::{MemoryLedger, PolicyLedger};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{
    AuditDecision, AuditLog, AuditRecord, ContentStore, InsertResult, ShareStore, StoredShare,
};
