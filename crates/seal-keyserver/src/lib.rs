//! # Seal Key Server
//!
//! The custodian side of threshold key release.
//!
//! ## Overview
//!
//! A custodian holds one Shamir share per content item. When a reader
//! asks for it, the custodian verifies the reader's signed proof, reads
//! the content's access policy fresh from the ledger, and only then
//! releases the share, wrapped to the reader's ephemeral session key.
//!
//! Custodians never talk to each other. Each one decides on its own, so
//! a reader needs a quorum of independent "yes" answers to recover a key.
//!
//! ## Message Flow
//!
//! ```text
//! Orchestrator                         Custodian
//!   |-------- StoreShare -------------->|   (upload)
//!   |<------- Stored -------------------|
//!   |-------- RequestShare ------------>|   (access)
//!   |<------- Release(Granted|Denied|Rejected)
//!   |-------- DiscardShare ------------>|   (rollback)
//!   |<------- Discarded ----------------|
//! ```

pub mod config;
pub mod error;
pub mod messages;
pub mod policy;
pub mod server;
pub mod transport;

pub use config::{KeyServerConfig, DEFAULT_MAX_FRAME_BYTES};
pub use error::{KeyServerError, Result, TransportError};
pub use messages::{
    decode_frame, encode_frame, CustodianRequest, CustodianResponse, DenyReason, ErrorCode,
    RejectReason, ReleaseStatus, PROTOCOL_VERSION,
};
pub use policy::{LedgerPolicyStore, PolicyStore};
pub use server::KeyServer;
pub use transport::{
    memory::{MemoryCustodianClient, MemoryNetwork},
    CustodianClient,
};
