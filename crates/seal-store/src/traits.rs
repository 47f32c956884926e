//! Storage traits: content records, custodian share storage, audit logs.
//!
//! These traits keep the orchestrator and the custodians storage-agnostic.
//! Implementations include SQLite (persistent) and in-memory (for tests).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use seal_core::{AccessPolicyRef, ContentId, ContentRecord, Identity};
use seal_shares::Share;

use crate::error::Result;

/// Result of inserting a record or share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// Inserted successfully.
    Inserted,
    /// The same data is already stored (idempotent - not an error).
    AlreadyExists,
    /// Different data is already stored under the same content id.
    Conflict,
}

/// A key share as held by one custodian.
///
/// The custodian keeps the policy pointer next to the share so it can
/// decide releases without trusting anything the requester sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredShare {
    pub content_id: ContentId,
    pub share: Share,
    pub policy: AccessPolicyRef,
    /// The uploader; the only identity allowed to discard the share.
    pub owner: Identity,
    /// Unix seconds.
    pub stored_at: u64,
}

impl StoredShare {
    /// Whether `other` carries the same share material, ignoring when it
    /// was stored.
    pub fn same_material(&self, other: &StoredShare) -> bool {
        self.content_id == other.content_id
            && self.share == other.share
            && self.policy == other.policy
            && self.owner == other.owner
    }
}

/// Outcome recorded for one custodian request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditDecision {
    /// Share released.
    Granted,
    /// Proof valid, but the policy or content lookup said no.
    Denied(String),
    /// Proof rejected before any policy read.
    Rejected(String),
    /// Share accepted for storage.
    Stored,
    /// Share discarded by its owner.
    Discarded,
}

impl AuditDecision {
    /// Stable label, used as the stored decision column.
    pub fn label(&self) -> &'static str {
        match self {
            AuditDecision::Granted => "granted",
            AuditDecision::Denied(_) => "denied",
            AuditDecision::Rejected(_) => "rejected",
            AuditDecision::Stored => "stored",
            AuditDecision::Discarded => "discarded",
        }
    }

    /// Reason text for denials and rejections.
    pub fn reason(&self) -> Option<&str> {
        match self {
            AuditDecision::Denied(r) | AuditDecision::Rejected(r) => Some(r),
            _ => None,
        }
    }

    /// Rebuild from the stored label and reason.
    pub fn from_parts(label: &str, reason: Option<String>) -> Option<Self> {
        let reason = reason.unwrap_or_default();
        match label {
            "granted" => Some(AuditDecision::Granted),
            "denied" => Some(AuditDecision::Denied(reason)),
            "rejected" => Some(AuditDecision::Rejected(reason)),
            "stored" => Some(AuditDecision::Stored),
            "discarded" => Some(AuditDecision::Discarded),
            _ => None,
        }
    }
}

/// One audit entry: who asked for what, what was decided, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// The identity the request claimed (unverified for rejected proofs).
    pub identity: Identity,
    pub content_id: ContentId,
    pub decision: AuditDecision,
    /// Unix seconds.
    pub timestamp: u64,
}

/// Persistence for content records (the orchestrator's side).
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert a record.
    ///
    /// Returns `AlreadyExists` for an identical record and `Conflict` if a
    /// different record has the same id.
    async fn put(&self, record: &ContentRecord) -> Result<InsertResult>;

    /// Get a record by id.
    async fn get(&self, id: &ContentId) -> Result<Option<ContentRecord>>;

    /// Delete a record. Returns `true` if it existed.
    async fn delete(&self, id: &ContentId) -> Result<bool>;

    /// All records uploaded by `owner`, oldest first.
    async fn list_by_owner(&self, owner: &Identity) -> Result<Vec<ContentRecord>>;
}

/// Persistence for a custodian's key shares.
#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Store a share. At most one share per content id.
    ///
    /// Re-storing the same material is `AlreadyExists`; different material
    /// under the same id is `Conflict` and leaves the original untouched.
    async fn put_share(&self, share: &StoredShare) -> Result<InsertResult>;

    /// Get the share for a content item.
    async fn get_share(&self, content_id: &ContentId) -> Result<Option<StoredShare>>;

    /// Delete the share for a content item. Returns `true` if it existed.
    async fn delete_share(&self, content_id: &ContentId) -> Result<bool>;
}

/// Append-only log of custodian decisions.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append a record.
    async fn append(&self, record: &AuditRecord) -> Result<()>;

    /// All records for a content item, in append order.
    async fn records_for(&self, content_id: &ContentId) -> Result<Vec<AuditRecord>>;
}
