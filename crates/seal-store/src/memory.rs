//! In-memory implementation of the storage traits.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use seal_core::{ContentId, ContentRecord, Identity};

use crate::error::{Result, StoreError};
use crate::traits::{AuditLog, AuditRecord, ContentStore, InsertResult, ShareStore, StoredShare};

/// In-memory store implementation.
///
/// Implements every storage trait, so one instance can back either an
/// orchestrator or a custodian. All data is lost when the store is
/// dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Content records by id.
    records: HashMap<ContentId, ContentRecord>,

    /// Key shares by content id.
    shares: HashMap<ContentId, StoredShare>,

    /// Audit entries in append order.
    audit: Vec<AuditRecord>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn put(&self, record: &ContentRecord) -> Result<InsertResult> {
        let mut inner = self.write()?;

        if let Some(existing) = inner.records.get(&record.id) {
            return Ok(if existing == record {
                InsertResult::AlreadyExists
            } else {
                InsertResult::Conflict
            });
        }

        inner.records.insert(record.id, record.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get(&self, id: &ContentId) -> Result<Option<ContentRecord>> {
        Ok(self.read()?.records.get(id).cloned())
    }

    async fn delete(&self, id: &ContentId) -> Result<bool> {
        Ok(self.write()?.records.remove(id).is_some())
    }

    async fn list_by_owner(&self, owner: &Identity) -> Result<Vec<ContentRecord>> {
        let inner = self.read()?;
        let mut records: Vec<ContentRecord> = inner
            .records
            .values()
            .filter(|r| r.owner == *owner)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }
}

#[async_trait]
impl ShareStore for MemoryStore {
    async fn put_share(&self, share: &StoredShare) -> Result<InsertResult> {
        let mut inner = self.write()?;

        if let Some(existing) = inner.shares.get(&share.content_id) {
            return Ok(if existing.same_material(share) {
                InsertResult::AlreadyExists
            } else {
                InsertResult::Conflict
            });
        }

        inner.shares.insert(share.content_id, share.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_share(&self, content_id: &ContentId) -> Result<Option<StoredShare>> {
        Ok(self.read()?.shares.get(content_id).cloned())
    }

    async fn delete_share(&self, content_id: &ContentId) -> Result<bool> {
        Ok(self.write()?.shares.remove(content_id).is_some())
    }
}

#[async_trait]
impl AuditLog for MemoryStore {
    async fn append(&self, record: &AuditRecord) -> Result<()> {
        self.write()?.audit.push(record.clone());
        Ok(())
    }

    async fn records_for(&self, content_id: &ContentId) -> Result<Vec<AuditRecord>> {
        Ok(self
            .read()?
            .audit
            .iter()
            .filter(|r| r.content_id == *content_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::AuditDecision;
    use seal_core::{AccessPolicyRef, AllowlistId, Keypair};
    use seal_shares::{split, ContentKey};

    fn record(owner: Identity, created_at: u64, body: &[u8]) -> ContentRecord {
        let policy = AccessPolicyRef::Allowlist(AllowlistId::from_bytes([1; 32]));
        ContentRecord {
            id: ContentRecord::derive_id(&owner, created_at, &policy, body).unwrap(),
            ciphertext: body.to_vec(),
            mime_type: "application/octet-stream".into(),
            size_bytes: body.len() as u64,
            owner,
            created_at,
            policy,
            title: String::new(),
            description: String::new(),
            custodians: vec!["a".into(), "b".into()],
            threshold: 2,
        }
    }

    fn stored_share(content_id: ContentId, owner: Identity) -> StoredShare {
        StoredShare {
            content_id,
            share: split(&ContentKey::generate(), 2, 2).unwrap().remove(0),
            policy: AccessPolicyRef::Allowlist(AllowlistId::from_bytes([1; 32])),
            owner,
            stored_at: 10,
        }
    }

    #[tokio::test]
    async fn test_put_get_record() {
        let store = MemoryStore::new();
        let rec = record(Keypair::generate().identity(), 5, b"cipher");

        assert_eq!(store.put(&rec).await.unwrap(), InsertResult::Inserted);
        assert_eq!(store.put(&rec).await.unwrap(), InsertResult::AlreadyExists);
        assert_eq!(store.get(&rec.id).await.unwrap(), Some(rec.clone()));

        let mut other = rec.clone();
        other.title = "changed".into();
        assert_eq!(store.put(&other).await.unwrap(), InsertResult::Conflict);
        assert_eq!(store.get(&rec.id).await.unwrap().unwrap().title, "");
    }

    #[tokio::test]
    async fn test_delete_record() {
        let store = MemoryStore::new();
        let rec = record(Keypair::generate().identity(), 5, b"cipher");
        store.put(&rec).await.unwrap();

        assert!(store.delete(&rec.id).await.unwrap());
        assert!(!store.delete(&rec.id).await.unwrap());
        assert!(store.get(&rec.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_owner_sorted() {
        let store = MemoryStore::new();
        let alice = Keypair::generate().identity();
        let bob = Keypair::generate().identity();

        store.put(&record(alice, 30, b"c")).await.unwrap();
        store.put(&record(alice, 10, b"a")).await.unwrap();
        store.put(&record(bob, 20, b"b")).await.unwrap();

        let listed = store.list_by_owner(&alice).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].created_at, 10);
        assert_eq!(listed[1].created_at, 30);
    }

    #[tokio::test]
    async fn test_share_insert_semantics() {
        let store = MemoryStore::new();
        let owner = Keypair::generate().identity();
        let content = ContentId::random();
        let share = stored_share(content, owner);

        assert_eq!(store.put_share(&share).await.unwrap(), InsertResult::Inserted);

        let mut retry = share.clone();
        retry.stored_at = 99;
        assert_eq!(store.put_share(&retry).await.unwrap(), InsertResult::AlreadyExists);

        let different = stored_share(content, owner);
        assert_eq!(store.put_share(&different).await.unwrap(), InsertResult::Conflict);
        assert_eq!(store.get_share(&content).await.unwrap(), Some(share));

        assert!(store.delete_share(&content).await.unwrap());
        assert!(store.get_share(&content).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_audit_filtered_by_content() {
        let store = MemoryStore::new();
        let who = Keypair::generate().identity();
        let a = ContentId::random();
        let b = ContentId::random();

        for (content, decision) in [
            (a, AuditDecision::Granted),
            (b, AuditDecision::Stored),
            (a, AuditDecision::Denied("no".into())),
        ] {
            store
                .append(&AuditRecord {
                    identity: who,
                    content_id: content,
                    decision,
                    timestamp: 1,
                })
                .await
                .unwrap();
        }

        let records = store.records_for(&a).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].decision, AuditDecision::Granted);
        assert_eq!(records[1].decision, AuditDecision::Denied("no".into()));
    }
}
