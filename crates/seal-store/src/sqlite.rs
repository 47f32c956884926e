//! SQLite implementation of the storage traits.
//!
//! The persistent backend for both orchestrators (content records) and
//! custodians (key shares and audit log). It uses rusqlite with bundled
//! SQLite, wrapped in async via `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};

use seal_core::{ContentId, ContentRecord, Identity};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{
    AuditDecision, AuditLog, AuditRecord, ContentStore, InsertResult, ShareStore, StoredShare,
};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn to_sql_time(t: u64) -> Result<i64> {
    i64::try_from(t).map_err(|_| StoreError::InvalidData(format!("timestamp {} out of range", t)))
}

fn from_sql_time(t: i64) -> Result<u64> {
    u64::try_from(t).map_err(|_| StoreError::InvalidData(format!("negative timestamp {}", t)))
}

fn identity_from_blob(blob: Vec<u8>) -> Result<Identity> {
    let bytes: [u8; 32] = blob
        .try_into()
        .map_err(|_| StoreError::InvalidData("identity must be 32 bytes".into()))?;
    Ok(Identity(bytes))
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn put(&self, record: &ContentRecord) -> Result<InsertResult> {
        let record = record.clone();
        let encoded = to_cbor(&record)?;
        let created_at = to_sql_time(record.created_at)?;

        self.run(move |conn| {
            let tx = conn.transaction()?;

            let existing: Option<Vec<u8>> = tx
                .query_row(
                    "SELECT record FROM content_records WHERE content_id = ?1",
                    params![record.id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(existing) = existing {
                let existing: ContentRecord = from_cbor(&existing)?;
                return Ok(if existing == record {
                    InsertResult::AlreadyExists
                } else {
                    InsertResult::Conflict
                });
            }

            tx.execute(
                "INSERT INTO content_records (content_id, owner, created_at, record)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id.as_bytes().as_slice(),
                    record.owner.as_bytes().as_slice(),
                    created_at,
                    encoded,
                ],
            )?;
            tx.commit()?;

            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn get(&self, id: &ContentId) -> Result<Option<ContentRecord>> {
        let id = *id;
        self.run(move |conn| {
            let blob: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT record FROM content_records WHERE content_id = ?1",
                    params![id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            blob.map(|b| from_cbor(&b)).transpose()
        })
        .await
    }

    async fn delete(&self, id: &ContentId) -> Result<bool> {
        let id = *id;
        self.run(move |conn| {
            let n = conn.execute(
                "DELETE FROM content_records WHERE content_id = ?1",
                params![id.as_bytes().as_slice()],
            )?;
            Ok(n > 0)
        })
        .await
    }

    async fn list_by_owner(&self, owner: &Identity) -> Result<Vec<ContentRecord>> {
        let owner = *owner;
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT record FROM content_records
                 WHERE owner = ?1
                 ORDER BY created_at, content_id",
            )?;
            let blobs = stmt
                .query_map(params![owner.as_bytes().as_slice()], |row| {
                    row.get::<_, Vec<u8>>(0)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            blobs.iter().map(|b| from_cbor(b)).collect()
        })
        .await
    }
}

#[async_trait]
impl ShareStore for SqliteStore {
    async fn put_share(&self, share: &StoredShare) -> Result<InsertResult> {
        let share = share.clone();
        let share_blob = to_cbor(&share.share)?;
        let policy_blob = to_cbor(&share.policy)?;
        let stored_at = to_sql_time(share.stored_at)?;

        self.run(move |conn| {
            let tx = conn.transaction()?;

            let existing = tx
                .query_row(
                    "SELECT owner, policy, share FROM key_shares WHERE content_id = ?1",
                    params![share.content_id.as_bytes().as_slice()],
                    |row| {
                        Ok((
                            row.get::<_, Vec<u8>>(0)?,
                            row.get::<_, Vec<u8>>(1)?,
                            row.get::<_, Vec<u8>>(2)?,
                        ))
                    },
                )
                .optional()?;

            if let Some((owner, policy, existing_share)) = existing {
                let same = owner == share.owner.as_bytes().as_slice()
                    && policy == policy_blob
                    && existing_share == share_blob;
                return Ok(if same {
                    InsertResult::AlreadyExists
                } else {
                    InsertResult::Conflict
                });
            }

            tx.execute(
                "INSERT INTO key_shares (content_id, owner, policy, share, stored_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    share.content_id.as_bytes().as_slice(),
                    share.owner.as_bytes().as_slice(),
                    policy_blob,
                    share_blob,
                    stored_at,
                ],
            )?;
            tx.commit()?;

            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn get_share(&self, content_id: &ContentId) -> Result<Option<StoredShare>> {
        let content_id = *content_id;
        self.run(move |conn| {
            let row = conn
                .query_row(
                    "SELECT owner, policy, share, stored_at FROM key_shares WHERE content_id = ?1",
                    params![content_id.as_bytes().as_slice()],
                    |row| {
                        Ok((
                            row.get::<_, Vec<u8>>(0)?,
                            row.get::<_, Vec<u8>>(1)?,
                            row.get::<_, Vec<u8>>(2)?,
                            row.get::<_, i64>(3)?,
                        ))
                    },
                )
                .optional()?;

            let Some((owner, policy, share, stored_at)) = row else {
                return Ok(None);
            };
            Ok(Some(StoredShare {
                content_id,
                share: from_cbor(&share)?,
                policy: from_cbor(&policy)?,
                owner: identity_from_blob(owner)?,
                stored_at: from_sql_time(stored_at)?,
            }))
        })
        .await
    }

    async fn delete_share(&self, content_id: &ContentId) -> Result<bool> {
        let content_id = *content_id;
        self.run(move |conn| {
            let n = conn.execute(
                "DELETE FROM key_shares WHERE content_id = ?1",
                params![content_id.as_bytes().as_slice()],
            )?;
            Ok(n > 0)
        })
        .await
    }
}

#[async_trait]
impl AuditLog for SqliteStore {
    async fn append(&self, record: &AuditRecord) -> Result<()> {
        let record = record.clone();
        let timestamp = to_sql_time(record.timestamp)?;
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO audit_log (content_id, identity, decision, reason, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.content_id.as_bytes().as_slice(),
                    record.identity.as_bytes().as_slice(),
                    record.decision.label(),
                    record.decision.reason(),
                    timestamp,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn records_for(&self, content_id: &ContentId) -> Result<Vec<AuditRecord>> {
        let content_id = *content_id;
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT identity, decision, reason, timestamp FROM audit_log
                 WHERE content_id = ?1
                 ORDER BY seq",
            )?;
            let rows = stmt
                .query_map(params![content_id.as_bytes().as_slice()], |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(identity, label, reason, timestamp)| {
                    let decision = AuditDecision::from_parts(&label, reason).ok_or_else(|| {
                        StoreError::InvalidData(format!("unknown audit decision {}", label))
                    })?;
                    Ok(AuditRecord {
                        identity: identity_from_blob(identity)?,
                        content_id,
                        decision,
                        timestamp: from_sql_time(timestamp)?,
                    })
                })
                .collect()
        })
        .await
    }
}
