//! Fault injection for custodian calls and the content store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use seal_core::{ContentId, ContentRecord, CustodianId, Identity};
use seal_keyserver::{CustodianClient, CustodianRequest, CustodianResponse, TransportError};
use seal_store::{ContentStore, InsertResult, MemoryStore, StoreError};

/// What a [`FaultyCustodian`] does to calls.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Every call fails as unreachable.
    Unreachable,
    /// Every call is held this long before being forwarded.
    Delay(Duration),
    /// Uploads fail as unreachable; other calls pass through.
    RefuseStore,
    /// Every call is answered with this response, unforwarded.
    Respond(CustodianResponse),
    /// Uploads reach the custodian but the reply is lost.
    LoseStoreReply,
    /// Every call panics.
    Panic,
}

/// Wraps a real custodian client and applies a [`Fault`].
pub struct FaultyCustodian {
    inner: Arc<dyn CustodianClient>,
    fault: Fault,
    calls: AtomicUsize,
}

impl FaultyCustodian {
    pub fn new(inner: Arc<dyn CustodianClient>, fault: Fault) -> Self {
        Self {
            inner,
            fault,
            calls: AtomicUsize::new(0),
        }
    }

    /// Calls received so far, faulted or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CustodianClient for FaultyCustodian {
    fn custodian_id(&self) -> &CustodianId {
        self.inner.custodian_id()
    }

    async fn call(&self, request: CustodianRequest) -> Result<CustodianResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.fault {
            Fault::Unreachable => Err(TransportError::Unreachable(self.custodian_id().clone())),
            Fault::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                self.inner.call(request).await
            }
            Fault::RefuseStore => match request {
                CustodianRequest::StoreShare { .. } => {
                    Err(TransportError::Unreachable(self.custodian_id().clone()))
                }
                other => self.inner.call(other).await,
            },
            Fault::Respond(response) => Ok(response.clone()),
            Fault::LoseStoreReply => match request {
                CustodianRequest::StoreShare { .. } => {
                    self.inner.call(request).await?;
                    Err(TransportError::Unreachable(self.custodian_id().clone()))
                }
                other => self.inner.call(other).await,
            },
            Fault::Panic => panic!("custodian {} crashed", self.custodian_id()),
        }
    }
}

/// A content store whose writes always fail. Reads hit an empty store.
#[derive(Default)]
pub struct BrokenContentStore {
    inner: MemoryStore,
}

#[async_trait]
impl ContentStore for BrokenContentStore {
    async fn put(&self, _record: &ContentRecord) -> seal_store::Result<InsertResult> {
        Err(StoreError::Task("content store offline".into()))
    }

    async fn get(&self, id: &ContentId) -> seal_store::Result<Option<ContentRecord>> {
        self.inner.get(id).await
    }

    async fn delete(&self, id: &ContentId) -> seal_store::Result<bool> {
        self.inner.delete(id).await
    }

    async fn list_by_owner(&self, owner: &Identity) -> seal_store::Result<Vec<ContentRecord>> {
        self.inner.list_by_owner(owner).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestNetwork;
    use seal_core::{ContentId, IdentityProof, Keypair, ManualClock, ProofPurpose, TimeProvider};
    use seal_keyserver::ErrorCode;

    fn request() -> CustodianRequest {
        let content_id = ContentId::random();
        let proof = IdentityProof::create(
            &Keypair::generate(),
            content_id,
            ProofPurpose::Access,
            ManualClock::default().now_unix(),
            [0; 32],
        )
        .unwrap();
        CustodianRequest::RequestShare { content_id, proof }
    }

    #[tokio::test]
    async fn test_unreachable_never_forwards() {
        let net = TestNetwork::new(1).await;
        let faulty = FaultyCustodian::new(net.custodian_clients().remove(0), Fault::Unreachable);

        let err = faulty.call(request()).await.unwrap_err();
        assert_eq!(err, TransportError::Unreachable(CustodianId::new("ks-1")));
        assert_eq!(faulty.calls(), 1);
    }

    #[tokio::test]
    async fn test_canned_response() {
        let net = TestNetwork::new(1).await;
        let canned = CustodianResponse::error(ErrorCode::InternalError, "disk full");
        let faulty = FaultyCustodian::new(
            net.custodian_clients().remove(0),
            Fault::Respond(canned.clone()),
        );

        assert_eq!(faulty.call(request()).await.unwrap(), canned);
    }
}
