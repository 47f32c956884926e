//! The key-release state machine.
//!
//! Each custodian decides on its own, from its own share store and its
//! own policy read. A share request moves through:
//!
//! ```text
//! Received -> ProofVerified -> ShareLoaded -> PolicyChecked -> Granted
//!          \-> Rejected(BadProof)
//!                            \-> Denied(ContentNotFound)
//!                                           \-> Denied(PolicyNotSatisfied)
//! ```
//!
//! Every request, whatever its outcome, leaves an audit record.

use std::sync::Arc;

use tracing::{debug, info, warn};

use seal_core::{
    AccessPolicyRef, ContentId, CustodianId, Identity, IdentityProof, ProofPurpose, TimeProvider,
};
use seal_shares::{Share, WrappedShare, X25519PublicKey};
use seal_store::{AuditDecision, AuditLog, AuditRecord, InsertResult, ShareStore, StoredShare};

use crate::config::KeyServerConfig;
use crate::error::{KeyServerError, Result};
use crate::messages::{
    decode_frame, encode_frame, CustodianRequest, CustodianResponse, DenyReason, ErrorCode,
    RejectReason, ReleaseStatus,
};
use crate::policy::PolicyStore;

/// One share custodian.
#[derive(Clone)]
pub struct KeyServer {
    id: CustodianId,
    shares: Arc<dyn ShareStore>,
    audit: Arc<dyn AuditLog>,
    policy: Arc<dyn PolicyStore>,
    clock: Arc<dyn TimeProvider>,
    config: KeyServerConfig,
}

impl KeyServer {
    /// Create a custodian over its own share store and audit log.
    pub fn new(
        id: CustodianId,
        shares: Arc<dyn ShareStore>,
        audit: Arc<dyn AuditLog>,
        policy: Arc<dyn PolicyStore>,
        clock: Arc<dyn TimeProvider>,
        config: KeyServerConfig,
    ) -> Self {
        Self {
            id,
            shares,
            audit,
            policy,
            clock,
            config,
        }
    }

    pub fn id(&self) -> &CustodianId {
        &self.id
    }

    pub fn config(&self) -> &KeyServerConfig {
        &self.config
    }

    /// Decode a request frame, handle it, and encode the response.
    ///
    /// Malformed, oversized or wrong-version frames get an error response
    /// rather than a dropped connection.
    pub async fn handle_frame(&self, frame: &[u8]) -> Result<Vec<u8>> {
        let response = match decode_frame::<CustodianRequest>(frame, self.config.max_frame_bytes) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                warn!(custodian = %self.id, error = %e, "rejected frame");
                let code = match e {
                    KeyServerError::VersionMismatch { .. } => ErrorCode::VersionMismatch,
                    KeyServerError::FrameTooLarge { .. } => ErrorCode::MessageTooLarge,
                    _ => ErrorCode::InvalidMessage,
                };
                CustodianResponse::error(code, e.to_string())
            }
        };
        encode_frame(&response)
    }

    /// Handle one decoded request.
    pub async fn handle(&self, request: CustodianRequest) -> CustodianResponse {
        let result = match request {
            CustodianRequest::StoreShare {
                content_id,
                share,
                policy,
                owner,
            } => self.store_share(content_id, share, policy, owner).await,
            CustodianRequest::RequestShare { content_id, proof } => self
                .release_share(&content_id, &proof)
                .await
                .map(CustodianResponse::Release),
            CustodianRequest::DiscardShare { content_id, proof } => {
                self.discard_share(&content_id, &proof).await
            }
        };

        result.unwrap_or_else(|e| {
            warn!(custodian = %self.id, error = %e, "request failed");
            CustodianResponse::error(ErrorCode::InternalError, e.to_string())
        })
    }

    /// Hold a share for an upload.
    pub async fn store_share(
        &self,
        content_id: ContentId,
        share: Share,
        policy: AccessPolicyRef,
        owner: Identity,
    ) -> Result<CustodianResponse> {
        let stored = StoredShare {
            content_id,
            share,
            policy,
            owner,
            stored_at: self.clock.now_unix(),
        };

        match self.shares.put_share(&stored).await? {
            InsertResult::Inserted => {
                self.record(owner, content_id, AuditDecision::Stored).await?;
                debug!(custodian = %self.id, content_id = %content_id, policy = policy.kind(), "stored share");
                Ok(CustodianResponse::Stored)
            }
            InsertResult::AlreadyExists => Ok(CustodianResponse::Stored),
            InsertResult::Conflict => Ok(CustodianResponse::error(
                ErrorCode::Conflict,
                format!("a different share is already stored for {}", content_id),
            )),
        }
    }

    /// Decide a share request.
    ///
    /// The proof is verified before anything is read. The policy is read
    /// fresh for this request only.
    pub async fn release_share(
        &self,
        content_id: &ContentId,
        proof: &IdentityProof,
    ) -> Result<ReleaseStatus> {
        let now = self.clock.now_unix();
        let requester = proof.identity;

        let message = match proof.verify(content_id, ProofPurpose::Access, now, &self.config.proof) {
            Ok(message) => message,
            Err(e) => {
                let reason = e.to_string();
                self.record_best_effort(
                    requester,
                    *content_id,
                    AuditDecision::Rejected(reason.clone()),
                )
                .await;
                return Ok(ReleaseStatus::Rejected(RejectReason::BadProof(reason)));
            }
        };

        let Some(stored) = self.shares.get_share(content_id).await? else {
            self.record_best_effort(
                requester,
                *content_id,
                AuditDecision::Denied("content not found".into()),
            )
            .await;
            return Ok(ReleaseStatus::Denied(DenyReason::ContentNotFound));
        };

        let allowed = match self.policy.satisfies(&requester, &stored.policy, now).await {
            Ok(allowed) => allowed,
            Err(e) => {
                self.record_best_effort(
                    requester,
                    *content_id,
                    AuditDecision::Denied(format!("policy unavailable: {}", e)),
                )
                .await;
                return Err(e.into());
            }
        };

        if !allowed {
            self.record_best_effort(
                requester,
                *content_id,
                AuditDecision::Denied("policy not satisfied".into()),
            )
            .await;
            return Ok(ReleaseStatus::Denied(DenyReason::PolicyNotSatisfied));
        }

        let session_key = X25519PublicKey::from_bytes(message.session_key);
        let wrapped = WrappedShare::wrap(&stored.share, &session_key, content_id)?;

        // No audit record, no release.
        self.record(requester, *content_id, AuditDecision::Granted).await?;
        Ok(ReleaseStatus::Granted(wrapped))
    }

    /// Withdraw a share on the owner's signed request.
    pub async fn discard_share(
        &self,
        content_id: &ContentId,
        proof: &IdentityProof,
    ) -> Result<CustodianResponse> {
        let now = self.clock.now_unix();
        let requester = proof.identity;

        if let Err(e) = proof.verify(content_id, ProofPurpose::Discard, now, &self.config.proof) {
            let reason = e.to_string();
            self.record_best_effort(requester, *content_id, AuditDecision::Rejected(reason.clone()))
                .await;
            return Ok(CustodianResponse::error(ErrorCode::Unauthorized, reason));
        }

        let Some(stored) = self.shares.get_share(content_id).await? else {
            return Ok(CustodianResponse::Discarded);
        };

        if stored.owner != requester {
            self.record_best_effort(
                requester,
                *content_id,
                AuditDecision::Rejected("not the share owner".into()),
            )
            .await;
            return Ok(CustodianResponse::error(
                ErrorCode::Unauthorized,
                "only the owner may discard a share",
            ));
        }

        self.shares.delete_share(content_id).await?;
        self.record(requester, *content_id, AuditDecision::Discarded).await?;
        Ok(CustodianResponse::Discarded)
    }

    /// Append an audit record and emit it as a tracing event.
    async fn record(
        &self,
        identity: Identity,
        content_id: ContentId,
        decision: AuditDecision,
    ) -> Result<()> {
        info!(
            target: "seal::audit",
            custodian = %self.id,
            identity = %identity,
            content_id = %content_id,
            decision = decision.label(),
            reason = decision.reason().unwrap_or(""),
            "custodian decision"
        );

        let record = AuditRecord {
            identity,
            content_id,
            decision,
            timestamp: self.clock.now_unix(),
        };
        self.audit.append(&record).await?;
        Ok(())
    }

    /// Like [`KeyServer::record`] for outcomes that release nothing: a
    /// failed append is logged, not propagated.
    async fn record_best_effort(
        &self,
        identity: Identity,
        content_id: ContentId,
        decision: AuditDecision,
    ) {
        if let Err(e) = self.record(identity, content_id, decision).await {
            warn!(custodian = %self.id, content_id = %content_id, error = %e, "audit append failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::LedgerPolicyStore;
    use seal_core::{Keypair, ManualClock};
    use seal_shares::{combine, split, ContentKey, SessionSecret};
    use seal_store::{MemoryLedger, MemoryStore, PolicyLedger};

    struct Harness {
        server: KeyServer,
        store: Arc<MemoryStore>,
        ledger: Arc<MemoryLedger>,
        clock: ManualClock,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        let clock = ManualClock::new(10_000);
        let server = KeyServer::new(
            CustodianId::new("ks-test"),
            store.clone(),
            store.clone(),
            Arc::new(LedgerPolicyStore::new(ledger.clone())),
            Arc::new(clock.clone()),
            KeyServerConfig::default(),
        );
        Harness {
            server,
            store,
            ledger,
            clock,
        }
    }

    async fn store_for_allowlist(h: &Harness, owner: &Keypair) -> (ContentId, Share, AccessPolicyRef) {
        let list = h
            .ledger
            .create_allowlist(owner.identity(), "list", 0)
            .await
            .unwrap();
        let policy = AccessPolicyRef::Allowlist(list.id);
        let content_id = ContentId::random();
        let share = split(&ContentKey::generate(), 1, 1).unwrap().remove(0);
        let resp = h
            .server
            .store_share(content_id, share.clone(), policy, owner.identity())
            .await
            .unwrap();
        assert_eq!(resp, CustodianResponse::Stored);
        (content_id, share, policy)
    }

    fn access_proof(wallet: &Keypair, content_id: ContentId, now: u64, session: &SessionSecret) -> IdentityProof {
        IdentityProof::create(
            wallet,
            content_id,
            ProofPurpose::Access,
            now,
            *session.public_key().as_bytes(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_member_gets_wrapped_share() {
        let h = harness();
        let owner = Keypair::generate();
        let (content_id, share, _) = store_for_allowlist(&h, &owner).await;

        let session = SessionSecret::generate();
        let proof = access_proof(&owner, content_id, h.clock.now_unix(), &session);
        let status = h.server.release_share(&content_id, &proof).await.unwrap();

        let ReleaseStatus::Granted(wrapped) = status else {
            panic!("expected grant, got {:?}", status);
        };
        let unwrapped = wrapped.unwrap(&session, &content_id).unwrap();
        assert_eq!(unwrapped, share);
        assert_eq!(
            combine(&[unwrapped], 1).unwrap().as_bytes(),
            combine(&[share], 1).unwrap().as_bytes()
        );
    }

    #[tokio::test]
    async fn test_non_member_denied() {
        let h = harness();
        let owner = Keypair::generate();
        let stranger = Keypair::generate();
        let (content_id, _, _) = store_for_allowlist(&h, &owner).await;

        let proof = access_proof(&stranger, content_id, h.clock.now_unix(), &SessionSecret::generate());
        let status = h.server.release_share(&content_id, &proof).await.unwrap();
        assert_eq!(status, ReleaseStatus::Denied(DenyReason::PolicyNotSatisfied));
    }

    #[tokio::test]
    async fn test_unknown_content_denied() {
        let h = harness();
        let reader = Keypair::generate();
        let content_id = ContentId::random();

        let proof = access_proof(&reader, content_id, h.clock.now_unix(), &SessionSecret::generate());
        let status = h.server.release_share(&content_id, &proof).await.unwrap();
        assert_eq!(status, ReleaseStatus::Denied(DenyReason::ContentNotFound));
    }

    #[tokio::test]
    async fn test_stale_proof_rejected_without_policy_read() {
        let h = harness();
        let owner = Keypair::generate();
        let (content_id, _, _) = store_for_allowlist(&h, &owner).await;

        let proof = access_proof(&owner, content_id, h.clock.now_unix(), &SessionSecret::generate());
        h.clock.advance(KeyServerConfig::default().proof.max_age + 1);

        let status = h.server.release_share(&content_id, &proof).await.unwrap();
        assert!(matches!(status, ReleaseStatus::Rejected(RejectReason::BadProof(_))));
    }

    #[tokio::test]
    async fn test_proof_for_other_content_rejected() {
        let h = harness();
        let owner = Keypair::generate();
        let (content_id, _, _) = store_for_allowlist(&h, &owner).await;

        let proof = access_proof(&owner, ContentId::random(), h.clock.now_unix(), &SessionSecret::generate());
        let status = h.server.release_share(&content_id, &proof).await.unwrap();
        assert!(matches!(status, ReleaseStatus::Rejected(_)));
    }

    #[tokio::test]
    async fn test_subscription_expiry_rechecked_per_request() {
        let h = harness();
        let creator = Keypair::generate();
        let reader = Keypair::generate();
        let service = h
            .ledger
            .create_subscription_service(creator.identity(), "hourly", 5, 3600, 0)
            .await
            .unwrap();
        let bought_at = h.clock.now_unix();
        h.ledger
            .purchase_subscription(reader.identity(), &service.id, 5, bought_at)
            .await
            .unwrap();

        let content_id = ContentId::random();
        let share = split(&ContentKey::generate(), 1, 1).unwrap().remove(0);
        h.server
            .store_share(
                content_id,
                share,
                AccessPolicyRef::Subscription(service.id),
                creator.identity(),
            )
            .await
            .unwrap();

        h.clock.set(bought_at + 3599);
        let proof = access_proof(&reader, content_id, h.clock.now_unix(), &SessionSecret::generate());
        assert!(matches!(
            h.server.release_share(&content_id, &proof).await.unwrap(),
            ReleaseStatus::Granted(_)
        ));

        h.clock.set(bought_at + 3601);
        let proof = access_proof(&reader, content_id, h.clock.now_unix(), &SessionSecret::generate());
        assert_eq!(
            h.server.release_share(&content_id, &proof).await.unwrap(),
            ReleaseStatus::Denied(DenyReason::PolicyNotSatisfied)
        );
    }

    #[tokio::test]
    async fn test_every_request_audited() {
        let h = harness();
        let owner = Keypair::generate();
        let stranger = Keypair::generate();
        let (content_id, _, _) = store_for_allowlist(&h, &owner).await;
        let now = h.clock.now_unix();

        let session = SessionSecret::generate();
        h.server
            .release_share(&content_id, &access_proof(&owner, content_id, now, &session))
            .await
            .unwrap();
        h.server
            .release_share(&content_id, &access_proof(&stranger, content_id, now, &session))
            .await
            .unwrap();

        let records = h.store.records_for(&content_id).await.unwrap();
        let labels: Vec<&str> = records.iter().map(|r| r.decision.label()).collect();
        assert_eq!(labels, vec!["stored", "granted", "denied"]);
        assert_eq!(records[2].identity, stranger.identity());
    }

    #[tokio::test]
    async fn test_store_conflict() {
        let h = harness();
        let owner = Keypair::generate();
        let (content_id, share, policy) = store_for_allowlist(&h, &owner).await;

        let again = h
            .server
            .store_share(content_id, share, policy, owner.identity())
            .await
            .unwrap();
        assert_eq!(again, CustodianResponse::Stored);

        let other = split(&ContentKey::generate(), 1, 1).unwrap().remove(0);
        let conflict = h
            .server
            .store_share(content_id, other, policy, owner.identity())
            .await
            .unwrap();
        assert!(matches!(
            conflict,
            CustodianResponse::Error { code: ErrorCode::Conflict, .. }
        ));
    }

    #[tokio::test]
    async fn test_discard_owner_only() {
        let h = harness();
        let owner = Keypair::generate();
        let stranger = Keypair::generate();
        let (content_id, _, _) = store_for_allowlist(&h, &owner).await;
        let now = h.clock.now_unix();

        let bad = IdentityProof::create(&stranger, content_id, ProofPurpose::Discard, now, [0; 32]).unwrap();
        assert!(matches!(
            h.server.discard_share(&content_id, &bad).await.unwrap(),
            CustodianResponse::Error { code: ErrorCode::Unauthorized, .. }
        ));

        // An access proof does not authorize a discard.
        let wrong_purpose =
            IdentityProof::create(&owner, content_id, ProofPurpose::Access, now, [0; 32]).unwrap();
        assert!(matches!(
            h.server.discard_share(&content_id, &wrong_purpose).await.unwrap(),
            CustodianResponse::Error { code: ErrorCode::Unauthorized, .. }
        ));
        assert!(h.store.get_share(&content_id).await.unwrap().is_some());

        let good = IdentityProof::create(&owner, content_id, ProofPurpose::Discard, now, [0; 32]).unwrap();
        assert_eq!(
            h.server.discard_share(&content_id, &good).await.unwrap(),
            CustodianResponse::Discarded
        );
        assert!(h.store.get_share(&content_id).await.unwrap().is_none());

        // Idempotent.
        assert_eq!(
            h.server.discard_share(&content_id, &good).await.unwrap(),
            CustodianResponse::Discarded
        );
    }

    #[tokio::test]
    async fn test_handle_frame_answers_garbage_with_error() {
        let h = harness();
        let reply = h.server.handle_frame(&[0x00, 0x01, 0x02]).await.unwrap();
        let response: CustodianResponse = decode_frame(&reply, usize::MAX).unwrap();
        assert!(matches!(
            response,
            CustodianResponse::Error { code: ErrorCode::InvalidMessage, .. }
        ));
    }

    #[tokio::test]
    async fn test_handle_frame_request_roundtrip() {
        let h = harness();
        let reader = Keypair::generate();
        let content_id = ContentId::random();
        let proof = access_proof(&reader, content_id, h.clock.now_unix(), &SessionSecret::generate());

        let frame = encode_frame(&CustodianRequest::RequestShare { content_id, proof }).unwrap();
        let reply = h.server.handle_frame(&frame).await.unwrap();
        let response: CustodianResponse = decode_frame(&reply, usize::MAX).unwrap();
        assert_eq!(
            response,
            CustodianResponse::Release(ReleaseStatus::Denied(DenyReason::ContentNotFound))
        );
    }
}
