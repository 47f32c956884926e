//! The content access orchestrator.
//!
//! Upload encrypts under a fresh key, splits the key, and places one share
//! with each custodian before publishing the record. Access fans a signed
//! request out to the record's custodians, stops once a quorum of grants
//! is in, and rebuilds the key locally.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use seal_core::{
    AccessPolicy, AccessPolicyRef, Allowlist, AllowlistId, ContentId, ContentRecord, CustodianId,
    Identity, IdentityProof, ProofPurpose, ServiceId, SubscriptionGrant, SubscriptionService,
    TimeProvider, Wallet,
};
use seal_keyserver::{
    CustodianClient, CustodianRequest, CustodianResponse, DenyReason, RejectReason, ReleaseStatus,
    TransportError,
};
use seal_shares::{combine, open_content, seal_content, split, ContentKey, SessionSecret, WrappedShare};
use seal_store::{ContentStore, InsertResult, PolicyLedger, StoreError};

use crate::config::ClientConfig;
use crate::error::{Result, SealError};

/// Descriptive fields stored alongside the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMeta {
    pub title: String,
    pub description: String,
    pub mime_type: String,
}

impl Default for ContentMeta {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            mime_type: "application/octet-stream".into(),
        }
    }
}

impl ContentMeta {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Client for uploading and reading policy-gated content.
///
/// Holds no decision state of its own: every access asks the custodians
/// again with a fresh proof.
#[derive(Clone)]
pub struct SealClient {
    wallet: Arc<dyn Wallet>,
    custodians: Vec<Arc<dyn CustodianClient>>,
    content: Arc<dyn ContentStore>,
    ledger: Arc<dyn PolicyLedger>,
    clock: Arc<dyn TimeProvider>,
    config: ClientConfig,
}

impl SealClient {
    /// Create a client over a custodian set.
    ///
    /// Fails if the configuration does not fit the custodians or two
    /// custodians share a name.
    pub fn new(
        wallet: Arc<dyn Wallet>,
        custodians: Vec<Arc<dyn CustodianClient>>,
        content: Arc<dyn ContentStore>,
        ledger: Arc<dyn PolicyLedger>,
        clock: Arc<dyn TimeProvider>,
        config: ClientConfig,
    ) -> Result<Self> {
        config.validate(custodians.len())?;

        let mut names: Vec<&CustodianId> = custodians.iter().map(|c| c.custodian_id()).collect();
        names.sort();
        if names.windows(2).any(|w| w[0] == w[1]) {
            return Err(SealError::InvalidConfig("custodian names must be unique".into()));
        }

        Ok(Self {
            wallet,
            custodians,
            content,
            ledger,
            clock,
            config,
        })
    }

    /// The identity this client signs as.
    pub fn identity(&self) -> Identity {
        self.wallet.address()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Names of the configured custodians, in share order.
    pub fn custodian_ids(&self) -> Vec<CustodianId> {
        self.custodians
            .iter()
            .map(|c| c.custodian_id().clone())
            .collect()
    }

    fn custodian(&self, id: &CustodianId) -> Option<&Arc<dyn CustodianClient>> {
        self.custodians.iter().find(|c| c.custodian_id() == id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Upload
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt `plaintext` and place its key under `policy`.
    ///
    /// Either every custodian holds its share and the record is published,
    /// or the upload fails and shares that were accepted are discarded.
    pub async fn upload(
        &self,
        plaintext: &[u8],
        policy: AccessPolicyRef,
        meta: ContentMeta,
    ) -> Result<ContentRecord> {
        let resolved = self.resolve_policy(&policy).await?;
        debug!(policy = policy.kind(), policy_owner = %resolved.owner(), "resolved upload policy");

        let owner = self.wallet.address();
        let now = self.clock.now_unix();
        let threshold = self.config.threshold;

        let key = ContentKey::generate();
        let ciphertext = seal_content(plaintext, &key)?;
        let content_id = ContentRecord::derive_id(&owner, now, &policy, &ciphertext)?;
        let shares = split(&key, self.custodians.len(), usize::from(threshold))?;

        let mut tasks = JoinSet::new();
        for (client, share) in self.custodians.iter().zip(shares) {
            let request = CustodianRequest::StoreShare {
                content_id,
                share,
                policy,
                owner,
            };
            tasks.spawn(call_custodian(
                Arc::clone(client),
                request,
                self.config.custodian_timeout,
            ));
        }

        let mut pending = self.custodian_ids();
        let mut accepted = Vec::new();
        // Custodians whose call failed after the request may have landed.
        let mut uncertain = Vec::new();
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (custodian, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(content_id = %content_id, error = %e, "share dispatch task failed");
                    continue;
                }
            };
            pending.retain(|id| id != &custodian);
            match result {
                Ok(CustodianResponse::Stored) => accepted.push(custodian),
                Ok(CustodianResponse::Error { code, message }) => {
                    failures.push((custodian, format!("{:?}: {}", code, message)))
                }
                Ok(other) => {
                    failures.push((custodian, format!("unexpected response: {:?}", other)))
                }
                Err(e) => {
                    failures.push((custodian.clone(), e.to_string()));
                    uncertain.push(custodian);
                }
            }
        }
        for custodian in pending {
            failures.push((custodian.clone(), UNREPORTED.to_string()));
            uncertain.push(custodian);
        }

        if !failures.is_empty() {
            warn!(content_id = %content_id, failed = failures.len(), "share dispatch failed, rolling back");
            let targets: Vec<CustodianId> = accepted.into_iter().chain(uncertain).collect();
            let orphaned = self.rollback(&content_id, &targets).await;
            return Err(SealError::UploadFailed {
                content_id,
                failures,
                orphaned,
            });
        }

        let record = ContentRecord {
            id: content_id,
            ciphertext,
            mime_type: meta.mime_type,
            size_bytes: plaintext.len() as u64,
            owner,
            created_at: now,
            policy,
            title: meta.title,
            description: meta.description,
            custodians: self.custodian_ids(),
            threshold,
        };

        let stored = match self.content.put(&record).await {
            Ok(InsertResult::Inserted) | Ok(InsertResult::AlreadyExists) => Ok(()),
            Ok(InsertResult::Conflict) => Err(SealError::Store(StoreError::InvalidData(format!(
                "a different record already exists under {}",
                content_id
            )))),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = stored {
            warn!(content_id = %content_id, error = %e, "publishing record failed, rolling back");
            let orphaned = self.rollback(&content_id, &accepted).await;
            return Err(SealError::PublishFailed {
                content_id,
                source: Box::new(e),
                orphaned,
            });
        }

        info!(
            content_id = %content_id,
            policy = policy.kind(),
            custodians = record.custodians.len(),
            threshold,
            "uploaded content"
        );
        Ok(record)
    }

    /// Ask each custodian in `targets` to drop its share. Returns the ones
    /// that could not be told.
    async fn rollback(&self, content_id: &ContentId, targets: &[CustodianId]) -> Vec<CustodianId> {
        if targets.is_empty() {
            return Vec::new();
        }

        let proof = match IdentityProof::create(
            self.wallet.as_ref(),
            *content_id,
            ProofPurpose::Discard,
            self.clock.now_unix(),
            [0u8; 32],
        ) {
            Ok(proof) => proof,
            Err(e) => {
                warn!(content_id = %content_id, error = %e, "could not sign discard request");
                return targets.to_vec();
            }
        };

        // Anything not confirmed discarded stays orphaned.
        let mut orphaned = targets.to_vec();
        let mut tasks = JoinSet::new();
        for id in targets {
            let Some(client) = self.custodian(id) else {
                continue;
            };
            let request = CustodianRequest::DiscardShare {
                content_id: *content_id,
                proof: proof.clone(),
            };
            tasks.spawn(call_custodian(
                Arc::clone(client),
                request,
                self.config.custodian_timeout,
            ));
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(CustodianResponse::Discarded))) => {
                    debug!(custodian = %id, content_id = %content_id, "discarded share");
                    orphaned.retain(|o| o != &id);
                }
                Ok((id, other)) => {
                    warn!(custodian = %id, content_id = %content_id, outcome = ?other, "discard failed")
                }
                Err(e) => warn!(content_id = %content_id, error = %e, "discard task failed"),
            }
        }
        orphaned
    }

    async fn resolve_policy(&self, policy: &AccessPolicyRef) -> Result<AccessPolicy> {
        self.ledger
            .resolve(policy)
            .await?
            .ok_or_else(|| SealError::PolicyNotFound(format!("{:?}", policy)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Access
    // ─────────────────────────────────────────────────────────────────────────

    /// Recover the plaintext of `content_id` if enough custodians grant.
    pub async fn access(&self, content_id: &ContentId) -> Result<Vec<u8>> {
        let record = self
            .content
            .get(content_id)
            .await?
            .ok_or(SealError::ContentNotFound(*content_id))?;
        let needed = usize::from(record.threshold);

        let session = SessionSecret::generate();
        let proof = IdentityProof::create(
            self.wallet.as_ref(),
            *content_id,
            ProofPurpose::Access,
            self.clock.now_unix(),
            *session.public_key().as_bytes(),
        )?;

        let mut tally = Tally::default();
        let mut tasks = JoinSet::new();
        for id in &record.custodians {
            let Some(client) = self.custodian(id) else {
                tally.unreachable.push((id.clone(), "no client configured".into()));
                continue;
            };
            let request = CustodianRequest::RequestShare {
                content_id: *content_id,
                proof: proof.clone(),
            };
            tasks.spawn(call_custodian(
                Arc::clone(client),
                request,
                self.config.custodian_timeout,
            ));
        }

        let mut pending: Vec<CustodianId> = record
            .custodians
            .iter()
            .filter(|id| self.custodian(id).is_some())
            .cloned()
            .collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((custodian, result)) => {
                    pending.retain(|id| id != &custodian);
                    tally.record(custodian, result);
                }
                Err(e) => warn!(content_id = %content_id, error = %e, "share request task failed"),
            }
            if tally.granted.len() >= needed {
                break;
            }
        }
        // Quorum reached or everyone answered; nothing left to wait for.
        tasks.abort_all();
        if tally.granted.len() < needed {
            for custodian in pending {
                tally.unreachable.push((custodian, UNREPORTED.to_string()));
            }
        }

        debug!(
            content_id = %content_id,
            granted = tally.granted.len(),
            denied = tally.denied.len(),
            rejected = tally.rejected.len(),
            unreachable = tally.unreachable.len(),
            "custodian responses"
        );

        if tally.granted.len() < needed {
            let err = tally.into_error(*content_id, needed);
            info!(content_id = %content_id, error = %err, "access refused");
            return Err(err);
        }

        let shares = tally
            .granted
            .iter()
            .map(|(_, wrapped)| wrapped.unwrap(&session, content_id))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let key = combine(&shares, needed)?;
        let plaintext = open_content(&record.ciphertext, &key)?;

        info!(content_id = %content_id, size = plaintext.len(), "access granted");
        Ok(plaintext)
    }

    /// Content records uploaded by this client's identity.
    pub async fn my_content(&self) -> Result<Vec<ContentRecord>> {
        Ok(self.content.list_by_owner(&self.wallet.address()).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ledger conveniences
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn create_allowlist(&self, name: &str) -> Result<Allowlist> {
        let list = self
            .ledger
            .create_allowlist(self.wallet.address(), name, self.clock.now_unix())
            .await?;
        info!(allowlist = %list.id, name, "created allowlist");
        Ok(list)
    }

    pub async fn add_member(&self, allowlist: &AllowlistId, member: Identity) -> Result<Allowlist> {
        Ok(self
            .ledger
            .add_member(&self.wallet.address(), allowlist, member)
            .await?)
    }

    pub async fn remove_member(
        &self,
        allowlist: &AllowlistId,
        member: &Identity,
    ) -> Result<Allowlist> {
        Ok(self
            .ledger
            .remove_member(&self.wallet.address(), allowlist, member)
            .await?)
    }

    pub async fn create_subscription_service(
        &self,
        name: &str,
        price: u64,
        duration_secs: u64,
    ) -> Result<SubscriptionService> {
        let service = self
            .ledger
            .create_subscription_service(
                self.wallet.address(),
                name,
                price,
                duration_secs,
                self.clock.now_unix(),
            )
            .await?;
        info!(service = %service.id, name, price, duration_secs, "created subscription service");
        Ok(service)
    }

    /// Buy access to `service`, paying `payment`.
    pub async fn purchase_subscription(
        &self,
        service: &ServiceId,
        payment: u64,
    ) -> Result<SubscriptionGrant> {
        Ok(self
            .ledger
            .purchase_subscription(self.wallet.address(), service, payment, self.clock.now_unix())
            .await?)
    }
}

/// Call one custodian under a deadline. A missed deadline is a timeout,
/// never a denial.
async fn call_custodian(
    client: Arc<dyn CustodianClient>,
    request: CustodianRequest,
    deadline: Duration,
) -> (CustodianId, std::result::Result<CustodianResponse, TransportError>) {
    let id = client.custodian_id().clone();
    let result = match tokio::time::timeout(deadline, client.call(request)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(id.clone())),
    };
    (id, result)
}

const UNREPORTED: &str = "call did not complete";
const SHARE_MISSING: &str = "custodian holds no share for this content";

/// Per-custodian outcomes of one access attempt.
#[derive(Default)]
struct Tally {
    granted: Vec<(CustodianId, WrappedShare)>,
    denied: Vec<(CustodianId, DenyReason)>,
    rejected: Vec<(CustodianId, String)>,
    unreachable: Vec<(CustodianId, String)>,
}

impl Tally {
    fn record(
        &mut self,
        custodian: CustodianId,
        result: std::result::Result<CustodianResponse, TransportError>,
    ) {
        match result {
            Ok(CustodianResponse::Release(ReleaseStatus::Granted(wrapped))) => {
                self.granted.push((custodian, wrapped))
            }
            // The record exists, so a custodian without its share is broken,
            // not refusing.
            Ok(CustodianResponse::Release(ReleaseStatus::Denied(
                DenyReason::ContentNotFound,
            ))) => self.unreachable.push((custodian, SHARE_MISSING.to_string())),
            Ok(CustodianResponse::Release(ReleaseStatus::Denied(reason))) => {
                self.denied.push((custodian, reason))
            }
            Ok(CustodianResponse::Release(ReleaseStatus::Rejected(RejectReason::BadProof(
                reason,
            )))) => self.rejected.push((custodian, reason)),
            Ok(CustodianResponse::Error { code, message }) => self
                .unreachable
                .push((custodian, format!("{:?}: {}", code, message))),
            Ok(other) => self
                .unreachable
                .push((custodian, format!("unexpected response: {:?}", other))),
            Err(e) => self.unreachable.push((custodian, e.to_string())),
        }
    }

    /// Classify a failed access.
    ///
    /// If the custodians that could not answer might have made up the
    /// quorum, the outcome is unknown and reported as infrastructure
    /// failure. Otherwise it is a policy or proof refusal.
    fn into_error(self, content_id: ContentId, needed: usize) -> SealError {
        let granted = self.granted.len();
        let undecided = self.unreachable.len();
        let nobody_refused = self.denied.is_empty() && self.rejected.is_empty();

        if undecided > 0 && (granted + undecided >= needed || nobody_refused) {
            SealError::PartialInfrastructureFailure {
                content_id,
                granted,
                needed,
                unreachable: self.unreachable,
            }
        } else if self.denied.is_empty() && !self.rejected.is_empty() {
            SealError::ProofRejected {
                content_id,
                reasons: self.rejected,
            }
        } else {
            SealError::AccessDenied {
                content_id,
                granted,
                needed,
                denials: self.denied,
            }
        }
    }
}
