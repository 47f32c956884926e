//! Policy store adapter.
//!
//! Custodians answer two questions against the policy ledger: is this
//! identity on that allowlist, and does it hold an active subscription.
//! Both are re-asked on every request; nothing is cached, so the
//! staleness window is whatever the ledger itself lags.

use std::sync::Arc;

use async_trait::async_trait;

use seal_core::{AccessPolicyRef, AllowlistId, Identity, ServiceId};
use seal_store::{LedgerResult, PolicyLedger};

/// Read-only policy checks used by a custodian.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Whether `identity` is a member (or the owner) of `allowlist`.
    ///
    /// An unknown allowlist admits nobody.
    async fn is_allowlisted(&self, identity: &Identity, allowlist: &AllowlistId)
        -> LedgerResult<bool>;

    /// Whether `identity` holds a grant for `service` active at `now`.
    async fn has_active_subscription(
        &self,
        identity: &Identity,
        service: &ServiceId,
        now: u64,
    ) -> LedgerResult<bool>;

    /// Evaluate whichever check `policy` calls for.
    async fn satisfies(
        &self,
        identity: &Identity,
        policy: &AccessPolicyRef,
        now: u64,
    ) -> LedgerResult<bool> {
        match policy {
            AccessPolicyRef::Allowlist(id) => self.is_allowlisted(identity, id).await,
            AccessPolicyRef::Subscription(id) => {
                self.has_active_subscription(identity, id, now).await
            }
        }
    }
}

/// A [`PolicyStore`] reading straight from a [`PolicyLedger`].
#[derive(Clone)]
pub struct LedgerPolicyStore {
    ledger: Arc<dyn PolicyLedger>,
}

impl LedgerPolicyStore {
    pub fn new(ledger: Arc<dyn PolicyLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl PolicyStore for LedgerPolicyStore {
    async fn is_allowlisted(
        &self,
        identity: &Identity,
        allowlist: &AllowlistId,
    ) -> LedgerResult<bool> {
        Ok(self
            .ledger
            .get_allowlist(allowlist)
            .await?
            .is_some_and(|list| list.contains(identity)))
    }

    async fn has_active_subscription(
        &self,
        identity: &Identity,
        service: &ServiceId,
        now: u64,
    ) -> LedgerResult<bool> {
        Ok(self
            .ledger
            .get_subscription_grant(service, identity)
            .await?
            .is_some_and(|grant| grant.is_active_at(now)))
    }
}
