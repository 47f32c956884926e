//! The policy ledger: the authoritative store of allowlists and
//! subscriptions.
//!
//! Seal only reads the ledger when deciding access. Writes go through the
//! same trait so that owners can manage their policy objects; every write
//! checks that the caller owns the object it touches.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::debug;

use seal_core::{
    AccessPolicy, AccessPolicyRef, Allowlist, AllowlistId, Identity, ServiceId,
    SubscriptionGrant, SubscriptionService,
};

use crate::error::{LedgerError, LedgerResult};

/// Read and write access to policy objects.
#[async_trait]
pub trait PolicyLedger: Send + Sync {
    /// Look up an allowlist.
    async fn get_allowlist(&self, id: &AllowlistId) -> LedgerResult<Option<Allowlist>>;

    /// Look up a subscription service.
    async fn get_subscription_service(
        &self,
        id: &ServiceId,
    ) -> LedgerResult<Option<SubscriptionService>>;

    /// The latest grant `subscriber` holds for `service`, active or not.
    async fn get_subscription_grant(
        &self,
        service: &ServiceId,
        subscriber: &Identity,
    ) -> LedgerResult<Option<SubscriptionGrant>>;

    /// Resolve a policy reference to the object it names.
    async fn resolve(&self, policy: &AccessPolicyRef) -> LedgerResult<Option<AccessPolicy>> {
        Ok(match policy {
            AccessPolicyRef::Allowlist(id) => {
                self.get_allowlist(id).await?.map(AccessPolicy::Allowlist)
            }
            AccessPolicyRef::Subscription(id) => self
                .get_subscription_service(id)
                .await?
                .map(AccessPolicy::Subscription),
        })
    }

    /// Create an allowlist owned by `owner`, with the owner as first member.
    async fn create_allowlist(&self, owner: Identity, name: &str, now: u64)
        -> LedgerResult<Allowlist>;

    /// Add `member` to an allowlist. Idempotent. Owner only.
    async fn add_member(
        &self,
        caller: &Identity,
        id: &AllowlistId,
        member: Identity,
    ) -> LedgerResult<Allowlist>;

    /// Remove `member` from an allowlist. Owner only; the owner itself is
    /// never removed.
    async fn remove_member(
        &self,
        caller: &Identity,
        id: &AllowlistId,
        member: &Identity,
    ) -> LedgerResult<Allowlist>;

    /// Create a subscription service owned by `owner`.
    async fn create_subscription_service(
        &self,
        owner: Identity,
        name: &str,
        price: u64,
        duration_secs: u64,
        now: u64,
    ) -> LedgerResult<SubscriptionService>;

    /// Buy access to a service. The new grant replaces any previous one.
    async fn purchase_subscription(
        &self,
        buyer: Identity,
        service: &ServiceId,
        payment: u64,
        now: u64,
    ) -> LedgerResult<SubscriptionGrant>;
}

/// An in-process ledger for tests and demos.
pub struct MemoryLedger {
    inner: RwLock<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    allowlists: HashMap<AllowlistId, Allowlist>,
    services: HashMap<ServiceId, SubscriptionService>,
    grants: HashMap<(ServiceId, Identity), SubscriptionGrant>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LedgerState::default()),
        }
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, LedgerState>> {
        self.inner
            .read()
            .map_err(|_| LedgerError::Unavailable("ledger lock poisoned".into()))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, LedgerState>> {
        self.inner
            .write()
            .map_err(|_| LedgerError::Unavailable("ledger lock poisoned".into()))
    }

    /// Allowlists owned by `owner`, oldest first.
    pub fn allowlists_by_owner(&self, owner: &Identity) -> LedgerResult<Vec<Allowlist>> {
        let state = self.read()?;
        let mut lists: Vec<Allowlist> = state
            .allowlists
            .values()
            .filter(|l| l.owner == *owner)
            .cloned()
            .collect();
        lists.sort_by_key(|l| (l.created_at, l.id));
        Ok(lists)
    }

    /// Subscription services owned by `owner`, oldest first.
    pub fn services_by_owner(&self, owner: &Identity) -> LedgerResult<Vec<SubscriptionService>> {
        let state = self.read()?;
        let mut services: Vec<SubscriptionService> = state
            .services
            .values()
            .filter(|s| s.owner == *owner)
            .cloned()
            .collect();
        services.sort_by_key(|s| (s.created_at, s.id));
        Ok(services)
    }

    fn with_owned_allowlist<F>(
        &self,
        caller: &Identity,
        id: &AllowlistId,
        f: F,
    ) -> LedgerResult<Allowlist>
    where
        F: FnOnce(&mut Allowlist),
    {
        let mut state = self.write()?;
        let list = state
            .allowlists
            .get_mut(id)
            .ok_or(LedgerError::AllowlistNotFound(*id))?;
        if list.owner != *caller {
            return Err(LedgerError::NotOwner { caller: *caller });
        }
        f(&mut *list);
        Ok(list.clone())
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PolicyLedger for MemoryLedger {
    async fn get_allowlist(&self, id: &AllowlistId) -> LedgerResult<Option<Allowlist>> {
        Ok(self.read()?.allowlists.get(id).cloned())
    }

    async fn get_subscription_service(
        &self,
        id: &ServiceId,
    ) -> LedgerResult<Option<SubscriptionService>> {
        Ok(self.read()?.services.get(id).cloned())
    }

    async fn get_subscription_grant(
        &self,
        service: &ServiceId,
        subscriber: &Identity,
    ) -> LedgerResult<Option<SubscriptionGrant>> {
        Ok(self.read()?.grants.get(&(*service, *subscriber)).copied())
    }

    async fn create_allowlist(
        &self,
        owner: Identity,
        name: &str,
        now: u64,
    ) -> LedgerResult<Allowlist> {
        if name.trim().is_empty() {
            return Err(LedgerError::InvalidArgument("allowlist name is empty".into()));
        }

        let list = Allowlist::new(AllowlistId::random(), name, owner, now);
        self.write()?.allowlists.insert(list.id, list.clone());

        debug!(allowlist = %list.id, owner = %owner, "created allowlist");
        Ok(list)
    }

    async fn add_member(
        &self,
        caller: &Identity,
        id: &AllowlistId,
        member: Identity,
    ) -> LedgerResult<Allowlist> {
        let list = self.with_owned_allowlist(caller, id, |list| {
            list.add_member(member);
        })?;
        debug!(allowlist = %id, member = %member, "added allowlist member");
        Ok(list)
    }

    async fn remove_member(
        &self,
        caller: &Identity,
        id: &AllowlistId,
        member: &Identity,
    ) -> LedgerResult<Allowlist> {
        let list = self.with_owned_allowlist(caller, id, |list| {
            list.remove_member(member);
        })?;
        debug!(allowlist = %id, member = %member, "removed allowlist member");
        Ok(list)
    }

    async fn create_subscription_service(
        &self,
        owner: Identity,
        name: &str,
        price: u64,
        duration_secs: u64,
        now: u64,
    ) -> LedgerResult<SubscriptionService> {
        if name.trim().is_empty() {
            return Err(LedgerError::InvalidArgument("service name is empty".into()));
        }
        if duration_secs == 0 {
            return Err(LedgerError::InvalidArgument(
                "subscription duration must be positive".into(),
            ));
        }

        let service = SubscriptionService {
            id: ServiceId::random(),
            name: name.to_string(),
            owner,
            price,
            duration_secs,
            created_at: now,
        };
        self.write()?.services.insert(service.id, service.clone());

        debug!(service = %service.id, owner = %owner, price, duration_secs, "created subscription service");
        Ok(service)
    }

    async fn purchase_subscription(
        &self,
        buyer: Identity,
        service: &ServiceId,
        payment: u64,
        now: u64,
    ) -> LedgerResult<SubscriptionGrant> {
        let mut state = self.write()?;
        let offering = state
            .services
            .get(service)
            .ok_or(LedgerError::ServiceNotFound(*service))?;
        if payment < offering.price {
            return Err(LedgerError::InsufficientPayment {
                price: offering.price,
                paid: payment,
            });
        }

        let grant = offering.grant_for(buyer, now);
        state.grants.insert((*service, buyer), grant);
        drop(state);

        debug!(service = %service, subscriber = %buyer, expires_at = grant.expires_at, "purchased subscription");
        Ok(grant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seal_core::Keypair;

    #[tokio::test]
    async fn test_create_allowlist_seeds_owner() {
        let ledger = MemoryLedger::new();
        let owner = Keypair::generate().identity();

        let list = ledger.create_allowlist(owner, "friends", 100).await.unwrap();
        assert!(list.contains(&owner));
        assert_eq!(list.created_at, 100);

        let fetched = ledger.get_allowlist(&list.id).await.unwrap().unwrap();
        assert_eq!(fetched, list);
    }

    #[tokio::test]
    async fn test_only_owner_modifies_allowlist() {
        let ledger = MemoryLedger::new();
        let owner = Keypair::generate().identity();
        let stranger = Keypair::generate().identity();
        let list = ledger.create_allowlist(owner, "friends", 0).await.unwrap();

        let err = ledger.add_member(&stranger, &list.id, stranger).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotOwner { .. }));

        let updated = ledger.add_member(&owner, &list.id, stranger).await.unwrap();
        assert!(updated.contains(&stranger));

        let err = ledger
            .remove_member(&stranger, &list.id, &stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotOwner { .. }));
    }

    #[tokio::test]
    async fn test_add_member_idempotent_and_owner_kept() {
        let ledger = MemoryLedger::new();
        let owner = Keypair::generate().identity();
        let guest = Keypair::generate().identity();
        let list = ledger.create_allowlist(owner, "friends", 0).await.unwrap();

        ledger.add_member(&owner, &list.id, guest).await.unwrap();
        let again = ledger.add_member(&owner, &list.id, guest).await.unwrap();
        assert_eq!(again.members.len(), 2);

        let after = ledger.remove_member(&owner, &list.id, &owner).await.unwrap();
        assert!(after.contains(&owner));

        let after = ledger.remove_member(&owner, &list.id, &guest).await.unwrap();
        assert!(!after.contains(&guest));
    }

    #[tokio::test]
    async fn test_unknown_allowlist() {
        let ledger = MemoryLedger::new();
        let caller = Keypair::generate().identity();
        let id = AllowlistId::random();
        assert!(ledger.get_allowlist(&id).await.unwrap().is_none());
        assert!(matches!(
            ledger.add_member(&caller, &id, caller).await,
            Err(LedgerError::AllowlistNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_purchase_requires_price() {
        let ledger = MemoryLedger::new();
        let creator = Keypair::generate().identity();
        let buyer = Keypair::generate().identity();
        let service = ledger
            .create_subscription_service(creator, "weekly", 500, 3600, 0)
            .await
            .unwrap();

        assert!(matches!(
            ledger.purchase_subscription(buyer, &service.id, 499, 10).await,
            Err(LedgerError::InsufficientPayment { price: 500, paid: 499 })
        ));
        assert!(ledger
            .get_subscription_grant(&service.id, &buyer)
            .await
            .unwrap()
            .is_none());

        let grant = ledger
            .purchase_subscription(buyer, &service.id, 500, 10)
            .await
            .unwrap();
        assert_eq!(grant.purchased_at, 10);
        assert_eq!(grant.expires_at, 3610);
    }

    #[tokio::test]
    async fn test_repurchase_replaces_grant() {
        let ledger = MemoryLedger::new();
        let creator = Keypair::generate().identity();
        let buyer = Keypair::generate().identity();
        let service = ledger
            .create_subscription_service(creator, "daily", 1, 100, 0)
            .await
            .unwrap();

        ledger.purchase_subscription(buyer, &service.id, 1, 0).await.unwrap();
        ledger.purchase_subscription(buyer, &service.id, 1, 500).await.unwrap();

        let grant = ledger
            .get_subscription_grant(&service.id, &buyer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(grant.purchased_at, 500);
        assert!(grant.is_active_at(550));
    }

    #[tokio::test]
    async fn test_invalid_service_arguments() {
        let ledger = MemoryLedger::new();
        let creator = Keypair::generate().identity();
        assert!(matches!(
            ledger.create_subscription_service(creator, "x", 1, 0, 0).await,
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            ledger.create_subscription_service(creator, "  ", 1, 10, 0).await,
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            ledger.purchase_subscription(creator, &ServiceId::random(), 1, 0).await,
            Err(LedgerError::ServiceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_by_owner() {
        let ledger = MemoryLedger::new();
        let alice = Keypair::generate().identity();
        let bob = Keypair::generate().identity();

        ledger.create_allowlist(alice, "b", 20).await.unwrap();
        ledger.create_allowlist(alice, "a", 10).await.unwrap();
        ledger.create_allowlist(bob, "c", 5).await.unwrap();
        ledger
            .create_subscription_service(bob, "monthly", 10, 60, 0)
            .await
            .unwrap();

        let lists = ledger.allowlists_by_owner(&alice).unwrap();
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0].name, "a");
        assert_eq!(ledger.services_by_owner(&bob).unwrap().len(), 1);
        assert!(ledger.services_by_owner(&alice).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_policy_refs() {
        let ledger = MemoryLedger::new();
        let owner = Keypair::generate().identity();
        let list = ledger.create_allowlist(owner, "friends", 0).await.unwrap();
        let service = ledger
            .create_subscription_service(owner, "monthly", 500, 3600, 0)
            .await
            .unwrap();

        let resolved = ledger.resolve(&AccessPolicyRef::Allowlist(list.id)).await.unwrap();
        assert_eq!(resolved, Some(AccessPolicy::Allowlist(list)));

        let resolved = ledger
            .resolve(&AccessPolicyRef::Subscription(service.id))
            .await
            .unwrap();
        assert_eq!(resolved.map(|p| p.owner()), Some(owner));

        let missing = AccessPolicyRef::Allowlist(AllowlistId::random());
        assert_eq!(ledger.resolve(&missing).await.unwrap(), None);
    }
}
