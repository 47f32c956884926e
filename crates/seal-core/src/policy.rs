//! Access policies: allowlists and time-bound subscriptions.
//!
//! These are the records the policy ledger holds. Seal never mutates them
//! itself; the types here carry the invariants every ledger must uphold.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::crypto::Identity;
use crate::types::{AllowlistId, ServiceId};

/// The policy a content item is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessPolicyRef {
    /// Access requires membership in an allowlist.
    Allowlist(AllowlistId),
    /// Access requires an active grant for a subscription service.
    Subscription(ServiceId),
}

impl AccessPolicyRef {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AccessPolicyRef::Allowlist(_) => "allowlist",
            AccessPolicyRef::Subscription(_) => "subscription",
        }
    }
}

/// A resolved access policy object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessPolicy {
    Allowlist(Allowlist),
    Subscription(SubscriptionService),
}

impl AccessPolicy {
    /// The identity that owns the policy object.
    pub fn owner(&self) -> Identity {
        match self {
            AccessPolicy::Allowlist(list) => list.owner,
            AccessPolicy::Subscription(service) => service.owner,
        }
    }
}

/// A named set of identities allowed to read content bound to it.
///
/// The owner is always implicitly a member: [`Allowlist::contains`] answers
/// `true` for the owner regardless of `members`, and
/// [`Allowlist::remove_member`] refuses to drop the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowlist {
    pub id: AllowlistId,
    pub name: String,
    pub owner: Identity,
    pub members: BTreeSet<Identity>,
    /// Creation time (Unix seconds).
    pub created_at: u64,
}

impl Allowlist {
    /// Create an allowlist seeded with its owner.
    pub fn new(id: AllowlistId, name: impl Into<String>, owner: Identity, created_at: u64) -> Self {
        let mut members = BTreeSet::new();
        members.insert(owner);
        Self {
            id,
            name: name.into(),
            owner,
            members,
            created_at,
        }
    }

    /// Whether `identity` may read content bound to this allowlist.
    pub fn contains(&self, identity: &Identity) -> bool {
        *identity == self.owner || self.members.contains(identity)
    }

    /// Add a member. Returns `false` if it was already present.
    pub fn add_member(&mut self, member: Identity) -> bool {
        self.members.insert(member)
    }

    /// Remove a member. The owner is never removed.
    ///
    /// Returns `true` if a member was actually removed.
    pub fn remove_member(&mut self, member: &Identity) -> bool {
        if *member == self.owner {
            return false;
        }
        self.members.remove(member)
    }
}

/// A paid, time-bound subscription offering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionService {
    pub id: ServiceId,
    pub name: String,
    pub owner: Identity,
    /// Price in minor currency units.
    pub price: u64,
    /// How long a purchased grant stays active, in seconds.
    pub duration_secs: u64,
    /// Creation time (Unix seconds).
    pub created_at: u64,
}

impl SubscriptionService {
    /// The grant a purchase at `now` produces.
    pub fn grant_for(&self, subscriber: Identity, now: u64) -> SubscriptionGrant {
        SubscriptionGrant {
            service_id: self.id,
            subscriber,
            purchased_at: now,
            expires_at: now.saturating_add(self.duration_secs),
        }
    }
}

/// A subscriber's purchased access window for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionGrant {
    pub service_id: ServiceId,
    pub subscriber: Identity,
    /// Unix seconds.
    pub purchased_at: u64,
    /// Unix seconds, exclusive.
    pub expires_at: u64,
}

impl SubscriptionGrant {
    /// Valid iff `purchased_at <= now < expires_at`. No grace window.
    pub fn is_active_at(&self, now: u64) -> bool {
        self.purchased_at <= now && now < self.expires_at
    }
}
