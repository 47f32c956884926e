//! Proptest generators for property-based testing.

use proptest::prelude::*;

use seal_core::{AccessPolicyRef, AllowlistId, ContentId, Identity, Keypair, ServiceId, Wallet};
use seal_shares::ContentKey;

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random identity.
pub fn identity() -> impl Strategy<Value = Identity> {
    keypair().prop_map(|kp| kp.address())
}

/// Generate a random ContentId.
pub fn content_id() -> impl Strategy<Value = ContentId> {
    any::<[u8; 32]>().prop_map(ContentId::from_bytes)
}

/// Generate a content key.
pub fn content_key() -> impl Strategy<Value = ContentKey> {
    any::<[u8; 32]>().prop_map(ContentKey::from_bytes)
}

/// Generate plaintext bytes up to `max_len`.
pub fn plaintext(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a policy reference of either kind.
pub fn policy_ref() -> impl Strategy<Value = AccessPolicyRef> {
    prop_oneof![
        any::<[u8; 32]>().prop_map(|b| AccessPolicyRef::Allowlist(AllowlistId::from_bytes(b))),
        any::<[u8; 32]>().prop_map(|b| AccessPolicyRef::Subscription(ServiceId::from_bytes(b))),
    ]
}

/// Share count and quorum for a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitParams {
    pub n: usize,
    pub quorum: usize,
}

impl Arbitrary for SplitParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (1usize..=16)
            .prop_flat_map(|n| (Just(n), 1usize..=n))
            .prop_map(|(n, quorum)| SplitParams { n, quorum })
            .boxed()
    }
}
