//! End-to-end walkthrough on an in-process custodian network.
//!
//! Runs an allowlist flow and a subscription flow against two custodians
//! with a 2-of-2 quorum. Set `RUST_LOG=seal::audit=info` to see every
//! custodian decision.

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::EnvFilter;

use seal::core::{AccessPolicyRef, CustodianId, Keypair, ManualClock, TimeProvider};
use seal::keyserver::{CustodianClient, KeyServer, KeyServerConfig, LedgerPolicyStore, MemoryNetwork};
use seal::store::{MemoryLedger, MemoryStore, PolicyLedger};
use seal::{ClientConfig, ContentMeta, SealClient, SealError, Wallet};

const CUSTODIANS: [&str; 2] = ["ks-1", "ks-2"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("seal=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let clock = ManualClock::default();
    let ledger = Arc::new(MemoryLedger::new());
    let network = MemoryNetwork::new();

    let mut custodians: Vec<Arc<dyn CustodianClient>> = Vec::new();
    for name in CUSTODIANS {
        let store = Arc::new(MemoryStore::new());
        let server = KeyServer::new(
            CustodianId::new(name),
            store.clone(),
            store,
            Arc::new(LedgerPolicyStore::new(ledger.clone())),
            Arc::new(clock.clone()),
            KeyServerConfig::default(),
        );
        custodians.push(Arc::new(network.spawn_custodian(Arc::new(server)).await));
    }

    let content = Arc::new(MemoryStore::new());
    let client_for = |wallet: Keypair| {
        SealClient::new(
            Arc::new(wallet),
            custodians.clone(),
            content.clone(),
            ledger.clone() as Arc<dyn PolicyLedger>,
            Arc::new(clock.clone()),
            ClientConfig::default(),
        )
    };

    let alice_key = Keypair::generate();
    let bob_key = Keypair::generate();
    let bob_id = bob_key.address();
    let alice = client_for(alice_key).context("alice client")?;
    let bob = client_for(bob_key).context("bob client")?;

    // Allowlist: bob is refused until alice adds him.
    let list = alice.create_allowlist("book club").await?;
    let record = alice
        .upload(
            b"chapter one",
            AccessPolicyRef::Allowlist(list.id),
            ContentMeta::titled("draft"),
        )
        .await?;

    match bob.access(&record.id).await {
        Err(SealError::AccessDenied { denials, .. }) => {
            info!(denials = denials.len(), "bob denied before being added")
        }
        other => bail!("expected denial, got {:?}", other.map(|p| p.len())),
    }

    alice.add_member(&list.id, bob_id).await?;
    let plaintext = bob.access(&record.id).await?;
    info!(plaintext = %String::from_utf8_lossy(&plaintext), "bob read the draft");

    // Subscription: access lasts exactly one hour from purchase.
    let service = alice
        .create_subscription_service("hourly pass", 1000, 3600)
        .await?;
    let premium = alice
        .upload(
            b"premium issue",
            AccessPolicyRef::Subscription(service.id),
            ContentMeta::titled("issue #1"),
        )
        .await?;

    let bought_at = clock.now_unix();
    bob.purchase_subscription(&service.id, 1000).await?;

    clock.set(bought_at + 3599);
    let plaintext = bob.access(&premium.id).await?;
    info!(plaintext = %String::from_utf8_lossy(&plaintext), "bob read within the hour");

    clock.set(bought_at + 3601);
    match bob.access(&premium.id).await {
        Err(SealError::AccessDenied { .. }) => info!("bob denied after expiry"),
        other => bail!("expected denial after expiry, got {:?}", other.map(|p| p.len())),
    }

    Ok(())
}
