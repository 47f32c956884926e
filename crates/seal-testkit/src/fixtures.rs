//! Test fixtures and helpers.
//!
//! A [`TestNetwork`] is a complete deployment in one process: a policy
//! ledger, a content store, and N custodians, each with its own share
//! store and audit log, all reading time from one [`ManualClock`].

use std::sync::Arc;

use seal::{ClientConfig, SealClient};
use seal_core::{ContentId, CustodianId, Keypair, ManualClock};
use seal_keyserver::{
    CustodianClient, KeyServer, KeyServerConfig, LedgerPolicyStore, MemoryCustodianClient,
    MemoryNetwork,
};
use seal_store::{AuditLog, AuditRecord, MemoryLedger, MemoryStore, ShareStore};

/// One custodian in a [`TestNetwork`].
pub struct TestCustodian {
    pub id: CustodianId,
    /// Share store and audit log of this custodian.
    pub store: Arc<MemoryStore>,
    pub server: Arc<KeyServer>,
    pub client: MemoryCustodianClient,
}

/// An in-process deployment.
pub struct TestNetwork {
    pub clock: ManualClock,
    pub ledger: Arc<MemoryLedger>,
    pub network: Arc<MemoryNetwork>,
    /// The orchestrator's content store, shared by every client.
    pub content: Arc<MemoryStore>,
    pub custodians: Vec<TestCustodian>,
}

impl TestNetwork {
    /// Spawn `n` custodians named `ks-1` .. `ks-n` with default config.
    pub async fn new(n: usize) -> Self {
        Self::with_config(n, KeyServerConfig::default()).await
    }

    /// Spawn `n` custodians sharing one custodian config.
    pub async fn with_config(n: usize, config: KeyServerConfig) -> Self {
        let clock = ManualClock::default();
        let ledger = Arc::new(MemoryLedger::new());
        let network = MemoryNetwork::new();

        let mut custodians = Vec::with_capacity(n);
        for i in 1..=n {
            let id = CustodianId::new(format!("ks-{}", i));
            let store = Arc::new(MemoryStore::new());
            let server = Arc::new(KeyServer::new(
                id.clone(),
                store.clone(),
                store.clone(),
                Arc::new(LedgerPolicyStore::new(ledger.clone())),
                Arc::new(clock.clone()),
                config.clone(),
            ));
            let client = network.spawn_custodian(Arc::clone(&server)).await;
            custodians.push(TestCustodian {
                id,
                store,
                server,
                client,
            });
        }

        Self {
            clock,
            ledger,
            network,
            content: Arc::new(MemoryStore::new()),
            custodians,
        }
    }

    /// Clients for every custodian, in order.
    pub fn custodian_clients(&self) -> Vec<Arc<dyn CustodianClient>> {
        self.custodians
            .iter()
            .map(|c| Arc::new(c.client.clone()) as Arc<dyn CustodianClient>)
            .collect()
    }

    /// A client signing as `wallet`, using a quorum of every custodian.
    pub fn client(&self, wallet: Keypair) -> seal::Result<SealClient> {
        let config = ClientConfig {
            threshold: self.custodians.len().min(usize::from(u8::MAX)) as u8,
            ..ClientConfig::default()
        };
        self.client_with(wallet, self.custodian_clients(), config)
    }

    /// A client with an explicit custodian set and config.
    pub fn client_with(
        &self,
        wallet: Keypair,
        custodians: Vec<Arc<dyn CustodianClient>>,
        config: ClientConfig,
    ) -> seal::Result<SealClient> {
        SealClient::new(
            Arc::new(wallet),
            custodians,
            self.content.clone(),
            self.ledger.clone(),
            Arc::new(self.clock.clone()),
            config,
        )
    }

    /// Audit trail of custodian `index` for one content item.
    pub async fn audit(&self, index: usize, content_id: &ContentId) -> Vec<AuditRecord> {
        match self.custodians.get(index) {
            Some(c) => c.store.records_for(content_id).await.unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Whether custodian `index` currently holds a share for `content_id`.
    pub async fn holds_share(&self, index: usize, content_id: &ContentId) -> bool {
        match self.custodians.get(index) {
            Some(c) => matches!(c.store.get_share(content_id).await, Ok(Some(_))),
            None => false,
        }
    }
}

/// Deterministic wallets for multi-party tests.
pub fn wallets(count: usize) -> Vec<Keypair> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            seed[31] = 0x5e;
            Keypair::from_seed(&seed)
        })
        .collect()
}
