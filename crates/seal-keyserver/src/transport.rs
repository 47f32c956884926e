//! Transport abstraction for reaching custodians.
//!
//! The orchestrator only ever talks to custodians through
//! [`CustodianClient`]. Implementations may use HTTP, gRPC or anything
//! else that can carry a request frame and return a response frame.

use async_trait::async_trait;

use seal_core::CustodianId;

use crate::error::TransportError;
use crate::messages::{CustodianRequest, CustodianResponse};

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// A handle on one remote custodian.
///
/// Implementations must be thread-safe (Send + Sync). A call carries no
/// deadline of its own; callers wrap it in whatever timeout they need.
#[async_trait]
pub trait CustodianClient: Send + Sync {
    /// Name of the custodian behind this handle.
    fn custodian_id(&self) -> &CustodianId;

    /// Send one request and wait for its response.
    async fn call(&self, request: CustodianRequest) -> Result<CustodianResponse>;
}

/// An in-process custodian network for testing and demos.
///
/// Each custodian runs as its own tokio task and is reached over a
/// channel carrying encoded frames, so requests go through the same codec
/// a networked deployment would use.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::{mpsc, oneshot, RwLock};
    use tokio::task::JoinHandle;
    use tracing::{debug, warn};

    use crate::messages::{decode_frame, encode_frame};
    use crate::server::KeyServer;

    /// An encoded request and where to send the encoded reply.
    type Call = (Vec<u8>, oneshot::Sender<Vec<u8>>);

    /// Registry of in-process custodians.
    pub struct MemoryNetwork {
        clients: RwLock<HashMap<CustodianId, MemoryCustodianClient>>,
    }

    impl MemoryNetwork {
        /// Create a new, empty network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Start a custodian task for `server` and return a client for it.
        pub async fn spawn_custodian(self: &Arc<Self>, server: Arc<KeyServer>) -> MemoryCustodianClient {
            let (tx, mut rx) = mpsc::channel::<Call>(256);
            let id = server.id().clone();
            let max_frame_bytes = server.config().max_frame_bytes;

            let task = tokio::spawn({
                let id = id.clone();
                async move {
                    while let Some((frame, reply)) = rx.recv().await {
                        let server = Arc::clone(&server);
                        let id = id.clone();
                        tokio::spawn(async move {
                            match server.handle_frame(&frame).await {
                                Ok(bytes) => {
                                    // The caller may have given up waiting.
                                    let _ = reply.send(bytes);
                                }
                                Err(e) => warn!(custodian = %id, error = %e, "failed to encode response"),
                            }
                        });
                    }
                    debug!(custodian = %id, "custodian task stopped");
                }
            });

            let client = MemoryCustodianClient {
                id: id.clone(),
                sender: tx,
                task: Arc::new(task),
                max_frame_bytes,
            };
            self.clients.write().await.insert(id, client.clone());
            client
        }

        /// Look up the client for a spawned custodian.
        pub async fn client(&self, id: &CustodianId) -> Option<MemoryCustodianClient> {
            self.clients.read().await.get(id).cloned()
        }

        /// Stop a custodian's task. Later calls to it fail as unreachable.
        pub async fn disconnect(&self, id: &CustodianId) -> bool {
            match self.clients.read().await.get(id) {
                Some(client) => {
                    client.abort();
                    true
                }
                None => false,
            }
        }

        /// Names of all spawned custodians, sorted.
        pub async fn custodians(&self) -> Vec<CustodianId> {
            let mut ids: Vec<_> = self.clients.read().await.keys().cloned().collect();
            ids.sort();
            ids
        }
    }

    impl Default for MemoryNetwork {
        fn default() -> Self {
            Self {
                clients: RwLock::new(HashMap::new()),
            }
        }
    }

    /// Client side of an in-process custodian.
    #[derive(Clone)]
    pub struct MemoryCustodianClient {
        id: CustodianId,
        sender: mpsc::Sender<Call>,
        task: Arc<JoinHandle<()>>,
        max_frame_bytes: usize,
    }

    impl MemoryCustodianClient {
        /// Kill the custodian task, as if the process crashed.
        pub fn abort(&self) {
            self.task.abort();
        }
    }

    impl std::fmt::Debug for MemoryCustodianClient {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MemoryCustodianClient")
                .field("id", &self.id)
                .finish_non_exhaustive()
        }
    }

    #[async_trait]
    impl CustodianClient for MemoryCustodianClient {
        fn custodian_id(&self) -> &CustodianId {
            &self.id
        }

        async fn call(&self, request: CustodianRequest) -> Result<CustodianResponse> {
            let frame = encode_frame(&request).map_err(|e| TransportError::Codec(e.to_string()))?;
            let (tx, rx) = oneshot::channel();

            self.sender
                .send((frame, tx))
                .await
                .map_err(|_| TransportError::Unreachable(self.id.clone()))?;
            let reply = rx
                .await
                .map_err(|_| TransportError::Unreachable(self.id.clone()))?;

            decode_frame(&reply, self.max_frame_bytes)
                .map_err(|e| TransportError::Codec(e.to_string()))
        }
    }
}
