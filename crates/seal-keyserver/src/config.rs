//! Custodian configuration.

use serde::{Deserialize, Serialize};

use seal_core::ProofConfig;

/// Default frame size limit: 1 MiB.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Configuration for a key-release service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyServerConfig {
    /// Freshness window applied to every proof.
    pub proof: ProofConfig,
    /// Frames larger than this are refused without decoding.
    pub max_frame_bytes: usize,
}

impl Default for KeyServerConfig {
    fn default() -> Self {
        Self {
            proof: ProofConfig::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}
