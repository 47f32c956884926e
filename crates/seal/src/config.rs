//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use seal_core::ProofConfig;
use seal_shares::MAX_SHARES;

use crate::error::{Result, SealError};

/// Configuration for a [`SealClient`](crate::SealClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Shares needed to recover a content key.
    pub threshold: u8,
    /// Deadline for each individual custodian call.
    pub custodian_timeout: Duration,
    /// Freshness window the client expects custodians to apply.
    pub proof: ProofConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            threshold: 2,
            custodian_timeout: Duration::from_secs(5),
            proof: ProofConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Check the configuration against a custodian set of size `custodians`.
    pub fn validate(&self, custodians: usize) -> Result<()> {
        if self.threshold == 0 {
            return Err(SealError::InvalidConfig("threshold must be at least 1".into()));
        }
        if custodians > MAX_SHARES {
            return Err(SealError::InvalidConfig(format!(
                "at most {} custodians are supported, got {}",
                MAX_SHARES, custodians
            )));
        }
        if usize::from(self.threshold) > custodians {
            return Err(SealError::InvalidConfig(format!(
                "threshold {} exceeds custodian count {}",
                self.threshold, custodians
            )));
        }
        if self.custodian_timeout.is_zero() {
            return Err(SealError::InvalidConfig("custodian timeout must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_two_of_two() {
        let config = ClientConfig::default();
        assert_eq!(config.threshold, 2);
        assert!(config.validate(2).is_ok());
        assert!(config.validate(3).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let mut config = ClientConfig::default();
        assert!(matches!(config.validate(1), Err(SealError::InvalidConfig(_))));

        config.threshold = 0;
        assert!(matches!(config.validate(3), Err(SealError::InvalidConfig(_))));

        config.threshold = 2;
        assert!(matches!(config.validate(MAX_SHARES + 1), Err(SealError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ClientConfig {
            custodian_timeout: Duration::ZERO,
            ..ClientConfig::default()
        };
        assert!(config.validate(2).is_err());
    }
}
