//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY_MS};
use crate::errors::{Error, Result};

/// Tunables of the sync engine.
///
/// Deserializes from the host's camelCase settings object, e.g.
/// `{"retryDelayMs": 500, "maxRetryAttempts": 10}`. Missing keys fall back
/// to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Fixed delay between two presentation retries (default: 500)
    pub retry_delay_ms: u64,

    /// Retries attempted before a deferred update is dropped (default: 10)
    pub max_retry_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
        }
    }
}

impl SyncConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.retry_delay_ms == 0 {
            return Err(Error::InvalidConfigValue(
                "retryDelayMs must be greater than zero".to_string(),
            ));
        }
        if self.max_retry_attempts == 0 {
            return Err(Error::InvalidConfigValue(
                "maxRetryAttempts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.retry_delay_ms, 500);
        assert_eq!(config.max_retry_attempts, 10);
        assert_eq!(config.retry_delay(), Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: SyncConfig = serde_json::from_str(r#"{"maxRetryAttempts": 3}"#).unwrap();
        assert_eq!(config.retry_delay_ms, 500);
        assert_eq!(config.max_retry_attempts, 3);
    }

    #[test]
    fn test_config_rejects_zero_values() {
        let config = SyncConfig {
            retry_delay_ms: 0,
            ..SyncConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfigValue(_))
        ));

        let config = SyncConfig {
            max_retry_attempts: 0,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
