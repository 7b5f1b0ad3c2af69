//! Engine configuration.
//!
//! Every field has a default, so an empty TOML file (or none at all) yields
//! a working configuration. CLI flags override what the file sets.

use std::path::Path;
use std::time::Duration;

use hoist_core::Wei;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Blocks (including the inclusion block) before a receipt counts.
    pub required_confirmations: u64,
    /// Milliseconds a transaction may stay pending before its fees are bumped.
    pub time_before_bumping_fees: u64,
    pub max_fee_bumps: u32,
    pub fee_bump_percent: u32,
    /// Upper bound for `maxFeePerGas` / `gasPrice`, as a decimal string.
    pub max_fee_per_gas_cap: Option<Wei>,
    /// Milliseconds between two polls of a pending transaction.
    pub block_polling_interval: u64,
    /// Futures of one batch processed at the same time.
    pub max_concurrency: usize,
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            required_confirmations: 5,
            time_before_bumping_fees: 180_000,
            max_fee_bumps: 4,
            fee_bump_percent: 10,
            max_fee_per_gas_cap: None,
            block_polling_interval: 1_000,
            max_concurrency: 8,
            retry: RetryConfig::default(),
        }
    }
}

/// Backoff for transient RPC failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff: u64,
    pub max_backoff: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 4,
            initial_backoff: 250,
            max_backoff: 5_000,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<EngineConfig, EngineError> {
        let config: EngineConfig =
            toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<EngineConfig, EngineError> {
        let text = std::fs::read_to_string(path).map_err(|e| EngineError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.required_confirmations == 0 {
            return Err(EngineError::Config(
                "requiredConfirmations must be at least 1".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(EngineError::Config(
                "maxConcurrency must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(EngineError::Config(
                "retry.maxAttempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.block_polling_interval)
    }
}
