//! Configuration management with validation and defaults

use crate::games::{Amount, MICROS_PER_CREDIT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level engine configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub server: ServerConfig,
    pub tables: TableConfig,
    pub identity: IdentityConfig,
    pub payments: PaymentConfig,
    pub monitoring: MonitoringConfig,
}

/// HTTP/WS server settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
    pub engine_id: String,
    pub network: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
            engine_id: "croupier-1".to_string(),
            network: "croupier-dev".to_string(),
        }
    }
}

/// Table limits and settlement retry policy
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub min_stake_micros: Amount,
    pub max_stake_micros: Amount,
    pub commit_attempts: u32,
    pub retry_backoff_ms: u64,
    pub feed_capacity: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            min_stake_micros: MICROS_PER_CREDIT / 10,
            max_stake_micros: 1_000 * MICROS_PER_CREDIT,
            commit_attempts: 3,
            retry_backoff_ms: 50,
            feed_capacity: 10,
        }
    }
}

/// Session issuance behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Issue sessions already verified (development mode)
    pub auto_verify: bool,
    /// Balance granted to new accounts, in micro-credits
    pub starting_balance_micros: Amount,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            auto_verify: false,
            starting_balance_micros: 0,
        }
    }
}

/// Payment provider settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    pub provider_base_url: String,
    pub currencies: Vec<String>,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            provider_base_url: "https://pay.example.test".to_string(),
            currencies: vec!["BTC".to_string(), "ETH".to_string(), "USDT".to_string()],
        }
    }
}

/// Logging and metrics settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enable_metrics: bool,
    pub log_filter: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
            log_filter: "croupier=info,tower_http=info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Development preset: auto-verified sessions and a faucet balance so
    /// local play works without a payment provider.
    pub fn development() -> Self {
        Self {
            identity: IdentityConfig {
                auto_verify: true,
                starting_balance_micros: 100 * MICROS_PER_CREDIT,
            },
            ..Default::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        let config: EngineConfig =
            toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tables.min_stake_micros == 0 {
            return Err(ConfigError::Invalid(
                "min_stake_micros must be > 0".to_string(),
            ));
        }
        if self.tables.max_stake_micros < self.tables.min_stake_micros {
            return Err(ConfigError::Invalid(
                "max_stake_micros must be >= min_stake_micros".to_string(),
            ));
        }
        if self.tables.commit_attempts == 0 {
            return Err(ConfigError::Invalid(
                "commit_attempts must be > 0".to_string(),
            ));
        }
        if self.tables.feed_capacity == 0 {
            return Err(ConfigError::Invalid(
                "feed_capacity must be > 0".to_string(),
            ));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.tables.retry_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("invalid configuration value: {0}")]
    Invalid(String),
}
