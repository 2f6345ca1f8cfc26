use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

use crate::core_types::NATIVE_ASSET_SENTINEL;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub enable_tracing: bool,
    pub engine: EngineConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default = "default_tokens")]
    pub tokens: Vec<TokenConfig>,
    #[serde(default)]
    pub staking: StakingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EngineConfig {
    pub url: String,
    /// Overridden by `ENGINE_ACCESS_TOKEN` when set
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_engine_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_engine_timeout_ms() -> u64 {
    30_000
}

/// Budget for one tracking phase
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    pub poll_interval_ms: u64,
    pub max_pending_retries: u32,
    pub max_error_retries: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TrackingConfig {
    pub foreground: PolicyConfig,
    pub background: PolicyConfig,
    pub max_concurrent_background: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            foreground: PolicyConfig {
                poll_interval_ms: 5_000,
                max_pending_retries: 3,
                max_error_retries: 3,
            },
            background: PolicyConfig {
                poll_interval_ms: 5_000,
                max_pending_retries: 100,
                max_error_retries: 100,
            },
            max_concurrent_background: 64,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenConfig {
    pub symbol: String,
    pub chain_id: String,
    pub contract: String,
}

pub(crate) fn default_tokens() -> Vec<TokenConfig> {
    let token = |symbol: &str, chain_id: &str, contract: &str| TokenConfig {
        symbol: symbol.to_string(),
        chain_id: chain_id.to_string(),
        contract: contract.to_string(),
    };
    vec![
        token("ETH", "1", NATIVE_ASSET_SENTINEL),
        token("SWELL", "1", "0x0a6E7Ba5042B38349e437ec6Db6214AEC7B35676"),
        token("RSWETH", "1", "0xFAe103DC9cf190eD75350761e95403b7b8aFa6c0"),
        token("DAGRI", "1923", "0x10fB9F8c0D73140b8Ec250ec3B0eE5B79A4457e6"),
    ]
}

/// Liquid staking contract
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StakingConfig {
    pub chain_id: String,
    pub contract: String,
    pub deposit_function: String,
    /// Optional contract ABI forwarded to the engine
    #[serde(default)]
    pub abi: Option<serde_json::Value>,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            chain_id: "1".to_string(),
            contract: "0xFAe103DC9cf190eD75350761e95403b7b8aFa6c0".to_string(),
            deposit_function: "function deposit()".to_string(),
            abi: None,
        }
    }
}

impl AppConfig {
    /// Load `config/<env>.yaml`, then apply environment overrides
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
            path: config_path.clone(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&content)?;

        if let Ok(url) = std::env::var("ENGINE_URL") {
            config.engine.url = url;
        }
        if let Ok(token) = std::env::var("ENGINE_ACCESS_TOKEN") {
            config.engine.access_token = token;
        }

        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let tracking = &self.tracking;
        if tracking.max_concurrent_background == 0 {
            return Err(ConfigError::Invalid(
                "tracking.max_concurrent_background must be > 0".to_string(),
            ));
        }
        if tracking.foreground.max_pending_retries == 0
            || tracking.background.max_pending_retries == 0
        {
            return Err(ConfigError::Invalid(
                "max_pending_retries must be > 0".to_string(),
            ));
        }
        // Counters carry over on escalation, so an equal budget leaves the
        // background nothing to spend
        if tracking.background.max_pending_retries <= tracking.foreground.max_pending_retries
            || tracking.background.max_error_retries <= tracking.foreground.max_error_retries
        {
            return Err(ConfigError::Invalid(
                "background budget must be larger than foreground budget".to_string(),
            ));
        }
        Ok(())
    }
}
