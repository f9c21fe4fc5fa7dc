//! Configuration module for the swap bundler
//!
//! Configuration is layered: TOML file, then environment variables (a `.env`
//! file is loaded first), then command-line flags applied by the binary.

use crate::swap_engine::EngineConfig;
use crate::tx_builder::{
    BundleConfig, PriorityFee, SimulationConfig, TransactionBuilderError, MAX_COMPUTE_UNIT_LIMIT,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rpc: RpcConfig,
    pub wallet: WalletConfig,
    pub relay: RelayConfig,
    pub quote: QuoteConfig,
    pub simulation: SimulationSettings,
    pub bundle: BundleSettings,
    pub fees: FeesConfig,
    pub engine: EngineSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Base58-encoded 64-byte secret key
    pub private_key: Option<String>,
}

impl fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletConfig")
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Block-engine base URL; `/api/v1/bundles` is appended
    pub base_url: String,
    pub timeout_secs: u64,

    /// Optional `x-jito-auth` value
    pub auth_uuid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteConfig {
    pub api_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub margin_percent: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleSettings {
    pub tip_lamports: u64,
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeesConfig {
    pub priority_fee_micro_lamports: u64,

    /// Used when neither simulation nor the quote suggests a limit
    pub fallback_compute_unit_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub max_batch_size: usize,
}

// Default value functions
fn default_timeout_secs() -> u64 { 30 }
fn default_relay_url() -> String { "https://mainnet.block-engine.jito.wtf".to_string() }
fn default_quote_url() -> String { "https://quote-api.jup.ag/v6".to_string() }
fn default_http_timeout_secs() -> u64 { 10 }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: default_relay_url(),
            timeout_secs: default_http_timeout_secs(),
            auth_uuid: None,
        }
    }
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            api_url: default_quote_url(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        let defaults = SimulationConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            retry_delay_ms: defaults.retry_delay_ms,
            margin_percent: defaults.margin_percent,
        }
    }
}

impl Default for BundleSettings {
    fn default() -> Self {
        let defaults = BundleConfig::default();
        Self {
            tip_lamports: defaults.tip_lamports,
            poll_attempts: defaults.poll_attempts,
            poll_interval_ms: defaults.poll_interval_ms,
        }
    }
}

impl Default for FeesConfig {
    fn default() -> Self {
        Self {
            priority_fee_micro_lamports: 0,
            fallback_compute_unit_limit: MAX_COMPUTE_UNIT_LIMIT,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self { max_batch_size: 4 }
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Defaults overlaid with environment variables, for runs without a file
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Overlay values from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("RPC_URL").or_else(|| non_empty("QUIKNODE_RPC")) {
            self.rpc.url = url;
        }
        if let Some(key) = non_empty("PRIVATE_KEY") {
            self.wallet.private_key = Some(key);
        }
        if let Some(url) = non_empty("JITO_BLOCK_ENGINE_URL") {
            self.relay.base_url = url;
        }
        if let Some(uuid) = non_empty("JITO_AUTH_UUID") {
            self.relay.auth_uuid = Some(uuid);
        }
        if let Some(url) = non_empty("JUPITER_API_URL") {
            self.quote.api_url = url;
        }
    }

    /// Reject configurations the pipeline cannot start with
    pub fn validate(&self) -> Result<(), TransactionBuilderError> {
        if self.rpc.url.trim().is_empty() {
            return Err(TransactionBuilderError::config("RPC URL is not set"));
        }
        if self
            .wallet
            .private_key
            .as_deref()
            .map_or(true, |k| k.trim().is_empty())
        {
            return Err(TransactionBuilderError::config("private key is not set"));
        }

        for (name, url) in [
            ("rpc.url", &self.rpc.url),
            ("relay.base_url", &self.relay.base_url),
            ("quote.api_url", &self.quote.api_url),
        ] {
            if !is_http_url(url) {
                return Err(TransactionBuilderError::config(format!(
                    "{} must be an http(s) URL, got '{}'",
                    name, url
                )));
            }
        }

        if self.simulation.max_attempts == 0 {
            return Err(TransactionBuilderError::config(
                "simulation.max_attempts must be at least 1",
            ));
        }
        if self.simulation.margin_percent < 100 {
            return Err(TransactionBuilderError::config(format!(
                "simulation.margin_percent must be at least 100, got {}",
                self.simulation.margin_percent
            )));
        }
        if self.engine.max_batch_size == 0 {
            return Err(TransactionBuilderError::config(
                "engine.max_batch_size must be at least 1",
            ));
        }
        if self.fees.fallback_compute_unit_limit == 0 {
            return Err(TransactionBuilderError::config(
                "fees.fallback_compute_unit_limit must be positive",
            ));
        }

        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            simulation: SimulationConfig {
                max_attempts: self.simulation.max_attempts,
                retry_delay_ms: self.simulation.retry_delay_ms,
                margin_percent: self.simulation.margin_percent,
            },
            bundle: BundleConfig {
                tip_lamports: self.bundle.tip_lamports,
                poll_attempts: self.bundle.poll_attempts,
                poll_interval_ms: self.bundle.poll_interval_ms,
            },
            priority_fee: PriorityFee::new(self.fees.priority_fee_micro_lamports),
            fallback_compute_unit_limit: self.fees.fallback_compute_unit_limit,
            max_batch_size: self.engine.max_batch_size,
        }
    }
}
