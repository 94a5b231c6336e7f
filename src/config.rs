//! Configuration module for the candymint client
//!
//! Handles configuration loading from TOML files with environment
//! variable overrides, and validation of the values the mint pipeline
//! cannot run without.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

use crate::error::MintError;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// RPC endpoint configuration
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Target candy machine
    #[serde(default)]
    pub machine: MachineConfig,

    /// Wallet configuration
    #[serde(default)]
    pub wallet: WalletConfig,

    /// Mint execution configuration
    #[serde(default)]
    pub mint: MintConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// RPC endpoint URL
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Candy machine account address (base58)
    ///
    /// Required; there is no sensible default. Validation surfaces an
    /// empty value as a user-facing configuration error.
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to keypair file
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintConfig {
    /// Ceiling on the finalized-confirmation wait, in seconds
    ///
    /// Expiry maps to `MintError::Timeout`; the transaction may still
    /// land after the ceiling.
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,
}

// Default value functions
fn default_rpc_endpoint() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}
fn default_rpc_timeout() -> u64 {
    30
}
fn default_keypair_path() -> String {
    "~/.config/solana/id.json".to_string()
}
fn default_confirm_timeout() -> u64 {
    120
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            timeout_secs: default_rpc_timeout(),
        }
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
        }
    }
}

impl Default for MintConfig {
    fn default() -> Self {
        Self {
            confirm_timeout_secs: default_confirm_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            machine: MachineConfig::default(),
            wallet: WalletConfig::default(),
            mint: MintConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, MintError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MintError::config(format!("failed to read {path}: {e}")))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| MintError::config(format!("failed to parse {path}: {e}")))?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    ///
    /// `.env` is honored if present. `CANDYMINT_RPC_URL`,
    /// `CANDYMINT_MACHINE_ADDRESS` and `CANDYMINT_KEYPAIR` override the
    /// file values.
    pub fn from_file_with_env(path: &str) -> Result<Self, MintError> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to an already-loaded config
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CANDYMINT_RPC_URL") {
            self.rpc.endpoint = url;
        }
        if let Ok(address) = std::env::var("CANDYMINT_MACHINE_ADDRESS") {
            self.machine.address = address;
        }
        if let Ok(path) = std::env::var("CANDYMINT_KEYPAIR") {
            self.wallet.keypair_path = path;
        }
    }

    /// Validate the configuration and resolve the machine address
    ///
    /// A missing machine address is the one configuration state the
    /// orchestrator cannot recover from; it is surfaced as a message,
    /// never a panic.
    pub fn machine_address(&self) -> Result<Pubkey, MintError> {
        if self.machine.address.is_empty() {
            return Err(MintError::config(
                "no candy machine address configured; set [machine] address or CANDYMINT_MACHINE_ADDRESS",
            ));
        }
        Pubkey::from_str(&self.machine.address).map_err(|e| {
            MintError::config(format!(
                "invalid candy machine address '{}': {e}",
                self.machine.address
            ))
        })
    }
}
