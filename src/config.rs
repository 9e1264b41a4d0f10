//! Configuration
//!
//! Loaded from a TOML file. Every section is optional; a missing file means
//! defaults and no networks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::ConfigError;
use crate::types::Address;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub verify: VerifyConfig,
    /// Supported networks by identifier
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// SQLite database for the derived ledger (in-memory when unset)
    #[serde(default)]
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Rows per indexed-store page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Authoritative calls in flight at once
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Per-call timeout for authoritative reads
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Fail the run on any record mismatch, not only on the global invariant
    #[serde(default)]
    pub fail_on_mismatch: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            chunk_size: default_chunk_size(),
            call_timeout_secs: default_call_timeout(),
            fail_on_mismatch: false,
        }
    }
}

impl VerifyConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

fn default_page_size() -> usize { 1000 }
fn default_chunk_size() -> usize { 100 }
fn default_call_timeout() -> u64 { 30 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Display name
    pub name: String,

    /// GraphQL endpoint of the indexed store
    pub indexed_store_endpoint: String,

    /// JSON-RPC endpoint for authoritative reads
    pub rpc_url: String,

    /// Constant flow agreement contract
    pub cfa_address: String,

    /// Index distribution agreement contract
    pub ida_address: String,

    #[serde(default)]
    pub chain_id: Option<u64>,
}

/// A network entry with its contract addresses parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub indexed_store_endpoint: String,
    pub rpc_url: String,
    pub cfa: Address,
    pub ida: Address,
    pub chain_id: Option<u64>,
}

impl Config {
    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse TOML text. `origin` names the source in errors.
    pub fn parse(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.verify.page_size == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "verify.page_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.verify.chunk_size == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "verify.chunk_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.verify.call_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "verify.call_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Resolve a network identifier. Unknown identifiers are fatal.
    pub fn network(&self, id: &str) -> Result<Network, ConfigError> {
        let entry = self
            .networks
            .get(id)
            .ok_or_else(|| ConfigError::UnsupportedNetwork(id.to_string()))?;
        let parse = |raw: &str| {
            raw.parse::<Address>().map_err(|source| ConfigError::InvalidAddress {
                network: id.to_string(),
                source,
            })
        };
        Ok(Network {
            id: id.to_string(),
            name: entry.name.clone(),
            indexed_store_endpoint: entry.indexed_store_endpoint.clone(),
            rpc_url: entry.rpc_url.clone(),
            cfa: parse(&entry.cfa_address)?,
            ida: parse(&entry.ida_address)?,
            chain_id: entry.chain_id,
        })
    }
}
