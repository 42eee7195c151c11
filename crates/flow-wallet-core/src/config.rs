//! Wallet configuration
//!
//! Network presets carry the few chain constants the core needs (key-indexer
//! endpoint, EVM system contract, Flow-EVM chain id). Everything else has a
//! sensible default and a `with_*` builder.

use crate::crypto::DEFAULT_PBKDF2_ITERATIONS;
use crate::crypto::hd::{EVM_DEFAULT_PATH, FLOW_DEFAULT_PATH, parse_path};
use crate::types::FlowAddress;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Flow network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// Public key-indexer base URL
    pub fn key_indexer_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://production.key-indexer.flow.com",
            Network::Testnet => "https://staging.key-indexer.flow.com",
        }
    }

    /// Address of the `EVM` system contract imported by COA scripts
    pub fn evm_contract_address(&self) -> FlowAddress {
        match self {
            Network::Mainnet => {
                FlowAddress::from_bytes([0xe4, 0x67, 0xb9, 0xdd, 0x11, 0xfa, 0x00, 0xdf])
            }
            Network::Testnet => {
                FlowAddress::from_bytes([0x8c, 0x53, 0x03, 0xea, 0xa2, 0x62, 0x02, 0xd6])
            }
        }
    }

    /// Flow-EVM chain id
    pub fn evm_chain_id(&self) -> u64 {
        match self {
            Network::Mainnet => 747,
            Network::Testnet => 545,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

impl std::str::FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(Error::InvalidInput(format!("unknown network: {}", other))),
        }
    }
}

/// Bounded polling for transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Delay between polls in milliseconds
    pub interval_ms: u64,
    /// Hard ceiling on the number of polls
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            max_attempts,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            max_attempts: 60,
        }
    }
}

/// Configuration for the wallet core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Flow network
    pub network: Network,
    /// Derivation path for Flow keys
    pub flow_derivation_path: String,
    /// Derivation path for EVM keys
    pub evm_derivation_path: String,
    /// PBKDF2 iterations for stored secrets
    pub pbkdf2_iterations: u32,
    /// Sealed-transaction polling
    pub poll: PollPolicy,
    /// Overrides the network's key-indexer URL
    pub key_indexer_url: Option<String>,
    /// HTTP request timeout in seconds
    pub http_timeout_secs: u64,
}

impl WalletConfig {
    /// Create config for Flow mainnet
    pub fn mainnet() -> Self {
        Self {
            network: Network::Mainnet,
            flow_derivation_path: FLOW_DEFAULT_PATH.to_string(),
            evm_derivation_path: EVM_DEFAULT_PATH.to_string(),
            pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
            poll: PollPolicy::default(),
            key_indexer_url: None,
            http_timeout_secs: 30,
        }
    }

    /// Create config for Flow testnet
    pub fn testnet() -> Self {
        Self {
            network: Network::Testnet,
            ..Self::mainnet()
        }
    }

    /// Load from JSON; missing fields take mainnet defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        parse_path(&self.flow_derivation_path)?;
        parse_path(&self.evm_derivation_path)?;
        if self.pbkdf2_iterations == 0 {
            return Err(Error::InvalidInput("pbkdf2_iterations must be non-zero".into()));
        }
        if self.poll.max_attempts == 0 {
            return Err(Error::InvalidInput("poll.max_attempts must be non-zero".into()));
        }
        Ok(())
    }

    /// Effective key-indexer base URL
    pub fn key_indexer_url(&self) -> &str {
        self.key_indexer_url
            .as_deref()
            .unwrap_or_else(|| self.network.key_indexer_url())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Set Flow derivation path
    pub fn with_flow_path(mut self, path: impl Into<String>) -> Self {
        self.flow_derivation_path = path.into();
        self
    }

    /// Set EVM derivation path
    pub fn with_evm_path(mut self, path: impl Into<String>) -> Self {
        self.evm_derivation_path = path.into();
        self
    }

    /// Set PBKDF2 iteration count
    pub fn with_pbkdf2_iterations(mut self, iterations: u32) -> Self {
        self.pbkdf2_iterations = iterations;
        self
    }

    /// Set sealed-transaction poll policy
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Use a custom key-indexer endpoint
    pub fn with_key_indexer_url(mut self, url: impl Into<String>) -> Self {
        self.key_indexer_url = Some(url.into());
        self
    }

    /// Set HTTP timeout
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout_secs = timeout.as_secs();
        self
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self::mainnet()
    }
}
