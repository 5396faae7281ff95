//! Configuration management for the Attestation Client
//!
//! Loads configuration from environment variables. The registry endpoint,
//! contract address and schema uid have no defaults: a missing value fails
//! construction instead of silently pointing at some other registry.

use anyhow::{Context, Result};
use provenance_common::{Address, Uid};
use std::env;
use std::time::Duration;

use crate::schema;

/// Client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Use the in-memory mock registry (development/testing)
    pub mock_mode: bool,

    /// Registry JSON-RPC endpoint (required unless in mock mode)
    pub rpc_url: Option<String>,

    /// Registry contract address
    pub registry_address: Address,

    /// Schema uid the payloads are encoded with
    pub schema_uid: Uid,

    /// Expected chain id; checked by the health check when set
    pub chain_id: Option<u64>,

    /// Sender account for the write path; no signing session when unset
    pub sender: Option<Address>,

    /// HTTP timeout for every registry call
    pub rpc_timeout_secs: u64,

    /// How long `submit` waits for a receipt
    pub confirmation_timeout_secs: u64,

    /// Receipt polling interval
    pub poll_interval_ms: u64,

    /// Block explorer base URL for transaction links
    pub explorer_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mock_mode = var("ATTEST_MOCK_MODE")
            .unwrap_or_else(|| "false".to_string())
            .parse::<bool>()
            .context("Invalid ATTEST_MOCK_MODE (expected true/false)")?;

        let registry_address = match var("ATTEST_REGISTRY_ADDRESS") {
            Some(v) => Address::from_hex(&v).context("Invalid ATTEST_REGISTRY_ADDRESS")?,
            None if mock_mode => Address::ZERO,
            None => anyhow::bail!("ATTEST_REGISTRY_ADDRESS is required when ATTEST_MOCK_MODE=false"),
        };

        let schema_uid = match var("ATTEST_SCHEMA_UID") {
            Some(v) => Uid::from_hex(&v).context("Invalid ATTEST_SCHEMA_UID")?,
            None if mock_mode => schema::schema_uid(Address::ZERO, true),
            None => anyhow::bail!("ATTEST_SCHEMA_UID is required when ATTEST_MOCK_MODE=false"),
        };

        let config = Config {
            mock_mode,
            rpc_url: var("ATTEST_RPC_URL"),
            registry_address,
            schema_uid,

            chain_id: var("ATTEST_CHAIN_ID")
                .map(|v| v.parse::<u64>())
                .transpose()
                .context("Invalid ATTEST_CHAIN_ID")?,

            sender: var("ATTEST_SENDER")
                .map(|v| Address::from_hex(&v))
                .transpose()
                .context("Invalid ATTEST_SENDER")?,

            rpc_timeout_secs: var("ATTEST_RPC_TIMEOUT_SECS")
                .unwrap_or_else(|| "30".to_string())
                .parse::<u64>()
                .context("Invalid ATTEST_RPC_TIMEOUT_SECS")?,

            confirmation_timeout_secs: var("ATTEST_CONFIRMATION_TIMEOUT_SECS")
                .unwrap_or_else(|| "120".to_string())
                .parse::<u64>()
                .context("Invalid ATTEST_CONFIRMATION_TIMEOUT_SECS")?,

            poll_interval_ms: var("ATTEST_POLL_INTERVAL_MS")
                .unwrap_or_else(|| "2000".to_string())
                .parse::<u64>()
                .context("Invalid ATTEST_POLL_INTERVAL_MS")?,

            explorer_url: var("ATTEST_EXPLORER_URL"),
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if !self.mock_mode && self.rpc_url.is_none() {
            anyhow::bail!("ATTEST_RPC_URL is required when ATTEST_MOCK_MODE=false");
        }

        if self.rpc_timeout_secs == 0 {
            anyhow::bail!("ATTEST_RPC_TIMEOUT_SECS must be greater than 0");
        }

        if self.poll_interval_ms == 0 {
            anyhow::bail!("ATTEST_POLL_INTERVAL_MS must be greater than 0");
        }

        if self.confirmation_timeout_secs == 0 {
            anyhow::bail!("ATTEST_CONFIRMATION_TIMEOUT_SECS must be greater than 0");
        }

        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
