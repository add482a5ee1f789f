//! Configuration Management Module
//!
//! This module handles loading and managing configuration for the solver
//! service. Configuration covers the two chain connections, timing constants
//! and the control API bind address.

use serde::{Deserialize, Serialize};

/// Main configuration structure containing all solver service settings.
///
/// This structure holds configuration for:
/// - Service-level timing constants and the control API bind address
/// - The Aztec-style chain connection (HTLC contract, token, solver account)
/// - The EVM chain connection (HTLC contract, token, solver account)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Service configuration (polling cadence, timeouts, API address)
    pub service: ServiceConfig,
    /// Aztec-style chain configuration
    pub aztec_chain: AztecChainConfig,
    /// EVM chain configuration
    pub evm_chain: EvmChainConfig,
}

/// Service-level configuration for the solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Watcher polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Upper bound on waiting for a submitted transaction to confirm, seconds
    pub tx_timeout_secs: u64,
    /// Safety margin: the solver's counter-lock expires this many seconds
    /// before the user's original lock
    pub timelock_buffer_secs: u64,
    /// Duration of the user-side lock the service quotes (and assumes for
    /// out-of-band notifications, which carry no timelock)
    pub user_timelock_secs: u64,
    /// How many blocks behind the chain tip a watcher seeds its high-water
    /// mark on first startup
    pub lookback_blocks: u64,
    /// Control API bind host
    #[serde(default = "default_api_host")]
    pub api_host: String,
    /// Control API bind port
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

/// Configuration for the Aztec-style chain connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AztecChainConfig {
    /// Human-readable name for the chain
    pub name: String,
    /// RPC endpoint URL (PXE / node)
    pub rpc_url: String,
    /// Chain identity label, matched against the destination-chain field of
    /// EVM lock events to ignore locks destined for other deployments
    pub chain_label: String,
    /// Address of the HTLC contract (32-byte field address)
    pub htlc_contract_addr: String,
    /// Address of the token contract (32-byte field address)
    pub token_contract_addr: String,
    /// Solver account address on this chain (32-byte field address)
    pub solver_address: String,
    /// Environment variable holding the solver's secret key, handed to the
    /// PXE at startup so it can sign on the solver's behalf
    pub secret_key_env: String,
    /// Mandatory minimum reward fraction of the locked amount, expressed as
    /// a denominator (10 = 10%). 0 disables the surcharge.
    #[serde(default)]
    pub reward_denominator: u64,
}

/// Configuration for the EVM chain connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmChainConfig {
    /// Human-readable name for the chain
    pub name: String,
    /// RPC endpoint URL. The node is expected to manage the solver's key
    /// (transactions are submitted with eth_sendTransaction).
    pub rpc_url: String,
    /// Chain ID (e.g., 84532 for Base Sepolia), matched against the
    /// destination-chain field of Aztec lock events
    pub chain_id: u64,
    /// Address of the HTLC contract (20-byte address)
    pub htlc_contract_addr: String,
    /// Address of the ERC20 token contract (20-byte address)
    pub token_contract_addr: String,
    /// Solver account address on this chain (20-byte address)
    pub solver_address: String,
    /// Mandatory minimum reward fraction of the locked amount, expressed as
    /// a denominator (10 = 10%). 0 disables the surcharge.
    #[serde(default)]
    pub reward_denominator: u64,
}

fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    3000
}

impl SolverConfig {
    /// Loads configuration from a TOML file.
    ///
    /// Resolution order: explicit `path` argument, then the
    /// `SOLVER_CONFIG_PATH` environment variable, then `config/solver.toml`.
    /// A missing file produces an error asking the operator to copy the
    /// template.
    pub fn load_from_path(path: Option<&str>) -> anyhow::Result<Self> {
        let config_path = path
            .map(|p| p.to_string())
            .or_else(|| std::env::var("SOLVER_CONFIG_PATH").ok())
            .unwrap_or_else(|| "config/solver.toml".to_string());

        if std::path::Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: SolverConfig = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/solver.template.toml config/solver.toml\n\
                Then edit config/solver.toml with your actual values.",
                config_path
            ))
        }
    }

    /// Loads configuration from the default path (see [`load_from_path`]).
    ///
    /// [`load_from_path`]: SolverConfig::load_from_path
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from_path(None)
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// Checks:
    /// - Timing constants are non-zero and the timelock buffer leaves the
    ///   solver a usable window inside the user's lock
    /// - Contract and account addresses have the right shape per chain
    /// - The chain identities are set
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.service.poll_interval_ms == 0 {
            anyhow::bail!("Configuration error: poll_interval_ms must be positive");
        }
        if self.service.tx_timeout_secs == 0 {
            anyhow::bail!("Configuration error: tx_timeout_secs must be positive");
        }
        if self.service.timelock_buffer_secs == 0 {
            anyhow::bail!("Configuration error: timelock_buffer_secs must be positive");
        }
        if self.service.timelock_buffer_secs >= self.service.user_timelock_secs {
            anyhow::bail!(
                "Configuration error: timelock_buffer_secs ({}) must be smaller than \
                user_timelock_secs ({}), or every counter-lock would already be expired",
                self.service.timelock_buffer_secs,
                self.service.user_timelock_secs
            );
        }

        if self.aztec_chain.chain_label.trim().is_empty() {
            anyhow::bail!("Configuration error: aztec_chain.chain_label must be set");
        }
        if self.aztec_chain.secret_key_env.trim().is_empty() {
            anyhow::bail!("Configuration error: aztec_chain.secret_key_env must be set");
        }
        if self.evm_chain.chain_id == 0 {
            anyhow::bail!("Configuration error: evm_chain.chain_id must be set");
        }

        for (label, addr) in [
            ("aztec_chain.htlc_contract_addr", &self.aztec_chain.htlc_contract_addr),
            ("aztec_chain.token_contract_addr", &self.aztec_chain.token_contract_addr),
            ("aztec_chain.solver_address", &self.aztec_chain.solver_address),
        ] {
            validate_aztec_address(addr)
                .map_err(|e| anyhow::anyhow!("Invalid {}: {}", label, e))?;
        }

        for (label, addr) in [
            ("evm_chain.htlc_contract_addr", &self.evm_chain.htlc_contract_addr),
            ("evm_chain.token_contract_addr", &self.evm_chain.token_contract_addr),
            ("evm_chain.solver_address", &self.evm_chain.solver_address),
        ] {
            validate_evm_address(addr)
                .map_err(|e| anyhow::anyhow!("Invalid {}: {}", label, e))?;
        }

        Ok(())
    }
}

/// Validates a 32-byte `0x`-prefixed field address (Aztec-style chain).
pub fn validate_aztec_address(addr: &str) -> anyhow::Result<()> {
    validate_hex_address(addr, 32)
}

/// Validates a 20-byte `0x`-prefixed account address (EVM chain).
pub fn validate_evm_address(addr: &str) -> anyhow::Result<()> {
    validate_hex_address(addr, 20)
}

/// Validates a `0x`-prefixed hex address with expected byte length.
fn validate_hex_address(addr: &str, expected_len: usize) -> anyhow::Result<()> {
    let stripped = addr
        .strip_prefix("0x")
        .ok_or_else(|| anyhow::anyhow!("address must be a 0x-prefixed hex string"))?;
    let bytes = hex::decode(stripped).map_err(|_| anyhow::anyhow!("invalid hex address"))?;
    if bytes.len() != expected_len {
        anyhow::bail!(
            "invalid address length: expected {} bytes, got {}",
            expected_len,
            bytes.len()
        );
    }
    Ok(())
}
