//! Chain Clients Module
//!
//! This module provides the clients for the two chains a deployment bridges:
//! the Aztec-style chain (field-based logs, PXE-held keys) and the EVM chain
//! (JSON-RPC, node-held keys). Both expose the same thin adapter surface -
//! submit transaction, read HTLC state, poll logs - dispatched through the
//! [`ChainClient`] enum.

pub mod aztec;
pub mod evm;

// Re-export for convenience
pub use aztec::AztecClient;
pub use evm::EvmClient;

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use ethereum_types::{H256, U128, U256};

use crate::events::ChainEvent;

/// Identifies one of the two chains a deployment bridges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainId {
    Aztec,
    Evm,
}

impl ChainId {
    /// The chain on the other side of a swap.
    pub fn opposite(self) -> ChainId {
        match self {
            ChainId::Aztec => ChainId::Evm,
            ChainId::Evm => ChainId::Aztec,
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainId::Aztec => write!(f, "aztec"),
            ChainId::Evm => write!(f, "evm"),
        }
    }
}

/// Lifecycle status of an HTLC entry as stored on-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtlcStatus {
    /// No HTLC exists for this id
    None,
    /// Funds are locked, secret not yet revealed
    Locked,
    /// Redeemed; the contract stores the revealed preimage
    Claimed,
    /// Refunded after timelock expiry
    Refunded,
}

/// On-chain HTLC state for a swap id, read directly from the contract.
#[derive(Debug, Clone)]
pub struct HtlcState {
    pub status: HtlcStatus,
    pub amount: U256,
    pub timelock: u64,
    /// The stored preimage, populated once the HTLC is claimed.
    pub secret: Option<H256>,
}

/// Parameters for a counter-lock submission.
#[derive(Debug, Clone)]
pub struct LockArgs {
    pub swap_id: H256,
    pub hashlock_high: U128,
    pub hashlock_low: U128,
    /// Total to lock, including any destination-mandated reward surcharge.
    pub amount: U256,
    /// Absolute unix expiry of the solver's lock.
    pub timelock: u64,
    /// Receiver address in the destination chain's native format.
    pub receiver: String,
}

/// A chain adapter, dispatching to the concrete client for each chain.
pub enum ChainClient {
    Aztec(AztecClient),
    Evm(EvmClient),
}

impl ChainClient {
    /// Which chain this client talks to.
    pub fn id(&self) -> ChainId {
        match self {
            ChainClient::Aztec(_) => ChainId::Aztec,
            ChainClient::Evm(_) => ChainId::Evm,
        }
    }

    /// The solver's account address on this chain.
    pub fn solver_address(&self) -> &str {
        match self {
            ChainClient::Aztec(c) => c.solver_address(),
            ChainClient::Evm(c) => c.solver_address(),
        }
    }

    /// Current chain tip height.
    pub async fn block_number(&self) -> Result<u64> {
        match self {
            ChainClient::Aztec(c) => c.block_number().await,
            ChainClient::Evm(c) => c.block_number().await,
        }
    }

    /// Fetches and decodes HTLC events in the inclusive block range.
    ///
    /// Malformed or foreign-deployment logs are skipped by the decoders,
    /// never surfaced as errors.
    pub async fn fetch_events(&self, from_block: u64, to_block: u64) -> Result<Vec<ChainEvent>> {
        match self {
            ChainClient::Aztec(c) => c.fetch_events(from_block, to_block).await,
            ChainClient::Evm(c) => c.fetch_events(from_block, to_block).await,
        }
    }

    /// Reads the HTLC contract's state for a swap id.
    pub async fn htlc_state(&self, swap_id: H256) -> Result<HtlcState> {
        match self {
            ChainClient::Aztec(c) => c.htlc_state(swap_id).await,
            ChainClient::Evm(c) => c.htlc_state(swap_id).await,
        }
    }

    /// Submits a counter-lock transaction; returns the transaction id.
    pub async fn submit_lock(&self, args: &LockArgs) -> Result<String> {
        match self {
            ChainClient::Aztec(c) => c.submit_lock(args).await,
            ChainClient::Evm(c) => c.submit_lock(args).await,
        }
    }

    /// Submits a redeem with the revealed secret; returns the transaction id.
    pub async fn submit_redeem(&self, swap_id: H256, secret: H256) -> Result<String> {
        match self {
            ChainClient::Aztec(c) => c.submit_redeem(swap_id, secret).await,
            ChainClient::Evm(c) => c.submit_redeem(swap_id, secret).await,
        }
    }

    /// Waits for a submitted transaction to confirm, bounded by `timeout`.
    pub async fn await_confirmation(&self, tx_id: &str, timeout: Duration) -> Result<()> {
        match self {
            ChainClient::Aztec(c) => c.await_confirmation(tx_id, timeout).await,
            ChainClient::Evm(c) => c.await_confirmation(tx_id, timeout).await,
        }
    }

    /// The solver's token balance on this chain.
    pub async fn solver_balance(&self) -> Result<U256> {
        match self {
            ChainClient::Aztec(c) => c.token_balance(c.solver_address()).await,
            ChainClient::Evm(c) => c.token_balance(c.solver_address()).await,
        }
    }

    /// The amount the solver can actually commit to a counter-lock.
    ///
    /// On the EVM chain the HTLC pulls funds via `transferFrom`, so the
    /// spendable amount is bounded by both balance and allowance.
    pub async fn spendable_balance(&self) -> Result<U256> {
        match self {
            ChainClient::Aztec(c) => c.token_balance(c.solver_address()).await,
            ChainClient::Evm(c) => {
                let balance = c.token_balance(c.solver_address()).await?;
                let allowance = c.htlc_allowance().await?;
                Ok(balance.min(allowance))
            }
        }
    }

    /// One-time startup check that this chain can sign for the solver.
    ///
    /// Registers the solver account with the PXE (Aztec) or verifies the RPC
    /// node manages the solver's key (EVM).
    pub async fn startup_check(&self) -> Result<()> {
        match self {
            ChainClient::Aztec(c) => c.register_account().await,
            ChainClient::Evm(c) => c.verify_managed_account().await,
        }
    }
}
