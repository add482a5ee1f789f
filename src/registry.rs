//! Swap Registry
//!
//! In-memory map of swap id to swap record; the single source of truth for
//! lifecycle state. Nothing here survives a restart - recovery happens by
//! re-scanning a bounded window of chain history.
//!
//! Multiple logical tasks (both watchers, the notify-lock handler) can race
//! on the same swap id at suspension points, so the creation path is a
//! single check-and-insert inside one lock guard with no awaits in between.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use ethereum_types::{H256, U128, U256};
use tokio::sync::RwLock;

use crate::chains::ChainId;
use crate::hashlock::{hashlock_bytes32, to_fixed_hex};

/// Which chain the user locked on first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    AztecToEvm,
    EvmToAztec,
}

impl SwapDirection {
    /// The chain carrying the user's original lock.
    pub fn origin(self) -> ChainId {
        match self {
            SwapDirection::AztecToEvm => ChainId::Aztec,
            SwapDirection::EvmToAztec => ChainId::Evm,
        }
    }

    /// The chain the solver counter-locks on.
    pub fn destination(self) -> ChainId {
        match self {
            SwapDirection::AztecToEvm => ChainId::Evm,
            SwapDirection::EvmToAztec => ChainId::Aztec,
        }
    }

    /// Direction implied by the chain a user lock was observed on.
    pub fn from_origin(origin: ChainId) -> Self {
        match origin {
            ChainId::Aztec => SwapDirection::AztecToEvm,
            ChainId::Evm => SwapDirection::EvmToAztec,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SwapDirection::AztecToEvm => "aztec_to_evm",
            SwapDirection::EvmToAztec => "evm_to_aztec",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "aztec_to_evm" => Some(SwapDirection::AztecToEvm),
            "evm_to_aztec" => Some(SwapDirection::EvmToAztec),
            _ => None,
        }
    }
}

/// A tracked swap. Created on first sighting of a lock event (or an
/// out-of-band notification), advanced by the lock scheduler and redeem
/// executor, removed once the solver has redeemed.
#[derive(Debug, Clone)]
pub struct SwapRecord {
    pub swap_id: H256,
    pub direction: SwapDirection,
    /// Token quantity, 6-decimal fixed point on both chains.
    pub amount: U256,
    /// Immutable after creation; the secret stays unknown until reveal.
    pub hashlock_high: U128,
    pub hashlock_low: U128,
    /// Destination-chain receiver; `None` while the Aztec log's address
    /// region is still pending recovery.
    pub counterparty: Option<String>,
    /// Absolute unix expiry of the user's lock.
    pub user_timelock: u64,
    /// The solver's counter-lock has confirmed on the destination chain.
    pub solver_locked: bool,
    /// The user redeemed on the destination chain, revealing the secret.
    pub user_redeemed: bool,
    /// The solver redeemed on the origin chain; terminal.
    pub solver_redeemed: bool,
    pub created_at: u64,
}

impl SwapRecord {
    /// The full 256-bit hashlock.
    pub fn hashlock(&self) -> H256 {
        hashlock_bytes32(self.hashlock_high, self.hashlock_low)
    }
}

/// Registry of in-flight swaps.
pub struct SwapRegistry {
    swaps: RwLock<HashMap<H256, SwapRecord>>,
}

impl Default for SwapRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SwapRegistry {
    pub fn new() -> Self {
        Self {
            swaps: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts a record built by `factory` unless the id is already tracked.
    ///
    /// This is the sole creation path. The existence check and the insert
    /// happen under one write guard with no suspension point in between, so
    /// overlapping pollers and the notify endpoint cannot double-create a
    /// swap. Returns the (existing or new) record and whether it was new.
    pub async fn upsert_if_absent<F>(&self, swap_id: H256, factory: F) -> (SwapRecord, bool)
    where
        F: FnOnce() -> SwapRecord,
    {
        let mut swaps = self.swaps.write().await;
        if let Some(existing) = swaps.get(&swap_id) {
            return (existing.clone(), false);
        }
        let record = factory();
        swaps.insert(swap_id, record.clone());
        (record, true)
    }

    pub async fn get(&self, swap_id: H256) -> Option<SwapRecord> {
        self.swaps.read().await.get(&swap_id).cloned()
    }

    pub async fn remove(&self, swap_id: H256) -> Option<SwapRecord> {
        self.swaps.write().await.remove(&swap_id)
    }

    /// Snapshot of all tracked swaps, oldest first.
    pub async fn list(&self) -> Vec<SwapRecord> {
        let swaps = self.swaps.read().await;
        let mut records: Vec<SwapRecord> = swaps.values().cloned().collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.swap_id.cmp(&b.swap_id))
        });
        records
    }

    /// Number of in-flight swaps.
    pub async fn pending_count(&self) -> usize {
        self.swaps.read().await.len()
    }

    /// Records the confirmed counter-lock. Forward-only; re-marking an
    /// already locked swap is a no-op.
    pub async fn mark_solver_locked(&self, swap_id: H256) -> Result<()> {
        let mut swaps = self.swaps.write().await;
        match swaps.get_mut(&swap_id) {
            Some(record) => {
                record.solver_locked = true;
                Ok(())
            }
            None => anyhow::bail!("Swap not found: {}", to_fixed_hex(&swap_id)),
        }
    }

    /// Records the user's redeem (secret reveal). Forward-only.
    pub async fn mark_user_redeemed(&self, swap_id: H256) -> Result<()> {
        let mut swaps = self.swaps.write().await;
        match swaps.get_mut(&swap_id) {
            Some(record) => {
                record.user_redeemed = true;
                Ok(())
            }
            None => anyhow::bail!("Swap not found: {}", to_fixed_hex(&swap_id)),
        }
    }

    /// Records the solver's redeem and removes the now-terminal record.
    pub async fn mark_solver_redeemed(&self, swap_id: H256) -> Result<SwapRecord> {
        let mut swaps = self.swaps.write().await;
        match swaps.remove(&swap_id) {
            Some(mut record) => {
                record.user_redeemed = true;
                record.solver_redeemed = true;
                Ok(record)
            }
            None => anyhow::bail!("Swap not found: {}", to_fixed_hex(&swap_id)),
        }
    }
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
