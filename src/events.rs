//! Decoded chain events
//!
//! Both chains emit the same four logical events - a source-leg lock, a
//! destination-leg (counter) lock, a redeem and a refund - in very different
//! wire formats. The chain clients decode their native log formats into this
//! tagged union so the watcher logic can consume them uniformly.

use ethereum_types::{H256, U128, U256};

/// Which leg of a swap a lock event belongs to.
///
/// Source-leg locks are placed by users and trigger a counter-lock; the
/// destination leg is the solver's own counter-lock, observed but not acted
/// on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockLeg {
    Src,
    Dst,
}

/// An event decoded from one chain's logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    Locked(LockedEvent),
    Redeemed(RedeemedEvent),
    Refunded(RefundedEvent),
}

/// An HTLC lock observed on a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedEvent {
    pub leg: LockLeg,
    pub swap_id: H256,
    pub amount: U256,
    pub hashlock_high: U128,
    pub hashlock_low: U128,
    /// Absolute unix expiry of the lock.
    pub timelock: u64,
    /// Receiver on the destination chain. `None` when the tolerant decode of
    /// the Aztec log's padded address region could not recover it.
    pub counterparty: Option<String>,
}

/// A redeem observed on a chain; reveals the preimage of the hashlock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemedEvent {
    pub swap_id: H256,
    pub secret: H256,
}

/// A refund observed on a chain after timelock expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundedEvent {
    pub swap_id: H256,
}

impl ChainEvent {
    /// The swap this event belongs to.
    pub fn swap_id(&self) -> H256 {
        match self {
            ChainEvent::Locked(ev) => ev.swap_id,
            ChainEvent::Redeemed(ev) => ev.swap_id,
            ChainEvent::Refunded(ev) => ev.swap_id,
        }
    }
}
