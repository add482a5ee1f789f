//! Swap solver library
//!
//! Provides the cross-chain atomic-swap engine, the per-chain event
//! watchers and lock schedulers, the chain adapters and the control API.

pub mod api;
pub mod chains;
pub mod config;
pub mod engine;
pub mod events;
pub mod hashlock;
pub mod registry;
pub mod scheduler;
pub mod watcher;

// Re-export public types for convenience
pub use chains::{AztecClient, ChainClient, ChainId, EvmClient, HtlcState, HtlcStatus, LockArgs};
pub use config::{AztecChainConfig, EvmChainConfig, ServiceConfig, SolverConfig};
pub use engine::{min_reward, IntakeOutcome, LockJobReceivers, SolverEngine};
pub use events::{ChainEvent, LockLeg, LockedEvent, RedeemedEvent, RefundedEvent};
pub use registry::{SwapDirection, SwapRecord, SwapRegistry};
pub use watcher::ChainWatcher;
