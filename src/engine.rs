//! Solver Engine
//!
//! Owns the swap registry, both chain clients and the per-chain lock queues.
//! Constructed once at startup and shared by handle with the watchers, the
//! lock workers and the HTTP handlers. The engine implements the three state
//! transitions of a swap: intake (create + enqueue counter-lock), the
//! counter-lock itself, and the redeem on the origin chain once the secret
//! is revealed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use ethereum_types::{H256, U256};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::chains::{AztecClient, ChainClient, ChainId, EvmClient, HtlcStatus, LockArgs};
use crate::config::SolverConfig;
use crate::events::{LockedEvent, RedeemedEvent};
use crate::hashlock::{sha256_bytes32, to_fixed_hex};
use crate::registry::{unix_now, SwapDirection, SwapRecord, SwapRegistry};

/// Result of feeding a lock observation into the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// A new swap was registered and a counter-lock job enqueued.
    Accepted,
    /// The swap was already tracked; the observation was a no-op.
    AlreadyTracking,
}

/// Receiving ends of the per-chain lock queues, handed to the lock workers.
pub struct LockJobReceivers {
    pub aztec: UnboundedReceiver<H256>,
    pub evm: UnboundedReceiver<H256>,
}

/// The solver engine. See module docs.
pub struct SolverEngine {
    config: SolverConfig,
    registry: SwapRegistry,
    aztec: ChainClient,
    evm: ChainClient,
    aztec_lock_tx: UnboundedSender<H256>,
    evm_lock_tx: UnboundedSender<H256>,
}

impl SolverEngine {
    /// Builds the engine and its lock queues from configuration.
    pub fn new(config: SolverConfig) -> Result<(Arc<Self>, LockJobReceivers)> {
        let aztec = AztecClient::new(&config.aztec_chain, config.evm_chain.chain_id)?;
        let evm = EvmClient::new(&config.evm_chain, config.aztec_chain.chain_label.clone())?;

        let (aztec_lock_tx, aztec_lock_rx) = mpsc::unbounded_channel();
        let (evm_lock_tx, evm_lock_rx) = mpsc::unbounded_channel();

        let engine = Arc::new(Self {
            config,
            registry: SwapRegistry::new(),
            aztec: ChainClient::Aztec(aztec),
            evm: ChainClient::Evm(evm),
            aztec_lock_tx,
            evm_lock_tx,
        });

        Ok((
            engine,
            LockJobReceivers {
                aztec: aztec_lock_rx,
                evm: evm_lock_rx,
            },
        ))
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn registry(&self) -> &SwapRegistry {
        &self.registry
    }

    pub fn client(&self, chain: ChainId) -> &ChainClient {
        match chain {
            ChainId::Aztec => &self.aztec,
            ChainId::Evm => &self.evm,
        }
    }

    /// Upper bound on waiting for any submitted transaction.
    pub fn tx_timeout(&self) -> Duration {
        Duration::from_secs(self.config.service.tx_timeout_secs)
    }

    /// One-time startup verification that both chains can sign for the
    /// solver (PXE account registration, node-managed EVM key).
    pub async fn startup_checks(&self) -> Result<()> {
        self.aztec.startup_check().await?;
        self.evm.startup_check().await?;
        Ok(())
    }

    /// Feeds a user lock observed on `origin` into the registry.
    ///
    /// Insertion is idempotent; only the first observation enqueues a
    /// counter-lock job on the opposite chain. Called by both event watchers
    /// and the out-of-band notify endpoint.
    pub async fn handle_locked(&self, origin: ChainId, ev: LockedEvent) -> IntakeOutcome {
        let direction = SwapDirection::from_origin(origin);
        let (record, was_new) = self
            .registry
            .upsert_if_absent(ev.swap_id, || SwapRecord {
                swap_id: ev.swap_id,
                direction,
                amount: ev.amount,
                hashlock_high: ev.hashlock_high,
                hashlock_low: ev.hashlock_low,
                counterparty: ev.counterparty.clone(),
                user_timelock: ev.timelock,
                solver_locked: false,
                user_redeemed: false,
                solver_redeemed: false,
                created_at: unix_now(),
            })
            .await;

        if !was_new {
            debug!("Already tracking swap {}", to_fixed_hex(&ev.swap_id));
            return IntakeOutcome::AlreadyTracking;
        }

        info!(
            "Tracking new {} swap {} (amount {})",
            direction.as_str(),
            to_fixed_hex(&record.swap_id),
            record.amount
        );
        self.enqueue_counter_lock(direction.destination(), ev.swap_id);
        IntakeOutcome::Accepted
    }

    /// Queues a counter-lock job on the destination chain's FIFO queue.
    fn enqueue_counter_lock(&self, destination: ChainId, swap_id: H256) {
        let sender = match destination {
            ChainId::Aztec => &self.aztec_lock_tx,
            ChainId::Evm => &self.evm_lock_tx,
        };
        if sender.send(swap_id).is_err() {
            error!(
                "Lock queue for {} is closed; dropping counter-lock for swap {}",
                destination,
                to_fixed_hex(&swap_id)
            );
        }
    }

    /// Processes one counter-lock job on `chain`. Failures are logged and
    /// the job is dropped without retry; the swap stays visible through the
    /// control API until the user's refund path resolves it.
    pub async fn process_lock_job(&self, chain: ChainId, swap_id: H256) {
        let id_hex = to_fixed_hex(&swap_id);
        let Some(record) = self.registry.get(swap_id).await else {
            warn!("Lock job for unknown swap {}; skipping", id_hex);
            return;
        };
        if record.direction.destination() != chain {
            warn!(
                "Lock job for swap {} routed to {} but its destination is {}; skipping",
                id_hex,
                chain,
                record.direction.destination()
            );
            return;
        }
        if record.solver_locked {
            debug!("Swap {} already counter-locked; skipping", id_hex);
            return;
        }
        let Some(receiver) = record.counterparty.clone() else {
            warn!(
                "Swap {} has no recovered destination address; dropping lock job",
                id_hex
            );
            return;
        };

        // The solver's lock must expire before the user's, leaving room to
        // refund if the swap stalls.
        let solver_timelock = record
            .user_timelock
            .saturating_sub(self.config.service.timelock_buffer_secs);
        if solver_timelock <= unix_now() {
            warn!(
                "Swap {} is too close to the user's expiry (user timelock {}); dropping lock job",
                id_hex, record.user_timelock
            );
            return;
        }

        let denominator = match chain {
            ChainId::Aztec => self.config.aztec_chain.reward_denominator,
            ChainId::Evm => self.config.evm_chain.reward_denominator,
        };
        let reward = if denominator > 0 {
            min_reward(record.amount, denominator)
        } else {
            U256::zero()
        };
        let total = record.amount.saturating_add(reward);

        let client = self.client(chain);
        match client.spendable_balance().await {
            Ok(spendable) if spendable < total => {
                warn!(
                    "Insufficient {} balance for swap {}: need {}, have {}; dropping lock job \
                    (operator must top up)",
                    chain, id_hex, total, spendable
                );
                return;
            }
            Ok(_) => {}
            Err(e) => {
                error!("Balance check on {} failed for swap {}: {:#}", chain, id_hex, e);
                return;
            }
        }

        // A stale or replayed event may race a lock that already happened;
        // trust the destination contract over the registry.
        match client.htlc_state(swap_id).await {
            Ok(state) if state.status != HtlcStatus::None => {
                info!(
                    "HTLC for swap {} already exists on {} ({:?}); marking locked without resubmitting",
                    id_hex, chain, state.status
                );
                if let Err(e) = self.registry.mark_solver_locked(swap_id).await {
                    warn!("Failed to mark swap {} locked: {:#}", id_hex, e);
                }
                return;
            }
            Ok(_) => {}
            Err(e) => {
                error!(
                    "Pre-lock state check on {} failed for swap {}: {:#}",
                    chain, id_hex, e
                );
                return;
            }
        }

        let args = LockArgs {
            swap_id,
            hashlock_high: record.hashlock_high,
            hashlock_low: record.hashlock_low,
            amount: total,
            timelock: solver_timelock,
            receiver,
        };

        info!(
            "Submitting counter-lock for swap {} on {}: amount {} (reward {}), timelock {}",
            id_hex, chain, total, reward, solver_timelock
        );
        match client.submit_lock(&args).await {
            Ok(tx_id) => match client.await_confirmation(&tx_id, self.tx_timeout()).await {
                Ok(()) => {
                    if let Err(e) = self.registry.mark_solver_locked(swap_id).await {
                        warn!("Failed to mark swap {} locked: {:#}", id_hex, e);
                        return;
                    }
                    info!("Counter-lock for swap {} confirmed on {} ({})", id_hex, chain, tx_id);
                }
                Err(e) => {
                    error!(
                        "Counter-lock for swap {} did not confirm on {}: {:#}",
                        id_hex, chain, e
                    );
                }
            },
            Err(e) => {
                error!(
                    "Counter-lock submission for swap {} failed on {}: {:#}",
                    id_hex, chain, e
                );
            }
        }
    }

    /// Handles a secret reveal observed on `reveal_chain`.
    ///
    /// Verifies the revealed secret against the stored hashlock and marks
    /// the user redeem. Returns the `(swap_id, secret)` pair the caller
    /// should immediately redeem on the origin chain, or `None` when the
    /// event is foreign, duplicate, or inconsistent.
    pub async fn handle_redeemed(
        &self,
        reveal_chain: ChainId,
        ev: RedeemedEvent,
    ) -> Option<(H256, H256)> {
        let id_hex = to_fixed_hex(&ev.swap_id);
        let record = self.registry.get(ev.swap_id).await?;
        if record.direction.destination() != reveal_chain {
            debug!(
                "Redeem for swap {} on {} does not match its destination chain; ignoring",
                id_hex, reveal_chain
            );
            return None;
        }
        if record.user_redeemed {
            // Rescans deliver at-least-once; the first observation already
            // triggered the redeem.
            return None;
        }
        if sha256_bytes32(ev.secret) != record.hashlock() {
            warn!(
                "Revealed secret for swap {} does not match its hashlock; ignoring",
                id_hex
            );
            return None;
        }
        if let Err(e) = self.registry.mark_user_redeemed(ev.swap_id).await {
            warn!("Failed to mark swap {} user-redeemed: {:#}", id_hex, e);
            return None;
        }
        info!("User redeemed swap {} on {}; secret revealed", id_hex, reveal_chain);
        Some((ev.swap_id, ev.secret))
    }

    /// Redeems the user's original lock with the revealed secret.
    ///
    /// Fired immediately on reveal, not queued: each redeem targets a
    /// distinct swap and the chain client serializes its own submissions.
    /// On failure the record is left in place and only logged; `/swaps`
    /// keeps showing the stuck swap.
    pub async fn redeem_on_origin(&self, swap_id: H256, secret: H256) {
        let id_hex = to_fixed_hex(&swap_id);
        let Some(record) = self.registry.get(swap_id).await else {
            warn!("Redeem requested for unknown swap {}; skipping", id_hex);
            return;
        };
        let origin = record.direction.origin();
        let client = self.client(origin);

        info!("Redeeming swap {} on {} with the revealed secret", id_hex, origin);
        match client.submit_redeem(swap_id, secret).await {
            Ok(tx_id) => match client.await_confirmation(&tx_id, self.tx_timeout()).await {
                Ok(()) => match self.registry.mark_solver_redeemed(swap_id).await {
                    Ok(_) => {
                        info!("Swap {} complete; removed from registry", id_hex);
                    }
                    Err(e) => {
                        warn!("Failed to finalize swap {}: {:#}", id_hex, e);
                    }
                },
                Err(e) => {
                    error!("Redeem for swap {} did not confirm on {}: {:#}", id_hex, origin, e);
                }
            },
            Err(e) => {
                error!("Redeem submission for swap {} failed on {}: {:#}", id_hex, origin, e);
            }
        }
    }

    /// Live solver balances on (aztec, evm), degrading to `None` on RPC
    /// errors so introspection never fails outright.
    pub async fn live_balances(&self) -> (Option<U256>, Option<U256>) {
        let aztec = match self.aztec.solver_balance().await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!("Failed to read aztec balance: {:#}", e);
                None
            }
        };
        let evm = match self.evm.solver_balance().await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!("Failed to read evm balance: {:#}", e);
                None
            }
        };
        (aztec, evm)
    }
}

/// Smallest reward satisfying a minimum fraction `1/denominator` of the
/// locked amount, via ceiling division.
pub fn min_reward(amount: U256, denominator: u64) -> U256 {
    let (quotient, remainder) = amount.div_mod(U256::from(denominator));
    if remainder.is_zero() {
        quotient
    } else {
        quotient + U256::one()
    }
}
