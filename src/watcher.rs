//! Event Watchers
//!
//! One watcher per chain polls for new HTLC logs on a fixed interval,
//! feeds decoded events into the engine, and runs a reconciliation sweep
//! that reads HTLC state directly for swaps awaiting a user redeem - a
//! fallback for RPCs that drop or delay log delivery.
//!
//! The high-water mark only advances after a whole pass succeeds, so a
//! failed pass re-scans the same range on the next tick (at-least-once;
//! registry dedup makes the replay harmless). A slow pass delays the next
//! poll rather than overlapping it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use ethereum_types::H256;
use tracing::{error, info, warn};

use crate::chains::{ChainId, HtlcStatus};
use crate::engine::SolverEngine;
use crate::events::{ChainEvent, LockLeg, RedeemedEvent};
use crate::hashlock::to_fixed_hex;

/// Watches one chain's HTLC contract for lock/redeem/refund activity.
pub struct ChainWatcher {
    engine: Arc<SolverEngine>,
    chain: ChainId,
}

impl ChainWatcher {
    pub fn new(engine: Arc<SolverEngine>, chain: ChainId) -> Self {
        Self { engine, chain }
    }

    /// Runs the watcher loop forever: poll, process, sleep.
    pub async fn run(self) {
        let interval =
            Duration::from_millis(self.engine.config().service.poll_interval_ms);
        let lookback = self.engine.config().service.lookback_blocks;

        // Seed the high-water mark a little behind the tip so events fired
        // just before startup are not lost.
        let mut high_water_mark = loop {
            match self.engine.client(self.chain).block_number().await {
                Ok(tip) => break tip.saturating_sub(lookback),
                Err(e) => {
                    error!("Failed to read {} chain tip at startup: {:#}", self.chain, e);
                    tokio::time::sleep(interval).await;
                }
            }
        };
        info!(
            "Watcher for {} started at block {} (polling every {:?})",
            self.chain, high_water_mark, interval
        );

        loop {
            match self.poll_once(high_water_mark).await {
                Ok(new_mark) => high_water_mark = new_mark,
                Err(e) => {
                    error!("Watcher pass on {} failed: {:#}", self.chain, e);
                }
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// One watcher pass. Scans logs above `high_water_mark`, feeds them into
    /// the engine, then reconciles in-flight swaps against direct HTLC state
    /// reads. Returns the new high-water mark.
    pub async fn poll_once(&self, high_water_mark: u64) -> Result<u64> {
        let client = self.engine.client(self.chain);
        let tip = client.block_number().await?;

        if tip > high_water_mark {
            let events = client.fetch_events(high_water_mark + 1, tip).await?;
            for event in events {
                self.process_event(event).await;
            }
        }

        self.reconcile().await;
        Ok(tip.max(high_water_mark))
    }

    async fn process_event(&self, event: ChainEvent) {
        match event {
            ChainEvent::Locked(ev) if ev.leg == LockLeg::Src => {
                self.engine.handle_locked(self.chain, ev).await;
            }
            ChainEvent::Locked(_) => {
                // Destination-leg locks are the solver's own counter-locks.
            }
            ChainEvent::Redeemed(ev) => {
                if let Some((swap_id, secret)) =
                    self.engine.handle_redeemed(self.chain, ev).await
                {
                    self.spawn_redeem(swap_id, secret);
                }
            }
            ChainEvent::Refunded(ev) => {
                if self.engine.registry().get(ev.swap_id).await.is_some() {
                    warn!(
                        "Tracked swap {} was refunded on {}; it will not complete",
                        to_fixed_hex(&ev.swap_id),
                        self.chain
                    );
                }
            }
        }
    }

    /// Reconciliation sweep: for swaps counter-locked on this chain that
    /// still await the user's redeem, read the HTLC state directly and treat
    /// a claimed entry exactly like an observed redeem event.
    async fn reconcile(&self) {
        let records = self.engine.registry().list().await;
        for record in records {
            if record.direction.destination() != self.chain
                || !record.solver_locked
                || record.user_redeemed
            {
                continue;
            }

            match self.engine.client(self.chain).htlc_state(record.swap_id).await {
                Ok(state) if state.status == HtlcStatus::Claimed => match state.secret {
                    Some(secret) => {
                        let ev = RedeemedEvent {
                            swap_id: record.swap_id,
                            secret,
                        };
                        if let Some((swap_id, secret)) =
                            self.engine.handle_redeemed(self.chain, ev).await
                        {
                            info!(
                                "Reconciliation found claimed HTLC for swap {} on {}",
                                to_fixed_hex(&swap_id),
                                self.chain
                            );
                            self.spawn_redeem(swap_id, secret);
                        }
                    }
                    None => {
                        warn!(
                            "HTLC for swap {} on {} is claimed but exposes no secret",
                            to_fixed_hex(&record.swap_id),
                            self.chain
                        );
                    }
                },
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        "Reconciliation state read for swap {} on {} failed: {:#}",
                        to_fixed_hex(&record.swap_id),
                        self.chain,
                        e
                    );
                }
            }
        }
    }

    /// Redeems are fired immediately on reveal, not queued.
    fn spawn_redeem(&self, swap_id: H256, secret: H256) {
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            engine.redeem_on_origin(swap_id, secret).await;
        });
    }
}
