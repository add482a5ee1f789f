//! Lock Scheduler
//!
//! One FIFO worker per chain drains that chain's lock queue, so at most one
//! counter-lock transaction per chain is in flight at any time and
//! submissions happen in the order their triggering events were first
//! observed. The worker moves to the next job after each terminal outcome,
//! success or failure alike.

use std::sync::Arc;

use ethereum_types::H256;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use crate::chains::ChainId;
use crate::engine::SolverEngine;

/// Runs the counter-lock worker for one chain until the queue closes.
pub async fn run_lock_worker(
    engine: Arc<SolverEngine>,
    chain: ChainId,
    mut jobs: UnboundedReceiver<H256>,
) {
    info!("Lock scheduler for {} started", chain);
    while let Some(swap_id) = jobs.recv().await {
        engine.process_lock_job(chain, swap_id).await;
    }
    warn!("Lock queue for {} closed; scheduler stopping", chain);
}
