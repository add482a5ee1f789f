//! Unit tests for the swap registry

use ethereum_types::{U128, U256};
use swap_solver::{SwapDirection, SwapRecord, SwapRegistry};

#[path = "helpers.rs"]
mod test_helpers;
use test_helpers::{swap_id, FAR_FUTURE};

fn record(n: u64, created_at: u64) -> SwapRecord {
    SwapRecord {
        swap_id: swap_id(n),
        direction: SwapDirection::AztecToEvm,
        amount: U256::from(1_000_000u64),
        hashlock_high: U128::from(1u64),
        hashlock_low: U128::from(2u64),
        counterparty: Some(test_helpers::DUMMY_EVM_USER_ADDR.to_string()),
        user_timelock: FAR_FUTURE,
        solver_locked: false,
        user_redeemed: false,
        solver_redeemed: false,
        created_at,
    }
}

/// What is tested: upsert_if_absent inserts exactly once per swap id
/// Why: duplicate lock events and the notify endpoint race on the same id
#[tokio::test]
async fn test_upsert_is_idempotent() {
    let registry = SwapRegistry::new();

    let (_, was_new) = registry.upsert_if_absent(swap_id(1), || record(1, 100)).await;
    assert!(was_new);

    let (existing, was_new) = registry
        .upsert_if_absent(swap_id(1), || record(1, 999))
        .await;
    assert!(!was_new);
    // The original record wins; the second factory result is discarded.
    assert_eq!(existing.created_at, 100);
    assert_eq!(registry.pending_count().await, 1);
}

/// What is tested: state transition helpers only move forward
/// Why: the lifecycle is strictly created -> locked -> user redeemed -> done
#[tokio::test]
async fn test_forward_transitions() {
    let registry = SwapRegistry::new();
    registry.upsert_if_absent(swap_id(1), || record(1, 100)).await;

    registry.mark_solver_locked(swap_id(1)).await.unwrap();
    let rec = registry.get(swap_id(1)).await.unwrap();
    assert!(rec.solver_locked);
    assert!(!rec.user_redeemed);

    registry.mark_user_redeemed(swap_id(1)).await.unwrap();
    let rec = registry.get(swap_id(1)).await.unwrap();
    assert!(rec.solver_locked);
    assert!(rec.user_redeemed);

    // Re-marking is a harmless no-op, not a rollback.
    registry.mark_solver_locked(swap_id(1)).await.unwrap();
    let rec = registry.get(swap_id(1)).await.unwrap();
    assert!(rec.user_redeemed);
}

/// What is tested: a solver redeem removes the terminal record
/// Why: completed swaps must disappear from /swaps
#[tokio::test]
async fn test_solver_redeem_removes_record() {
    let registry = SwapRegistry::new();
    registry.upsert_if_absent(swap_id(1), || record(1, 100)).await;

    let finished = registry.mark_solver_redeemed(swap_id(1)).await.unwrap();
    assert!(finished.solver_redeemed);
    assert!(finished.user_redeemed);
    assert!(registry.get(swap_id(1)).await.is_none());
    assert_eq!(registry.pending_count().await, 0);
}

/// What is tested: transition helpers fail on unknown swaps
#[tokio::test]
async fn test_transitions_require_known_swap() {
    let registry = SwapRegistry::new();
    assert!(registry.mark_solver_locked(swap_id(9)).await.is_err());
    assert!(registry.mark_user_redeemed(swap_id(9)).await.is_err());
    assert!(registry.mark_solver_redeemed(swap_id(9)).await.is_err());
}

/// What is tested: list() returns a snapshot ordered by creation time
/// Why: the control API presents swaps oldest first
#[tokio::test]
async fn test_list_ordering() {
    let registry = SwapRegistry::new();
    registry.upsert_if_absent(swap_id(3), || record(3, 300)).await;
    registry.upsert_if_absent(swap_id(1), || record(1, 100)).await;
    registry.upsert_if_absent(swap_id(2), || record(2, 200)).await;

    let listed = registry.list().await;
    let created: Vec<u64> = listed.iter().map(|r| r.created_at).collect();
    assert_eq!(created, vec![100, 200, 300]);
}
