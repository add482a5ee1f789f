//! Shared test helpers for swap-solver unit tests
//!
//! Provides dummy constants, config builders, raw-log builders for both
//! chains' wire formats, and JSON-RPC mock helpers.

#![allow(dead_code)]

use ethereum_types::{H256, U128, U256};
use serde_json::json;
use sha3::{Digest, Keccak256};
use wiremock::matchers::{body_partial_json, method as http_method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use swap_solver::chains::aztec::{AztecLog, DST_LOCK_TAG, REDEEM_TAG, REFUND_TAG, SRC_LOCK_TAG};
use swap_solver::chains::evm::EvmLog;
use swap_solver::hashlock::{sha256_bytes32, split_secret};
use swap_solver::{AztecChainConfig, EvmChainConfig, ServiceConfig, SolverConfig};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Dummy swap ID (fixed-width form)
pub const DUMMY_SWAP_ID: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000001";

/// Dummy user address on the EVM chain (40 hex characters)
pub const DUMMY_EVM_USER_ADDR: &str = "0x00000000000000000000000000000000000000aa";

/// Dummy user address on the Aztec chain (64 hex characters)
pub const DUMMY_AZTEC_USER_ADDR: &str =
    "0x00000000000000000000000000000000000000000000000000000000000000ab";

/// Dummy HTLC contract address on the EVM chain
pub const DUMMY_EVM_HTLC_ADDR: &str = "0x0000000000000000000000000000000000000002";

/// Dummy token contract address on the EVM chain
pub const DUMMY_EVM_TOKEN_ADDR: &str = "0x0000000000000000000000000000000000000003";

/// Dummy solver address on the EVM chain
pub const DUMMY_EVM_SOLVER_ADDR: &str = "0x0000000000000000000000000000000000000004";

/// Dummy HTLC contract address on the Aztec chain
pub const DUMMY_AZTEC_HTLC_ADDR: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000005";

/// Dummy token contract address on the Aztec chain
pub const DUMMY_AZTEC_TOKEN_ADDR: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000006";

/// Dummy solver address on the Aztec chain
pub const DUMMY_AZTEC_SOLVER_ADDR: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000007";

/// EVM chain identity used in test configs
pub const TEST_EVM_CHAIN_ID: u64 = 84532;

/// Aztec chain identity used in test configs
pub const TEST_AZTEC_LABEL: &str = "aztec-testnet";

/// Far-future unix timestamp for user timelocks in tests
pub const FAR_FUTURE: u64 = 9999999999;

// ============================================================================
// CONFIG BUILDERS
// ============================================================================

/// Create a solver config pointing both chains at the given RPC endpoints.
/// The EVM side mandates a 10% reward, the Aztec side none.
pub fn build_test_config(aztec_url: &str, evm_url: &str) -> SolverConfig {
    SolverConfig {
        service: ServiceConfig {
            poll_interval_ms: 1000,
            tx_timeout_secs: 5,
            timelock_buffer_secs: 3600,
            user_timelock_secs: 86400,
            lookback_blocks: 50,
            api_host: "127.0.0.1".to_string(),
            api_port: 0,
        },
        aztec_chain: AztecChainConfig {
            name: "Aztec Test".to_string(),
            rpc_url: aztec_url.to_string(),
            chain_label: TEST_AZTEC_LABEL.to_string(),
            htlc_contract_addr: DUMMY_AZTEC_HTLC_ADDR.to_string(),
            token_contract_addr: DUMMY_AZTEC_TOKEN_ADDR.to_string(),
            solver_address: DUMMY_AZTEC_SOLVER_ADDR.to_string(),
            secret_key_env: "AZTEC_SOLVER_KEY".to_string(),
            reward_denominator: 0,
        },
        evm_chain: EvmChainConfig {
            name: "EVM Test".to_string(),
            rpc_url: evm_url.to_string(),
            chain_id: TEST_EVM_CHAIN_ID,
            htlc_contract_addr: DUMMY_EVM_HTLC_ADDR.to_string(),
            token_contract_addr: DUMMY_EVM_TOKEN_ADDR.to_string(),
            solver_address: DUMMY_EVM_SOLVER_ADDR.to_string(),
            reward_denominator: 10,
        },
    }
}

/// Create a config with both RPC endpoints pointing at unroutable addresses.
pub fn build_offline_config() -> SolverConfig {
    build_test_config("http://127.0.0.1:1", "http://127.0.0.1:1")
}

// ============================================================================
// SECRETS AND HASHLOCKS
// ============================================================================

/// Deterministic test secret.
pub fn test_secret(seed: u8) -> H256 {
    H256::repeat_byte(seed)
}

/// Hashlock halves for a test secret.
pub fn test_hashlock_halves(secret: H256) -> (U128, U128) {
    split_secret(sha256_bytes32(secret))
}

pub fn swap_id(n: u64) -> H256 {
    H256::from_low_u64_be(n)
}

// ============================================================================
// AZTEC RAW LOG BUILDERS
// ============================================================================

fn field_h256(value: H256) -> String {
    format!("0x{}", hex::encode(value.as_bytes()))
}

fn field_u256(value: U256) -> String {
    format!("{:#x}", value)
}

fn field_u128(value: U128) -> String {
    format!("{:#x}", value)
}

fn field_u64(value: u64) -> String {
    format!("{:#x}", value)
}

/// Packs text into space-padded 30-byte ASCII payload slots, each rendered
/// as a 32-byte field with two zero high bytes.
pub fn ascii_slots(text: &str) -> Vec<String> {
    let mut padded = text.as_bytes().to_vec();
    let slots = padded.len().div_ceil(30).max(1);
    padded.resize(slots * 30, b' ');

    padded
        .chunks(30)
        .map(|chunk| {
            let mut field = [0u8; 32];
            field[2..].copy_from_slice(chunk);
            format!("0x{}", hex::encode(field))
        })
        .collect()
}

/// A well-formed Aztec src-lock log destined for the given EVM chain.
pub fn aztec_src_lock_log(
    id: H256,
    amount: U256,
    hashlock_high: U128,
    hashlock_low: U128,
    timelock: u64,
    dst_chain_id: u64,
    address_text: &str,
) -> AztecLog {
    let mut fields = vec![
        field_u64(SRC_LOCK_TAG),
        field_h256(id),
        field_u256(amount),
        field_u128(hashlock_high),
        field_u128(hashlock_low),
        field_u64(timelock),
        field_u64(dst_chain_id),
    ];
    fields.extend(ascii_slots(address_text));
    AztecLog { fields }
}

/// An Aztec dst-lock log (the solver's own counter-lock).
pub fn aztec_dst_lock_log(
    id: H256,
    amount: U256,
    hashlock_high: U128,
    hashlock_low: U128,
    timelock: u64,
    receiver: H256,
) -> AztecLog {
    AztecLog {
        fields: vec![
            field_u64(DST_LOCK_TAG),
            field_h256(id),
            field_u256(amount),
            field_u128(hashlock_high),
            field_u128(hashlock_low),
            field_u64(timelock),
            field_h256(receiver),
        ],
    }
}

/// An Aztec redeem log revealing the secret halves.
pub fn aztec_redeem_log(id: H256, secret: H256) -> AztecLog {
    let (high, low) = split_secret(secret);
    AztecLog {
        fields: vec![
            field_u64(REDEEM_TAG),
            field_h256(id),
            field_u128(high),
            field_u128(low),
        ],
    }
}

/// An Aztec refund log.
pub fn aztec_refund_log(id: H256) -> AztecLog {
    AztecLog {
        fields: vec![field_u64(REFUND_TAG), field_h256(id)],
    }
}

// ============================================================================
// EVM RAW LOG BUILDERS
// ============================================================================

/// Keccak-256 topic of an event signature, matching the client's filters.
pub fn evm_topic(signature: &str) -> String {
    let mut hasher = Keccak256::new();
    hasher.update(signature.as_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

/// First four bytes of a function signature's Keccak-256, hex encoded.
pub fn evm_selector_hex(signature: &str) -> String {
    let mut hasher = Keccak256::new();
    hasher.update(signature.as_bytes());
    hex::encode(&hasher.finalize()[..4])
}

pub const EVM_SRC_LOCKED_SIG: &str = "SrcLocked(bytes32,bytes32,uint256,uint256,string,string)";
pub const EVM_DST_LOCKED_SIG: &str = "DstLocked(bytes32,bytes32,uint256,uint256,address)";
pub const EVM_REDEEMED_SIG: &str = "Redeemed(bytes32,bytes32)";
pub const EVM_REFUNDED_SIG: &str = "Refunded(bytes32)";

fn word_u256(value: U256) -> Vec<u8> {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out.to_vec()
}

fn word_address(addr: &str) -> Vec<u8> {
    let bytes = hex::decode(addr.strip_prefix("0x").unwrap()).unwrap();
    let mut out = vec![0u8; 12];
    out.extend_from_slice(&bytes);
    out
}

fn abi_string_tail(text: &str) -> Vec<u8> {
    let mut out = word_u256(U256::from(text.len()));
    let mut bytes = text.as_bytes().to_vec();
    let padded = bytes.len().div_ceil(32) * 32;
    bytes.resize(padded, 0);
    out.extend_from_slice(&bytes);
    out
}

/// A well-formed EVM SrcLocked log.
pub fn evm_src_locked_log(
    id: H256,
    hashlock: H256,
    amount: U256,
    timelock: u64,
    dst_chain: &str,
    dst_address: &str,
) -> EvmLog {
    let tail1 = abi_string_tail(dst_chain);
    let offset1 = 5 * 32;
    let offset2 = offset1 + tail1.len();

    let mut data = Vec::new();
    data.extend_from_slice(hashlock.as_bytes());
    data.extend_from_slice(&word_u256(amount));
    data.extend_from_slice(&word_u256(U256::from(timelock)));
    data.extend_from_slice(&word_u256(U256::from(offset1)));
    data.extend_from_slice(&word_u256(U256::from(offset2)));
    data.extend_from_slice(&tail1);
    data.extend_from_slice(&abi_string_tail(dst_address));

    EvmLog {
        topics: vec![
            evm_topic(EVM_SRC_LOCKED_SIG),
            format!("0x{}", hex::encode(id.as_bytes())),
        ],
        data: format!("0x{}", hex::encode(data)),
    }
}

/// An EVM DstLocked log (the solver's own counter-lock).
pub fn evm_dst_locked_log(
    id: H256,
    hashlock: H256,
    amount: U256,
    timelock: u64,
    receiver: &str,
) -> EvmLog {
    let mut data = Vec::new();
    data.extend_from_slice(hashlock.as_bytes());
    data.extend_from_slice(&word_u256(amount));
    data.extend_from_slice(&word_u256(U256::from(timelock)));
    data.extend_from_slice(&word_address(receiver));

    EvmLog {
        topics: vec![
            evm_topic(EVM_DST_LOCKED_SIG),
            format!("0x{}", hex::encode(id.as_bytes())),
        ],
        data: format!("0x{}", hex::encode(data)),
    }
}

/// An EVM Redeemed log revealing the secret.
pub fn evm_redeemed_log(id: H256, secret: H256) -> EvmLog {
    EvmLog {
        topics: vec![
            evm_topic(EVM_REDEEMED_SIG),
            format!("0x{}", hex::encode(id.as_bytes())),
        ],
        data: format!("0x{}", hex::encode(secret.as_bytes())),
    }
}

/// An EVM Refunded log.
pub fn evm_refunded_log(id: H256) -> EvmLog {
    EvmLog {
        topics: vec![
            evm_topic(EVM_REFUNDED_SIG),
            format!("0x{}", hex::encode(id.as_bytes())),
        ],
        data: "0x".to_string(),
    }
}

// ============================================================================
// JSON-RPC MOCK HELPERS
// ============================================================================

/// Mounts a mock answering one JSON-RPC method with a fixed result.
pub async fn mock_rpc(server: &MockServer, rpc_method: &str, result: serde_json::Value) {
    Mock::given(http_method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": result,
        })))
        .mount(server)
        .await;
}

/// Mounts a mock answering `eth_call` requests whose calldata contains the
/// given hex fragment (typically a function selector).
pub async fn mock_eth_call(server: &MockServer, calldata_fragment: &str, result_hex: &str) {
    Mock::given(http_method("POST"))
        .and(body_partial_json(json!({ "method": "eth_call" })))
        .and(wiremock::matchers::body_string_contains(calldata_fragment))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": result_hex,
        })))
        .mount(server)
        .await;
}

/// 32-byte words concatenated into an `eth_call` result string.
pub fn call_result_words(words: &[U256]) -> String {
    let mut out = String::from("0x");
    for word in words {
        let mut bytes = [0u8; 32];
        word.to_big_endian(&mut bytes);
        out.push_str(&hex::encode(bytes));
    }
    out
}

/// Extracts the `data` field of every `eth_sendTransaction` request the
/// server has received, in arrival order.
pub async fn sent_transaction_calldata(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|req| {
            let body: serde_json::Value = serde_json::from_slice(&req.body).ok()?;
            if body.get("method")?.as_str()? != "eth_sendTransaction" {
                return None;
            }
            Some(body.get("params")?.get(0)?.get("data")?.as_str()?.to_string())
        })
        .collect()
}
