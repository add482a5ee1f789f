//! EVM Chain Client
//!
//! JSON-RPC client for the EVM chain's HTLC contract: queries lock/redeem
//! logs with `eth_getLogs`, reads contract state with `eth_call`, and submits
//! transactions with `eth_sendTransaction` (the node's signer manages the
//! solver key).

use anyhow::{Context, Result};
use ethereum_types::{H256, U256};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::config::EvmChainConfig;
use crate::events::{ChainEvent, LockLeg, LockedEvent, RedeemedEvent, RefundedEvent};
use crate::hashlock::{hashlock_bytes32, split_secret};

use super::{HtlcState, HtlcStatus, LockArgs};

/// How often a pending transaction receipt is re-polled.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

// Event signatures of the HTLC contract. Indexed parameters do not affect
// the signature, only the types matter.
const SRC_LOCKED_SIG: &str = "SrcLocked(bytes32,bytes32,uint256,uint256,string,string)";
const DST_LOCKED_SIG: &str = "DstLocked(bytes32,bytes32,uint256,uint256,address)";
const REDEEMED_SIG: &str = "Redeemed(bytes32,bytes32)";
const REFUNDED_SIG: &str = "Refunded(bytes32)";

/// EVM JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<serde_json::Value>,
    id: u64,
}

/// EVM JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// EVM event log entry
#[derive(Debug, Clone, Deserialize)]
pub struct EvmLog {
    /// Array of topics (indexed event parameters)
    pub topics: Vec<String>,
    /// Event data (non-indexed parameters)
    pub data: String,
}

/// Client for the EVM chain.
pub struct EvmClient {
    client: Client,
    base_url: String,
    htlc_contract_addr: String,
    token_contract_addr: String,
    solver_address: String,
    /// Chain A identity; SrcLocked events destined elsewhere are ignored.
    expected_dst_label: String,
    topic_src_locked: String,
    topic_dst_locked: String,
    topic_redeemed: String,
    topic_refunded: String,
}

impl EvmClient {
    /// Creates a new EVM chain client.
    pub fn new(config: &EvmChainConfig, expected_dst_label: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.rpc_url.clone(),
            htlc_contract_addr: config.htlc_contract_addr.to_lowercase(),
            token_contract_addr: config.token_contract_addr.to_lowercase(),
            solver_address: config.solver_address.to_lowercase(),
            expected_dst_label,
            topic_src_locked: event_topic(SRC_LOCKED_SIG),
            topic_dst_locked: event_topic(DST_LOCKED_SIG),
            topic_redeemed: event_topic(REDEEMED_SIG),
            topic_refunded: event_topic(REFUNDED_SIG),
        })
    }

    pub fn solver_address(&self) -> &str {
        &self.solver_address
    }

    /// Sends one JSON-RPC request and unwraps the response envelope.
    async fn rpc<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        };

        let response: JsonRpcResponse<T> = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", method))?
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", method))?;

        if let Some(error) = response.error {
            anyhow::bail!("{} failed: {} ({})", method, error.message, error.code);
        }
        response
            .result
            .with_context(|| format!("{} returned no result", method))
    }

    /// Gets the current block number.
    pub async fn block_number(&self) -> Result<u64> {
        let block_hex: String = self.rpc("eth_blockNumber", vec![]).await?;
        parse_quantity(&block_hex).context("Failed to parse block number")
    }

    /// Queries the HTLC contract for events in the inclusive block range and
    /// decodes them. Malformed logs are skipped with a warning.
    pub async fn fetch_events(&self, from_block: u64, to_block: u64) -> Result<Vec<ChainEvent>> {
        let filter = serde_json::json!({
            "address": self.htlc_contract_addr.as_str(),
            "fromBlock": format!("0x{:x}", from_block),
            "toBlock": format!("0x{:x}", to_block),
            "topics": [[
                self.topic_src_locked.as_str(),
                self.topic_dst_locked.as_str(),
                self.topic_redeemed.as_str(),
                self.topic_refunded.as_str(),
            ]],
        });

        let logs: Vec<EvmLog> = self.rpc("eth_getLogs", vec![filter]).await?;
        Ok(logs.iter().filter_map(|log| self.decode_log(log)).collect())
    }

    /// Decodes a single HTLC log entry.
    ///
    /// Returns `None` for malformed logs and for SrcLocked events whose
    /// destination-chain field names a different deployment. Pure and
    /// idempotent; decoding the same log twice yields the same event.
    pub fn decode_log(&self, log: &EvmLog) -> Option<ChainEvent> {
        let topic0 = log.topics.first()?.to_lowercase();
        let swap_id = topic_h256(log.topics.get(1)?)?;
        let data = decode_hex_blob(&log.data)?;

        if topic0 == self.topic_src_locked {
            let hashlock = word_h256(&data, 0)?;
            let amount = word_u256(&data, 1)?;
            let timelock = word_u64(&data, 2)?;
            let dst_chain = abi_string(&data, 3)?;
            let dst_address = abi_string(&data, 4)?;
            if dst_chain != self.expected_dst_label {
                return None;
            }
            let (hashlock_high, hashlock_low) = split_secret(hashlock);
            Some(ChainEvent::Locked(LockedEvent {
                leg: LockLeg::Src,
                swap_id,
                amount,
                hashlock_high,
                hashlock_low,
                timelock,
                counterparty: Some(dst_address),
            }))
        } else if topic0 == self.topic_dst_locked {
            let hashlock = word_h256(&data, 0)?;
            let amount = word_u256(&data, 1)?;
            let timelock = word_u64(&data, 2)?;
            let receiver = word_address(&data, 3)?;
            let (hashlock_high, hashlock_low) = split_secret(hashlock);
            Some(ChainEvent::Locked(LockedEvent {
                leg: LockLeg::Dst,
                swap_id,
                amount,
                hashlock_high,
                hashlock_low,
                timelock,
                counterparty: Some(receiver),
            }))
        } else if topic0 == self.topic_redeemed {
            let secret = word_h256(&data, 0)?;
            Some(ChainEvent::Redeemed(RedeemedEvent { swap_id, secret }))
        } else if topic0 == self.topic_refunded {
            Some(ChainEvent::Refunded(RefundedEvent { swap_id }))
        } else {
            warn!("Skipping EVM log with unknown topic {}", topic0);
            None
        }
    }

    /// Reads the HTLC contract's entry for a swap id.
    ///
    /// `getSwap(bytes32)` returns `(uint8 status, uint256 amount,
    /// uint256 timelock, bytes32 secret)`; the secret word is populated once
    /// the entry is claimed.
    pub async fn htlc_state(&self, swap_id: H256) -> Result<HtlcState> {
        let mut calldata = selector("getSwap(bytes32)");
        calldata.extend_from_slice(swap_id.as_bytes());
        let data = self.eth_call(&self.htlc_contract_addr, &calldata).await?;

        let status_raw = word_u64(&data, 0).context("Malformed getSwap response")?;
        let status = match status_raw {
            0 => HtlcStatus::None,
            1 => HtlcStatus::Locked,
            2 => HtlcStatus::Claimed,
            3 => HtlcStatus::Refunded,
            other => anyhow::bail!("Unknown HTLC status {}", other),
        };
        let amount = word_u256(&data, 1).context("Malformed getSwap response")?;
        let timelock = word_u64(&data, 2).context("Malformed getSwap response")?;
        let secret_word = word_h256(&data, 3).context("Malformed getSwap response")?;
        let secret =
            (status == HtlcStatus::Claimed && !secret_word.is_zero()).then_some(secret_word);

        Ok(HtlcState {
            status,
            amount,
            timelock,
            secret,
        })
    }

    /// ERC20 balance of `owner` for the configured token.
    pub async fn token_balance(&self, owner: &str) -> Result<U256> {
        let mut calldata = selector("balanceOf(address)");
        calldata.extend_from_slice(&encode_address(owner)?);
        let data = self.eth_call(&self.token_contract_addr, &calldata).await?;
        word_u256(&data, 0).context("Malformed balanceOf response")
    }

    /// ERC20 allowance granted by the solver to the HTLC contract.
    pub async fn htlc_allowance(&self) -> Result<U256> {
        let mut calldata = selector("allowance(address,address)");
        calldata.extend_from_slice(&encode_address(&self.solver_address)?);
        calldata.extend_from_slice(&encode_address(&self.htlc_contract_addr)?);
        let data = self.eth_call(&self.token_contract_addr, &calldata).await?;
        word_u256(&data, 0).context("Malformed allowance response")
    }

    /// Submits the solver's counter-lock:
    /// `lock(bytes32 id, bytes32 hashlock, uint256 amount, uint256 timelock,
    /// address receiver)`. The contract pulls `amount` via `transferFrom`.
    pub async fn submit_lock(&self, args: &LockArgs) -> Result<String> {
        let hashlock = hashlock_bytes32(args.hashlock_high, args.hashlock_low);
        let mut calldata = selector("lock(bytes32,bytes32,uint256,uint256,address)");
        calldata.extend_from_slice(args.swap_id.as_bytes());
        calldata.extend_from_slice(hashlock.as_bytes());
        calldata.extend_from_slice(&encode_u256(args.amount));
        calldata.extend_from_slice(&encode_u256(U256::from(args.timelock)));
        calldata.extend_from_slice(&encode_address(&args.receiver)?);
        self.send_transaction(&calldata).await
    }

    /// Submits a redeem: `redeem(bytes32 id, bytes32 secret)`.
    pub async fn submit_redeem(&self, swap_id: H256, secret: H256) -> Result<String> {
        let mut calldata = selector("redeem(bytes32,bytes32)");
        calldata.extend_from_slice(swap_id.as_bytes());
        calldata.extend_from_slice(secret.as_bytes());
        self.send_transaction(&calldata).await
    }

    /// Polls the transaction receipt until it confirms, fails, or the
    /// timeout elapses.
    pub async fn await_confirmation(&self, tx_hash: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let receipt: serde_json::Value = self
                .rpc(
                    "eth_getTransactionReceipt",
                    vec![serde_json::json!(tx_hash)],
                )
                .await
                .unwrap_or(serde_json::Value::Null);

            if !receipt.is_null() {
                let status = receipt.get("status").and_then(|s| s.as_str()).unwrap_or("");
                if status == "0x1" {
                    return Ok(());
                }
                anyhow::bail!("Transaction {} reverted (status {})", tx_hash, status);
            }

            if Instant::now() >= deadline {
                anyhow::bail!(
                    "Timed out after {:?} waiting for transaction {}",
                    timeout,
                    tx_hash
                );
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }

    /// Startup check: the RPC node must manage the solver's key, since
    /// submissions go through `eth_sendTransaction`.
    pub async fn verify_managed_account(&self) -> Result<()> {
        let accounts: Vec<String> = self.rpc("eth_accounts", vec![]).await?;
        if accounts
            .iter()
            .any(|a| a.eq_ignore_ascii_case(&self.solver_address))
        {
            Ok(())
        } else {
            anyhow::bail!(
                "EVM node does not manage the solver account {} (eth_accounts returned {} entries)",
                self.solver_address,
                accounts.len()
            )
        }
    }

    async fn eth_call(&self, to: &str, calldata: &[u8]) -> Result<Vec<u8>> {
        let call = serde_json::json!({
            "to": to,
            "data": format!("0x{}", hex::encode(calldata)),
        });
        let result: String = self
            .rpc("eth_call", vec![call, serde_json::json!("latest")])
            .await?;
        decode_hex_blob(&result).context("eth_call returned malformed hex")
    }

    async fn send_transaction(&self, calldata: &[u8]) -> Result<String> {
        let tx = serde_json::json!({
            "from": self.solver_address.as_str(),
            "to": self.htlc_contract_addr.as_str(),
            "data": format!("0x{}", hex::encode(calldata)),
        });
        self.rpc("eth_sendTransaction", vec![tx]).await
    }
}

/// Keccak-256 topic of an event signature, `0x`-prefixed.
fn event_topic(signature: &str) -> String {
    let mut hasher = Keccak256::new();
    hasher.update(signature.as_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

/// First four bytes of the Keccak-256 of a function signature.
fn selector(signature: &str) -> Vec<u8> {
    let mut hasher = Keccak256::new();
    hasher.update(signature.as_bytes());
    hasher.finalize()[..4].to_vec()
}

/// Parses a `0x`-prefixed quantity into a u64.
fn parse_quantity(value: &str) -> Result<u64> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(stripped, 16).with_context(|| format!("invalid quantity '{}'", value))
}

fn decode_hex_blob(value: &str) -> Option<Vec<u8>> {
    hex::decode(value.strip_prefix("0x").unwrap_or(value)).ok()
}

fn topic_h256(topic: &str) -> Option<H256> {
    let bytes = decode_hex_blob(topic)?;
    (bytes.len() == 32).then(|| H256::from_slice(&bytes))
}

fn word(data: &[u8], index: usize) -> Option<&[u8]> {
    data.get(index * 32..(index + 1) * 32)
}

fn word_h256(data: &[u8], index: usize) -> Option<H256> {
    word(data, index).map(H256::from_slice)
}

fn word_u256(data: &[u8], index: usize) -> Option<U256> {
    word(data, index).map(U256::from_big_endian)
}

fn word_u64(data: &[u8], index: usize) -> Option<u64> {
    let value = word_u256(data, index)?;
    (value <= U256::from(u64::MAX)).then(|| value.low_u64())
}

/// Extracts the 20-byte address from a right-aligned 32-byte word.
fn word_address(data: &[u8], index: usize) -> Option<String> {
    word(data, index).map(|w| format!("0x{}", hex::encode(&w[12..])))
}

/// Decodes a dynamic `string` whose offset sits at the given head word.
fn abi_string(data: &[u8], head_index: usize) -> Option<String> {
    let offset = word_u64(data, head_index)? as usize;
    let len_word = data.get(offset..offset + 32)?;
    let len = U256::from_big_endian(len_word);
    if len > U256::from(data.len()) {
        return None;
    }
    let len = len.low_u64() as usize;
    let bytes = data.get(offset + 32..offset + 32 + len)?;
    String::from_utf8(bytes.to_vec()).ok()
}

/// ABI-encodes a `0x`-prefixed 20-byte address as a 32-byte word.
fn encode_address(addr: &str) -> Result<[u8; 32]> {
    let stripped = addr
        .strip_prefix("0x")
        .context("address must be 0x-prefixed")?;
    let bytes = hex::decode(stripped).context("invalid hex address")?;
    if bytes.len() != 20 {
        anyhow::bail!("expected 20-byte address, got {} bytes", bytes.len());
    }
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(&bytes);
    Ok(out)
}

fn encode_u256(value: U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}
