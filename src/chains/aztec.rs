//! Aztec-Style Chain Client
//!
//! Client for the private chain's PXE/node RPC. The chain exposes HTLC logs
//! as untyped arrays of 32-byte field slots; this module owns the decoding
//! of that format, including the tolerant recovery of the destination EVM
//! address from space-padded ASCII spread across fixed-width slots.

use anyhow::{Context, Result};
use ethereum_types::{H256, U128, U256};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::config::AztecChainConfig;
use crate::events::{ChainEvent, LockLeg, LockedEvent, RedeemedEvent, RefundedEvent};
use crate::hashlock::{join_secret, split_secret, to_fixed_hex};

use super::{HtlcState, HtlcStatus, LockArgs};

/// How often a pending transaction receipt is re-polled.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

// Event signature tags emitted as the first field of every HTLC log entry.
// These mirror the selector constants of the deployed contract.
pub const SRC_LOCK_TAG: u64 = 0x1d4a_91f2;
pub const DST_LOCK_TAG: u64 = 0x2b7c_03a5;
pub const REDEEM_TAG: u64 = 0x3f58_6cd1;
pub const REFUND_TAG: u64 = 0x4e19_b7e8;

/// Usable bytes per ASCII payload slot: field elements carry 30 bytes of
/// payload, the two high bytes stay zero.
const ASCII_SLOT_BYTES: usize = 30;

/// At most this many trailing slots form the address payload region.
const ASCII_SLOT_COUNT: usize = 4;

/// JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<serde_json::Value>,
    id: u64,
}

/// JSON-RPC response wrapper
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

/// One public log entry as returned by the node.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AztecLog {
    /// 32-byte field slots as hex strings; slot 0 is the event tag.
    pub fields: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GetLogsResult {
    logs: Vec<AztecLog>,
}

#[derive(Debug, Deserialize)]
struct SimulateResult {
    fields: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TxReceipt {
    status: String,
}

/// Client for the Aztec-style chain.
pub struct AztecClient {
    client: Client,
    base_url: String,
    htlc_contract_addr: String,
    token_contract_addr: String,
    solver_address: String,
    secret_key_env: String,
    /// EVM chain identity; src-lock events destined elsewhere are ignored.
    expected_evm_chain_id: u64,
}

impl AztecClient {
    /// Creates a new Aztec chain client.
    pub fn new(config: &AztecChainConfig, expected_evm_chain_id: u64) -> Result<Self> {
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
            secret_key_env: config.secret_key_env.clone(),
            expected_evm_chain_id,
        })
    }

    pub fn solver_address(&self) -> &str {
        &self.solver_address
    }

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

    /// Current chain tip height.
    pub async fn block_number(&self) -> Result<u64> {
        self.rpc("aztec_getBlockNumber", vec![]).await
    }

    /// Fetches and decodes HTLC public logs in the inclusive block range.
    pub async fn fetch_events(&self, from_block: u64, to_block: u64) -> Result<Vec<ChainEvent>> {
        let filter = serde_json::json!({
            "contractAddress": self.htlc_contract_addr.as_str(),
            "fromBlock": from_block,
            "toBlock": to_block,
        });
        let result: GetLogsResult = self.rpc("aztec_getPublicLogs", vec![filter]).await?;
        Ok(result
            .logs
            .iter()
            .filter_map(|log| self.decode_log(log))
            .collect())
    }

    /// Decodes one field-slot log entry.
    ///
    /// Slot 0 carries the event signature tag; the remaining slots are
    /// interpreted positionally per tag. Returns `None` for unknown tags,
    /// short slot arrays, malformed numeric fields, and src-locks destined
    /// for a different EVM chain. Never panics on garbled payloads: a
    /// src-lock whose ASCII address region cannot be recovered still decodes,
    /// with `counterparty: None`.
    pub fn decode_log(&self, log: &AztecLog) -> Option<ChainEvent> {
        let fields = &log.fields;
        let tag = field_u64(fields.first()?)?;

        match tag {
            SRC_LOCK_TAG => {
                if fields.len() < 7 {
                    warn!("Skipping truncated src-lock log ({} fields)", fields.len());
                    return None;
                }
                let swap_id = field_h256(&fields[1])?;
                let amount = field_u256(&fields[2])?;
                let hashlock_high = field_u128(&fields[3])?;
                let hashlock_low = field_u128(&fields[4])?;
                let timelock = field_u64(&fields[5])?;
                let dst_chain_id = field_u64(&fields[6])?;
                if dst_chain_id != self.expected_evm_chain_id {
                    return None;
                }
                let slots = &fields[7..fields.len().min(7 + ASCII_SLOT_COUNT)];
                let counterparty = extract_evm_address(slots);
                if counterparty.is_none() {
                    warn!(
                        "Src-lock {} has no recoverable EVM address yet (address pending)",
                        to_fixed_hex(&swap_id)
                    );
                }
                Some(ChainEvent::Locked(LockedEvent {
                    leg: LockLeg::Src,
                    swap_id,
                    amount,
                    hashlock_high,
                    hashlock_low,
                    timelock,
                    counterparty,
                }))
            }
            DST_LOCK_TAG => {
                if fields.len() < 7 {
                    warn!("Skipping truncated dst-lock log ({} fields)", fields.len());
                    return None;
                }
                let swap_id = field_h256(&fields[1])?;
                let amount = field_u256(&fields[2])?;
                let hashlock_high = field_u128(&fields[3])?;
                let hashlock_low = field_u128(&fields[4])?;
                let timelock = field_u64(&fields[5])?;
                let receiver = field_h256(&fields[6])?;
                Some(ChainEvent::Locked(LockedEvent {
                    leg: LockLeg::Dst,
                    swap_id,
                    amount,
                    hashlock_high,
                    hashlock_low,
                    timelock,
                    counterparty: Some(to_fixed_hex(&receiver)),
                }))
            }
            REDEEM_TAG => {
                if fields.len() < 4 {
                    warn!("Skipping truncated redeem log ({} fields)", fields.len());
                    return None;
                }
                let swap_id = field_h256(&fields[1])?;
                let secret_high = field_u128(&fields[2])?;
                let secret_low = field_u128(&fields[3])?;
                Some(ChainEvent::Redeemed(RedeemedEvent {
                    swap_id,
                    secret: join_secret(secret_high, secret_low),
                }))
            }
            REFUND_TAG => {
                let swap_id = field_h256(fields.get(1)?)?;
                Some(ChainEvent::Refunded(RefundedEvent { swap_id }))
            }
            other => {
                warn!("Skipping Aztec log with unknown event tag {:#x}", other);
                None
            }
        }
    }

    /// Reads the HTLC contract's entry for a swap id via a view simulation.
    ///
    /// `get_swap` returns `[status, amount, timelock, secret_high,
    /// secret_low]`; the secret fields are populated once claimed.
    pub async fn htlc_state(&self, swap_id: H256) -> Result<HtlcState> {
        let fields = self
            .simulate_view(&self.htlc_contract_addr, "get_swap", vec![to_fixed_hex(&swap_id)])
            .await?;
        if fields.len() < 5 {
            anyhow::bail!("Malformed get_swap response ({} fields)", fields.len());
        }

        let status_raw = field_u64(&fields[0]).context("Malformed get_swap status")?;
        let status = match status_raw {
            0 => HtlcStatus::None,
            1 => HtlcStatus::Locked,
            2 => HtlcStatus::Claimed,
            3 => HtlcStatus::Refunded,
            other => anyhow::bail!("Unknown HTLC status {}", other),
        };
        let amount = field_u256(&fields[1]).context("Malformed get_swap amount")?;
        let timelock = field_u64(&fields[2]).context("Malformed get_swap timelock")?;
        let secret = if status == HtlcStatus::Claimed {
            let high = field_u128(&fields[3]).context("Malformed get_swap secret")?;
            let low = field_u128(&fields[4]).context("Malformed get_swap secret")?;
            let joined = join_secret(high, low);
            (!joined.is_zero()).then_some(joined)
        } else {
            None
        };

        Ok(HtlcState {
            status,
            amount,
            timelock,
            secret,
        })
    }

    /// Token balance of `owner` on the configured token contract.
    pub async fn token_balance(&self, owner: &str) -> Result<U256> {
        let fields = self
            .simulate_view(
                &self.token_contract_addr,
                "balance_of_public",
                vec![owner.to_string()],
            )
            .await?;
        let raw = fields.first().context("Empty balance_of_public response")?;
        field_u256(raw).context("Malformed balance_of_public response")
    }

    /// Submits the solver's counter-lock. Hashlock and receiver are passed in
    /// the chain's native form: two field-sized halves and a field address.
    pub async fn submit_lock(&self, args: &LockArgs) -> Result<String> {
        self.send_transaction(
            "lock",
            vec![
                to_fixed_hex(&args.swap_id),
                half_hex(args.hashlock_high),
                half_hex(args.hashlock_low),
                format!("{:#x}", args.amount),
                format!("{:#x}", args.timelock),
                args.receiver.clone(),
            ],
        )
        .await
    }

    /// Submits a redeem with the secret split into field-sized halves.
    pub async fn submit_redeem(&self, swap_id: H256, secret: H256) -> Result<String> {
        let (high, low) = split_secret(secret);
        self.send_transaction(
            "redeem",
            vec![to_fixed_hex(&swap_id), half_hex(high), half_hex(low)],
        )
        .await
    }

    /// Polls the transaction receipt until it settles or the timeout elapses.
    pub async fn await_confirmation(&self, tx_id: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let receipt: TxReceipt = self
                .rpc("aztec_getTxReceipt", vec![serde_json::json!(tx_id)])
                .await?;
            match receipt.status.as_str() {
                "success" => return Ok(()),
                "pending" => {}
                "dropped" => anyhow::bail!("Transaction {} was dropped", tx_id),
                other => anyhow::bail!("Transaction {} in unexpected state '{}'", tx_id, other),
            }

            if Instant::now() >= deadline {
                anyhow::bail!("Timed out after {:?} waiting for transaction {}", timeout, tx_id);
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }

    /// Startup registration: hands the PXE the solver's secret key (from the
    /// configured environment variable) so it can sign on the solver's
    /// behalf for the lifetime of the process.
    pub async fn register_account(&self) -> Result<()> {
        let secret_key = std::env::var(&self.secret_key_env).with_context(|| {
            format!(
                "Environment variable {} with the solver's Aztec secret key is not set",
                self.secret_key_env
            )
        })?;

        let params = serde_json::json!({
            "secretKey": secret_key,
            "address": self.solver_address.as_str(),
        });
        let _: serde_json::Value = self.rpc("aztec_registerAccount", vec![params]).await?;
        Ok(())
    }

    async fn simulate_view(
        &self,
        contract: &str,
        function_name: &str,
        args: Vec<String>,
    ) -> Result<Vec<String>> {
        let params = serde_json::json!({
            "contractAddress": contract,
            "functionName": function_name,
            "args": args,
        });
        let result: SimulateResult = self.rpc("aztec_simulateView", vec![params]).await?;
        Ok(result.fields)
    }

    async fn send_transaction(&self, function_name: &str, args: Vec<String>) -> Result<String> {
        let params = serde_json::json!({
            "contractAddress": self.htlc_contract_addr.as_str(),
            "functionName": function_name,
            "args": args,
            "from": self.solver_address.as_str(),
        });
        self.rpc("aztec_sendTransaction", vec![params]).await
    }
}

/// Recovers an embedded EVM address from space-padded ASCII payload slots.
///
/// Each slot contributes its 30 payload bytes; the concatenation is decoded
/// as UTF-8 (lossily) and scanned for the `0x` + 40 hex digit pattern. This
/// is a tolerant decode: partially-populated or garbled slots yield `None`
/// ("address pending") rather than an error. The padded-slot layout is an
/// external protocol detail; keeping the heuristic inside this one function
/// lets a confirmed wire format replace it without touching watcher logic.
pub fn extract_evm_address(slots: &[String]) -> Option<String> {
    let mut payload = Vec::with_capacity(slots.len() * ASCII_SLOT_BYTES);
    for slot in slots {
        // Unparseable slots are dropped, not fatal; the address may still
        // sit entirely in the remaining ones.
        let Some(value) = field_u256(slot) else {
            continue;
        };
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        payload.extend_from_slice(&bytes[32 - ASCII_SLOT_BYTES..]);
    }

    let text = String::from_utf8_lossy(&payload);
    let pattern = Regex::new(r"0x[0-9a-fA-F]{40}").ok()?;
    pattern
        .find(&text)
        .map(|m| m.as_str().to_lowercase())
}

fn half_hex(half: U128) -> String {
    format!("{:#x}", half)
}

fn field_u256(raw: &str) -> Option<U256> {
    let stripped = raw.strip_prefix("0x").unwrap_or(raw);
    if stripped.is_empty() || stripped.len() > 64 {
        return None;
    }
    U256::from_str_radix(stripped, 16).ok()
}

fn field_h256(raw: &str) -> Option<H256> {
    let value = field_u256(raw)?;
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    Some(H256::from_slice(&bytes))
}

fn field_u64(raw: &str) -> Option<u64> {
    let value = field_u256(raw)?;
    (value <= U256::from(u64::MAX)).then(|| value.low_u64())
}

fn field_u128(raw: &str) -> Option<U128> {
    let value = field_u256(raw)?;
    if value > U256::from(u128::MAX) {
        return None;
    }
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    Some(U128::from_big_endian(&bytes[16..]))
}
