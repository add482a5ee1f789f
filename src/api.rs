//! Control API
//!
//! Minimal HTTP surface over the in-memory registry: liveness, solver
//! introspection, and an out-of-band lock notification that bypasses
//! event-poll latency. JSON over HTTP, CORS-open. Error responses are
//! `{"error": message}`; malformed JSON bodies surface the parse error with
//! a 500, acceptable for an internal/testnet-facing service.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use ethereum_types::{U128, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::{Filter, Rejection, Reply};

use crate::chains::ChainId;
use crate::config::{validate_aztec_address, validate_evm_address};
use crate::engine::{IntakeOutcome, SolverEngine};
use crate::events::{LockLeg, LockedEvent};
use crate::hashlock::{half_to_hex, normalize_swap_id, to_fixed_hex};
use crate::registry::{unix_now, SwapDirection, SwapRecord};

/// Request failed client-side validation.
#[derive(Debug)]
struct BadRequest(String);
impl warp::reject::Reject for BadRequest {}

/// Requested entity does not exist.
#[derive(Debug)]
struct NotFound(String);
impl warp::reject::Reject for NotFound {}

/// Request body was not valid JSON; the parse error is passed through.
#[derive(Debug)]
struct ParseFailure(String);
impl warp::reject::Reject for ParseFailure {}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    pending_swaps: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChainInfo {
    address: String,
    /// Decimal token balance; null when the chain RPC is unreachable.
    balance: Option<String>,
}

#[derive(Debug, Serialize)]
struct InfoResponse {
    aztec: ChainInfo,
    evm: ChainInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapSummary {
    swap_id: String,
    direction: &'static str,
    amount: String,
    solver_locked: bool,
    user_redeemed: bool,
    solver_redeemed: bool,
    created_at: u64,
}

#[derive(Debug, Serialize)]
struct SwapsResponse {
    swaps: Vec<SwapSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapDetail {
    swap_id: String,
    direction: &'static str,
    amount: String,
    hashlock_high: String,
    hashlock_low: String,
    hashlock: String,
    counterparty: Option<String>,
    user_timelock: u64,
    solver_locked: bool,
    user_redeemed: bool,
    solver_redeemed: bool,
    created_at: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteRequest {
    direction: String,
    amount: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    direction: &'static str,
    input_amount: String,
    output_amount: String,
    timelock_seconds: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotifyLockRequest {
    swap_id: serde_json::Value,
    direction: String,
    amount: serde_json::Value,
    hashlock_high: String,
    hashlock_low: String,
    user_address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotifyLockResponse {
    status: &'static str,
    swap_id: String,
}

fn summarize(record: &SwapRecord) -> SwapSummary {
    SwapSummary {
        swap_id: to_fixed_hex(&record.swap_id),
        direction: record.direction.as_str(),
        amount: record.amount.to_string(),
        solver_locked: record.solver_locked,
        user_redeemed: record.user_redeemed,
        solver_redeemed: record.solver_redeemed,
        created_at: record.created_at,
    }
}

fn with_engine(
    engine: Arc<SolverEngine>,
) -> impl Filter<Extract = (Arc<SolverEngine>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || engine.clone())
}

/// Builds all control API routes with CORS and error normalization applied.
pub fn build_routes(
    engine: Arc<SolverEngine>,
) -> impl Filter<Extract = impl Reply, Error = std::convert::Infallible> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_engine(engine.clone()))
        .and_then(health_handler);

    let info = warp::path("info")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_engine(engine.clone()))
        .and_then(info_handler);

    let swaps = warp::path("swaps")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_engine(engine.clone()))
        .and_then(swaps_handler);

    let swap_detail = warp::path("swap")
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_engine(engine.clone()))
        .and_then(swap_detail_handler);

    let quote = warp::path("quote")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::bytes())
        .and(with_engine(engine.clone()))
        .and_then(quote_handler);

    let notify_lock = warp::path("notify-lock")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::bytes())
        .and(with_engine(engine))
        .and_then(notify_lock_handler);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST", "OPTIONS"]);

    health
        .or(info)
        .or(swaps)
        .or(swap_detail)
        .or(quote)
        .or(notify_lock)
        .with(cors)
        .recover(handle_rejection)
}

/// Starts the control API server; runs until the process stops.
pub async fn run_api_server(engine: Arc<SolverEngine>, host: String, port: u16) {
    let routes = build_routes(engine);
    // Fall back to loopback if host parsing fails.
    let ip: IpAddr = host
        .parse()
        .unwrap_or(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
    info!("Control API listening on {}:{}", ip, port);
    warp::serve(routes).run((ip, port)).await;
}

async fn health_handler(engine: Arc<SolverEngine>) -> Result<impl Reply, Rejection> {
    let pending_swaps = engine.registry().pending_count().await;
    Ok(warp::reply::json(&HealthResponse {
        status: "ok",
        pending_swaps,
    }))
}

async fn info_handler(engine: Arc<SolverEngine>) -> Result<impl Reply, Rejection> {
    let (aztec_balance, evm_balance) = engine.live_balances().await;
    Ok(warp::reply::json(&InfoResponse {
        aztec: ChainInfo {
            address: engine.client(ChainId::Aztec).solver_address().to_string(),
            balance: aztec_balance.map(|b| b.to_string()),
        },
        evm: ChainInfo {
            address: engine.client(ChainId::Evm).solver_address().to_string(),
            balance: evm_balance.map(|b| b.to_string()),
        },
    }))
}

async fn swaps_handler(engine: Arc<SolverEngine>) -> Result<impl Reply, Rejection> {
    let swaps = engine
        .registry()
        .list()
        .await
        .iter()
        .map(summarize)
        .collect();
    Ok(warp::reply::json(&SwapsResponse { swaps }))
}

async fn swap_detail_handler(
    raw_id: String,
    engine: Arc<SolverEngine>,
) -> Result<impl Reply, Rejection> {
    let swap_id = normalize_swap_id(&raw_id)
        .map_err(|e| warp::reject::custom(BadRequest(e.to_string())))?;
    let record = engine.registry().get(swap_id).await.ok_or_else(|| {
        warp::reject::custom(NotFound(format!("No swap {}", to_fixed_hex(&swap_id))))
    })?;

    Ok(warp::reply::json(&SwapDetail {
        swap_id: to_fixed_hex(&record.swap_id),
        direction: record.direction.as_str(),
        amount: record.amount.to_string(),
        hashlock_high: half_to_hex(record.hashlock_high),
        hashlock_low: half_to_hex(record.hashlock_low),
        hashlock: to_fixed_hex(&record.hashlock()),
        counterparty: record.counterparty.clone(),
        user_timelock: record.user_timelock,
        solver_locked: record.solver_locked,
        user_redeemed: record.user_redeemed,
        solver_redeemed: record.solver_redeemed,
        created_at: record.created_at,
    }))
}

async fn quote_handler(body: Bytes, engine: Arc<SolverEngine>) -> Result<impl Reply, Rejection> {
    let request: QuoteRequest = parse_body(&body)?;
    let direction = parse_direction(&request.direction)?;
    let amount = parse_amount(&request.amount)?;

    // 1:1 for now; no fee model.
    Ok(warp::reply::json(&QuoteResponse {
        direction: direction.as_str(),
        input_amount: amount.to_string(),
        output_amount: amount.to_string(),
        timelock_seconds: engine.config().service.user_timelock_secs,
    }))
}

async fn notify_lock_handler(
    body: Bytes,
    engine: Arc<SolverEngine>,
) -> Result<impl Reply, Rejection> {
    let request: NotifyLockRequest = parse_body(&body)?;
    let direction = parse_direction(&request.direction)?;
    let swap_id = normalize_swap_id(&json_value_as_string(&request.swap_id))
        .map_err(|e| warp::reject::custom(BadRequest(e.to_string())))?;
    let amount = parse_amount(&request.amount)?;
    let hashlock_high = parse_half(&request.hashlock_high)?;
    let hashlock_low = parse_half(&request.hashlock_low)?;

    let address_check = match direction.destination() {
        ChainId::Aztec => validate_aztec_address(&request.user_address),
        ChainId::Evm => validate_evm_address(&request.user_address),
    };
    address_check.map_err(|e| {
        warp::reject::custom(BadRequest(format!("Invalid userAddress: {}", e)))
    })?;

    // The notification carries no timelock; assume the standard user lock
    // duration this service quotes.
    let event = LockedEvent {
        leg: LockLeg::Src,
        swap_id,
        amount,
        hashlock_high,
        hashlock_low,
        timelock: unix_now() + engine.config().service.user_timelock_secs,
        counterparty: Some(request.user_address.to_lowercase()),
    };

    debug!(
        "notify-lock for swap {} ({})",
        to_fixed_hex(&swap_id),
        direction.as_str()
    );
    let status = match engine.handle_locked(direction.origin(), event).await {
        IntakeOutcome::Accepted => "accepted",
        IntakeOutcome::AlreadyTracking => "already_tracking",
    };

    Ok(warp::reply::json(&NotifyLockResponse {
        status,
        swap_id: to_fixed_hex(&swap_id),
    }))
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, Rejection> {
    serde_json::from_slice(body)
        .map_err(|e| warp::reject::custom(ParseFailure(e.to_string())))
}

fn parse_direction(value: &str) -> Result<SwapDirection, Rejection> {
    SwapDirection::parse(value).ok_or_else(|| {
        warp::reject::custom(BadRequest(format!(
            "Unknown direction '{}': expected aztec_to_evm or evm_to_aztec",
            value
        )))
    })
}

/// Accepts amounts as JSON numbers or as decimal/hex strings; JSON numbers
/// alone cannot carry full 256-bit quantities.
fn parse_amount(value: &serde_json::Value) -> Result<U256, Rejection> {
    let raw = json_value_as_string(value);
    let parsed = if let Some(hex_part) = raw.strip_prefix("0x") {
        U256::from_str_radix(hex_part, 16).ok()
    } else {
        U256::from_dec_str(&raw).ok()
    };
    parsed
        .filter(|amount| !amount.is_zero())
        .ok_or_else(|| {
            warp::reject::custom(BadRequest(format!("Invalid amount '{}'", raw)))
        })
}

fn parse_half(raw: &str) -> Result<U128, Rejection> {
    let id = normalize_swap_id(raw)
        .map_err(|e| warp::reject::custom(BadRequest(e.to_string())))?;
    let as_u256 = U256::from_big_endian(id.as_bytes());
    if as_u256 > U256::from(u128::MAX) {
        return Err(warp::reject::custom(BadRequest(format!(
            "Hashlock half '{}' exceeds 128 bits",
            raw
        ))));
    }
    Ok(U128::from_big_endian(&id.as_bytes()[16..]))
}

fn json_value_as_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Normalizes rejections into `{"error": message}` responses.
async fn handle_rejection(rej: Rejection) -> Result<impl Reply, std::convert::Infallible> {
    let (status, message) = if let Some(BadRequest(msg)) = rej.find::<BadRequest>() {
        (StatusCode::BAD_REQUEST, msg.clone())
    } else if let Some(NotFound(msg)) = rej.find::<NotFound>() {
        (StatusCode::NOT_FOUND, msg.clone())
    } else if let Some(ParseFailure(msg)) = rej.find::<ParseFailure>() {
        (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
    } else if rej.is_not_found() {
        (StatusCode::NOT_FOUND, "Endpoint not found".to_string())
    } else if rej.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed".to_string(),
        )
    } else {
        error!("Unhandled rejection: {:?}", rej);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ErrorBody { error: message }),
        status,
    ))
}
