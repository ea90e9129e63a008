//! # REST + JSON-RPC API
//!
//! Builds the axum router that exposes the pool over HTTP. All endpoints
//! share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                        | Description                      |
//! |--------|-----------------------------|----------------------------------|
//! | GET    | `/health`                   | Liveness check                   |
//! | GET    | `/status`                   | Pool figures                     |
//! | GET    | `/accounts/:address`        | Shares, asset, tickets           |
//! | GET    | `/orders/:id`               | Withdrawal order and its status  |
//! | GET    | `/preview/deposit/:assets`  | Shares a deposit would mint      |
//! | GET    | `/preview/withdraw/:shares` | Asset a redemption would owe     |
//! | POST   | `/rpc`                      | JSON-RPC 2.0 gateway             |
//!
//! The gateway trusts the `caller` parameter. Authentication belongs to
//! whatever fronts the node.
//!
//! Every successful state-changing RPC writes a snapshot before the
//! response goes out, while the pool's write lock is still held. A client
//! that saw a result will find it in the store after a crash.

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use restake_contracts::{
    DepositOutcome, ErrorClass, OrderId, OrderStatus, PoolError, PoolStatus, RestakingPool,
    WithdrawOutcome,
};
use restake_protocol::storage::SnapshotStore;
use restake_protocol::types::{decimal, Address, Amount};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// The pool behind a lock. Writers are serialized, which is what the
/// pool's atomicity model expects.
pub type SharedPool = Arc<RwLock<RestakingPool>>;

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The pool every handler reads and writes.
    pub pool: SharedPool,
    /// Prometheus gauges and counters.
    pub metrics: SharedMetrics,
    /// Where mutating RPCs persist the pool before responding.
    pub store: Arc<SnapshotStore>,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/orders/:id", get(order_handler))
        .route("/preview/deposit/:assets", get(preview_deposit_handler))
        .route("/preview/withdraw/:shares", get(preview_withdraw_handler))
        .route("/rpc", post(rpc_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// JSON-RPC Types
// ---------------------------------------------------------------------------

/// JSON-RPC error codes for pool rejections, one per error class.
pub const CODE_PRECONDITION: i32 = -32010;
pub const CODE_CAPACITY: i32 = -32011;
pub const CODE_LIQUIDITY: i32 = -32012;
pub const CODE_INVARIANT: i32 = -32013;

/// The call took effect in memory but its snapshot could not be written.
pub const CODE_PERSISTENCE: i32 = -32603;

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version. Must be "2.0".
    pub jsonrpc: String,
    /// The method to invoke.
    pub method: String,
    /// Named parameters.
    pub params: Option<serde_json::Value>,
    /// Request identifier. Echoed back in the response.
    pub id: serde_json::Value,
}

/// A JSON-RPC 2.0 response envelope.
///
/// Serialized straight to the HTTP body so 128-bit amounts survive; a
/// `serde_json::Value` cannot hold them.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// Always "2.0".
    pub jsonrpc: String,
    /// Present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RpcResult>,
    /// Present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// The request's id.
    pub id: serde_json::Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i32,
    /// Short human-readable error description.
    pub message: String,
    /// Optional structured error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl From<&PoolError> for JsonRpcError {
    fn from(e: &PoolError) -> Self {
        let class = e.class();
        let code = match class {
            ErrorClass::Precondition => CODE_PRECONDITION,
            ErrorClass::Capacity => CODE_CAPACITY,
            ErrorClass::Liquidity => CODE_LIQUIDITY,
            ErrorClass::Invariant => CODE_INVARIANT,
        };
        Self {
            code,
            message: e.to_string(),
            data: Some(serde_json::json!({ "class": class })),
        }
    }
}

/// Successful RPC results.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RpcResult {
    /// Shares minted and any refunded remainder.
    Deposit(DepositOutcome),
    /// How a withdrawal request was settled.
    Withdraw(WithdrawOutcome),
    /// A paid-out order.
    Claim {
        /// The claimed order.
        order_id: OrderId,
        /// Asset paid to the ticket holder.
        amount: Amount,
    },
    /// Result of `advanceQueue`.
    Advance {
        /// Liquidity newly committed to pending orders.
        released: Amount,
    },
    /// Result of `setRate`.
    Rate {
        /// The rate now in effect.
        rate: Amount,
    },
}

#[derive(Debug, Deserialize)]
struct DepositParams {
    caller: Address,
    #[serde(with = "decimal")]
    amount: Amount,
    receiver: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct WithdrawParams {
    caller: Address,
    #[serde(with = "decimal")]
    shares: Amount,
    receiver: Option<Address>,
    owner: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct ClaimParams {
    caller: Address,
    order_id: OrderId,
}

#[derive(Debug, Deserialize)]
struct SetRateParams {
    caller: Address,
    #[serde(with = "decimal")]
    rate: Amount,
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// ISO-8601 pool time.
    pub timestamp: String,
    pub pool: PoolStatus,
}

/// Response payload for `GET /preview/withdraw/:shares`.
#[derive(Debug, Serialize)]
pub struct PreviewWithdrawResponse {
    pub shares: Amount,
    pub assets: Amount,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn pool_error_response(e: &PoolError) -> axum::response::Response {
    let status = match e.class() {
        ErrorClass::Invariant => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    error_response(status, e.to_string())
}

fn parse_amount(raw: &str) -> Result<Amount, axum::response::Response> {
    raw.replace('_', "")
        .parse::<Amount>()
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("invalid amount {raw:?}: {e}")))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
///
/// Liveness only. A halted pool still answers here; `/status` reports it.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`: pool-wide figures.
async fn status_handler(State(state): State<AppState>) -> axum::response::Response {
    let pool = state.pool.read().await;
    match pool.status() {
        Ok(status) => {
            state.metrics.observe(&status);
            Json(StatusResponse {
                version: state.version.clone(),
                timestamp: pool.now().to_rfc3339(),
                pool: status,
            })
            .into_response()
        }
        Err(e) => pool_error_response(&e),
    }
}

/// `GET /accounts/:address`: shares, share value, asset, tickets.
///
/// Unknown addresses are simply empty accounts.
async fn account_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> axum::response::Response {
    let pool = state.pool.read().await;
    match pool.account(&Address::from(address)) {
        Ok(view) => Json(view).into_response(),
        Err(e) => pool_error_response(&e),
    }
}

/// `GET /orders/:id`: order details. 404 for ids never issued.
async fn order_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
) -> axum::response::Response {
    let view = state.pool.read().await.order(OrderId(id));
    if view.status == OrderStatus::Unknown {
        return error_response(StatusCode::NOT_FOUND, format!("order {} not found", view.id));
    }
    Json(view).into_response()
}

/// `GET /preview/deposit/:assets`
async fn preview_deposit_handler(
    Path(raw): Path<String>,
    State(state): State<AppState>,
) -> axum::response::Response {
    let assets = match parse_amount(&raw) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    match state.pool.read().await.preview_deposit(assets) {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => pool_error_response(&e),
    }
}

/// `GET /preview/withdraw/:shares`
async fn preview_withdraw_handler(
    Path(raw): Path<String>,
    State(state): State<AppState>,
) -> axum::response::Response {
    let shares = match parse_amount(&raw) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match state.pool.read().await.preview_withdraw(shares) {
        Ok(assets) => Json(PreviewWithdrawResponse { shares, assets }).into_response(),
        Err(e) => pool_error_response(&e),
    }
}

/// `POST /rpc`: JSON-RPC 2.0 gateway.
///
/// Methods: `deposit`, `requestWithdraw`, `claim`, `advanceQueue`,
/// `setRate`. Pool rejections map to codes -32010..-32013 by error class;
/// unknown methods return -32601.
async fn rpc_handler(
    State(state): State<AppState>,
    Json(req): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    if req.jsonrpc != "2.0" {
        return Json(JsonRpcResponse {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(JsonRpcError::new(
                -32600,
                "Invalid Request: jsonrpc must be \"2.0\"",
            )),
            id: req.id,
        });
    }

    let params = req.params.unwrap_or(serde_json::Value::Null);
    let (result, error) = match dispatch(&state, &req.method, params).await {
        Ok(result) => (Some(result), None),
        Err(error) => (None, Some(error)),
    };

    Json(JsonRpcResponse {
        jsonrpc: "2.0".into(),
        result,
        error,
        id: req.id,
    })
}

fn parse_params<T: DeserializeOwned>(params: serde_json::Value) -> Result<T, JsonRpcError> {
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::new(-32602, format!("Invalid params: {e}")))
}

async fn dispatch(
    state: &AppState,
    method: &str,
    params: serde_json::Value,
) -> Result<RpcResult, JsonRpcError> {
    let mut pool = state.pool.write().await;
    let metrics = &state.metrics;

    let result = match method {
        "deposit" => {
            let p: DepositParams = parse_params(params)?;
            let receiver = p.receiver.unwrap_or_else(|| p.caller.clone());
            pool.deposit(&p.caller, p.amount, &receiver).map(|outcome| {
                metrics.deposits_total.inc();
                RpcResult::Deposit(outcome)
            })
        }
        "requestWithdraw" => {
            let p: WithdrawParams = parse_params(params)?;
            let owner = p.owner.unwrap_or_else(|| p.caller.clone());
            let receiver = p.receiver.unwrap_or_else(|| owner.clone());
            pool.request_withdraw(&p.caller, p.shares, &receiver, &owner)
                .map(|outcome| {
                    metrics.withdrawal_requests_total.inc();
                    RpcResult::Withdraw(outcome)
                })
        }
        "claim" => {
            let p: ClaimParams = parse_params(params)?;
            pool.claim(&p.caller, p.order_id).map(|amount| {
                metrics.claims_total.inc();
                RpcResult::Claim {
                    order_id: p.order_id,
                    amount,
                }
            })
        }
        "advanceQueue" => pool
            .advance_queue()
            .map(|released| RpcResult::Advance { released }),
        "setRate" => {
            let p: SetRateParams = parse_params(params)?;
            pool.set_rate(&p.caller, p.rate)
                .map(|()| RpcResult::Rate { rate: p.rate })
        }
        _ => {
            return Err(JsonRpcError::new(
                -32601,
                format!("Method not found: {method}"),
            ))
        }
    };

    match pool.status() {
        Ok(status) => metrics.observe(&status),
        Err(e) => tracing::warn!(error = %e, "status unavailable after rpc"),
    }
    let result = result.map_err(|e| {
        metrics.reject(e.class());
        JsonRpcError::from(&e)
    })?;

    // Still under the write lock: nothing else can land between the
    // mutation and its snapshot.
    match state.store.put_snapshot(pool.state()) {
        Ok(seq) => {
            tracing::debug!(method, seq, "snapshot written after rpc");
            Ok(result)
        }
        Err(e) => {
            tracing::error!(method, error = %e, "failed to persist snapshot after rpc");
            Err(JsonRpcError::new(
                CODE_PERSISTENCE,
                format!("applied but not persisted: {e}"),
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use restake_protocol::access::Role;
    use restake_protocol::clock::ManualClock;
    use restake_contracts::PoolState;
    use restake_protocol::config::{ProtocolConfig, RATE_PRECISION};
    use serde_json::json;
    use tower::ServiceExt;

    /// Creates a test AppState: `alice` holds 10k wei, no fast reserve.
    fn test_app_state() -> AppState {
        test_app_state_with(Arc::new(SnapshotStore::open_temporary().unwrap()))
    }

    fn test_app_state_with(store: Arc<SnapshotStore>) -> AppState {
        let mut config = ProtocolConfig::default();
        config.ledger.cap = 1_000_000;
        config.ledger.daily_limit_bps = 10_000;
        config.vault.fast_reserve_bps = 0;
        let pool = RestakingPool::new(
            &config,
            Address::from("admin"),
            [(Address::from("alice"), 10_000)],
            Arc::new(ManualClock::at_unix(1_700_000_000)),
        )
        .unwrap();

        AppState {
            version: "0.1.0-test".into(),
            pool: Arc::new(RwLock::new(pool)),
            metrics: Arc::new(crate::metrics::NodeMetrics::new().unwrap()),
            store,
        }
    }

    /// Sends a GET request and returns the (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    /// Sends a JSON-RPC call and returns the parsed response body.
    async fn rpc(router: &Router, method: &str, params: serde_json::Value) -> serde_json::Value {
        let body = json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": 1 });
        let req = Request::builder()
            .method("POST")
            .uri("/rpc")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_of(body: &[u8]) -> serde_json::Value {
        serde_json::from_slice(body).unwrap()
    }

    // -- REST ---------------------------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["status"], "ok");
    }

    #[tokio::test]
    async fn status_endpoint_reports_pool_figures() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/status").await;

        assert_eq!(status, StatusCode::OK);
        let json = json_of(&body);
        assert_eq!(json["version"], "0.1.0-test");
        assert_eq!(json["pool"]["total_shares"], 0);
        assert_eq!(json["pool"]["cap"], 1_000_000);
        assert_eq!(json["pool"]["halted"], false);
    }

    #[tokio::test]
    async fn unknown_order_is_404() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/orders/7").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json_of(&body)["error"].as_str().unwrap().contains("#7"));
    }

    #[tokio::test]
    async fn previews_parse_and_quote() {
        let router = create_router(test_app_state());

        let (status, body) = get(&router, "/preview/deposit/2_500").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["shares_minted"], 2_500);

        let (status, body) = get(&router, "/preview/withdraw/300").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["assets"], 300);

        let (status, _) = get(&router, "/preview/withdraw/lots").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // -- JSON-RPC -----------------------------------------------------------

    #[tokio::test]
    async fn rpc_deposit_updates_account() {
        let state = test_app_state();
        let metrics = Arc::clone(&state.metrics);
        let router = create_router(state);

        let resp = rpc(&router, "deposit", json!({ "caller": "alice", "amount": "1000" })).await;
        assert_eq!(resp["result"]["shares_minted"], 1_000);
        assert_eq!(resp["result"]["refund"], 0);

        let (status, body) = get(&router, "/accounts/alice").await;
        assert_eq!(status, StatusCode::OK);
        let account = json_of(&body);
        assert_eq!(account["shares"], 1_000);
        assert_eq!(account["asset_balance"], 9_000);
        assert_eq!(metrics.deposits_total.get(), 1);
        assert_eq!(metrics.share_supply.get(), 1_000.0);
    }

    #[tokio::test]
    async fn rpc_withdraw_claim_flow() {
        let state = test_app_state();
        let pool = Arc::clone(&state.pool);
        let metrics = Arc::clone(&state.metrics);
        let router = create_router(state);

        rpc(&router, "deposit", json!({ "caller": "alice", "amount": 1_000 })).await;
        pool.write()
            .await
            .withdraw_for_restaking(&Address::from("admin"))
            .unwrap();

        let resp = rpc(&router, "requestWithdraw", json!({ "caller": "alice", "shares": "400" })).await;
        assert_eq!(resp["result"]["status"], "queued");
        assert_eq!(resp["result"]["order_id"], 0);

        let (status, body) = get(&router, "/orders/0").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["status"], "pending");

        let resp = rpc(&router, "claim", json!({ "caller": "alice", "order_id": 0 })).await;
        assert_eq!(resp["error"]["code"], CODE_LIQUIDITY);
        assert_eq!(resp["error"]["data"]["class"], "liquidity");
        assert_eq!(
            metrics
                .rejected_operations_total
                .with_label_values(&["liquidity"])
                .get(),
            1
        );

        pool.write()
            .await
            .deposit_from_restaker(&Address::from("admin"), 400)
            .unwrap();
        let resp = rpc(&router, "claim", json!({ "caller": "alice", "order_id": 0 })).await;
        assert_eq!(resp["result"]["amount"], 400);

        let (_, body) = get(&router, "/orders/0").await;
        assert_eq!(json_of(&body)["status"], "claimed");
    }

    #[tokio::test]
    async fn rpc_set_rate_and_advance() {
        let state = test_app_state();
        state
            .pool
            .write()
            .await
            .grant_role(&Address::from("admin"), Role::RateSource, &Address::from("oracle"))
            .unwrap();
        let router = create_router(state);

        let rate = RATE_PRECISION + RATE_PRECISION * 40 / 10_000;
        let resp = rpc(
            &router,
            "setRate",
            json!({ "caller": "oracle", "rate": rate.to_string() }),
        )
        .await;
        assert!(resp["error"].is_null());

        let resp = rpc(&router, "setRate", json!({ "caller": "alice", "rate": rate.to_string() })).await;
        assert_eq!(resp["error"]["code"], CODE_PRECONDITION);

        let resp = rpc(&router, "advanceQueue", serde_json::Value::Null).await;
        assert_eq!(resp["result"]["released"], 0);
    }

    #[tokio::test]
    async fn rpc_deposit_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SnapshotStore::open(dir.path()).unwrap());
        let router = create_router(test_app_state_with(Arc::clone(&store)));

        let resp = rpc(&router, "deposit", json!({ "caller": "alice", "amount": "1000" })).await;
        assert_eq!(resp["result"]["shares_minted"], 1_000);
        assert_eq!(store.snapshot_count(), 1);

        // Rejections and unknown methods change nothing and write nothing.
        let resp = rpc(&router, "claim", json!({ "caller": "alice", "order_id": 7 })).await;
        assert!(resp["error"]["code"].is_i64());
        rpc(&router, "mint", json!({})).await;
        assert_eq!(store.snapshot_count(), 1);

        // Crash without a shutdown snapshot.
        drop(router);
        drop(store);

        let store = SnapshotStore::open(dir.path()).unwrap();
        let (seq, state): (u64, PoolState) = store.latest_snapshot().unwrap().unwrap();
        assert_eq!(seq, 0);
        let pool = RestakingPool::from_state(state, Arc::new(ManualClock::at_unix(1_700_000_000)));
        let alice = pool.account(&Address::from("alice")).unwrap();
        assert_eq!(alice.shares, 1_000);
        assert_eq!(alice.asset_balance, 9_000);
    }

    #[tokio::test]
    async fn rpc_rejects_malformed_calls() {
        let router = create_router(test_app_state());

        let resp = rpc(&router, "mint", json!({})).await;
        assert_eq!(resp["error"]["code"], -32601);

        let resp = rpc(&router, "deposit", json!({ "caller": "alice" })).await;
        assert_eq!(resp["error"]["code"], -32602);

        let body = json!({ "jsonrpc": "1.0", "method": "advanceQueue", "id": 9 });
        let req = Request::builder()
            .method("POST")
            .uri("/rpc")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"]["code"], -32600);
        assert_eq!(json["id"], 9);
    }
}
