// tests/common/mod.rs
// Shared fixtures: an in-memory market source and a fake exchange HTTP server
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crypto_pulse::analysis::{AnalysisService, MANUAL_ENDPOINT};
use crypto_pulse::config::HttpPolicy;
use crypto_pulse::errors::FetchError;
use crypto_pulse::market_data::MarketSource;
use crypto_pulse::monitor::{MonitorRequest, MonitorSpec};
use crypto_pulse::report::ReportStore;
use crypto_pulse::types::{Kline, OrderBook, TradeRecord};

pub fn kline(open_time: i64) -> Kline {
    Kline {
        open_time,
        open: "100.0".into(),
        high: "101.0".into(),
        low: "99.0".into(),
        close: "100.5".into(),
        volume: "12.34".into(),
        close_time: open_time + 899_999,
    }
}

pub fn spec(symbol: &str, intervals: &[&str], cycle: &str) -> MonitorSpec {
    MonitorRequest {
        symbol: symbol.to_string(),
        intervals: intervals.iter().map(|s| s.to_string()).collect(),
        cycle: Some(cycle.to_string()),
    }
    .validate()
    .expect("valid monitor spec")
}

pub fn analysis_service(endpoint: &str) -> (Arc<AnalysisService>, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("temp dir");
    let reports = ReportStore::new(tmp.path()).expect("report store");
    (Arc::new(AnalysisService::new(endpoint, reports)), tmp)
}

pub fn manual_analysis() -> (Arc<AnalysisService>, tempfile::TempDir) {
    analysis_service(MANUAL_ENDPOINT)
}

/// In-memory source. Every depth fetch returns a new book whose
/// `last_update_id` equals the call number (1-based).
#[derive(Default)]
pub struct ScriptedSource {
    pub kline_calls: AtomicUsize,
    pub depth_calls: AtomicUsize,
    pub trade_calls: AtomicUsize,
    pub fail_depth: AtomicBool,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn depth_calls(&self) -> usize {
        self.depth_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_depth(&self, fail: bool) {
        self.fail_depth.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MarketSource for ScriptedSource {
    async fn fetch_klines(&self, _symbol: &str, _interval: &str) -> Result<Vec<Kline>, FetchError> {
        let call = self.kline_calls.fetch_add(1, Ordering::SeqCst) as i64;
        Ok((0..100).map(|i| kline(call * 1_000_000 + i)).collect())
    }

    async fn fetch_order_book(&self, _symbol: &str) -> Result<OrderBook, FetchError> {
        let call = self.depth_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_depth.load(Ordering::SeqCst) {
            return Err(FetchError::decode("depth", "scripted failure"));
        }
        let mut bids = HashMap::new();
        bids.insert(format!("{}.00", call), 1.0);
        let mut asks = HashMap::new();
        asks.insert(format!("{}.50", call), 2.0);
        Ok(OrderBook {
            last_update_id: call as i64,
            bids,
            asks,
        })
    }

    async fn fetch_trades(&self, _symbol: &str) -> Result<Vec<TradeRecord>, FetchError> {
        self.trade_calls.fetch_add(1, Ordering::SeqCst);
        Ok((0..60)
            .map(|i| {
                let mut trade = TradeRecord::new();
                trade.insert("a".into(), Value::from(i));
                trade.insert("p".into(), Value::from("100.0"));
                trade
            })
            .collect())
    }

    async fn list_symbols(&self) -> Result<Vec<String>, FetchError> {
        Ok(vec!["BTCUSDT".into(), "ETHUSDT".into()])
    }
}

#[derive(Default)]
pub struct FakeExchangeState {
    pub depth_calls: AtomicUsize,
    pub malformed_depth: AtomicBool,
}

pub struct FakeExchange {
    pub base_url: String,
    pub state: Arc<FakeExchangeState>,
}

pub fn test_policy() -> HttpPolicy {
    HttpPolicy {
        timeout: Duration::from_secs(5),
        retries: 1,
        retry_wait: Duration::from_millis(10),
    }
}

fn symbol_error() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "code": -1121, "msg": "Invalid symbol." })),
    )
        .into_response()
}

async fn fake_klines(Query(params): Query<HashMap<String, String>>) -> Response {
    if params.get("symbol").map(String::as_str) == Some("BADSYMBOL") {
        return symbol_error();
    }
    let limit: i64 = params
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(500);
    let rows: Vec<Value> = (0..limit)
        .map(|i| {
            let open = 1_700_000_000_000i64 + i * 900_000;
            json!([open, "100.0", "101.0", "99.0", "100.5", "12.34", open + 899_999, "1234.5", 42, "6.0", "600.0", "0"])
        })
        .collect();
    Json(Value::Array(rows)).into_response()
}

async fn fake_depth(
    State(state): State<Arc<FakeExchangeState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if params.get("symbol").map(String::as_str) == Some("BADSYMBOL") {
        return symbol_error();
    }
    let call = state.depth_calls.fetch_add(1, Ordering::SeqCst) + 1;
    if state.malformed_depth.load(Ordering::SeqCst) {
        return (StatusCode::OK, "{\"lastUpdateId\": \"not json").into_response();
    }
    let bids: Vec<Value> = (0..120)
        .map(|i| json!([format!("{}.00", 30_000 - i), "0.5"]))
        .collect();
    let asks: Vec<Value> = (0..120)
        .map(|i| json!([format!("{}.00", 30_001 + i), "0.25"]))
        .collect();
    Json(json!({ "lastUpdateId": call, "bids": bids, "asks": asks })).into_response()
}

async fn fake_trades(Query(params): Query<HashMap<String, String>>) -> Response {
    if params.get("symbol").map(String::as_str) == Some("BADSYMBOL") {
        return symbol_error();
    }
    let trades: Vec<Value> = (0..500)
        .map(|i| json!({ "a": i, "p": "30000.00", "q": "0.01", "T": 1_700_000_000_000i64 + i, "m": i % 2 == 0 }))
        .collect();
    Json(Value::Array(trades)).into_response()
}

async fn fake_exchange_info() -> Json<Value> {
    Json(json!({
        "timezone": "UTC",
        "symbols": [
            { "symbol": "BTCUSDT", "status": "TRADING" },
            { "symbol": "ETHUSDT", "status": "TRADING" },
            { "symbol": "ETHBTC", "status": "TRADING" },
            { "symbol": "SOLUSDT", "status": "TRADING" }
        ]
    }))
}

pub async fn spawn_fake_exchange() -> FakeExchange {
    let state = Arc::new(FakeExchangeState::default());
    let app = Router::new()
        .route("/api/v3/klines", get(fake_klines))
        .route("/api/v3/depth", get(fake_depth))
        .route("/api/v3/aggTrades", get(fake_trades))
        .route("/api/v3/exchangeInfo", get(fake_exchange_info))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake exchange");
    let addr = listener.local_addr().expect("fake exchange addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake exchange server");
    });

    FakeExchange {
        base_url: format!("http://{}", addr),
        state,
    }
}

/// A local address nothing is listening on.
pub async fn dead_address() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{}", addr)
}
