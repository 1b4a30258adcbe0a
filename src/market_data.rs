// src/market_data.rs
// Exchange REST client: klines, depth, aggregated trades and symbol listing

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, HttpPolicy};
use crate::errors::FetchError;
use crate::types::{Kline, MarketBatch, OrderBook, TradeRecord};

pub const KLINE_FETCH_LIMIT: usize = 100;
pub const DEPTH_FETCH_LIMIT: usize = 1000;
pub const TRADE_FETCH_LIMIT: usize = 500;

/// Where a monitor gets its market data from.
#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn fetch_klines(&self, symbol: &str, interval: &str) -> Result<Vec<Kline>, FetchError>;

    async fn fetch_order_book(&self, symbol: &str) -> Result<OrderBook, FetchError>;

    async fn fetch_trades(&self, symbol: &str) -> Result<Vec<TradeRecord>, FetchError>;

    async fn list_symbols(&self) -> Result<Vec<String>, FetchError>;
}

/// Runs one full fetch cycle. Nothing is returned unless every call succeeded.
pub async fn fetch_market_batch(
    source: &dyn MarketSource,
    symbol: &str,
    intervals: &[String],
) -> Result<MarketBatch, FetchError> {
    let start = Instant::now();
    let mut batch = MarketBatch::default();

    for interval in intervals {
        let klines = source.fetch_klines(symbol, interval).await?;
        info!(symbol, interval = %interval, kline_count = klines.len(), "📊 Fetched klines");
        batch.klines.push((interval.clone(), klines));
    }

    batch.order_book = source.fetch_order_book(symbol).await?;
    info!(
        symbol,
        bids_count = batch.order_book.bids.len(),
        asks_count = batch.order_book.asks.len(),
        "📖 Fetched order book"
    );

    batch.trades = source.fetch_trades(symbol).await?;
    info!(symbol, trades_count = batch.trades.len(), "💱 Fetched trades");

    debug!(
        "[MARKET_DATA] Cycle for {} fetched in {:.2}s",
        symbol,
        start.elapsed().as_secs_f64()
    );
    Ok(batch)
}

pub fn filter_symbols(symbols: Vec<String>, query: &str) -> Vec<String> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return symbols;
    }
    symbols
        .into_iter()
        .filter(|s| s.to_lowercase().contains(&needle))
        .collect()
}

#[derive(Deserialize)]
struct DepthResponse {
    #[serde(rename = "lastUpdateId")]
    last_update_id: i64,
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
}

#[derive(Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Deserialize)]
struct SymbolInfo {
    symbol: String,
}

/// Binance-compatible public REST client sharing one reqwest connection pool.
#[derive(Debug, Clone)]
pub struct ExchangeClient {
    client: Client,
    base_url: String,
    policy: HttpPolicy,
}

impl ExchangeClient {
    pub fn new(
        base_url: &str,
        policy: HttpPolicy,
        proxy_url: Option<&str>,
    ) -> Result<Self, FetchError> {
        let mut builder = Client::builder().timeout(policy.timeout);
        if let Some(proxy) = proxy_url {
            info!("🔀 [MARKET_DATA] Using HTTP proxy {}", proxy);
            builder = builder.proxy(reqwest::Proxy::all(proxy).map_err(FetchError::Client)?);
        }
        let client = builder.build().map_err(FetchError::Client)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, FetchError> {
        Self::new(
            &config.exchange_base_url,
            config.http.clone(),
            config.proxy_url.as_deref(),
        )
    }

    /// GET with retries on transport failure only. HTTP error statuses are not retried.
    async fn get_body(&self, path_and_query: &str) -> Result<Vec<u8>, FetchError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let result = match self.client.get(&url).send().await {
                Ok(response) => {
                    let status = response.status();
                    match response.bytes().await {
                        Ok(body) => Ok((status, body)),
                        Err(e) => Err(e),
                    }
                }
                Err(e) => Err(e),
            };

            match result {
                Ok((status, body)) => {
                    debug!("[MARKET_DATA] GET {} -> {}", url, status.as_u16());
                    if !status.is_success() {
                        let snippet: String =
                            String::from_utf8_lossy(&body).chars().take(200).collect();
                        return Err(FetchError::Status {
                            url,
                            status: status.as_u16(),
                            body: snippet,
                        });
                    }
                    return Ok(body.to_vec());
                }
                Err(e) if attempt <= self.policy.retries => {
                    warn!(
                        "⚠️ [MARKET_DATA] GET {} failed (attempt {}/{}): {}",
                        url,
                        attempt,
                        self.policy.retries + 1,
                        e
                    );
                    tokio::time::sleep(self.policy.retry_wait).await;
                }
                Err(e) => {
                    return Err(FetchError::Transport {
                        url,
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }
}

#[async_trait]
impl MarketSource for ExchangeClient {
    async fn fetch_klines(&self, symbol: &str, interval: &str) -> Result<Vec<Kline>, FetchError> {
        let body = self
            .get_body(&format!(
                "/api/v3/klines?symbol={}&interval={}&limit={}",
                symbol, interval, KLINE_FETCH_LIMIT
            ))
            .await?;
        decode_klines(&body)
    }

    async fn fetch_order_book(&self, symbol: &str) -> Result<OrderBook, FetchError> {
        let body = self
            .get_body(&format!(
                "/api/v3/depth?symbol={}&limit={}",
                symbol, DEPTH_FETCH_LIMIT
            ))
            .await?;
        decode_order_book(&body)
    }

    async fn fetch_trades(&self, symbol: &str) -> Result<Vec<TradeRecord>, FetchError> {
        let body = self
            .get_body(&format!(
                "/api/v3/aggTrades?symbol={}&limit={}",
                symbol, TRADE_FETCH_LIMIT
            ))
            .await?;
        serde_json::from_slice::<Vec<TradeRecord>>(&body).map_err(|e| FetchError::decode("trades", e))
    }

    async fn list_symbols(&self) -> Result<Vec<String>, FetchError> {
        let body = self.get_body("/api/v3/exchangeInfo").await?;
        let info: ExchangeInfo =
            serde_json::from_slice(&body).map_err(|e| FetchError::decode("exchange info", e))?;
        Ok(info.symbols.into_iter().map(|s| s.symbol).collect())
    }
}

pub fn decode_klines(body: &[u8]) -> Result<Vec<Kline>, FetchError> {
    let rows: Vec<Vec<Value>> =
        serde_json::from_slice(body).map_err(|e| FetchError::decode("klines", e))?;
    rows.iter()
        .enumerate()
        .map(|(idx, row)| {
            parse_kline_row(row).map_err(|reason| {
                FetchError::decode("klines", format!("row {}: {}", idx, reason))
            })
        })
        .collect()
}

/// `[openTime, open, high, low, close, volume, closeTime, ...]`; trailing columns ignored.
fn parse_kline_row(row: &[Value]) -> Result<Kline, String> {
    if row.len() < 7 {
        return Err(format!("expected at least 7 columns, got {}", row.len()));
    }
    let time = |i: usize| {
        row[i]
            .as_i64()
            .ok_or_else(|| format!("column {} is not an integer timestamp", i))
    };
    let text = |i: usize| {
        row[i]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| format!("column {} is not a decimal string", i))
    };

    Ok(Kline {
        open_time: time(0)?,
        open: text(1)?,
        high: text(2)?,
        low: text(3)?,
        close: text(4)?,
        volume: text(5)?,
        close_time: time(6)?,
    })
}

/// Levels whose price or quantity fails to parse are dropped instead of failing the book.
pub fn decode_order_book(body: &[u8]) -> Result<OrderBook, FetchError> {
    let depth: DepthResponse =
        serde_json::from_slice(body).map_err(|e| FetchError::decode("depth", e))?;

    let (bids, bad_bids) = levels_to_map(depth.bids);
    let (asks, bad_asks) = levels_to_map(depth.asks);
    if bad_bids + bad_asks > 0 {
        debug!(
            "[MARKET_DATA] Dropped {} bid / {} ask levels with unparsable quantities",
            bad_bids, bad_asks
        );
    }

    Ok(OrderBook {
        last_update_id: depth.last_update_id,
        bids,
        asks,
    })
}

fn levels_to_map(levels: Vec<[String; 2]>) -> (HashMap<String, f64>, usize) {
    let mut map = HashMap::with_capacity(levels.len());
    let mut dropped = 0;
    for [price, qty] in levels {
        let price_ok = price.parse::<f64>().map_or(false, f64::is_finite);
        match qty.parse::<f64>() {
            Ok(q) if price_ok => {
                map.insert(price, q);
            }
            _ => dropped += 1,
        }
    }
    (map, dropped)
}
