// src/types.rs
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Interval labels a monitor may subscribe to.
pub const ALLOWED_INTERVALS: [&str; 6] = ["1m", "5m", "15m", "1h", "4h", "1d"];

/// Sentiment label attached to every snapshot after a trade fetch.
pub const NEUTRAL_SENTIMENT: &str = "neutral";

/// One candlestick. Prices stay as the exchange's decimal strings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Kline {
    pub open_time: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub close_time: i64,
}

/// Price level -> quantity on each side. Replaced wholesale on every fetch.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct OrderBook {
    pub last_update_id: i64,
    pub bids: HashMap<String, f64>,
    pub asks: HashMap<String, f64>,
}

/// Trades are carried exactly as the exchange sends them.
pub type TradeRecord = serde_json::Map<String, serde_json::Value>;

/// Everything one fetch cycle produced, applied to a snapshot in one go.
#[derive(Debug, Clone, Default)]
pub struct MarketBatch {
    pub klines: Vec<(String, Vec<Kline>)>,
    pub order_book: OrderBook,
    pub trades: Vec<TradeRecord>,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct DepthView {
    pub bids: HashMap<String, f64>,
    pub asks: HashMap<String, f64>,
}

/// Bounded copy of a snapshot for charting.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct ChartView {
    pub kline: BTreeMap<String, Vec<Kline>>,
    pub depth: DepthView,
}

impl ChartView {
    pub fn kline_count(&self) -> usize {
        self.kline.values().map(Vec::len).sum()
    }
}

pub fn is_allowed_interval(interval: &str) -> bool {
    ALLOWED_INTERVALS.contains(&interval)
}
