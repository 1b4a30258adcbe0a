// src/prompt.rs
// Renders a bounded analysis prompt from a market snapshot

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde_json::json;

use crate::snapshot::{tail, Snapshot, SnapshotStore};
use crate::types::Kline;

pub const PROMPT_KLINE_LIMIT: usize = 10;
pub const PROMPT_TRADE_LIMIT: usize = 50;
pub const PROMPT_DEPTH_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptParams {
    pub analysis_type: String,
    pub cycle: String,
    // Reserved for historical-range analysis; not used by the template yet.
    pub start_ts: i64,
    pub end_ts: i64,
}

impl Default for PromptParams {
    fn default() -> Self {
        Self {
            analysis_type: "monitor".to_string(),
            cycle: "continuous".to_string(),
            start_ts: 0,
            end_ts: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Bid,
    Ask,
}

/// Bids best-first (highest price), asks best-first (lowest price), then cut to `limit`.
/// Levels whose price is not a finite number are left out.
pub fn top_levels(levels: &HashMap<String, f64>, side: Side, limit: usize) -> Vec<(String, f64)> {
    let mut sorted: Vec<(f64, &String, f64)> = levels
        .iter()
        .filter_map(|(price, qty)| {
            let numeric = price.parse::<f64>().ok().filter(|p| p.is_finite())?;
            Some((numeric, price, *qty))
        })
        .collect();

    sorted.sort_by(|a, b| {
        let by_price = match side {
            Side::Bid => b.0.total_cmp(&a.0),
            Side::Ask => a.0.total_cmp(&b.0),
        };
        if by_price == Ordering::Equal {
            a.1.cmp(b.1)
        } else {
            by_price
        }
    });

    sorted
        .into_iter()
        .take(limit)
        .map(|(_, price, qty)| (price.clone(), qty))
        .collect()
}

/// Prompt body text. Pure: the snapshot is only read.
pub fn render_prompt(
    symbol: &str,
    intervals: &[String],
    snapshot: &Snapshot,
    params: &PromptParams,
) -> String {
    let klines: BTreeMap<&str, &[Kline]> = snapshot
        .klines
        .iter()
        .map(|(interval, klines)| (interval.as_str(), tail(klines, PROMPT_KLINE_LIMIT)))
        .collect();
    let trades = tail(&snapshot.trades, PROMPT_TRADE_LIMIT);
    let order_book = json!({
        "bids": top_levels(&snapshot.order_book.bids, Side::Bid, PROMPT_DEPTH_LIMIT),
        "asks": top_levels(&snapshot.order_book.asks, Side::Ask, PROMPT_DEPTH_LIMIT),
    });

    let klines_json = serde_json::to_string(&klines).unwrap_or_else(|_| "{}".to_string());
    let order_book_json = order_book.to_string();
    let trades_json = serde_json::to_string(trades).unwrap_or_else(|_| "[]".to_string());
    let sentiment = if snapshot.sentiment.is_empty() {
        "unknown"
    } else {
        snapshot.sentiment.as_str()
    };

    format!(
        r#"## Digital Asset Market Dynamics Report

**Input data**:
- Trading pair: {symbol}
- Kline intervals: [{intervals}]
  - Data: {klines_json}
- Order book depth: {order_book_json}
- Trades: {trades_json}
- External sentiment: {sentiment}
- Analysis type: {analysis_type}
- Monitoring cycle: {cycle}
## Analysis tasks
1. Capital flow
- Identify aggressive buy/sell direction
- Track large-order behaviour
- Judge net inflow/outflow trend

2. Technical structure
- Cross-check indicators across intervals
- Locate key price ranges
- Flag potential trend reversals

3. Order book depth
- Compare bid and ask strength
- Identify support and resistance zones

4. Market sentiment
- Volume distribution characteristics
- Volatility changes

5. Risk warnings
- Abnormal price movements
- Signs of market manipulation
"#,
        symbol = symbol,
        intervals = intervals.join(", "),
        klines_json = klines_json,
        order_book_json = order_book_json,
        trades_json = trades_json,
        sentiment = sentiment,
        analysis_type = params.analysis_type,
        cycle = params.cycle,
    )
}

/// Wraps a prompt body in the `{"prompt": ...}` envelope.
pub fn wrap_prompt(body: &str) -> String {
    json!({ "prompt": body }).to_string()
}

/// Renders and wraps a prompt while holding the store's read lock.
pub async fn generate_prompt(
    store: &SnapshotStore,
    symbol: &str,
    intervals: &[String],
    params: &PromptParams,
) -> String {
    let body = store
        .read(|snapshot| render_prompt(symbol, intervals, snapshot, params))
        .await;
    wrap_prompt(&body)
}
