// src/snapshot.rs
// Lock-protected latest market state for one monitored symbol

use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;
use tracing::debug;

use crate::types::{ChartView, DepthView, Kline, MarketBatch, OrderBook, TradeRecord, NEUTRAL_SENTIMENT};

/// Klines per interval kept in a chart view.
pub const CHART_KLINE_LIMIT: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub klines: HashMap<String, Vec<Kline>>,
    pub order_book: OrderBook,
    pub trades: Vec<TradeRecord>,
    pub sentiment: String,
}

/// Every read and write goes through the same RwLock, so readers only ever
/// see state left behind by a completed write.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    inner: RwLock<Snapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn replace_klines(&self, interval: &str, klines: Vec<Kline>) {
        let mut snapshot = self.inner.write().await;
        snapshot.klines.insert(interval.to_string(), klines);
    }

    pub async fn replace_order_book(&self, order_book: OrderBook) {
        let mut snapshot = self.inner.write().await;
        snapshot.order_book = order_book;
    }

    pub async fn replace_trades(&self, trades: Vec<TradeRecord>) {
        let mut snapshot = self.inner.write().await;
        snapshot.trades = trades;
        snapshot.sentiment = NEUTRAL_SENTIMENT.to_string();
    }

    /// Applies a whole fetch cycle under a single write guard.
    pub async fn apply(&self, batch: MarketBatch) {
        let mut snapshot = self.inner.write().await;
        for (interval, klines) in batch.klines {
            snapshot.klines.insert(interval, klines);
        }
        snapshot.order_book = batch.order_book;
        snapshot.trades = batch.trades;
        snapshot.sentiment = NEUTRAL_SENTIMENT.to_string();
        debug!(
            "[SNAPSHOT] Applied batch: {} intervals, {} bids, {} asks, {} trades",
            snapshot.klines.len(),
            snapshot.order_book.bids.len(),
            snapshot.order_book.asks.len(),
            snapshot.trades.len()
        );
    }

    pub async fn chart_view(&self) -> ChartView {
        let snapshot = self.inner.read().await;
        render_chart(&snapshot)
    }

    /// Runs `f` against the snapshot while holding the read lock.
    pub async fn read<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> R {
        let snapshot = self.inner.read().await;
        f(&snapshot)
    }

    pub async fn to_snapshot(&self) -> Snapshot {
        self.inner.read().await.clone()
    }
}

pub fn render_chart(snapshot: &Snapshot) -> ChartView {
    let kline: BTreeMap<String, Vec<Kline>> = snapshot
        .klines
        .iter()
        .map(|(interval, klines)| (interval.clone(), tail(klines, CHART_KLINE_LIMIT).to_vec()))
        .collect();

    ChartView {
        kline,
        depth: DepthView {
            bids: snapshot.order_book.bids.clone(),
            asks: snapshot.order_book.asks.clone(),
        },
    }
}

/// Last `n` items of a slice.
pub fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}
