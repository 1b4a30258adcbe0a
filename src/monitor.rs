// src/monitor.rs
// Per-symbol monitor engine: periodic fetch -> snapshot -> chart -> analysis request

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::analysis::AnalysisService;
use crate::errors::{CycleError, FetchError, ValidationError};
use crate::market_data::{fetch_market_batch, MarketSource};
use crate::prompt::{generate_prompt, PromptParams};
use crate::snapshot::SnapshotStore;
use crate::types::{is_allowed_interval, ChartView};

pub const DEFAULT_CYCLE: &str = "30s";
pub const MIN_CYCLE: Duration = Duration::from_secs(10);

/// Interval used by one-shot chart and prompt requests.
pub const ONE_SHOT_INTERVAL: &str = "15m";

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorRequest {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub intervals: Vec<String>,
    #[serde(default)]
    pub cycle: Option<String>,
}

/// A validated monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorSpec {
    pub symbol: String,
    pub intervals: Vec<String>,
    pub cycle_label: String,
    #[serde(skip)]
    pub cycle: Duration,
}

impl MonitorRequest {
    pub fn validate(self) -> Result<MonitorSpec, ValidationError> {
        let symbol = normalize_symbol(&self.symbol)?;
        if self.intervals.is_empty() {
            return Err(ValidationError::NoIntervals);
        }
        if let Some(bad) = self.intervals.iter().find(|i| !is_allowed_interval(i)) {
            return Err(ValidationError::InvalidInterval(bad.clone()));
        }

        let cycle_label = self
            .cycle
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CYCLE.to_string());
        let cycle = parse_cycle(&cycle_label)?;
        if cycle < MIN_CYCLE {
            return Err(ValidationError::CycleTooShort(MIN_CYCLE, cycle));
        }

        Ok(MonitorSpec {
            symbol,
            intervals: self.intervals,
            cycle_label,
            cycle,
        })
    }
}

impl MonitorSpec {
    /// Spec for a single fetch with no monitoring loop behind it.
    pub fn one_shot(symbol: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            symbol: normalize_symbol(symbol)?,
            intervals: vec![ONE_SHOT_INTERVAL.to_string()],
            cycle_label: DEFAULT_CYCLE.to_string(),
            cycle: Duration::from_secs(30),
        })
    }
}

pub fn normalize_symbol(raw: &str) -> Result<String, ValidationError> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(ValidationError::EmptySymbol);
    }
    Ok(symbol)
}

/// Parses Go-style duration strings: `30s`, `1m30s`, `1.5h`, `500ms`.
pub fn parse_cycle(raw: &str) -> Result<Duration, ValidationError> {
    let invalid = || ValidationError::InvalidCycle(raw.to_string());
    let s = raw.trim();
    if s.is_empty() {
        return Err(invalid());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total_nanos: f64 = 0.0;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if num_len == 0 {
            return Err(invalid());
        }
        let value: f64 = rest[..num_len].parse().map_err(|_| invalid())?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];
        total_nanos += value * nanos_per_unit;
    }

    // Same ceiling as Go's time.Duration (i64 nanoseconds).
    if !total_nanos.is_finite() || total_nanos > i64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Created,
    Running,
    Stopped,
}

pub struct MonitorEngine {
    spec: MonitorSpec,
    source: Arc<dyn MarketSource>,
    analysis: Arc<AnalysisService>,
    snapshot: SnapshotStore,
    latest_chart: RwLock<ChartView>,
    last_analysis_id: Mutex<Option<String>>,
    state: Mutex<EngineState>,
    cycles: AtomicU64,
    stop_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for MonitorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorEngine")
            .field("spec", &self.spec)
            .field("state", &self.state())
            .field("cycles", &self.cycles_completed())
            .finish()
    }
}

impl MonitorEngine {
    pub fn new(
        spec: MonitorSpec,
        source: Arc<dyn MarketSource>,
        analysis: Arc<AnalysisService>,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            spec,
            source,
            analysis,
            snapshot: SnapshotStore::new(),
            latest_chart: RwLock::new(ChartView::default()),
            last_analysis_id: Mutex::new(None),
            state: Mutex::new(EngineState::Created),
            cycles: AtomicU64::new(0),
            stop_tx,
            task: Mutex::new(None),
        }
    }

    pub fn spec(&self) -> &MonitorSpec {
        &self.spec
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn last_analysis_id(&self) -> Option<String> {
        self.last_analysis_id.lock().clone()
    }

    pub fn snapshot(&self) -> &SnapshotStore {
        &self.snapshot
    }

    /// Fetches one full batch and applies it; a failed fetch leaves the snapshot untouched.
    pub async fn fetch(&self) -> Result<(), FetchError> {
        let batch =
            fetch_market_batch(self.source.as_ref(), &self.spec.symbol, &self.spec.intervals).await?;
        self.snapshot.apply(batch).await;
        Ok(())
    }

    /// One synchronous fetch before the loop starts, so callers get data right away.
    pub async fn prime(&self) -> Result<ChartView, FetchError> {
        self.fetch().await?;
        self.refresh_chart().await;
        Ok(self.latest_chart().await)
    }

    /// Fresh chart view straight from the snapshot.
    pub async fn chart_view(&self) -> ChartView {
        let view = self.snapshot.chart_view().await;
        debug!(
            symbol = %self.spec.symbol,
            kline_count = view.kline_count(),
            bids_count = view.depth.bids.len(),
            "Generated chart data"
        );
        view
    }

    /// Chart view cached by the last completed cycle.
    pub async fn latest_chart(&self) -> ChartView {
        self.latest_chart.read().await.clone()
    }

    async fn refresh_chart(&self) {
        let view = self.chart_view().await;
        *self.latest_chart.write().await = view;
    }

    pub async fn generate_prompt(&self, params: &PromptParams) -> String {
        generate_prompt(&self.snapshot, &self.spec.symbol, &self.spec.intervals, params).await
    }

    pub async fn request_analysis(&self) -> Result<String, CycleError> {
        let prompt = self.generate_prompt(&PromptParams::default()).await;
        let analysis_id = self.analysis.issue(prompt)?;
        *self.last_analysis_id.lock() = Some(analysis_id.clone());
        Ok(analysis_id)
    }

    /// Fetch -> store -> chart refresh -> analysis request.
    pub async fn run_cycle(&self) -> Result<String, CycleError> {
        self.fetch().await?;
        self.refresh_chart().await;
        let analysis_id = self.request_analysis().await?;
        self.cycles.fetch_add(1, Ordering::Relaxed);
        Ok(analysis_id)
    }

    /// Created -> Running. Returns false if the engine was already started or stopped.
    pub fn start(self: &Arc<Self>) -> bool {
        {
            let mut state = self.state.lock();
            if *state != EngineState::Created {
                warn!(
                    "🔄 [MONITOR] {} start ignored in state {:?}",
                    self.spec.symbol, *state
                );
                return false;
            }
            *state = EngineState::Running;
        }

        let engine = Arc::clone(self);
        let stop_rx = self.stop_tx.subscribe();
        let handle = tokio::spawn(async move { engine.run_loop(stop_rx).await });
        *self.task.lock() = Some(handle);

        info!(
            "🚀 [MONITOR] Started {} {:?} every {}",
            self.spec.symbol, self.spec.intervals, self.spec.cycle_label
        );
        true
    }

    /// Stops scheduling further cycles. An in-flight cycle is allowed to finish.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if *state == EngineState::Stopped {
            return;
        }
        *state = EngineState::Stopped;
        self.stop_tx.send_replace(true);
        info!("🛑 [MONITOR] Stop requested for {}", self.spec.symbol);
    }

    /// Waits for the periodic task to exit. Returns immediately if it never started.
    pub async fn join(&self) {
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("❌ [MONITOR] Task for {} ended abnormally: {}", self.spec.symbol, e);
            }
        }
    }

    async fn run_loop(self: Arc<Self>, mut stop_rx: watch::Receiver<bool>) {
        let cycle = self.spec.cycle;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + cycle, cycle);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }
            if *stop_rx.borrow() {
                break;
            }

            let start = Instant::now();
            debug!("⏰ [MONITOR] Running cycle for {}", self.spec.symbol);
            match self.run_cycle().await {
                Ok(analysis_id) => info!(
                    symbol = %self.spec.symbol,
                    analysis_id = %analysis_id,
                    "✅ [MONITOR] Cycle #{} completed in {:.2}s",
                    self.cycles_completed(),
                    start.elapsed().as_secs_f64()
                ),
                Err(CycleError::Fetch(e)) => {
                    error!("❌ [MONITOR] {} fetch failed, retrying next tick: {}", self.spec.symbol, e)
                }
                Err(CycleError::Analysis(e)) => {
                    error!("❌ [MONITOR] {} analysis request failed: {}", self.spec.symbol, e)
                }
            }
        }

        info!(
            "🏁 [MONITOR] Loop for {} ended after {} cycles",
            self.spec.symbol,
            self.cycles_completed()
        );
    }
}
