// src/registry.rs
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::AnalysisService;
use crate::errors::FetchError;
use crate::market_data::MarketSource;
use crate::monitor::{MonitorEngine, MonitorSpec};
use crate::types::ChartView;

#[derive(Debug, Clone, Serialize)]
pub struct StartedMonitor {
    pub monitor_id: String,
    pub chart: ChartView,
}

/// Running monitors by id. Owns the collaborators every engine is built with.
pub struct MonitorRegistry {
    monitors: DashMap<String, Arc<MonitorEngine>>,
    source: Arc<dyn MarketSource>,
    analysis: Arc<AnalysisService>,
}

impl MonitorRegistry {
    pub fn new(source: Arc<dyn MarketSource>, analysis: Arc<AnalysisService>) -> Self {
        Self {
            monitors: DashMap::new(),
            source,
            analysis,
        }
    }

    /// Builds an engine that is never registered or started.
    pub fn detached_engine(&self, spec: MonitorSpec) -> MonitorEngine {
        MonitorEngine::new(spec, Arc::clone(&self.source), Arc::clone(&self.analysis))
    }

    /// Primes, registers and starts a monitor. A failed initial fetch registers nothing.
    pub async fn start(&self, spec: MonitorSpec) -> Result<StartedMonitor, FetchError> {
        let engine = Arc::new(self.detached_engine(spec));
        engine.prime().await?;

        let mut monitor_id = Uuid::new_v4().to_string();
        while self.monitors.contains_key(&monitor_id) {
            monitor_id = Uuid::new_v4().to_string();
        }
        self.monitors.insert(monitor_id.clone(), Arc::clone(&engine));
        engine.start();

        let chart = engine.chart_view().await;
        info!(
            monitor_id = %monitor_id,
            symbol = %engine.spec().symbol,
            kline_count = chart.kline_count(),
            "📡 [REGISTRY] Monitor registered ({} active)",
            self.monitors.len()
        );

        Ok(StartedMonitor { monitor_id, chart })
    }

    /// Removes and stops a monitor. False if the id is unknown.
    pub fn stop(&self, monitor_id: &str) -> bool {
        match self.monitors.remove(monitor_id) {
            Some((_, engine)) => {
                engine.stop();
                info!(monitor_id, "🛑 [REGISTRY] Monitor stopped ({} active)", self.monitors.len());
                true
            }
            None => {
                warn!(monitor_id, "⚠️ [REGISTRY] Monitor not found");
                false
            }
        }
    }

    pub fn get(&self, monitor_id: &str) -> Option<Arc<MonitorEngine>> {
        self.monitors.get(monitor_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn active_ids(&self) -> Vec<String> {
        self.monitors.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// Stops every monitor and waits for their tasks to exit.
    pub async fn stop_all(&self) {
        let ids = self.active_ids();
        let mut engines = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some((_, engine)) = self.monitors.remove(&id) {
                engine.stop();
                engines.push(engine);
            }
        }
        for engine in &engines {
            engine.join().await;
        }
        info!("🏁 [REGISTRY] Stopped {} monitors", engines.len());
    }
}
