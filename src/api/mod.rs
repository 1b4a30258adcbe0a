// src/api/mod.rs
pub mod market_handlers;
pub mod monitor_handlers;
pub mod report_handlers;

use std::sync::Arc;

use std::path::Path;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tracing::info;

use crate::analysis::AnalysisService;
use crate::config::AppConfig;
use crate::errors::ConfigError;
use crate::market_data::{ExchangeClient, MarketSource};
use crate::registry::MonitorRegistry;
use crate::report::ReportStore;

/// Shared handler state: one exchange client, one analysis service, one registry.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub source: Arc<dyn MarketSource>,
    pub analysis: Arc<AnalysisService>,
    pub registry: Arc<MonitorRegistry>,
}

impl AppState {
    pub fn new(config: AppConfig, source: Arc<dyn MarketSource>, reports: ReportStore) -> Self {
        let analysis = Arc::new(AnalysisService::new(config.ai_endpoint.clone(), reports));
        let registry = Arc::new(MonitorRegistry::new(
            Arc::clone(&source),
            Arc::clone(&analysis),
        ));
        Self {
            config: Arc::new(config),
            source,
            analysis,
            registry,
        }
    }

    pub fn from_config(config: AppConfig) -> Result<Self, ConfigError> {
        let client = ExchangeClient::from_config(&config)?;
        let reports = ReportStore::new(&config.report_dir)?;
        info!("📁 [API] Reports stored in {}", reports.dir().display());
        Ok(Self::new(config, Arc::new(client), reports))
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_dir = state.config.static_dir.clone();
    let api = Router::new()
        .route("/api/pairs", get(market_handlers::list_pairs))
        .route("/api/chart", get(market_handlers::chart_snapshot))
        .route("/api/prompt", get(market_handlers::prompt_snapshot))
        .route("/api/monitor", post(monitor_handlers::start_monitor))
        .route("/api/monitor/stop", post(monitor_handlers::stop_monitor))
        .route("/api/monitor/latest", get(monitor_handlers::latest_monitor_data))
        .route("/api/pending_prompt", get(report_handlers::pending_prompt))
        .route("/api/submit_response", post(report_handlers::submit_response))
        .route("/api/report", get(report_handlers::download_report))
        .route("/health", get(health_check));

    let app = match static_dir {
        Some(dir) => with_static_files(api, Path::new(&dir)),
        None => api,
    };
    app.layer(cors).with_state(state)
}

/// Web UI: `/` serves `index.html`, everything else under `/static`.
fn with_static_files(router: Router<AppState>, dir: &Path) -> Router<AppState> {
    info!("🗂️ [API] Serving static files from {}", dir.display());
    router
        .route_service("/", ServeFile::new(dir.join("index.html")))
        .nest_service("/static", ServeDir::new(dir))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "exchange": state.config.exchange_base_url,
        "ai_endpoint": state.config.ai_endpoint,
        "active_monitors": state.registry.len(),
        "pending_analyses": state.analysis.pending_count(),
        "timestamp": chrono::Utc::now(),
    }))
}
