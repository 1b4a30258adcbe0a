// src/api/monitor_handlers.rs
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::AppState;
use crate::errors::{ApiError, ValidationError};
use crate::monitor::MonitorRequest;

#[derive(Debug, Deserialize)]
pub struct MonitorIdRequest {
    #[serde(default)]
    pub monitor_id: String,
}

pub async fn start_monitor(
    State(state): State<AppState>,
    payload: Result<Json<MonitorRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let start = Instant::now();
    let Json(request) = payload?;
    let spec = request.validate()?;
    let (symbol, intervals, cycle) = (
        spec.symbol.clone(),
        spec.intervals.clone(),
        spec.cycle_label.clone(),
    );

    let started = state.registry.start(spec).await?;

    info!(
        symbol = %symbol,
        intervals = ?intervals,
        cycle = %cycle,
        monitor_id = %started.monitor_id,
        duration_ms = start.elapsed().as_millis() as u64,
        "Processed /api/monitor"
    );
    Ok(Json(json!({
        "chart_data": started.chart,
        "monitor_id": started.monitor_id,
    })))
}

pub async fn stop_monitor(
    State(state): State<AppState>,
    payload: Result<Json<MonitorIdRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let start = Instant::now();
    let Json(request) = payload?;
    if !state.registry.stop(&request.monitor_id) {
        return Err(ApiError::NotFound("monitor"));
    }
    info!(
        monitor_id = %request.monitor_id,
        duration_ms = start.elapsed().as_millis() as u64,
        "Processed /api/monitor/stop"
    );
    Ok(Json(json!({ "message": "Monitoring stopped" })))
}

/// Cached chart view and last analysis id of a running monitor.
pub async fn latest_monitor_data(
    State(state): State<AppState>,
    Query(request): Query<MonitorIdRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.monitor_id.is_empty() {
        return Err(ValidationError::MissingField("monitor_id").into());
    }
    let engine = state
        .registry
        .get(&request.monitor_id)
        .ok_or(ApiError::NotFound("monitor"))?;

    Ok(Json(json!({
        "monitor_id": request.monitor_id,
        "symbol": engine.spec().symbol,
        "state": engine.state(),
        "chart_data": engine.latest_chart().await,
        "analysis_id": engine.last_analysis_id(),
        "cycles": engine.cycles_completed(),
    })))
}
