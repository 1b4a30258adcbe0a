// src/api/market_handlers.rs
// One-shot market endpoints: symbol search, chart snapshot, prompt snapshot

use std::time::Instant;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::AppState;
use crate::errors::ApiError;
use crate::market_data::filter_symbols;
use crate::monitor::MonitorSpec;
use crate::prompt::PromptParams;

#[derive(Debug, Deserialize)]
pub struct PairsQuery {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct SymbolQuery {
    #[serde(default)]
    pub symbol: String,
}

pub async fn list_pairs(
    State(state): State<AppState>,
    Query(params): Query<PairsQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    let start = Instant::now();
    let symbols = state.source.list_symbols().await?;
    let pairs = filter_symbols(symbols, &params.query);
    info!(
        query = %params.query,
        matches = pairs.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Processed /api/pairs"
    );
    Ok(Json(pairs))
}

pub async fn chart_snapshot(
    State(state): State<AppState>,
    Query(params): Query<SymbolQuery>,
) -> Result<Json<Value>, ApiError> {
    let start = Instant::now();
    let spec = MonitorSpec::one_shot(&params.symbol)?;
    let engine = state.registry.detached_engine(spec);
    let chart = engine.prime().await?;

    info!(
        symbol = %engine.spec().symbol,
        duration_ms = start.elapsed().as_millis() as u64,
        "Processed /api/chart"
    );
    Ok(Json(json!({ "chart_data": chart })))
}

pub async fn prompt_snapshot(
    State(state): State<AppState>,
    Query(params): Query<SymbolQuery>,
) -> Result<Json<Value>, ApiError> {
    let start = Instant::now();
    let spec = MonitorSpec::one_shot(&params.symbol)?;
    let engine = state.registry.detached_engine(spec);
    engine.fetch().await?;
    let prompt = engine.generate_prompt(&PromptParams::default()).await;

    info!(
        symbol = %engine.spec().symbol,
        duration_ms = start.elapsed().as_millis() as u64,
        "Processed /api/prompt"
    );
    Ok(Json(json!({
        "symbol": engine.spec().symbol,
        "prompt": prompt,
    })))
}
