// src/api/report_handlers.rs
// Manual analysis round-trip: pending prompt lookup, response submission, report download

use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::AppState;
use crate::errors::{ApiError, ValidationError};

#[derive(Debug, Deserialize)]
pub struct AnalysisIdQuery {
    #[serde(default)]
    pub analysis_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitResponseRequest {
    #[serde(default)]
    pub analysis_id: String,
    pub response_json: String,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub report_id: String,
}

pub async fn pending_prompt(
    State(state): State<AppState>,
    Query(query): Query<AnalysisIdQuery>,
) -> Result<Json<Value>, ApiError> {
    if query.analysis_id.is_empty() {
        return Err(ValidationError::MissingField("analysis_id").into());
    }
    let prompt = state
        .analysis
        .pending_prompt(&query.analysis_id)
        .ok_or(ApiError::NotFound("pending analysis"))?;
    Ok(Json(json!({
        "analysis_id": query.analysis_id,
        "prompt": prompt,
    })))
}

pub async fn submit_response(
    State(state): State<AppState>,
    payload: Result<Json<SubmitResponseRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let start = Instant::now();
    let Json(request) = payload?;
    let resolution = state
        .analysis
        .resolve(&request.analysis_id, &request.response_json)
        .await?;

    info!(
        analysis_id = %request.analysis_id,
        report_id = %resolution.report_id,
        duration_ms = start.elapsed().as_millis() as u64,
        "Processed /api/submit_response"
    );
    Ok(Json(json!({
        "report_id": resolution.report_id,
        "had_pending": resolution.had_pending,
    })))
}

pub async fn download_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let start = Instant::now();
    let content = state.analysis.reports().load(&query.report_id).await?;
    let disposition = format!("attachment; filename=\"{}.json\"", query.report_id);

    info!(
        report_id = %query.report_id,
        duration_ms = start.elapsed().as_millis() as u64,
        "Processed /api/report"
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        content,
    )
        .into_response())
}
