// src/errors.rs
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Failures talking to the exchange.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Fetch failed for {url} after {attempts} attempt(s): {source}")]
    Transport {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("Exchange returned status {status} for {url}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("Decode failed for {what}: {reason}")]
    Decode { what: String, reason: String },
}

impl FetchError {
    pub fn decode(what: impl Into<String>, reason: impl ToString) -> Self {
        FetchError::Decode {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

/// Caller input rejected before any engine starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("symbol is required")]
    EmptySymbol,

    #[error("intervals are required")]
    NoIntervals,

    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    #[error("invalid cycle duration: {0}")]
    InvalidCycle(String),

    #[error("cycle must be at least {}s, got {:?}", .0.as_secs(), .1)]
    CycleTooShort(Duration, Duration),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Report I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("report not found: {0}")]
    NotFound(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("unsupported AI endpoint: {0}")]
    UnsupportedEndpoint(String),

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// A single monitor cycle failed; the engine logs it and keeps ticking.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Startup failures. The binary exits on any of these.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("Invalid proxy URL {url:?}: {reason}")]
    InvalidProxy { url: String, reason: String },

    #[error(transparent)]
    Client(#[from] FetchError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Everything an HTTP handler can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("{0} not found")]
    NotFound(&'static str),
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        ApiError::Analysis(AnalysisError::Report(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(ValidationError::MalformedBody(rejection.body_text()))
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Analysis(AnalysisError::Report(ReportError::NotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Fetch(_) | ApiError::Analysis(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ApiError::Fetch(e) => {
                tracing::error!("❌ [API] Market data error: {}", e);
                "failed to fetch market data".to_string()
            }
            ApiError::Analysis(AnalysisError::Report(ReportError::Io(e))) => {
                tracing::error!("❌ [API] Report storage error: {}", e);
                "failed to store report".to_string()
            }
            other => {
                tracing::warn!("⚠️ [API] Request rejected: {}", other);
                other.to_string()
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(ValidationError::EmptySymbol).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::NotFound("monitor").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(ReportError::NotFound("abc".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(AnalysisError::UnsupportedEndpoint("http://x".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_cycle_too_short_message() {
        let err = ValidationError::CycleTooShort(Duration::from_secs(10), Duration::from_secs(5));
        assert_eq!(err.to_string(), "cycle must be at least 10s, got 5s");
    }
}
