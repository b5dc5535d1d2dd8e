//! HTTP routes for the scanner service.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use kairi_common::Error;

use crate::pipeline::{ScanOutcome, ScanPreview};
use crate::signal::RawSignalRecord;
use crate::ScannerState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

/// Query for scan and preview endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ScanQuery {
    #[serde(default, alias = "borsa")]
    pub exchange: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn error_response(err: Error) -> (StatusCode, Json<ErrorResponse>) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    tracing::error!(error = %err, status = status.as_u16(), "Request failed");
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "kairi-scanner".to_string(),
    })
}

/// Run one scan pass and deliver the report.
///
/// The pass runs on its own task and always reaches delivery, even if the
/// caller disconnects first.
pub async fn scan(
    State(state): State<Arc<ScannerState>>,
    Query(query): Query<ScanQuery>,
) -> ApiResult<ScanOutcome> {
    let exchange = state.pipeline.resolve_exchange(query.exchange.as_deref());
    tracing::info!(exchange = %exchange, "Scan requested");

    let pipeline = state.pipeline.clone();
    let pass = tokio::spawn(async move { pipeline.run(&exchange).await });

    match pass.await {
        Ok(outcome) => outcome.map(Json).map_err(error_response),
        Err(e) => Err(error_response(Error::Internal(format!(
            "scan task failed: {}",
            e
        )))),
    }
}

/// Match and partition only; no enrichment, commentary or delivery.
pub async fn matches(
    State(state): State<Arc<ScannerState>>,
    Query(query): Query<ScanQuery>,
) -> ApiResult<ScanPreview> {
    let exchange = state.pipeline.resolve_exchange(query.exchange.as_deref());

    state
        .pipeline
        .preview(&exchange)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Append one webhook record to the signal log.
///
/// The body is read as raw JSON so that any object is accepted and
/// missing fields default to empty strings.
pub async fn webhook(
    State(state): State<Arc<ScannerState>>,
    body: String,
) -> ApiResult<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| error_response(Error::InvalidInput(format!("body is not JSON: {}", e))))?;

    let record = RawSignalRecord::from_value(value).ok_or_else(|| {
        error_response(Error::InvalidInput("body must be a JSON object".to_string()))
    })?;

    state.store.append(record).await.map_err(error_response)?;

    Ok(Json(serde_json::json!({ "success": true })))
}
