//! Observation submission endpoints
//!
//! - POST /api/observations: classify and commit one image
//! - POST /api/observations/batch: camera-trap ingestion
//! - GET /api/observations/recent: most recent accepted observations

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::LimitParams;
use crate::aggregation::AnnotatedObservation;
use crate::engine::{SubmissionReceipt, SubmitError, SubmitRequest};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Largest batch accepted in one request
pub const MAX_BATCH: usize = 500;

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub observations: Vec<SubmitRequest>,
}

/// Per-item batch outcome, in request order
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchItem {
    Accepted { receipt: Box<SubmissionReceipt> },
    Failed { code: String, message: String },
}

impl From<Result<SubmissionReceipt, SubmitError>> for BatchItem {
    fn from(result: Result<SubmissionReceipt, SubmitError>) -> Self {
        match result {
            Ok(receipt) => BatchItem::Accepted {
                receipt: Box::new(receipt),
            },
            Err(e) => {
                let code = match &e {
                    SubmitError::ClassificationUnavailable(_) => "CLASSIFICATION_UNAVAILABLE",
                    SubmitError::Validation(v) => v.code(),
                    SubmitError::Journal(_) => "JOURNAL_ERROR",
                    SubmitError::Internal(_) => "INTERNAL_ERROR",
                };
                BatchItem::Failed {
                    code: code.to_string(),
                    message: e.to_string(),
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub accepted: usize,
    pub failed: usize,
    pub results: Vec<BatchItem>,
}

/// POST /api/observations
pub async fn submit_observation(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> ApiResult<(StatusCode, Json<SubmissionReceipt>)> {
    let cancel = state.shutdown.child_token();
    let receipt = state.engine.submit_observation(request, &cancel).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// POST /api/observations/batch
pub async fn submit_batch(
    State(state): State<AppState>,
    Json(batch): Json<BatchRequest>,
) -> ApiResult<Json<BatchResponse>> {
    if batch.observations.is_empty() {
        return Err(ApiError::BadRequest("batch is empty".to_string()));
    }
    if batch.observations.len() > MAX_BATCH {
        return Err(ApiError::BadRequest(format!(
            "batch of {} exceeds limit of {}",
            batch.observations.len(),
            MAX_BATCH
        )));
    }

    info!("Batch submission: {} images", batch.observations.len());
    let cancel = state.shutdown.child_token();
    let results: Vec<BatchItem> = state
        .engine
        .submit_batch(batch.observations, &cancel)
        .await
        .into_iter()
        .map(BatchItem::from)
        .collect();

    let accepted = results
        .iter()
        .filter(|r| matches!(r, BatchItem::Accepted { .. }))
        .count();

    Ok(Json(BatchResponse {
        accepted,
        failed: results.len() - accepted,
        results,
    }))
}

/// GET /api/observations/recent?limit=
pub async fn recent_observations(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Json<Vec<AnnotatedObservation>> {
    Json(state.engine.recent_observations(params.resolve()).await)
}

pub fn observation_routes() -> Router<AppState> {
    Router::new()
        .route("/api/observations", post(submit_observation))
        .route("/api/observations/batch", post(submit_batch))
        .route("/api/observations/recent", get(recent_observations))
}
