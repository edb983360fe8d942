//! bfly-engine library interface
//!
//! Observation classification and aggregation engine plus the HTTP/SSE API
//! that exposes it. Exposed as a library for integration testing.

pub mod aggregation;
pub mod api;
pub mod classifier;
pub mod conservation;
pub mod db;
pub mod engine;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod observation;
pub mod query;
pub mod validator;

pub use crate::engine::{ObservationEngine, SubmissionReceipt, SubmitError, SubmitRequest};
pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ObservationEngine>,
    /// Cancelled on shutdown; in-flight classifications and SSE streams stop
    pub shutdown: CancellationToken,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(engine: Arc<ObservationEngine>, shutdown: CancellationToken) -> Self {
        Self {
            engine,
            shutdown,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::health_routes())
        .merge(api::observation_routes())
        .merge(api::analytics_routes())
        .merge(api::catalog_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
