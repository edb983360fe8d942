//! HTTP API handlers for bfly-engine
//!
//! JSON endpoints for the presentation shell plus an SSE event stream.

pub mod analytics;
pub mod catalog;
pub mod health;
pub mod observations;
pub mod sse;

pub use analytics::analytics_routes;
pub use catalog::catalog_routes;
pub use health::health_routes;
pub use observations::observation_routes;
pub use sse::event_stream;

use serde::Deserialize;

/// Default number of rows for list endpoints
pub const DEFAULT_LIMIT: usize = 10;
/// Upper bound on `?limit=`
pub const MAX_LIMIT: usize = 100;

/// `?limit=` query parameter
#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

impl LimitParams {
    /// Requested limit clamped to `1..=MAX_LIMIT`
    pub fn resolve(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}
