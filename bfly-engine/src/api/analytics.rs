//! Research analytics and community endpoints

use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use bfly_common::PeriodKey;
use serde::Deserialize;

use super::LimitParams;
use crate::aggregation::{HotspotBreakdown, HotspotSummary, SeriesPoint, SpeciesCount};
use crate::error::{ApiError, ApiResult};
use crate::ledger::{LeaderboardEntry, UserProgress};
use crate::query::{SpeciesTrend, Summary};
use crate::AppState;

/// `?from=YYYY-MM&to=YYYY-MM`
#[derive(Debug, Default, Deserialize)]
pub struct SeriesParams {
    pub from: Option<String>,
    pub to: Option<String>,
}

fn parse_period(value: Option<&str>, name: &str) -> ApiResult<Option<PeriodKey>> {
    value
        .map(|v| {
            PeriodKey::from_str(v)
                .map_err(|e| ApiError::BadRequest(format!("invalid '{}' period: {}", name, e)))
        })
        .transpose()
}

/// GET /api/summary
pub async fn summary(State(state): State<AppState>) -> Json<Summary> {
    Json(state.engine.summary().await)
}

/// GET /api/leaderboard?limit=
pub async fn leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Json<Vec<LeaderboardEntry>> {
    Json(state.engine.leaderboard(params.resolve()).await)
}

/// GET /api/species/top?limit=
pub async fn top_species(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Json<Vec<SpeciesCount>> {
    Json(state.engine.top_species(params.resolve()).await)
}

/// GET /api/species/:id/trend
pub async fn species_trend(
    State(state): State<AppState>,
    Path(species_id): Path<String>,
) -> ApiResult<Json<SpeciesTrend>> {
    state
        .engine
        .species_trend(&species_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("species '{}'", species_id)))
}

/// GET /api/hotspots?limit=
pub async fn hotspots(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Json<Vec<HotspotSummary>> {
    Json(state.engine.hotspots(params.resolve()).await)
}

/// GET /api/hotspots/:label
pub async fn hotspot_detail(
    State(state): State<AppState>,
    Path(label): Path<String>,
) -> ApiResult<Json<HotspotBreakdown>> {
    state
        .engine
        .hotspot_detail(&label)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("hotspot '{}'", label)))
}

/// GET /api/series?from=&to=
pub async fn series(
    State(state): State<AppState>,
    Query(params): Query<SeriesParams>,
) -> ApiResult<Json<Vec<SeriesPoint>>> {
    let from = parse_period(params.from.as_deref(), "from")?;
    let to = parse_period(params.to.as_deref(), "to")?;
    Ok(Json(state.engine.series(from, to).await))
}

/// GET /api/users/:id/progress
pub async fn user_progress(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserProgress>> {
    state
        .engine
        .user_progress(&user_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("user '{}'", user_id)))
}

pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/api/summary", get(summary))
        .route("/api/leaderboard", get(leaderboard))
        .route("/api/species/top", get(top_species))
        .route("/api/species/:id/trend", get(species_trend))
        .route("/api/hotspots", get(hotspots))
        .route("/api/hotspots/:label", get(hotspot_detail))
        .route("/api/series", get(series))
        .route("/api/users/:id/progress", get(user_progress))
}
