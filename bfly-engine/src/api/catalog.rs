//! Species catalog endpoints

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use bfly_common::SpeciesEntry;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/catalog
pub async fn list_species(State(state): State<AppState>) -> Json<Vec<SpeciesEntry>> {
    Json(state.engine.catalog().entries().to_vec())
}

/// GET /api/catalog/:id
pub async fn get_species(
    State(state): State<AppState>,
    Path(species_id): Path<String>,
) -> ApiResult<Json<SpeciesEntry>> {
    state
        .engine
        .catalog()
        .get(&species_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("species '{}'", species_id)))
}

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/api/catalog", get(list_species))
        .route("/api/catalog/:id", get(get_species))
}
