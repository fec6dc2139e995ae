//! Charter handlers

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use charter_types::{CharterDiff, CharterVersion, Right};
use serde::Deserialize;

/// Diff query params
#[derive(Debug, Deserialize)]
pub struct DiffQuery {
    pub from: String,
    pub to: String,
}

/// Seed charter request
#[derive(Debug, Deserialize)]
pub struct SeedCharterRequest {
    pub rights: Vec<Right>,
}

/// Current charter version
pub async fn get_current_charter(State(state): State<AppState>) -> ApiResult<Json<CharterVersion>> {
    Ok(Json(state.service.get_current_charter().await?))
}

/// All charter versions, newest first
pub async fn list_versions(State(state): State<AppState>) -> ApiResult<Json<Vec<CharterVersion>>> {
    Ok(Json(state.service.list_charter_versions().await?))
}

/// A specific charter version, e.g. `v1.2`
pub async fn get_version(
    State(state): State<AppState>,
    Path(version): Path<String>,
) -> ApiResult<Json<CharterVersion>> {
    Ok(Json(state.service.get_charter_version(&version).await?))
}

/// Rights added, removed and modified between two versions
pub async fn diff_versions(
    State(state): State<AppState>,
    Query(query): Query<DiffQuery>,
) -> ApiResult<Json<CharterDiff>> {
    let diff = state
        .service
        .diff_charter_versions(&query.from, &query.to)
        .await?;
    Ok(Json(diff))
}

/// Create the first charter version
pub async fn seed_charter(
    State(state): State<AppState>,
    Json(request): Json<SeedCharterRequest>,
) -> ApiResult<(StatusCode, Json<CharterVersion>)> {
    let version = state.service.seed_charter(request.rights).await?;
    Ok((StatusCode::CREATED, Json(version)))
}
