//! Administrative handlers

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{extract::State, Json};
use charter_types::ProposalId;
use serde::{Deserialize, Serialize};

/// Manual sweep response
#[derive(Debug, Serialize, Deserialize)]
pub struct SweepResponse {
    pub count: usize,
    pub expired: Vec<ProposalId>,
}

/// Run the expiration sweeper now
pub async fn run_sweep(State(state): State<AppState>) -> ApiResult<Json<SweepResponse>> {
    let report = state.service.expire_proposals().await?;
    tracing::info!(expired = report.count(), "Manual sweep finished");
    Ok(Json(SweepResponse {
        count: report.count(),
        expired: report.expired,
    }))
}
