//! Health and status handlers

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{extract::State, Json};
use charter_governance::{GovernanceError, ProposalCounts, RatificationPolicy};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
    })
}

/// Daemon status response
#[derive(Debug, Serialize)]
pub struct DaemonStatusResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub proposals: ProposalCounts,
    pub charter_version: Option<String>,
    pub policy: RatificationPolicy,
    pub sweeper: SweeperStatus,
}

/// Sweeper state
#[derive(Debug, Serialize)]
pub struct SweeperStatus {
    pub running: bool,
    pub interval_secs: u64,
    pub last_sweep: Option<chrono::DateTime<chrono::Utc>>,
}

/// Daemon status endpoint
pub async fn daemon_status(State(state): State<AppState>) -> ApiResult<Json<DaemonStatusResponse>> {
    let proposals = state.service.proposal_counts().await?;
    let charter_version = match state.service.get_current_charter().await {
        Ok(current) => Some(current.version),
        Err(GovernanceError::VersionNotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };

    Ok(Json(DaemonStatusResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
        started_at: state.started_at,
        proposals,
        charter_version,
        policy: *state.service.policy(),
        sweeper: SweeperStatus {
            running: state.scheduler.is_running().await,
            interval_secs: state.scheduler.interval_secs(),
            last_sweep: state.scheduler.last_sweep().await,
        },
    }))
}
