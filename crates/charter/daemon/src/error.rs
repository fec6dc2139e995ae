//! Error types for charter-daemon

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use charter_governance::{GovernanceError, StorageError};
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Caller did not identify itself
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller may not perform this action
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<GovernanceError> for ApiError {
    fn from(err: GovernanceError) -> Self {
        match err {
            GovernanceError::Validation(msg) => ApiError::Validation(msg),
            GovernanceError::Forbidden(msg) => ApiError::Forbidden(msg),
            e @ (GovernanceError::ProposalNotFound(_)
            | GovernanceError::VersionNotFound(_)
            | GovernanceError::VoteNotFound(_)) => ApiError::NotFound(e.to_string()),
            e @ (GovernanceError::DuplicateVote { .. } | GovernanceError::ProposalClosed { .. }) => {
                ApiError::Conflict(e.to_string())
            }
            GovernanceError::Storage(e) => ApiError::Storage(e),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::Storage(StorageError::NotFound(_)) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;
    use charter_types::{AgentId, ProposalId, ProposalStatus};

    fn status_of(err: GovernanceError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(
            ApiError::NotFound("test".to_string()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Unauthorized("test".to_string()).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Storage(StorageError::Connection("down".into()))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_governance_error_mapping() {
        let id = ProposalId::generate();
        assert_eq!(
            status_of(GovernanceError::Validation("empty title".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_of(GovernanceError::ProposalNotFound(id)), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(GovernanceError::VersionNotFound("v9.9".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(GovernanceError::DuplicateVote {
                agent_id: AgentId::new("a"),
                proposal_id: id,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(GovernanceError::ProposalClosed {
                id,
                status: ProposalStatus::Ratified,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(GovernanceError::Forbidden("not the author".into())),
            StatusCode::FORBIDDEN
        );
    }
}
