//! Governance error types.

use charter_types::{AgentId, ProposalId, ProposalStatus, VoteId};
use thiserror::Error;

/// Storage-specific errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict (e.g., already exists)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query error
    #[error("Query error: {0}")]
    Query(String),
}

/// Errors surfaced by governance operations.
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// The request was malformed; nothing was written.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("proposal not found: {0}")]
    ProposalNotFound(ProposalId),

    #[error("charter version not found: {0}")]
    VersionNotFound(String),

    #[error("vote not found: {0}")]
    VoteNotFound(VoteId),

    /// A vote already exists for this pair; use the change path instead.
    #[error("agent {agent_id} already voted on proposal {proposal_id}")]
    DuplicateVote {
        agent_id: AgentId,
        proposal_id: ProposalId,
    },

    /// The proposal has left the `active` state.
    #[error("proposal {id} is {status}, voting is closed")]
    ProposalClosed {
        id: ProposalId,
        status: ProposalStatus,
    },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl GovernanceError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GovernanceError::ProposalNotFound(_)
                | GovernanceError::VersionNotFound(_)
                | GovernanceError::VoteNotFound(_)
                | GovernanceError::Storage(StorageError::NotFound(_))
        )
    }
}

/// Result type for governance operations.
pub type Result<T> = std::result::Result<T, GovernanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display() {
        let err = GovernanceError::Validation("title must not be empty".into());
        assert_eq!(err.to_string(), "validation failed: title must not be empty");
    }

    #[test]
    fn closed_error_names_status() {
        let err = GovernanceError::ProposalClosed {
            id: ProposalId::generate(),
            status: ProposalStatus::Rejected,
        };
        assert!(err.to_string().contains("is rejected"));
    }

    #[test]
    fn not_found_classification() {
        assert!(GovernanceError::VersionNotFound("v9.9".into()).is_not_found());
        assert!(GovernanceError::Storage(StorageError::NotFound("x".into())).is_not_found());
        assert!(!GovernanceError::Validation("x".into()).is_not_found());
    }
}
