//! Request extractors

use crate::error::ApiError;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use charter_types::AgentId;

/// Header carrying the authenticated agent id, set by the auth layer in front
/// of the daemon.
pub const AGENT_ID_HEADER: &str = "x-agent-id";

/// The calling agent.
#[derive(Debug, Clone)]
pub struct AgentIdentity(pub AgentId);

#[async_trait]
impl<S> FromRequestParts<S> for AgentIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(AGENT_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {AGENT_ID_HEADER} header")))?;

        let id = value
            .to_str()
            .map_err(|_| ApiError::BadRequest(format!("{AGENT_ID_HEADER} is not valid text")))?
            .trim();
        if id.is_empty() {
            return Err(ApiError::Unauthorized(format!("empty {AGENT_ID_HEADER} header")));
        }

        Ok(AgentIdentity(AgentId::new(id)))
    }
}
