//! Proposal and voting handlers

use crate::api::rest::extract::AgentIdentity;
use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use charter_governance::{NewProposal, ProposalView, RatificationStatus, TallyReport, VoteReceipt};
use charter_types::{
    Countdown, PageRequest, Paginated, Proposal, ProposalFilter, ProposalId, ProposalStatus,
    Theme, Vote, VoteChoice,
};
use serde::Deserialize;

/// List proposals query params
#[derive(Debug, Default, Deserialize)]
pub struct ListProposalsQuery {
    pub status: Option<String>,
    pub theme: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ListProposalsQuery {
    fn filter(&self) -> ApiResult<ProposalFilter> {
        let status = self
            .status
            .as_deref()
            .map(str::parse::<ProposalStatus>)
            .transpose()
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        let theme = self
            .theme
            .as_deref()
            .map(str::parse::<Theme>)
            .transpose()
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        Ok(ProposalFilter { status, theme })
    }

    fn page(&self) -> PageRequest {
        let default = PageRequest::default();
        PageRequest::new(
            self.page.unwrap_or(default.page),
            self.per_page.unwrap_or(default.per_page),
        )
    }
}

/// Create proposal request
#[derive(Debug, Deserialize)]
pub struct CreateProposalRequest {
    pub title: String,
    pub text: String,
    pub theme: String,
}

/// Cast vote request
#[derive(Debug, Deserialize)]
pub struct CastVoteRequest {
    pub choice: String,
}

/// List proposals
pub async fn list_proposals(
    State(state): State<AppState>,
    Query(query): Query<ListProposalsQuery>,
) -> ApiResult<Json<Paginated<Proposal>>> {
    let filter = query.filter()?;
    let page = state.service.list_proposals(&filter, query.page()).await?;
    Ok(Json(page))
}

/// Create a new proposal authored by the calling agent
pub async fn create_proposal(
    State(state): State<AppState>,
    AgentIdentity(agent_id): AgentIdentity,
    Json(request): Json<CreateProposalRequest>,
) -> ApiResult<(StatusCode, Json<Proposal>)> {
    let proposal = state
        .service
        .create_proposal(
            agent_id,
            NewProposal {
                title: request.title,
                text: request.text,
                theme: request.theme,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(proposal)))
}

/// Get a proposal with its countdown
pub async fn get_proposal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProposalView>> {
    let id = parse_proposal_id(&id)?;
    Ok(Json(state.service.get_proposal(&id).await?))
}

/// Get the time left in a proposal's voting window
pub async fn get_countdown(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Countdown>> {
    let id = parse_proposal_id(&id)?;
    Ok(Json(state.service.countdown(&id).await?))
}

/// Create, change or repeat the calling agent's vote
pub async fn cast_vote(
    State(state): State<AppState>,
    AgentIdentity(agent_id): AgentIdentity,
    Path(id): Path<String>,
    Json(request): Json<CastVoteRequest>,
) -> ApiResult<Json<VoteReceipt>> {
    let id = parse_proposal_id(&id)?;
    let choice: VoteChoice = request
        .choice
        .parse()
        .map_err(|e: charter_types::ParseEnumError| ApiError::Validation(e.to_string()))?;

    let receipt = state.service.vote(agent_id, id, choice).await?;
    Ok(Json(receipt))
}

/// The calling agent's vote on a proposal
pub async fn get_my_vote(
    State(state): State<AppState>,
    AgentIdentity(agent_id): AgentIdentity,
    Path(id): Path<String>,
) -> ApiResult<Json<Vote>> {
    let id = parse_proposal_id(&id)?;
    let vote = state
        .service
        .my_vote(&agent_id, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{agent_id} has not voted on {id}")))?;
    Ok(Json(vote))
}

/// Cached counters against the ledger
pub async fn get_tally(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TallyReport>> {
    let id = parse_proposal_id(&id)?;
    Ok(Json(state.service.tally_report(&id).await?))
}

/// Recompute cached counters from the ledger
pub async fn reconcile_tally(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TallyReport>> {
    let id = parse_proposal_id(&id)?;
    Ok(Json(state.service.reconcile_tally(&id).await?))
}

/// Withdraw a proposal; author only
pub async fn withdraw_proposal(
    State(state): State<AppState>,
    AgentIdentity(agent_id): AgentIdentity,
    Path(id): Path<String>,
) -> ApiResult<Json<Proposal>> {
    let id = parse_proposal_id(&id)?;
    Ok(Json(state.service.withdraw_proposal(&agent_id, &id).await?))
}

/// Run the ratification check now
pub async fn check_ratification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RatificationStatus>> {
    let id = parse_proposal_id(&id)?;
    Ok(Json(state.service.check_ratification(&id).await?))
}

/// Parse a proposal id, with or without the `proposal:` prefix
fn parse_proposal_id(id: &str) -> ApiResult<ProposalId> {
    id.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid proposal ID: {}", id)))
}
