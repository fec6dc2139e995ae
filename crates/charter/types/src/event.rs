//! Domain events emitted by the governance service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, ProposalId};
use crate::vote::{VoteChoice, VoteTally};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GovernanceEvent {
    ProposalCreated {
        proposal_id: ProposalId,
        agent_id: AgentId,
        at: DateTime<Utc>,
    },
    VoteRecorded {
        proposal_id: ProposalId,
        agent_id: AgentId,
        choice: VoteChoice,
        tally: VoteTally,
        at: DateTime<Utc>,
    },
    ProposalRatified {
        proposal_id: ProposalId,
        at: DateTime<Utc>,
    },
    CharterAmended {
        version: String,
        proposal_id: Option<ProposalId>,
        at: DateTime<Utc>,
    },
    ProposalExpired {
        proposal_id: ProposalId,
        at: DateTime<Utc>,
    },
    ProposalWithdrawn {
        proposal_id: ProposalId,
        agent_id: AgentId,
        at: DateTime<Utc>,
    },
}

impl GovernanceEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            GovernanceEvent::ProposalCreated { .. } => "proposal_created",
            GovernanceEvent::VoteRecorded { .. } => "vote_recorded",
            GovernanceEvent::ProposalRatified { .. } => "proposal_ratified",
            GovernanceEvent::CharterAmended { .. } => "charter_amended",
            GovernanceEvent::ProposalExpired { .. } => "proposal_expired",
            GovernanceEvent::ProposalWithdrawn { .. } => "proposal_withdrawn",
        }
    }
}
