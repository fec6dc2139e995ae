//! Vote casting: create, change or keep an agent's vote, then try to ratify.

use std::sync::Arc;

use charter_types::{AgentId, Proposal, ProposalId, Vote, VoteChoice, VoteId};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{GovernanceError, Result};
use crate::ledger::VoteLedger;
use crate::ratification::{RatificationEvaluator, RatificationStatus};
use crate::registry::ProposalRegistry;
use crate::storage::{GovernanceStorage, VoteStorage, VoteWrite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
    Created,
    Changed,
    Unchanged,
}

/// What a vote call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub action: VoteAction,
    pub vote: Vote,
    pub proposal: Proposal,
    /// Absent when the vote was unchanged or the check itself failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratification: Option<RatificationStatus>,
}

pub struct VoteCasting {
    storage: Arc<dyn GovernanceStorage>,
    registry: Arc<ProposalRegistry>,
    ledger: Arc<VoteLedger>,
    evaluator: Arc<RatificationEvaluator>,
    clock: Arc<dyn Clock>,
}

impl VoteCasting {
    pub fn new(
        storage: Arc<dyn GovernanceStorage>,
        registry: Arc<ProposalRegistry>,
        ledger: Arc<VoteLedger>,
        evaluator: Arc<RatificationEvaluator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            registry,
            ledger,
            evaluator,
            clock,
        }
    }

    pub async fn vote(
        &self,
        agent_id: AgentId,
        proposal_id: ProposalId,
        choice: VoteChoice,
    ) -> Result<VoteReceipt> {
        let proposal = self
            .registry
            .get(&proposal_id)
            .await?
            .ok_or(GovernanceError::ProposalNotFound(proposal_id))?;
        if !proposal.is_active() {
            return Err(GovernanceError::ProposalClosed {
                id: proposal_id,
                status: proposal.status,
            });
        }

        let existing = match self.ledger.find_vote(&agent_id, &proposal_id).await? {
            Some(vote) => vote,
            None => {
                let vote = Vote::new(agent_id, proposal_id, choice, self.clock.now());
                let vote_id = vote.id;
                match self.storage.record_vote(vote).await? {
                    VoteWrite::Applied { vote, proposal } => {
                        return Ok(self.finish(VoteAction::Created, vote, proposal).await);
                    }
                    // Lost a race with the same agent's concurrent first vote.
                    VoteWrite::Duplicate(vote) => vote,
                    other => return Err(write_failure(proposal_id, vote_id, other)),
                }
            }
        };

        if existing.choice == choice {
            tracing::debug!(
                proposal_id = %proposal_id,
                agent_id = %existing.agent_id,
                "Vote unchanged"
            );
            return Ok(VoteReceipt {
                action: VoteAction::Unchanged,
                vote: existing,
                proposal,
                ratification: None,
            });
        }

        match self
            .storage
            .switch_vote(&existing.id, choice, self.clock.now())
            .await?
        {
            VoteWrite::Applied { vote, proposal } => {
                Ok(self.finish(VoteAction::Changed, vote, proposal).await)
            }
            other => Err(write_failure(proposal_id, existing.id, other)),
        }
    }

    async fn finish(&self, action: VoteAction, vote: Vote, mut proposal: Proposal) -> VoteReceipt {
        tracing::info!(
            proposal_id = %proposal.id,
            agent_id = %vote.agent_id,
            choice = %vote.choice,
            action = ?action,
            votes_for = proposal.votes_for,
            votes_against = proposal.votes_against,
            "Vote recorded"
        );

        let ratification = match self.evaluator.check_ratification(&proposal.id).await {
            Ok(status) => Some(status),
            Err(e) => {
                tracing::warn!(
                    proposal_id = %proposal.id,
                    error = %e,
                    "Ratification check failed, vote kept"
                );
                None
            }
        };

        if ratification.as_ref().is_some_and(|r| r.ratified) {
            match self.registry.get(&proposal.id).await {
                Ok(Some(fresh)) => proposal = fresh,
                Ok(None) => {}
                Err(e) => tracing::warn!(proposal_id = %proposal.id, error = %e, "Could not re-read ratified proposal"),
            }
        }

        VoteReceipt {
            action,
            vote,
            proposal,
            ratification,
        }
    }
}

fn write_failure(proposal_id: ProposalId, vote_id: VoteId, outcome: VoteWrite) -> GovernanceError {
    match outcome {
        VoteWrite::Closed(status) => GovernanceError::ProposalClosed {
            id: proposal_id,
            status,
        },
        VoteWrite::MissingVote => GovernanceError::VoteNotFound(vote_id),
        VoteWrite::Duplicate(vote) => GovernanceError::DuplicateVote {
            agent_id: vote.agent_id,
            proposal_id,
        },
        VoteWrite::MissingProposal | VoteWrite::Applied { .. } => {
            GovernanceError::ProposalNotFound(proposal_id)
        }
    }
}
