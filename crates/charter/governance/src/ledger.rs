//! Vote ledger: at most one live vote per (agent, proposal).
//!
//! The ledger knows nothing about proposal lifecycle or ratification.

use std::sync::Arc;

use charter_types::{AgentId, ProposalId, Vote, VoteChoice, VoteId, VoteTally};

use crate::clock::Clock;
use crate::error::{GovernanceError, Result, StorageError};
use crate::storage::{GovernanceStorage, VoteStorage};

pub struct VoteLedger {
    storage: Arc<dyn GovernanceStorage>,
    clock: Arc<dyn Clock>,
}

impl VoteLedger {
    pub fn new(storage: Arc<dyn GovernanceStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    pub async fn find_vote(
        &self,
        agent_id: &AgentId,
        proposal_id: &ProposalId,
    ) -> Result<Option<Vote>> {
        Ok(self.storage.get_vote(agent_id, proposal_id).await?)
    }

    /// Record a first vote. Fails with `DuplicateVote` if the agent already
    /// voted on this proposal; callers should take the change path instead.
    pub async fn cast_vote(
        &self,
        agent_id: AgentId,
        proposal_id: ProposalId,
        choice: VoteChoice,
    ) -> Result<Vote> {
        let vote = Vote::new(agent_id, proposal_id, choice, self.clock.now());
        match self.storage.insert_vote(vote.clone()).await {
            Ok(()) => Ok(vote),
            Err(StorageError::Conflict(_)) => Err(GovernanceError::DuplicateVote {
                agent_id: vote.agent_id,
                proposal_id: vote.proposal_id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the stored choice in place.
    pub async fn change_vote(&self, vote_id: &VoteId, choice: VoteChoice) -> Result<Vote> {
        self.storage
            .update_vote_choice(vote_id, choice, self.clock.now())
            .await?
            .ok_or(GovernanceError::VoteNotFound(*vote_id))
    }

    /// Recount a proposal's votes straight from the ledger.
    pub async fn count_by_proposal(&self, proposal_id: &ProposalId) -> Result<VoteTally> {
        Ok(self.storage.count_votes(proposal_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::storage::InMemoryStorage;

    fn ledger() -> VoteLedger {
        VoteLedger::new(Arc::new(InMemoryStorage::new()), Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn cast_then_duplicate_is_rejected() {
        let ledger = ledger();
        let agent = AgentId::new("a1");
        let proposal = ProposalId::generate();

        ledger
            .cast_vote(agent.clone(), proposal, VoteChoice::For)
            .await
            .unwrap();
        let err = ledger
            .cast_vote(agent.clone(), proposal, VoteChoice::Against)
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::DuplicateVote { .. }));

        let stored = ledger.find_vote(&agent, &proposal).await.unwrap().unwrap();
        assert_eq!(stored.choice, VoteChoice::For);
    }

    #[tokio::test]
    async fn change_vote_keeps_single_row() {
        let ledger = ledger();
        let agent = AgentId::new("a1");
        let proposal = ProposalId::generate();

        let vote = ledger
            .cast_vote(agent.clone(), proposal, VoteChoice::For)
            .await
            .unwrap();
        let changed = ledger.change_vote(&vote.id, VoteChoice::Against).await.unwrap();
        assert_eq!(changed.id, vote.id);
        assert_eq!(changed.choice, VoteChoice::Against);

        let tally = ledger.count_by_proposal(&proposal).await.unwrap();
        assert_eq!(tally, VoteTally { votes_for: 0, votes_against: 1 });
    }

    #[tokio::test]
    async fn change_unknown_vote_is_not_found() {
        let ledger = ledger();
        let err = ledger
            .change_vote(&VoteId::generate(), VoteChoice::For)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
