//! In-memory storage implementation
//!
//! All tables sit behind one lock so the composite operations
//! (`record_vote`, `switch_vote`, `append_version`, `commit_ratification`)
//! are atomic with respect to each other.

use super::traits::*;
use crate::error::StorageError;
use async_trait::async_trait;
use charter_types::{
    AgentId, CharterVersion, CharterVersionId, PageRequest, Proposal, ProposalFilter, ProposalId,
    ProposalStatus, Vote, VoteChoice, VoteId, VoteTally,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    proposals: HashMap<ProposalId, Proposal>,
    votes: HashMap<VoteId, Vote>,
    vote_index: HashMap<(AgentId, ProposalId), VoteId>,
    /// Creation order; the last entry is the head.
    versions: Vec<CharterVersion>,
}

impl Tables {
    fn transition(
        &mut self,
        id: &ProposalId,
        status: ProposalStatus,
        at: DateTime<Utc>,
    ) -> Transition {
        let Some(proposal) = self.proposals.get_mut(id) else {
            return Transition::Missing;
        };
        if !proposal.status.can_transition_to(status) {
            return Transition::Unchanged(proposal.status);
        }
        proposal.status = status;
        if status == ProposalStatus::Ratified {
            proposal.ratified_at = Some(at);
        }
        proposal.updated_at = at;
        Transition::Applied(proposal.clone())
    }

    fn head_id(&self) -> Option<CharterVersionId> {
        self.versions.last().map(|v| v.id)
    }

    fn append(&mut self, mut version: CharterVersion) -> CharterVersion {
        for existing in self.versions.iter_mut() {
            existing.is_current = false;
        }
        version.is_current = true;
        self.versions.push(version.clone());
        version
    }
}

/// In-memory storage for development and testing
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    tables: RwLock<Tables>,
}

impl InMemoryStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProposalStorage for InMemoryStorage {
    async fn insert_proposal(&self, proposal: Proposal) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        if tables.proposals.contains_key(&proposal.id) {
            return Err(StorageError::Conflict(format!(
                "proposal {} already exists",
                proposal.id
            )));
        }
        tables.proposals.insert(proposal.id, proposal);
        Ok(())
    }

    async fn get_proposal(&self, id: &ProposalId) -> StorageResult<Option<Proposal>> {
        let tables = self.tables.read().await;
        Ok(tables.proposals.get(id).cloned())
    }

    async fn list_proposals(
        &self,
        filter: &ProposalFilter,
        page: PageRequest,
    ) -> StorageResult<(Vec<Proposal>, u64)> {
        let tables = self.tables.read().await;
        let mut matching: Vec<&Proposal> = tables
            .proposals
            .values()
            .filter(|p| filter.matches(p.status, p.theme))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();
        Ok((items, total))
    }

    async fn adjust_tally(
        &self,
        id: &ProposalId,
        delta: TallyDelta,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<Proposal>> {
        let mut tables = self.tables.write().await;
        Ok(tables.proposals.get_mut(id).map(|p| {
            p.set_tally(delta.apply(p.tally()));
            p.updated_at = at;
            p.clone()
        }))
    }

    async fn overwrite_tally(
        &self,
        id: &ProposalId,
        tally: VoteTally,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<Proposal>> {
        let mut tables = self.tables.write().await;
        Ok(tables.proposals.get_mut(id).map(|p| {
            p.set_tally(tally);
            p.updated_at = at;
            p.clone()
        }))
    }

    async fn transition_status(
        &self,
        id: &ProposalId,
        status: ProposalStatus,
        at: DateTime<Utc>,
    ) -> StorageResult<Transition> {
        let mut tables = self.tables.write().await;
        Ok(tables.transition(id, status, at))
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> StorageResult<Vec<Proposal>> {
        let tables = self.tables.read().await;
        let mut expired: Vec<Proposal> = tables
            .proposals
            .values()
            .filter(|p| p.is_expired(now))
            .cloned()
            .collect();
        expired.sort_by_key(|p| p.expires_at);
        Ok(expired)
    }
}

#[async_trait]
impl VoteStorage for InMemoryStorage {
    async fn get_vote(
        &self,
        agent_id: &AgentId,
        proposal_id: &ProposalId,
    ) -> StorageResult<Option<Vote>> {
        let tables = self.tables.read().await;
        Ok(tables
            .vote_index
            .get(&(agent_id.clone(), *proposal_id))
            .and_then(|id| tables.votes.get(id))
            .cloned())
    }

    async fn insert_vote(&self, vote: Vote) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        let key = (vote.agent_id.clone(), vote.proposal_id);
        if tables.vote_index.contains_key(&key) {
            return Err(StorageError::Conflict(format!(
                "agent {} already voted on {}",
                vote.agent_id, vote.proposal_id
            )));
        }
        tables.vote_index.insert(key, vote.id);
        tables.votes.insert(vote.id, vote);
        Ok(())
    }

    async fn update_vote_choice(
        &self,
        id: &VoteId,
        choice: VoteChoice,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<Vote>> {
        let mut tables = self.tables.write().await;
        Ok(tables.votes.get_mut(id).map(|v| {
            v.choice = choice;
            v.updated_at = at;
            v.clone()
        }))
    }

    async fn count_votes(&self, proposal_id: &ProposalId) -> StorageResult<VoteTally> {
        let tables = self.tables.read().await;
        Ok(tables
            .votes
            .values()
            .filter(|v| &v.proposal_id == proposal_id)
            .map(|v| v.choice)
            .collect())
    }

    async fn record_vote(&self, vote: Vote) -> StorageResult<VoteWrite> {
        let mut tables = self.tables.write().await;
        let tables = &mut *tables;

        let Some(proposal) = tables.proposals.get_mut(&vote.proposal_id) else {
            return Ok(VoteWrite::MissingProposal);
        };
        if !proposal.is_active() {
            return Ok(VoteWrite::Closed(proposal.status));
        }
        let key = (vote.agent_id.clone(), vote.proposal_id);
        if let Some(existing) = tables.vote_index.get(&key).and_then(|id| tables.votes.get(id)) {
            return Ok(VoteWrite::Duplicate(existing.clone()));
        }

        proposal.set_tally(TallyDelta::cast(vote.choice).apply(proposal.tally()));
        proposal.updated_at = vote.updated_at;
        let proposal = proposal.clone();

        tables.vote_index.insert(key, vote.id);
        tables.votes.insert(vote.id, vote.clone());
        Ok(VoteWrite::Applied { vote, proposal })
    }

    async fn switch_vote(
        &self,
        id: &VoteId,
        choice: VoteChoice,
        at: DateTime<Utc>,
    ) -> StorageResult<VoteWrite> {
        let mut tables = self.tables.write().await;
        let tables = &mut *tables;

        let Some(vote) = tables.votes.get_mut(id) else {
            return Ok(VoteWrite::MissingVote);
        };
        let Some(proposal) = tables.proposals.get_mut(&vote.proposal_id) else {
            return Ok(VoteWrite::MissingProposal);
        };
        if !proposal.is_active() {
            return Ok(VoteWrite::Closed(proposal.status));
        }

        let delta = TallyDelta::switch(vote.choice, choice);
        proposal.set_tally(delta.apply(proposal.tally()));
        proposal.updated_at = at;
        vote.choice = choice;
        vote.updated_at = at;

        Ok(VoteWrite::Applied {
            vote: vote.clone(),
            proposal: proposal.clone(),
        })
    }
}

#[async_trait]
impl CharterStorage for InMemoryStorage {
    async fn latest_version(&self) -> StorageResult<Option<CharterVersion>> {
        let tables = self.tables.read().await;
        Ok(tables.versions.last().cloned())
    }

    async fn current_version(&self) -> StorageResult<Option<CharterVersion>> {
        let tables = self.tables.read().await;
        Ok(tables.versions.iter().rev().find(|v| v.is_current).cloned())
    }

    async fn get_version(&self, version: &str) -> StorageResult<Option<CharterVersion>> {
        let tables = self.tables.read().await;
        Ok(tables
            .versions
            .iter()
            .find(|v| v.version == version)
            .cloned())
    }

    async fn list_versions(&self) -> StorageResult<Vec<CharterVersion>> {
        let tables = self.tables.read().await;
        Ok(tables.versions.iter().rev().cloned().collect())
    }

    async fn append_version(
        &self,
        version: CharterVersion,
        expected_head: Option<CharterVersionId>,
    ) -> StorageResult<AppendOutcome> {
        let mut tables = self.tables.write().await;
        if tables.head_id() != expected_head {
            return Ok(AppendOutcome::HeadMoved);
        }
        if tables.versions.iter().any(|v| v.version == version.version) {
            return Err(StorageError::Conflict(format!(
                "charter version {} already exists",
                version.version
            )));
        }
        Ok(AppendOutcome::Appended(tables.append(version)))
    }
}

#[async_trait]
impl GovernanceStorage for InMemoryStorage {
    async fn commit_ratification(
        &self,
        proposal_id: &ProposalId,
        ratified_at: DateTime<Utc>,
        version: CharterVersion,
        expected_head: Option<CharterVersionId>,
    ) -> StorageResult<RatifyCommit> {
        let mut tables = self.tables.write().await;

        match tables.proposals.get(proposal_id) {
            None => return Ok(RatifyCommit::MissingProposal),
            Some(p) if !p.is_active() => return Ok(RatifyCommit::NotActive(p.status)),
            Some(_) => {}
        }
        if tables.head_id() != expected_head {
            return Ok(RatifyCommit::HeadMoved);
        }

        let proposal = match tables.transition(proposal_id, ProposalStatus::Ratified, ratified_at)
        {
            Transition::Applied(p) => p,
            Transition::Unchanged(status) => return Ok(RatifyCommit::NotActive(status)),
            Transition::Missing => return Ok(RatifyCommit::MissingProposal),
        };
        let version = tables.append(version);
        Ok(RatifyCommit::Committed { proposal, version })
    }
}
