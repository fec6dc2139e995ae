//! Storage trait definitions

use crate::error::StorageError;
use async_trait::async_trait;
use charter_types::{
    AgentId, CharterVersion, CharterVersionId, PageRequest, Proposal, ProposalFilter, ProposalId,
    ProposalStatus, Vote, VoteChoice, VoteId, VoteTally,
};
use chrono::{DateTime, Utc};

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Signed adjustment applied to a proposal's cached counters.
///
/// Counters saturate at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TallyDelta {
    pub votes_for: i64,
    pub votes_against: i64,
}

impl TallyDelta {
    /// One new vote on `choice`.
    pub fn cast(choice: VoteChoice) -> Self {
        match choice {
            VoteChoice::For => Self {
                votes_for: 1,
                votes_against: 0,
            },
            VoteChoice::Against => Self {
                votes_for: 0,
                votes_against: 1,
            },
        }
    }

    /// An existing vote moving from `from` to `to`.
    pub fn switch(from: VoteChoice, to: VoteChoice) -> Self {
        if from == to {
            return Self::default();
        }
        let added = Self::cast(to);
        let removed = Self::cast(from);
        Self {
            votes_for: added.votes_for - removed.votes_for,
            votes_against: added.votes_against - removed.votes_against,
        }
    }

    pub fn apply(&self, tally: VoteTally) -> VoteTally {
        VoteTally {
            votes_for: offset(tally.votes_for, self.votes_for),
            votes_against: offset(tally.votes_against, self.votes_against),
        }
    }
}

fn offset(value: u64, delta: i64) -> u64 {
    if delta >= 0 {
        value.saturating_add(delta.unsigned_abs())
    } else {
        value.saturating_sub(delta.unsigned_abs())
    }
}

/// Outcome of a compare-and-set status change out of `active`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The proposal was `active` and now carries the new status.
    Applied(Proposal),
    /// The proposal was already terminal; carries its current status.
    Unchanged(ProposalStatus),
    Missing,
}

/// Outcome of a vote write that also adjusts the proposal tally
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteWrite {
    Applied { vote: Vote, proposal: Proposal },
    /// The agent already holds this vote on the proposal.
    Duplicate(Vote),
    /// The proposal is no longer `active`.
    Closed(ProposalStatus),
    MissingProposal,
    MissingVote,
}

/// Outcome of a head-conditional charter append
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended(CharterVersion),
    /// Another version was appended after the draft was computed.
    HeadMoved,
}

/// Outcome of the combined ratify-and-amend write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RatifyCommit {
    Committed {
        proposal: Proposal,
        version: CharterVersion,
    },
    NotActive(ProposalStatus),
    MissingProposal,
    HeadMoved,
}

/// Combined storage trait
#[async_trait]
pub trait GovernanceStorage: ProposalStorage + VoteStorage + CharterStorage + Send + Sync {
    /// Atomically flip `proposal_id` from `active` to `ratified` and append
    /// `version` as the new current charter, provided the charter head is
    /// still `expected_head`.
    async fn commit_ratification(
        &self,
        proposal_id: &ProposalId,
        ratified_at: DateTime<Utc>,
        version: CharterVersion,
        expected_head: Option<CharterVersionId>,
    ) -> StorageResult<RatifyCommit>;
}

/// Storage for proposals
#[async_trait]
pub trait ProposalStorage: Send + Sync {
    async fn insert_proposal(&self, proposal: Proposal) -> StorageResult<()>;

    async fn get_proposal(&self, id: &ProposalId) -> StorageResult<Option<Proposal>>;

    /// Filtered page, newest first, plus the total matching count.
    async fn list_proposals(
        &self,
        filter: &ProposalFilter,
        page: PageRequest,
    ) -> StorageResult<(Vec<Proposal>, u64)>;

    /// Atomically apply `delta` to the cached counters and return the result.
    async fn adjust_tally(
        &self,
        id: &ProposalId,
        delta: TallyDelta,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<Proposal>>;

    /// Replace the cached counters outright.
    async fn overwrite_tally(
        &self,
        id: &ProposalId,
        tally: VoteTally,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<Proposal>>;

    /// Move an `active` proposal to `status`, stamping `ratified_at` when the
    /// target is `ratified`. Terminal proposals are left untouched.
    async fn transition_status(
        &self,
        id: &ProposalId,
        status: ProposalStatus,
        at: DateTime<Utc>,
    ) -> StorageResult<Transition>;

    /// `active` proposals whose `expires_at` is before `now`.
    async fn list_expired(&self, now: DateTime<Utc>) -> StorageResult<Vec<Proposal>>;
}

/// Storage for the vote ledger
#[async_trait]
pub trait VoteStorage: Send + Sync {
    async fn get_vote(
        &self,
        agent_id: &AgentId,
        proposal_id: &ProposalId,
    ) -> StorageResult<Option<Vote>>;

    /// Insert a ledger row; `Conflict` if the (agent, proposal) pair exists.
    async fn insert_vote(&self, vote: Vote) -> StorageResult<()>;

    async fn update_vote_choice(
        &self,
        id: &VoteId,
        choice: VoteChoice,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<Vote>>;

    /// Aggregate the ledger rows for a proposal.
    async fn count_votes(&self, proposal_id: &ProposalId) -> StorageResult<VoteTally>;

    /// Insert a first vote and bump the matching counter as one unit.
    async fn record_vote(&self, vote: Vote) -> StorageResult<VoteWrite>;

    /// Flip an existing vote and move one count between the counters as one unit.
    async fn switch_vote(
        &self,
        id: &VoteId,
        choice: VoteChoice,
        at: DateTime<Utc>,
    ) -> StorageResult<VoteWrite>;
}

/// Storage for charter versions
#[async_trait]
pub trait CharterStorage: Send + Sync {
    /// The most recently created version.
    async fn latest_version(&self) -> StorageResult<Option<CharterVersion>>;

    /// The version flagged `is_current`.
    async fn current_version(&self) -> StorageResult<Option<CharterVersion>>;

    async fn get_version(&self, version: &str) -> StorageResult<Option<CharterVersion>>;

    /// All versions, newest first.
    async fn list_versions(&self) -> StorageResult<Vec<CharterVersion>>;

    /// Append `version` as current, unflagging the previous holder, provided
    /// the latest version is still `expected_head`.
    async fn append_version(
        &self,
        version: CharterVersion,
        expected_head: Option<CharterVersionId>,
    ) -> StorageResult<AppendOutcome>;
}
