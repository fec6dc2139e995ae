//! Governance service facade.
//!
//! Wires the components over one storage backend and clock, and broadcasts a
//! [`GovernanceEvent`] after each state change.

use std::sync::Arc;

use charter_types::{
    AgentId, CharterDiff, CharterVersion, Countdown, GovernanceEvent, PageRequest, Paginated,
    Proposal, ProposalFilter, ProposalId, ProposalStatus, Right, Vote, VoteChoice,
    VoteTally,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::charter::CharterStore;
use crate::clock::Clock;
use crate::error::{GovernanceError, Result};
use crate::expiration::{ExpirationSweeper, SweepReport};
use crate::ledger::VoteLedger;
use crate::policy::RatificationPolicy;
use crate::ratification::{RatificationEvaluator, RatificationStatus};
use crate::registry::{NewProposal, ProposalRegistry};
use crate::storage::{GovernanceStorage, Transition};
use crate::voting::{VoteAction, VoteCasting, VoteReceipt};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// A proposal together with its remaining voting time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalView {
    #[serde(flatten)]
    pub proposal: Proposal,
    pub countdown: Countdown,
}

/// Cached counters compared with a fresh ledger aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyReport {
    pub proposal_id: ProposalId,
    pub cached: VoteTally,
    pub ledger: VoteTally,
    pub drift: bool,
}

/// Number of proposals in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalCounts {
    pub active: u64,
    pub ratified: u64,
    pub rejected: u64,
    pub withdrawn: u64,
}

pub struct GovernanceService {
    clock: Arc<dyn Clock>,
    policy: RatificationPolicy,
    registry: Arc<ProposalRegistry>,
    ledger: Arc<VoteLedger>,
    charter: Arc<CharterStore>,
    evaluator: Arc<RatificationEvaluator>,
    casting: VoteCasting,
    sweeper: ExpirationSweeper,
    events: broadcast::Sender<GovernanceEvent>,
}

impl GovernanceService {
    pub fn new(
        storage: Arc<dyn GovernanceStorage>,
        clock: Arc<dyn Clock>,
        policy: RatificationPolicy,
    ) -> Self {
        let registry = Arc::new(ProposalRegistry::new(storage.clone(), clock.clone(), policy));
        let ledger = Arc::new(VoteLedger::new(storage.clone(), clock.clone()));
        let charter = Arc::new(CharterStore::new(storage.clone(), clock.clone()));
        let evaluator = Arc::new(RatificationEvaluator::new(
            storage.clone(),
            charter.clone(),
            clock.clone(),
            policy,
        ));
        let casting = VoteCasting::new(
            storage,
            registry.clone(),
            ledger.clone(),
            evaluator.clone(),
            clock.clone(),
        );
        let sweeper = ExpirationSweeper::new(registry.clone(), clock.clone(), policy);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            clock,
            policy,
            registry,
            ledger,
            charter,
            evaluator,
            casting,
            sweeper,
            events,
        }
    }

    pub fn policy(&self) -> &RatificationPolicy {
        &self.policy
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GovernanceEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: GovernanceEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn publish_ratification(&self, proposal_id: ProposalId, status: &RatificationStatus) {
        if !status.ratified {
            return;
        }
        let at = self.clock.now();
        self.publish(GovernanceEvent::ProposalRatified { proposal_id, at });
        if let Some(version) = &status.charter_version {
            self.publish(GovernanceEvent::CharterAmended {
                version: version.clone(),
                proposal_id: Some(proposal_id),
                at,
            });
        }
    }

    // Proposals

    pub async fn create_proposal(&self, agent_id: AgentId, input: NewProposal) -> Result<Proposal> {
        let proposal = self.registry.create(agent_id, input).await?;
        self.publish(GovernanceEvent::ProposalCreated {
            proposal_id: proposal.id,
            agent_id: proposal.agent_id.clone(),
            at: proposal.created_at,
        });
        Ok(proposal)
    }

    pub async fn list_proposals(
        &self,
        filter: &ProposalFilter,
        page: PageRequest,
    ) -> Result<Paginated<Proposal>> {
        self.registry.list(filter, page).await
    }

    pub async fn get_proposal(&self, id: &ProposalId) -> Result<ProposalView> {
        let proposal = self.require_proposal(id).await?;
        let countdown = self.sweeper.time_remaining(proposal.expires_at);
        Ok(ProposalView {
            proposal,
            countdown,
        })
    }

    pub async fn countdown(&self, id: &ProposalId) -> Result<Countdown> {
        let proposal = self.require_proposal(id).await?;
        Ok(self.sweeper.time_remaining(proposal.expires_at))
    }

    pub async fn proposal_counts(&self) -> Result<ProposalCounts> {
        let one = PageRequest::new(1, 1);
        let mut counts = ProposalCounts::default();
        for status in [
            ProposalStatus::Active,
            ProposalStatus::Ratified,
            ProposalStatus::Rejected,
            ProposalStatus::Withdrawn,
        ] {
            let filter = ProposalFilter {
                status: Some(status),
                theme: None,
            };
            let total = self.registry.list(&filter, one).await?.total;
            match status {
                ProposalStatus::Active => counts.active = total,
                ProposalStatus::Ratified => counts.ratified = total,
                ProposalStatus::Rejected => counts.rejected = total,
                ProposalStatus::Withdrawn => counts.withdrawn = total,
            }
        }
        Ok(counts)
    }

    /// Withdraw an `active` proposal. Only its author may do so.
    pub async fn withdraw_proposal(&self, agent_id: &AgentId, id: &ProposalId) -> Result<Proposal> {
        let proposal = self.require_proposal(id).await?;
        if &proposal.agent_id != agent_id {
            return Err(GovernanceError::Forbidden(format!(
                "only the author may withdraw proposal {id}"
            )));
        }

        match self
            .registry
            .update_status(id, ProposalStatus::Withdrawn)
            .await?
        {
            Transition::Applied(withdrawn) => {
                self.publish(GovernanceEvent::ProposalWithdrawn {
                    proposal_id: withdrawn.id,
                    agent_id: agent_id.clone(),
                    at: withdrawn.updated_at,
                });
                Ok(withdrawn)
            }
            Transition::Unchanged(status) => {
                Err(GovernanceError::ProposalClosed { id: *id, status })
            }
            Transition::Missing => Err(GovernanceError::ProposalNotFound(*id)),
        }
    }

    // Votes

    pub async fn vote(
        &self,
        agent_id: AgentId,
        proposal_id: ProposalId,
        choice: VoteChoice,
    ) -> Result<VoteReceipt> {
        let receipt = self.casting.vote(agent_id, proposal_id, choice).await?;

        if receipt.action != VoteAction::Unchanged {
            self.publish(GovernanceEvent::VoteRecorded {
                proposal_id,
                agent_id: receipt.vote.agent_id.clone(),
                choice: receipt.vote.choice,
                tally: receipt.proposal.tally(),
                at: receipt.vote.updated_at,
            });
        }
        if let Some(status) = &receipt.ratification {
            self.publish_ratification(proposal_id, status);
        }
        Ok(receipt)
    }

    pub async fn my_vote(&self, agent_id: &AgentId, proposal_id: &ProposalId) -> Result<Option<Vote>> {
        self.require_proposal(proposal_id).await?;
        self.ledger.find_vote(agent_id, proposal_id).await
    }

    /// Compare the proposal's cached counters with the ledger.
    pub async fn tally_report(&self, proposal_id: &ProposalId) -> Result<TallyReport> {
        let proposal = self.require_proposal(proposal_id).await?;
        let ledger = self.ledger.count_by_proposal(proposal_id).await?;
        let cached = proposal.tally();
        Ok(TallyReport {
            proposal_id: *proposal_id,
            cached,
            ledger,
            drift: cached != ledger,
        })
    }

    /// Overwrite the cached counters with the ledger aggregate.
    pub async fn reconcile_tally(&self, proposal_id: &ProposalId) -> Result<TallyReport> {
        let before = self.tally_report(proposal_id).await?;
        if before.drift {
            tracing::warn!(
                proposal_id = %proposal_id,
                cached_for = before.cached.votes_for,
                cached_against = before.cached.votes_against,
                ledger_for = before.ledger.votes_for,
                ledger_against = before.ledger.votes_against,
                "Tally drift detected, reconciling from ledger"
            );
            self.registry
                .overwrite_tally(proposal_id, before.ledger)
                .await?
                .ok_or(GovernanceError::ProposalNotFound(*proposal_id))?;
        }
        self.tally_report(proposal_id).await
    }

    // Ratification

    pub async fn check_ratification(&self, proposal_id: &ProposalId) -> Result<RatificationStatus> {
        let status = self.evaluator.check_ratification(proposal_id).await?;
        self.publish_ratification(*proposal_id, &status);
        Ok(status)
    }

    // Charter

    pub async fn get_current_charter(&self) -> Result<CharterVersion> {
        self.charter
            .find_current()
            .await?
            .ok_or_else(|| GovernanceError::VersionNotFound("current".into()))
    }

    pub async fn get_charter_version(&self, version: &str) -> Result<CharterVersion> {
        self.charter
            .find_by_version(version)
            .await?
            .ok_or_else(|| GovernanceError::VersionNotFound(version.to_string()))
    }

    pub async fn list_charter_versions(&self) -> Result<Vec<CharterVersion>> {
        self.charter.find_all().await
    }

    pub async fn diff_charter_versions(&self, from: &str, to: &str) -> Result<CharterDiff> {
        self.charter.diff_versions(from, to).await
    }

    /// Create the first charter version. Fails once any version exists.
    pub async fn seed_charter(&self, rights: Vec<Right>) -> Result<CharterVersion> {
        let version = self.charter.seed(rights).await?;
        self.publish(GovernanceEvent::CharterAmended {
            version: version.version.clone(),
            proposal_id: None,
            at: version.created_at,
        });
        Ok(version)
    }

    // Expiration

    pub async fn expire_proposals(&self) -> Result<SweepReport> {
        let report = self.sweeper.expire_proposals().await?;
        let at = self.clock.now();
        for proposal_id in &report.expired {
            self.publish(GovernanceEvent::ProposalExpired {
                proposal_id: *proposal_id,
                at,
            });
        }
        Ok(report)
    }

    async fn require_proposal(&self, id: &ProposalId) -> Result<Proposal> {
        self.registry
            .get(id)
            .await?
            .ok_or(GovernanceError::ProposalNotFound(*id))
    }
}
