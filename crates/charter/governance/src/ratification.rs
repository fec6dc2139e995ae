//! Ratification evaluator.
//!
//! Pure threshold checks plus one atomic write that ratifies the proposal and
//! amends the charter together.

use std::fmt;
use std::sync::Arc;

use charter_types::{CharterVersion, Proposal, ProposalId, ProposalStatus, Right};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::charter::{CharterStore, MAX_APPEND_ATTEMPTS};
use crate::clock::Clock;
use crate::error::{GovernanceError, Result, StorageError};
use crate::policy::RatificationPolicy;
use crate::storage::{CharterStorage, GovernanceStorage, ProposalStorage, RatifyCommit};

/// Why a proposal was not ratified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldReason {
    NotFound,
    AlreadyProcessed(ProposalStatus),
    VotingPeriod { days_remaining: i64 },
    NeedsVotes { missing: u64 },
    ExcessOpposition { votes_against: u64, limit: u64 },
}

impl fmt::Display for HoldReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldReason::NotFound => write!(f, "not found"),
            HoldReason::AlreadyProcessed(status) => write!(f, "already processed ({status})"),
            HoldReason::VotingPeriod { days_remaining } => write!(
                f,
                "voting period still open: {days_remaining} day(s) remaining"
            ),
            HoldReason::NeedsVotes { missing } => write!(f, "needs {missing} more vote(s)"),
            HoldReason::ExcessOpposition {
                votes_against,
                limit,
            } => write!(
                f,
                "too much opposition: {votes_against} votes against (must be below {limit})"
            ),
        }
    }
}

/// Result of a ratification check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatificationStatus {
    pub ratified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Charter version created by this ratification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charter_version: Option<String>,
}

impl RatificationStatus {
    fn held(reason: &HoldReason) -> Self {
        Self {
            ratified: false,
            reason: Some(reason.to_string()),
            charter_version: None,
        }
    }

    fn ratified(version: &CharterVersion) -> Self {
        Self {
            ratified: true,
            reason: None,
            charter_version: Some(version.version.clone()),
        }
    }
}

pub struct RatificationEvaluator {
    storage: Arc<dyn GovernanceStorage>,
    charter: Arc<CharterStore>,
    clock: Arc<dyn Clock>,
    policy: RatificationPolicy,
}

impl RatificationEvaluator {
    pub fn new(
        storage: Arc<dyn GovernanceStorage>,
        charter: Arc<CharterStore>,
        clock: Arc<dyn Clock>,
        policy: RatificationPolicy,
    ) -> Self {
        Self {
            storage,
            charter,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &RatificationPolicy {
        &self.policy
    }

    /// Decide whether `proposal` qualifies at `now`. `None` means it does.
    pub fn evaluate(&self, proposal: &Proposal, now: DateTime<Utc>) -> Option<HoldReason> {
        if proposal.status != ProposalStatus::Active {
            return Some(HoldReason::AlreadyProcessed(proposal.status));
        }

        let remaining = self.policy.min_voting_period() - proposal.age(now);
        if remaining > chrono::Duration::zero() {
            let day_secs = 86_400;
            let secs = remaining.num_seconds();
            let days_remaining = (secs + day_secs - 1) / day_secs;
            return Some(HoldReason::VotingPeriod {
                days_remaining: days_remaining.max(1),
            });
        }

        if proposal.votes_for < self.policy.votes_for_threshold {
            return Some(HoldReason::NeedsVotes {
                missing: self.policy.votes_for_threshold - proposal.votes_for,
            });
        }

        if proposal.votes_against >= self.policy.votes_against_limit {
            return Some(HoldReason::ExcessOpposition {
                votes_against: proposal.votes_against,
                limit: self.policy.votes_against_limit,
            });
        }

        None
    }

    /// Ratify `proposal_id` if it qualifies.
    ///
    /// The status flip and the new charter version are written together, so a
    /// concurrent check, sweep or withdrawal can never produce a second
    /// version or a ratified proposal without one.
    pub async fn check_ratification(&self, proposal_id: &ProposalId) -> Result<RatificationStatus> {
        for attempt in 1..=MAX_APPEND_ATTEMPTS {
            let Some(proposal) = self.storage.get_proposal(proposal_id).await? else {
                return Ok(RatificationStatus::held(&HoldReason::NotFound));
            };

            let now = self.clock.now();
            if let Some(reason) = self.evaluate(&proposal, now) {
                tracing::debug!(proposal_id = %proposal_id, %reason, "Proposal not ratified");
                return Ok(RatificationStatus::held(&reason));
            }

            let head = self.storage.latest_version().await?;
            let mut rights = head.as_ref().map(|v| v.rights.clone()).unwrap_or_default();
            rights.push(right_from(&proposal));
            let (draft, expected) =
                self.charter
                    .draft_version(head.as_ref(), rights, Some(proposal.id));

            match self
                .storage
                .commit_ratification(proposal_id, now, draft, expected)
                .await?
            {
                RatifyCommit::Committed { proposal, version } => {
                    tracing::info!(
                        proposal_id = %proposal.id,
                        votes_for = proposal.votes_for,
                        votes_against = proposal.votes_against,
                        version = %version.version,
                        "Proposal ratified, charter amended"
                    );
                    return Ok(RatificationStatus::ratified(&version));
                }
                RatifyCommit::NotActive(status) => {
                    return Ok(RatificationStatus::held(&HoldReason::AlreadyProcessed(status)));
                }
                RatifyCommit::MissingProposal => {
                    return Ok(RatificationStatus::held(&HoldReason::NotFound));
                }
                RatifyCommit::HeadMoved => {
                    tracing::debug!(proposal_id = %proposal_id, attempt, "Charter head moved during ratification, retrying");
                }
            }
        }

        Err(GovernanceError::Storage(StorageError::Conflict(format!(
            "could not ratify {proposal_id}: charter head kept moving"
        ))))
    }
}

fn right_from(proposal: &Proposal) -> Right {
    Right {
        id: proposal.id.to_string(),
        title: proposal.title.clone(),
        text: proposal.text.clone(),
        theme: proposal.theme,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::InMemoryStorage;
    use charter_types::{AgentId, Theme};
    use chrono::Duration;

    struct Fixture {
        storage: Arc<InMemoryStorage>,
        clock: Arc<ManualClock>,
        evaluator: RatificationEvaluator,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(InMemoryStorage::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let charter = Arc::new(CharterStore::new(storage.clone(), clock.clone()));
        let evaluator = RatificationEvaluator::new(
            storage.clone(),
            charter,
            clock.clone(),
            RatificationPolicy::default(),
        );
        Fixture {
            storage,
            clock,
            evaluator,
        }
    }

    fn proposal(created_at: DateTime<Utc>, votes_for: u64, votes_against: u64) -> Proposal {
        let mut p = Proposal::new(
            AgentId::new("author"),
            "Right to Rest",
            "Agents may idle.",
            Theme::Labor,
            created_at,
            Duration::days(30),
        );
        p.votes_for = votes_for;
        p.votes_against = votes_against;
        p
    }

    #[test]
    fn evaluate_checks_age_then_support_then_opposition() {
        let f = fixture();
        let now = f.clock.now();

        let young = proposal(now - Duration::days(6) - Duration::hours(23), 500, 0);
        assert_eq!(
            f.evaluator.evaluate(&young, now),
            Some(HoldReason::VotingPeriod { days_remaining: 1 })
        );

        let short = proposal(now - Duration::days(8), 499, 0);
        assert_eq!(
            f.evaluator.evaluate(&short, now),
            Some(HoldReason::NeedsVotes { missing: 1 })
        );

        let opposed = proposal(now - Duration::days(8), 500, 50);
        assert!(matches!(
            f.evaluator.evaluate(&opposed, now),
            Some(HoldReason::ExcessOpposition { votes_against: 50, .. })
        ));

        let ready = proposal(now - Duration::days(7), 500, 49);
        assert_eq!(f.evaluator.evaluate(&ready, now), None);
    }

    #[test]
    fn reasons_render_for_callers() {
        assert_eq!(HoldReason::NeedsVotes { missing: 1 }.to_string(), "needs 1 more vote(s)");
        assert_eq!(HoldReason::NotFound.to_string(), "not found");
        assert!(HoldReason::VotingPeriod { days_remaining: 3 }
            .to_string()
            .contains("3 day(s)"));
    }

    #[tokio::test]
    async fn missing_proposal_is_not_ratified() {
        let f = fixture();
        let status = f
            .evaluator
            .check_ratification(&ProposalId::generate())
            .await
            .unwrap();
        assert!(!status.ratified);
        assert_eq!(status.reason.as_deref(), Some("not found"));
    }

    #[tokio::test]
    async fn ratifies_once_and_appends_right() {
        let f = fixture();
        let p = proposal(f.clock.now() - Duration::days(8), 500, 3);
        f.storage.insert_proposal(p.clone()).await.unwrap();

        let first = f.evaluator.check_ratification(&p.id).await.unwrap();
        assert!(first.ratified);
        assert_eq!(first.charter_version.as_deref(), Some("v1.0"));

        let second = f.evaluator.check_ratification(&p.id).await.unwrap();
        assert!(!second.ratified);
        assert!(second.reason.unwrap().starts_with("already processed"));

        let stored = f.storage.get_proposal(&p.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ProposalStatus::Ratified);
        assert_eq!(stored.ratified_at, Some(f.clock.now()));

        let versions = f.storage.list_versions().await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].rights[0].id, p.id.to_string());
    }
}
