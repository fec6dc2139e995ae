//! Expiration sweeper: force-closes proposals whose voting window elapsed.
//!
//! Expiry never consults the ratification thresholds. A proposal that would
//! have qualified is still rejected once it expires.

use std::sync::Arc;

use charter_types::{Countdown, ProposalId, ProposalStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::Result;
use crate::policy::RatificationPolicy;
use crate::registry::ProposalRegistry;
use crate::storage::Transition;

/// Proposals closed by one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub expired: Vec<ProposalId>,
}

impl SweepReport {
    pub fn count(&self) -> usize {
        self.expired.len()
    }
}

pub struct ExpirationSweeper {
    registry: Arc<ProposalRegistry>,
    clock: Arc<dyn Clock>,
    policy: RatificationPolicy,
}

impl ExpirationSweeper {
    pub fn new(
        registry: Arc<ProposalRegistry>,
        clock: Arc<dyn Clock>,
        policy: RatificationPolicy,
    ) -> Self {
        Self {
            registry,
            clock,
            policy,
        }
    }

    /// Reject every `active` proposal past its expiry.
    ///
    /// Each close is a conditional `active -> rejected` write, so a proposal
    /// ratified or withdrawn since the scan is skipped and overlapping sweeps
    /// count each proposal once.
    pub async fn expire_proposals(&self) -> Result<SweepReport> {
        let candidates = self.registry.find_expired().await?;
        let mut report = SweepReport::default();

        for proposal in candidates {
            match self
                .registry
                .update_status(&proposal.id, ProposalStatus::Rejected)
                .await?
            {
                Transition::Applied(closed) => {
                    tracing::info!(
                        proposal_id = %closed.id,
                        expires_at = %closed.expires_at,
                        votes_for = closed.votes_for,
                        votes_against = closed.votes_against,
                        "Expired proposal"
                    );
                    report.expired.push(closed.id);
                }
                Transition::Unchanged(_) | Transition::Missing => {}
            }
        }

        if report.count() > 0 {
            tracing::info!(count = report.count(), "Expiration sweep closed proposals");
        } else {
            tracing::debug!("Expiration sweep found nothing to close");
        }
        Ok(report)
    }

    /// Expiry for a proposal created now.
    pub fn calculate_expires_at(&self) -> DateTime<Utc> {
        self.clock.now() + self.policy.proposal_ttl()
    }

    pub fn time_remaining(&self, expires_at: DateTime<Utc>) -> Countdown {
        Countdown::until(expires_at, self.clock.now())
    }
}
