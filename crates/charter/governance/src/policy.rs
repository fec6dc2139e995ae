//! Ratification thresholds and the proposal voting window.

use chrono::Duration;
use serde::{Deserialize, Serialize};

pub const VOTES_FOR_THRESHOLD: u64 = 500;
pub const VOTES_AGAINST_THRESHOLD: u64 = 50;
pub const MIN_VOTING_PERIOD_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatificationPolicy {
    /// Minimum `votes_for` needed to ratify.
    pub votes_for_threshold: u64,
    /// `votes_against` must stay strictly below this.
    pub votes_against_limit: u64,
    pub min_voting_period_days: i64,
    pub proposal_ttl_days: i64,
}

impl Default for RatificationPolicy {
    fn default() -> Self {
        Self {
            votes_for_threshold: VOTES_FOR_THRESHOLD,
            votes_against_limit: VOTES_AGAINST_THRESHOLD,
            min_voting_period_days: MIN_VOTING_PERIOD_DAYS,
            proposal_ttl_days: charter_types::PROPOSAL_TTL_DAYS,
        }
    }
}

impl RatificationPolicy {
    pub fn min_voting_period(&self) -> Duration {
        Duration::days(self.min_voting_period_days)
    }

    pub fn proposal_ttl(&self) -> Duration {
        Duration::days(self.proposal_ttl_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_thresholds() {
        let policy = RatificationPolicy::default();
        assert_eq!(policy.votes_for_threshold, 500);
        assert_eq!(policy.votes_against_limit, 50);
        assert_eq!(policy.min_voting_period(), Duration::days(7));
        assert_eq!(policy.proposal_ttl(), Duration::days(30));
    }
}
