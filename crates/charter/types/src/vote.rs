//! Votes and tallies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ids::{AgentId, ProposalId, VoteId};
use crate::proposal::ParseEnumError;

/// Side an agent takes on a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    For,
    Against,
}

impl VoteChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteChoice::For => "for",
            VoteChoice::Against => "against",
        }
    }
}

impl fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteChoice {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "for" => Ok(VoteChoice::For),
            "against" => Ok(VoteChoice::Against),
            other => Err(ParseEnumError {
                kind: "choice",
                value: other.to_string(),
            }),
        }
    }
}

/// A ledger entry: one live vote per (agent, proposal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: VoteId,
    pub agent_id: AgentId,
    pub proposal_id: ProposalId,
    pub choice: VoteChoice,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(
        agent_id: AgentId,
        proposal_id: ProposalId,
        choice: VoteChoice,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: VoteId::generate(),
            agent_id,
            proposal_id,
            choice,
            created_at: at,
            updated_at: at,
        }
    }
}

/// For/against counts for a proposal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub votes_for: u64,
    pub votes_against: u64,
}

impl VoteTally {
    pub fn record(&mut self, choice: VoteChoice) {
        match choice {
            VoteChoice::For => self.votes_for += 1,
            VoteChoice::Against => self.votes_against += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.votes_for + self.votes_against
    }
}

impl FromIterator<VoteChoice> for VoteTally {
    fn from_iter<I: IntoIterator<Item = VoteChoice>>(iter: I) -> Self {
        let mut tally = VoteTally::default();
        for choice in iter {
            tally.record(choice);
        }
        tally
    }
}
