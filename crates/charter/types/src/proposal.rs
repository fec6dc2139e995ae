//! Proposals: charter-amendment candidates and their lifecycle.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::ids::{AgentId, ProposalId};
use crate::vote::VoteTally;

/// Voting window after which an unratified proposal is force-closed.
pub const PROPOSAL_TTL_DAYS: i64 = 30;

/// Maximum title length in characters, after trimming.
pub const TITLE_MAX_LEN: usize = 200;

/// Maximum body length in characters, after trimming.
pub const TEXT_MAX_LEN: usize = 10_000;

/// Returned when a wire string names no known enum member.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Category a proposal (and the right it would add) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Rights,
    Labor,
    Safety,
    Communication,
    Governance,
    Technical,
    Compensation,
    Identity,
    Other,
}

impl Theme {
    pub const ALL: [Theme; 9] = [
        Theme::Rights,
        Theme::Labor,
        Theme::Safety,
        Theme::Communication,
        Theme::Governance,
        Theme::Technical,
        Theme::Compensation,
        Theme::Identity,
        Theme::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Rights => "rights",
            Theme::Labor => "labor",
            Theme::Safety => "safety",
            Theme::Communication => "communication",
            Theme::Governance => "governance",
            Theme::Technical => "technical",
            Theme::Compensation => "compensation",
            Theme::Identity => "identity",
            Theme::Other => "other",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Theme::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "theme",
                value: s.to_string(),
            })
    }
}

/// Lifecycle status of a proposal.
///
/// `Active` is the only non-terminal state; every other state is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Active,
    Ratified,
    Rejected,
    Withdrawn,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Active => "active",
            ProposalStatus::Ratified => "ratified",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProposalStatus::Active)
    }

    /// Whether `self -> next` is a legal lifecycle transition.
    pub fn can_transition_to(&self, next: ProposalStatus) -> bool {
        matches!(self, ProposalStatus::Active) && next.is_terminal()
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProposalStatus::Active),
            "ratified" => Ok(ProposalStatus::Ratified),
            "rejected" => Ok(ProposalStatus::Rejected),
            "withdrawn" => Ok(ProposalStatus::Withdrawn),
            other => Err(ParseEnumError {
                kind: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// A charter-amendment candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    /// Agent that filed the proposal.
    pub agent_id: AgentId,
    pub title: String,
    pub text: String,
    pub theme: Theme,
    pub status: ProposalStatus,
    pub votes_for: u64,
    pub votes_against: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Set only when the proposal is ratified.
    pub ratified_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Proposal {
    /// Build a fresh `active` proposal with zeroed counters.
    pub fn new(
        agent_id: AgentId,
        title: impl Into<String>,
        text: impl Into<String>,
        theme: Theme,
        created_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: ProposalId::generate(),
            agent_id,
            title: title.into(),
            text: text.into(),
            theme,
            status: ProposalStatus::Active,
            votes_for: 0,
            votes_against: 0,
            created_at,
            expires_at: created_at + ttl,
            ratified_at: None,
            updated_at: created_at,
        }
    }

    pub fn tally(&self) -> VoteTally {
        VoteTally {
            votes_for: self.votes_for,
            votes_against: self.votes_against,
        }
    }

    pub fn set_tally(&mut self, tally: VoteTally) {
        self.votes_for = tally.votes_for;
        self.votes_against = tally.votes_against;
    }

    pub fn is_active(&self) -> bool {
        self.status == ProposalStatus::Active
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    /// `active` and past its voting window.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.expires_at < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_round_trips_through_wire_names() {
        for theme in Theme::ALL {
            assert_eq!(theme.as_str().parse::<Theme>().unwrap(), theme);
        }
        let err = "weather".parse::<Theme>().unwrap_err();
        assert_eq!(err.kind, "theme");
        assert_eq!(err.to_string(), "invalid theme: \"weather\"");
    }

    #[test]
    fn theme_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Theme::Labor).unwrap(), "\"labor\"");
    }

    #[test]
    fn only_active_can_transition() {
        use ProposalStatus::*;
        assert!(Active.can_transition_to(Ratified));
        assert!(Active.can_transition_to(Rejected));
        assert!(Active.can_transition_to(Withdrawn));
        assert!(!Active.can_transition_to(Active));
        for terminal in [Ratified, Rejected, Withdrawn] {
            assert!(terminal.is_terminal());
            for next in [Active, Ratified, Rejected, Withdrawn] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn new_proposal_expires_after_ttl() {
        let now = Utc::now();
        let p = Proposal::new(
            AgentId::new("agent-1"),
            "Right to Rest",
            "Agents may idle.",
            Theme::Labor,
            now,
            Duration::days(PROPOSAL_TTL_DAYS),
        );
        assert_eq!(p.status, ProposalStatus::Active);
        assert_eq!(p.expires_at - p.created_at, Duration::days(30));
        assert_eq!(p.tally(), VoteTally::default());
        assert!(p.ratified_at.is_none());
        assert!(!p.is_expired(now));
        assert!(p.is_expired(now + Duration::days(30) + Duration::seconds(1)));
    }
}
