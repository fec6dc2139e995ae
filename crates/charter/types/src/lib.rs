#![deny(unsafe_code)]
//! Core data types for the charter governance workflow.
//!
//! This crate provides:
//! - **Identifiers** for proposals, votes, charter versions and agents.
//! - **Proposals** with their lifecycle status and vote tally ([`Proposal`], [`ProposalStatus`]).
//! - **Votes** and tallies ([`Vote`], [`VoteChoice`], [`VoteTally`]).
//! - **Charter versions**, rights and diffs ([`CharterVersion`], [`Right`], [`CharterDiff`]).
//! - **Display helpers** such as the expiry [`Countdown`] and pagination types.
//! - **Domain events** broadcast by the governance service ([`GovernanceEvent`]).

pub mod charter;
pub mod countdown;
pub mod event;
pub mod ids;
pub mod page;
pub mod proposal;
pub mod vote;

pub use charter::{CharterDiff, CharterVersion, Right, RightChange, VersionTag};
pub use countdown::Countdown;
pub use event::GovernanceEvent;
pub use ids::{AgentId, CharterVersionId, ProposalId, VoteId};
pub use page::{PageRequest, Paginated, ProposalFilter};
pub use proposal::{
    ParseEnumError, Proposal, ProposalStatus, Theme, PROPOSAL_TTL_DAYS, TEXT_MAX_LEN,
    TITLE_MAX_LEN,
};
pub use vote::{Vote, VoteChoice, VoteTally};
