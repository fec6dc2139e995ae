#![deny(unsafe_code)]
//! Charter governance engine.
//!
//! This crate provides the proposal workflow that amends the charter:
//! - **Proposal registry** owning proposal records, status and tally counters ([`ProposalRegistry`]).
//! - **Vote ledger** enforcing one vote per agent per proposal ([`VoteLedger`]).
//! - **Vote casting** orchestration with best-effort ratification ([`VoteCasting`]).
//! - **Ratification** evaluation against fixed thresholds ([`RatificationEvaluator`]).
//! - **Expiration** sweeping of stale proposals ([`ExpirationSweeper`]).
//! - **Charter store** with versioning and diffs ([`CharterStore`], [`diff_rights`]).
//! - **Service facade** exposing the operations callers use ([`GovernanceService`]).
//! - **Storage** traits with in-memory and PostgreSQL backends.

pub mod charter;
pub mod clock;
pub mod error;
pub mod expiration;
pub mod ledger;
pub mod policy;
pub mod ratification;
pub mod registry;
pub mod service;
pub mod storage;
pub mod voting;

pub use charter::{diff_rights, CharterStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{GovernanceError, Result, StorageError};
pub use expiration::{ExpirationSweeper, SweepReport};
pub use ledger::VoteLedger;
pub use policy::RatificationPolicy;
pub use ratification::{HoldReason, RatificationEvaluator, RatificationStatus};
pub use registry::{NewProposal, ProposalRegistry};
pub use service::{GovernanceService, ProposalCounts, ProposalView, TallyReport};
pub use storage::{GovernanceStorage, InMemoryStorage};
#[cfg(feature = "postgres")]
pub use storage::PostgresStorage;
pub use voting::{VoteAction, VoteCasting, VoteReceipt};
