//! Storage layer for the governance engine
//!
//! Provides persistence for proposals, the vote ledger and charter versions.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod traits;

pub use memory::InMemoryStorage;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStorage;
pub use traits::{
    AppendOutcome, CharterStorage, GovernanceStorage, ProposalStorage, RatifyCommit,
    StorageResult, TallyDelta, Transition, VoteStorage, VoteWrite,
};
