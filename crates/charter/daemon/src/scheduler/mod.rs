//! Periodic background work

mod sweeper;

pub use sweeper::Scheduler;
