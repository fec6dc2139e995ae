//! Charter Daemon library
//!
//! This module provides the core components for the charter daemon:
//! - REST API handlers over the governance service
//! - Storage backend selection
//! - Expiration sweep scheduling
//! - Server lifecycle management

pub mod api;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod server;
pub mod storage;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError};
pub use scheduler::Scheduler;
pub use server::Server;
