//! REST API under `/api/v1`

pub mod extract;
pub mod handlers;
pub mod router;
pub mod state;
