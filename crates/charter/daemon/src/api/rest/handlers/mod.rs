//! API request handlers

mod admin;
mod charter;
mod events;
mod health;
mod proposals;

pub use admin::*;
pub use charter::*;
pub use events::*;
pub use health::*;
pub use proposals::*;
