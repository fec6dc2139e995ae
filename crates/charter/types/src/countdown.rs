//! Time remaining in a proposal's voting window, for display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub expired: bool,
}

impl Countdown {
    /// Whole days/hours/minutes until `expires_at`. Once `expires_at <= now`
    /// every component is zero and `expired` is set.
    pub fn until(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if expires_at <= now {
            return Self {
                expired: true,
                ..Self::default()
            };
        }

        let minutes_left = (expires_at - now).num_minutes();
        Self {
            days: minutes_left / (24 * 60),
            hours: (minutes_left / 60) % 24,
            minutes: minutes_left % 60,
            expired: false,
        }
    }
}
