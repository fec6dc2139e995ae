//! Charter versions, rights and the differences between versions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{CharterVersionId, ProposalId};
use crate::proposal::Theme;

/// A single named clause of the charter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Right {
    /// Unique within a version. Rights added by ratification use the proposal id.
    pub id: String,
    pub title: String,
    pub text: String,
    pub theme: Theme,
}

/// A right whose content changed between two versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RightChange {
    pub before: Right,
    pub after: Right,
}

/// Added/removed/modified rights between two versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharterDiff {
    pub added: Vec<Right>,
    pub removed: Vec<Right>,
    pub modified: Vec<RightChange>,
}

impl CharterDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Parsed `v{major}.{minor}` version label.
///
/// Ordering is numeric, so `v1.10` sorts after `v1.9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionTag {
    pub major: u32,
    pub minor: u32,
}

impl VersionTag {
    pub const INITIAL: VersionTag = VersionTag { major: 1, minor: 0 };

    pub fn parse(s: &str) -> Option<Self> {
        let (major, minor) = s.strip_prefix('v')?.split_once('.')?;
        Some(Self {
            major: major.parse().ok()?,
            minor: minor.parse().ok()?,
        })
    }

    /// Bump the minor component. Major only moves when minor is exhausted.
    pub fn next_minor(&self) -> Self {
        match self.minor.checked_add(1) {
            Some(minor) => Self {
                major: self.major,
                minor,
            },
            None => Self {
                major: self.major.saturating_add(1),
                minor: 0,
            },
        }
    }

    /// Label following `previous`: `v1.0` when there is none, or when it
    /// cannot be parsed.
    pub fn following(previous: Option<&str>) -> Self {
        previous
            .and_then(Self::parse)
            .map(|tag| tag.next_minor())
            .unwrap_or(Self::INITIAL)
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)
    }
}

/// An immutable snapshot of the charter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharterVersion {
    pub id: CharterVersionId,
    pub version: String,
    pub rights: Vec<Right>,
    /// Changes against the preceding version; absent for the first one.
    pub diff: Option<CharterDiff>,
    /// Proposal whose ratification produced this version; absent when seeded.
    pub proposal_id: Option<ProposalId>,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
}

impl CharterVersion {
    pub fn tag(&self) -> Option<VersionTag> {
        VersionTag::parse(&self.version)
    }
}
