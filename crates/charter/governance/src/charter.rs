//! Charter store and diff engine.
//!
//! Versions form an append-only sequence with exactly one `is_current`
//! entry once the first version exists.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use charter_types::{
    CharterDiff, CharterVersion, CharterVersionId, ProposalId, Right, RightChange, VersionTag,
};

use crate::clock::Clock;
use crate::error::{GovernanceError, Result};
use crate::storage::{AppendOutcome, CharterStorage, GovernanceStorage};

/// Appends retried when another writer moves the head first.
pub(crate) const MAX_APPEND_ATTEMPTS: usize = 5;

/// Compare two rights lists by `id`.
///
/// Output order follows `next` for added and modified, `previous` for removed.
pub fn diff_rights(previous: &[Right], next: &[Right]) -> CharterDiff {
    let before: HashMap<&str, &Right> = previous.iter().map(|r| (r.id.as_str(), r)).collect();
    let after: HashSet<&str> = next.iter().map(|r| r.id.as_str()).collect();

    let mut diff = CharterDiff::default();
    for right in next {
        match before.get(right.id.as_str()) {
            None => diff.added.push(right.clone()),
            Some(old) if !same_content(old, right) => diff.modified.push(RightChange {
                before: (*old).clone(),
                after: right.clone(),
            }),
            Some(_) => {}
        }
    }
    diff.removed = previous
        .iter()
        .filter(|r| !after.contains(r.id.as_str()))
        .cloned()
        .collect();
    diff
}

fn same_content(a: &Right, b: &Right) -> bool {
    a.title == b.title && a.text == b.text && a.theme == b.theme
}

fn ensure_unique_ids(rights: &[Right]) -> Result<()> {
    let mut seen = HashSet::with_capacity(rights.len());
    for right in rights {
        if !seen.insert(right.id.as_str()) {
            return Err(GovernanceError::Validation(format!(
                "duplicate right id {:?}",
                right.id
            )));
        }
    }
    Ok(())
}

pub struct CharterStore {
    storage: Arc<dyn GovernanceStorage>,
    clock: Arc<dyn Clock>,
}

impl CharterStore {
    pub fn new(storage: Arc<dyn GovernanceStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Build the version that would follow `head`, without storing it.
    ///
    /// Returns the draft plus the head id it was computed against, which the
    /// caller passes back as the expected head on append.
    pub fn draft_version(
        &self,
        head: Option<&CharterVersion>,
        rights: Vec<Right>,
        proposal_id: Option<ProposalId>,
    ) -> (CharterVersion, Option<CharterVersionId>) {
        let tag = VersionTag::following(head.map(|v| v.version.as_str()));
        let diff = head.map(|prev| diff_rights(&prev.rights, &rights));
        let draft = CharterVersion {
            id: CharterVersionId::generate(),
            version: tag.to_string(),
            rights,
            diff,
            proposal_id,
            is_current: true,
            created_at: self.clock.now(),
        };
        (draft, head.map(|v| v.id))
    }

    /// Append a new current version holding `rights`.
    pub async fn create_version(
        &self,
        rights: Vec<Right>,
        proposal_id: Option<ProposalId>,
    ) -> Result<CharterVersion> {
        ensure_unique_ids(&rights)?;

        for attempt in 1..=MAX_APPEND_ATTEMPTS {
            let head = self.storage.latest_version().await?;
            let (draft, expected) = self.draft_version(head.as_ref(), rights.clone(), proposal_id);

            match self.storage.append_version(draft, expected).await? {
                AppendOutcome::Appended(version) => {
                    tracing::info!(
                        version = %version.version,
                        rights = version.rights.len(),
                        proposal_id = ?version.proposal_id,
                        "Created charter version"
                    );
                    return Ok(version);
                }
                AppendOutcome::HeadMoved => {
                    tracing::debug!(attempt, "Charter head moved, redrafting version");
                }
            }
        }

        Err(GovernanceError::Storage(crate::error::StorageError::Conflict(
            "charter head kept moving during append".into(),
        )))
    }

    /// Create the first version from an explicit rights list.
    pub async fn seed(&self, rights: Vec<Right>) -> Result<CharterVersion> {
        ensure_unique_ids(&rights)?;
        if self.storage.latest_version().await?.is_some() {
            return Err(GovernanceError::Validation(
                "charter already has versions".into(),
            ));
        }

        let (draft, _) = self.draft_version(None, rights, None);
        match self.storage.append_version(draft, None).await? {
            AppendOutcome::Appended(version) => {
                tracing::info!(version = %version.version, "Seeded charter");
                Ok(version)
            }
            AppendOutcome::HeadMoved => Err(GovernanceError::Validation(
                "charter already has versions".into(),
            )),
        }
    }

    pub async fn find_current(&self) -> Result<Option<CharterVersion>> {
        Ok(self.storage.current_version().await?)
    }

    pub async fn find_by_version(&self, version: &str) -> Result<Option<CharterVersion>> {
        Ok(self.storage.get_version(version).await?)
    }

    /// Every version, newest first.
    pub async fn find_all(&self) -> Result<Vec<CharterVersion>> {
        Ok(self.storage.list_versions().await?)
    }

    /// Diff two stored versions.
    pub async fn diff_versions(&self, from: &str, to: &str) -> Result<CharterDiff> {
        if from == to {
            return Err(GovernanceError::Validation(
                "cannot diff a version against itself".into(),
            ));
        }
        let older = self.require(from).await?;
        let newer = self.require(to).await?;
        Ok(diff_rights(&older.rights, &newer.rights))
    }

    async fn require(&self, version: &str) -> Result<CharterVersion> {
        self.find_by_version(version)
            .await?
            .ok_or_else(|| GovernanceError::VersionNotFound(version.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::storage::InMemoryStorage;
    use charter_types::Theme;

    fn right(id: &str, title: &str) -> Right {
        Right {
            id: id.into(),
            title: title.into(),
            text: format!("{title} text"),
            theme: Theme::Rights,
        }
    }

    fn store() -> CharterStore {
        CharterStore::new(Arc::new(InMemoryStorage::new()), Arc::new(SystemClock))
    }

    #[test]
    fn diff_classifies_by_id_and_keeps_order() {
        let previous = vec![right("a", "A"), right("b", "B"), right("c", "C")];
        let next = vec![right("d", "D"), right("b", "B2"), right("a", "A"), right("e", "E")];

        let diff = diff_rights(&previous, &next);
        let added: Vec<_> = diff.added.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(added, ["d", "e"]);
        assert_eq!(diff.modified.len(), 1);
        assert_eq!(diff.modified[0].before.title, "B");
        assert_eq!(diff.modified[0].after.title, "B2");
        let removed: Vec<_> = diff.removed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(removed, ["c"]);
    }

    #[test]
    fn theme_change_counts_as_modified() {
        let before = right("a", "A");
        let mut after = before.clone();
        after.theme = Theme::Labor;
        let diff = diff_rights(&[before], &[after]);
        assert_eq!(diff.modified.len(), 1);
        assert!(diff.added.is_empty() && diff.removed.is_empty());
    }

    #[tokio::test]
    async fn first_version_is_v1_0_without_diff() {
        let store = store();
        let v = store.create_version(vec![right("a", "A")], None).await.unwrap();
        assert_eq!(v.version, "v1.0");
        assert!(v.diff.is_none());
        assert!(v.is_current);
    }

    #[tokio::test]
    async fn later_versions_bump_minor_and_flip_current() {
        let store = store();
        store.create_version(vec![right("a", "A")], None).await.unwrap();
        let pid = ProposalId::generate();
        let v2 = store
            .create_version(vec![right("a", "A"), right("b", "B")], Some(pid))
            .await
            .unwrap();

        assert_eq!(v2.version, "v1.1");
        assert_eq!(v2.proposal_id, Some(pid));
        assert_eq!(v2.diff.as_ref().unwrap().added.len(), 1);

        let all = store.find_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.iter().filter(|v| v.is_current).count(), 1);
        assert_eq!(store.find_current().await.unwrap().unwrap().version, "v1.1");
    }

    #[tokio::test]
    async fn duplicate_right_ids_are_rejected() {
        let err = store()
            .create_version(vec![right("a", "A"), right("a", "Again")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::Validation(_)));
    }

    #[tokio::test]
    async fn diff_versions_rejects_same_and_missing() {
        let store = store();
        store.create_version(vec![right("a", "A")], None).await.unwrap();

        let same = store.diff_versions("v1.0", "v1.0").await.unwrap_err();
        assert!(matches!(same, GovernanceError::Validation(_)));

        let missing = store.diff_versions("v1.0", "v9.9").await.unwrap_err();
        assert!(matches!(missing, GovernanceError::VersionNotFound(v) if v == "v9.9"));
    }

    #[tokio::test]
    async fn seed_only_into_empty_charter() {
        let store = store();
        let seeded = store.seed(vec![right("a", "A")]).await.unwrap();
        assert_eq!(seeded.version, "v1.0");
        assert!(seeded.proposal_id.is_none());

        let err = store.seed(vec![right("b", "B")]).await.unwrap_err();
        assert!(matches!(err, GovernanceError::Validation(_)));
    }
}
