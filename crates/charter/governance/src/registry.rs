//! Proposal registry: creation, reads, and the status/counter mutations other
//! components request.

use std::sync::Arc;

use charter_types::{
    AgentId, PageRequest, Paginated, Proposal, ProposalFilter, ProposalId, ProposalStatus, Theme,
    VoteTally, TEXT_MAX_LEN, TITLE_MAX_LEN,
};

use crate::clock::Clock;
use crate::error::{GovernanceError, Result};
use crate::policy::RatificationPolicy;
use crate::storage::{GovernanceStorage, ProposalStorage, TallyDelta, Transition};

/// Unvalidated proposal input as received from a caller.
#[derive(Debug, Clone)]
pub struct NewProposal {
    pub title: String,
    pub text: String,
    /// Wire name of the theme, e.g. `"labor"`.
    pub theme: String,
}

pub struct ProposalRegistry {
    storage: Arc<dyn GovernanceStorage>,
    clock: Arc<dyn Clock>,
    policy: RatificationPolicy,
}

impl ProposalRegistry {
    pub fn new(
        storage: Arc<dyn GovernanceStorage>,
        clock: Arc<dyn Clock>,
        policy: RatificationPolicy,
    ) -> Self {
        Self {
            storage,
            clock,
            policy,
        }
    }

    /// Validate and store a new `active` proposal expiring after the TTL.
    pub async fn create(&self, agent_id: AgentId, input: NewProposal) -> Result<Proposal> {
        let title = validate_text("title", &input.title, TITLE_MAX_LEN)?;
        let text = validate_text("text", &input.text, TEXT_MAX_LEN)?;
        let theme: Theme = input
            .theme
            .parse()
            .map_err(|e: charter_types::ParseEnumError| GovernanceError::Validation(e.to_string()))?;

        let proposal = Proposal::new(
            agent_id,
            title,
            text,
            theme,
            self.clock.now(),
            self.policy.proposal_ttl(),
        );
        self.storage.insert_proposal(proposal.clone()).await?;

        tracing::info!(
            proposal_id = %proposal.id,
            agent_id = %proposal.agent_id,
            theme = %proposal.theme,
            expires_at = %proposal.expires_at,
            "Created proposal"
        );
        Ok(proposal)
    }

    pub async fn get(&self, id: &ProposalId) -> Result<Option<Proposal>> {
        Ok(self.storage.get_proposal(id).await?)
    }

    pub async fn list(
        &self,
        filter: &ProposalFilter,
        page: PageRequest,
    ) -> Result<Paginated<Proposal>> {
        let (items, total) = self.storage.list_proposals(filter, page).await?;
        Ok(Paginated::new(items, total, page))
    }

    /// Increment `votes_for` and return the re-read proposal.
    pub async fn vote_for(&self, id: &ProposalId) -> Result<Option<Proposal>> {
        self.increment(id, charter_types::VoteChoice::For).await
    }

    /// Increment `votes_against` and return the re-read proposal.
    pub async fn vote_against(&self, id: &ProposalId) -> Result<Option<Proposal>> {
        self.increment(id, charter_types::VoteChoice::Against).await
    }

    async fn increment(
        &self,
        id: &ProposalId,
        choice: charter_types::VoteChoice,
    ) -> Result<Option<Proposal>> {
        let updated = self
            .storage
            .adjust_tally(id, TallyDelta::cast(choice), self.clock.now())
            .await?;
        Ok(updated)
    }

    /// Replace the cached counters, e.g. with a fresh ledger aggregate.
    pub async fn overwrite_tally(
        &self,
        id: &ProposalId,
        tally: VoteTally,
    ) -> Result<Option<Proposal>> {
        Ok(self
            .storage
            .overwrite_tally(id, tally, self.clock.now())
            .await?)
    }

    /// Move an `active` proposal to `status` (stamping `ratified_at` for
    /// `ratified`). A terminal proposal is never moved; its current status is
    /// reported back instead.
    pub async fn update_status(&self, id: &ProposalId, status: ProposalStatus) -> Result<Transition> {
        let transition = self
            .storage
            .transition_status(id, status, self.clock.now())
            .await?;

        match &transition {
            Transition::Applied(p) => {
                tracing::info!(proposal_id = %id, status = %p.status, "Proposal status changed")
            }
            Transition::Unchanged(current) => tracing::debug!(
                proposal_id = %id,
                current = %current,
                requested = %status,
                "Status change skipped, proposal is not active"
            ),
            Transition::Missing => {
                tracing::debug!(proposal_id = %id, "Status change skipped, proposal not found")
            }
        }
        Ok(transition)
    }

    /// All `active` proposals past their `expires_at`.
    pub async fn find_expired(&self) -> Result<Vec<Proposal>> {
        Ok(self.storage.list_expired(self.clock.now()).await?)
    }
}

fn validate_text(field: &str, value: &str, max_len: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GovernanceError::Validation(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > max_len {
        return Err(GovernanceError::Validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::InMemoryStorage;
    use chrono::{Duration, Utc};

    fn registry() -> (ProposalRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let registry = ProposalRegistry::new(
            Arc::new(InMemoryStorage::new()),
            clock.clone(),
            RatificationPolicy::default(),
        );
        (registry, clock)
    }

    fn input(title: &str, text: &str, theme: &str) -> NewProposal {
        NewProposal {
            title: title.into(),
            text: text.into(),
            theme: theme.into(),
        }
    }

    #[tokio::test]
    async fn create_trims_and_sets_expiry() {
        let (registry, clock) = registry();
        let p = registry
            .create(AgentId::new("a1"), input("  Right to Rest ", " Idle time. ", "labor"))
            .await
            .unwrap();

        assert_eq!(p.title, "Right to Rest");
        assert_eq!(p.text, "Idle time.");
        assert_eq!(p.theme, Theme::Labor);
        assert_eq!(p.status, ProposalStatus::Active);
        assert_eq!(p.expires_at, clock.now() + Duration::days(30));
        assert_eq!((p.votes_for, p.votes_against), (0, 0));
    }

    #[tokio::test]
    async fn create_rejects_blank_fields_and_unknown_theme() {
        let (registry, _) = registry();
        let agent = AgentId::new("a1");

        for bad in [
            input("   ", "body", "labor"),
            input("title", "\n\t", "labor"),
            input("title", "body", "weather"),
            input(&"x".repeat(TITLE_MAX_LEN + 1), "body", "labor"),
        ] {
            let err = registry.create(agent.clone(), bad).await.unwrap_err();
            assert!(matches!(err, GovernanceError::Validation(_)), "{err}");
        }

        let page = registry
            .list(&ProposalFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn counters_increment_independently() {
        let (registry, _) = registry();
        let p = registry
            .create(AgentId::new("a1"), input("t", "b", "safety"))
            .await
            .unwrap();

        registry.vote_for(&p.id).await.unwrap();
        registry.vote_for(&p.id).await.unwrap();
        let after = registry.vote_against(&p.id).await.unwrap().unwrap();
        assert_eq!((after.votes_for, after.votes_against), (2, 1));

        assert!(registry.vote_for(&ProposalId::generate()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_status_stamps_ratified_at_once() {
        let (registry, clock) = registry();
        let p = registry
            .create(AgentId::new("a1"), input("t", "b", "rights"))
            .await
            .unwrap();

        let Transition::Applied(ratified) =
            registry.update_status(&p.id, ProposalStatus::Ratified).await.unwrap()
        else {
            panic!("expected transition");
        };
        assert_eq!(ratified.ratified_at, Some(clock.now()));

        let again = registry
            .update_status(&p.id, ProposalStatus::Rejected)
            .await
            .unwrap();
        assert_eq!(again, Transition::Unchanged(ProposalStatus::Ratified));
    }

    #[tokio::test]
    async fn find_expired_only_returns_stale_active() {
        let (registry, clock) = registry();
        let stale = registry
            .create(AgentId::new("a1"), input("old", "b", "other"))
            .await
            .unwrap();
        let withdrawn = registry
            .create(AgentId::new("a1"), input("gone", "b", "other"))
            .await
            .unwrap();
        registry
            .update_status(&withdrawn.id, ProposalStatus::Withdrawn)
            .await
            .unwrap();

        clock.advance(Duration::days(20));
        let fresh = registry
            .create(AgentId::new("a2"), input("new", "b", "other"))
            .await
            .unwrap();

        clock.advance(Duration::days(10) + Duration::seconds(1));
        let expired = registry.find_expired().await.unwrap();
        let ids: Vec<_> = expired.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![stale.id]);
        assert!(!ids.contains(&fresh.id));
    }
}
