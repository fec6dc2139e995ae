//! Property tests for governance invariants.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use charter_governance::{
    diff_rights, CharterStore, GovernanceService, InMemoryStorage, ManualClock, NewProposal,
    ProposalRegistry, RatificationPolicy, SystemClock,
};
use charter_types::{AgentId, ProposalStatus, Right, Theme, VersionTag, VoteChoice};
use chrono::Utc;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
        .block_on(future)
}

fn arb_theme() -> impl Strategy<Value = Theme> {
    prop::sample::select(Theme::ALL.to_vec())
}

fn arb_right() -> impl Strategy<Value = Right> {
    ("[a-z]{1,6}", "[A-Za-z ]{1,20}", "[a-z ]{0,40}", arb_theme()).prop_map(
        |(id, title, text, theme)| Right {
            id,
            title,
            text,
            theme,
        },
    )
}

/// Rights list with unique ids.
fn arb_rights(max: usize) -> impl Strategy<Value = Vec<Right>> {
    prop::collection::vec(arb_right(), 0..max).prop_map(|rights| {
        let mut seen = HashSet::new();
        rights
            .into_iter()
            .filter(|r| seen.insert(r.id.clone()))
            .collect()
    })
}

fn arb_status() -> impl Strategy<Value = ProposalStatus> {
    prop_oneof![
        Just(ProposalStatus::Active),
        Just(ProposalStatus::Ratified),
        Just(ProposalStatus::Rejected),
        Just(ProposalStatus::Withdrawn),
    ]
}

fn arb_ballots() -> impl Strategy<Value = Vec<(u8, bool)>> {
    prop::collection::vec((0u8..6, any::<bool>()), 0..40)
}

fn input() -> NewProposal {
    NewProposal {
        title: "Open ledger".into(),
        text: "All votes are public.".into(),
        theme: "governance".into(),
    }
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Diffing any rights list against itself yields nothing.
    #[test]
    fn diff_with_self_is_empty(rights in arb_rights(12)) {
        prop_assert!(diff_rights(&rights, &rights).is_empty());
    }

    /// Every id lands in exactly one bucket or is unchanged.
    #[test]
    fn diff_partitions_ids(previous in arb_rights(10), next in arb_rights(10)) {
        let diff = diff_rights(&previous, &next);
        let prev_ids: HashSet<_> = previous.iter().map(|r| r.id.clone()).collect();
        let next_ids: HashSet<_> = next.iter().map(|r| r.id.clone()).collect();

        for r in &diff.added {
            prop_assert!(next_ids.contains(&r.id) && !prev_ids.contains(&r.id));
        }
        for r in &diff.removed {
            prop_assert!(prev_ids.contains(&r.id) && !next_ids.contains(&r.id));
        }
        for change in &diff.modified {
            prop_assert_eq!(&change.before.id, &change.after.id);
            prop_assert_ne!(&change.before, &change.after);
        }
        prop_assert_eq!(diff.added.len(), next_ids.difference(&prev_ids).count());
        prop_assert_eq!(diff.removed.len(), prev_ids.difference(&next_ids).count());
    }

    /// Versions strictly increase and exactly one is current.
    #[test]
    fn versions_increase_with_single_current(snapshots in prop::collection::vec(arb_rights(6), 1..8)) {
        let versions = block_on(async {
            let store = CharterStore::new(Arc::new(InMemoryStorage::new()), Arc::new(SystemClock));
            for rights in snapshots {
                store.create_version(rights, None).await.expect("create version");
            }
            store.find_all().await.expect("list versions")
        });

        prop_assert_eq!(versions.iter().filter(|v| v.is_current).count(), 1);
        prop_assert!(versions[0].is_current);

        let tags: Vec<VersionTag> = versions.iter().rev().filter_map(|v| v.tag()).collect();
        prop_assert_eq!(tags.len(), versions.len());
        prop_assert!(tags.windows(2).all(|w| w[0] < w[1]));
    }

    /// One ledger row per agent, and the cached counters track the ledger.
    #[test]
    fn one_vote_per_agent_and_counters_match(ballots in arb_ballots()) {
        let (report, agents, rows) = block_on(async {
            let service = GovernanceService::new(
                Arc::new(InMemoryStorage::new()),
                Arc::new(ManualClock::new(Utc::now())),
                RatificationPolicy::default(),
            );
            let proposal = service
                .create_proposal(AgentId::new("author"), input())
                .await
                .expect("create");

            let mut agents = HashSet::new();
            for (agent, support) in ballots {
                let choice = if support { VoteChoice::For } else { VoteChoice::Against };
                service
                    .vote(AgentId::new(format!("agent-{agent}")), proposal.id, choice)
                    .await
                    .expect("vote");
                agents.insert(agent);
            }

            let mut rows = 0;
            for agent in &agents {
                let id = AgentId::new(format!("agent-{agent}"));
                if service.my_vote(&id, &proposal.id).await.expect("lookup").is_some() {
                    rows += 1;
                }
            }
            let report = service.tally_report(&proposal.id).await.expect("report");
            (report, agents.len() as u64, rows)
        });

        prop_assert_eq!(rows, agents);
        prop_assert_eq!(report.ledger.total(), agents);
        prop_assert!(!report.drift);
    }

    /// Once a proposal leaves `active` its status never changes again.
    #[test]
    fn terminal_status_is_sticky(requests in prop::collection::vec(arb_status(), 1..10)) {
        let history = block_on(async {
            let clock = Arc::new(ManualClock::new(Utc::now()));
            let registry = ProposalRegistry::new(
                Arc::new(InMemoryStorage::new()),
                clock,
                RatificationPolicy::default(),
            );
            let proposal = registry
                .create(AgentId::new("author"), input())
                .await
                .expect("create");
            prop_assert_eq!(proposal.tally().total(), 0);

            let mut history = Vec::new();
            for status in requests {
                registry.update_status(&proposal.id, status).await.expect("update");
                let current = registry.get(&proposal.id).await.expect("get").expect("exists");
                history.push(current.status);
            }
            Ok(history)
        })?;

        if let Some(first_terminal) = history.iter().position(|s| s.is_terminal()) {
            let settled = history[first_terminal];
            prop_assert!(history[first_terminal..].iter().all(|s| *s == settled));
        }
    }
}
