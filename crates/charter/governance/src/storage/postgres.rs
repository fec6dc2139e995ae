//! PostgreSQL storage implementation
//!
//! Composite operations run inside a transaction: proposal rows are locked
//! with `SELECT ... FOR UPDATE` and charter appends take a table lock so the
//! head check, the `is_current` flip and the insert happen as one unit.

use super::traits::*;
use crate::error::StorageError;
use async_trait::async_trait;
use charter_types::{
    AgentId, CharterDiff, CharterVersion, CharterVersionId, PageRequest, Proposal,
    ProposalFilter, ProposalId, ProposalStatus, Right, Vote, VoteChoice, VoteId, VoteTally,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

const PROPOSAL_COLUMNS: &str = "id, agent_id, title, body, theme, status, votes_for, \
     votes_against, created_at, expires_at, ratified_at, updated_at";

const VOTE_COLUMNS: &str = "id, agent_id, proposal_id, choice, created_at, updated_at";

const VERSION_COLUMNS: &str = "id, version, rights, diff, proposal_id, is_current, created_at";

/// PostgreSQL-backed storage
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Connect to PostgreSQL and initialize schema
    pub async fn new(
        url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(connect_timeout_secs))
            .connect(url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let storage = Self { pool };
        storage.initialize_schema().await?;
        Ok(storage)
    }

    async fn initialize_schema(&self) -> Result<(), StorageError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS proposals (
                id UUID PRIMARY KEY,
                agent_id TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                theme TEXT NOT NULL,
                status TEXT NOT NULL,
                votes_for BIGINT NOT NULL DEFAULT 0 CHECK (votes_for >= 0),
                votes_against BIGINT NOT NULL DEFAULT 0 CHECK (votes_against >= 0),
                created_at TIMESTAMPTZ NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                ratified_at TIMESTAMPTZ,
                updated_at TIMESTAMPTZ NOT NULL
            );
            "#,
            r#"CREATE INDEX IF NOT EXISTS proposals_status_expires ON proposals(status, expires_at);"#,
            r#"CREATE INDEX IF NOT EXISTS proposals_created_at ON proposals(created_at DESC);"#,
            r#"
            CREATE TABLE IF NOT EXISTS votes (
                id UUID PRIMARY KEY,
                agent_id TEXT NOT NULL,
                proposal_id UUID NOT NULL REFERENCES proposals(id),
                choice TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                UNIQUE (agent_id, proposal_id)
            );
            "#,
            r#"CREATE INDEX IF NOT EXISTS votes_proposal_id ON votes(proposal_id);"#,
            r#"
            CREATE TABLE IF NOT EXISTS charter_versions (
                seq BIGSERIAL,
                id UUID PRIMARY KEY,
                version TEXT NOT NULL UNIQUE,
                rights JSONB NOT NULL,
                diff JSONB,
                proposal_id UUID,
                is_current BOOLEAN NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            );
            "#,
            r#"CREATE INDEX IF NOT EXISTS charter_versions_seq ON charter_versions(seq DESC);"#,
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS charter_versions_single_current
                ON charter_versions(is_current) WHERE is_current;
            "#,
        ];

        for stmt in statements {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(query_err)?;
        }

        Ok(())
    }

    async fn connection(&self) -> StorageResult<sqlx::pool::PoolConnection<sqlx::Postgres>> {
        self.pool
            .acquire()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn query_err(e: sqlx::Error) -> StorageError {
    StorageError::Query(e.to_string())
}

fn invalid<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::InvalidData(e.to_string())
}

fn proposal_from_row(row: &PgRow) -> StorageResult<Proposal> {
    let theme: String = row.try_get("theme").map_err(query_err)?;
    let status: String = row.try_get("status").map_err(query_err)?;
    let votes_for: i64 = row.try_get("votes_for").map_err(query_err)?;
    let votes_against: i64 = row.try_get("votes_against").map_err(query_err)?;
    let agent_id: String = row.try_get("agent_id").map_err(query_err)?;

    Ok(Proposal {
        id: ProposalId::from_uuid(row.try_get("id").map_err(query_err)?),
        agent_id: AgentId::new(agent_id),
        title: row.try_get("title").map_err(query_err)?,
        text: row.try_get("body").map_err(query_err)?,
        theme: theme.parse().map_err(invalid)?,
        status: status.parse().map_err(invalid)?,
        votes_for: u64::try_from(votes_for).map_err(invalid)?,
        votes_against: u64::try_from(votes_against).map_err(invalid)?,
        created_at: row.try_get("created_at").map_err(query_err)?,
        expires_at: row.try_get("expires_at").map_err(query_err)?,
        ratified_at: row.try_get("ratified_at").map_err(query_err)?,
        updated_at: row.try_get("updated_at").map_err(query_err)?,
    })
}

fn vote_from_row(row: &PgRow) -> StorageResult<Vote> {
    let agent_id: String = row.try_get("agent_id").map_err(query_err)?;
    let choice: String = row.try_get("choice").map_err(query_err)?;

    Ok(Vote {
        id: VoteId::from_uuid(row.try_get("id").map_err(query_err)?),
        agent_id: AgentId::new(agent_id),
        proposal_id: ProposalId::from_uuid(row.try_get("proposal_id").map_err(query_err)?),
        choice: choice.parse().map_err(invalid)?,
        created_at: row.try_get("created_at").map_err(query_err)?,
        updated_at: row.try_get("updated_at").map_err(query_err)?,
    })
}

fn version_from_row(row: &PgRow) -> StorageResult<CharterVersion> {
    let rights: Json<Vec<Right>> = row.try_get("rights").map_err(query_err)?;
    let diff: Option<Json<CharterDiff>> = row.try_get("diff").map_err(query_err)?;
    let proposal_id: Option<Uuid> = row.try_get("proposal_id").map_err(query_err)?;

    Ok(CharterVersion {
        id: CharterVersionId::from_uuid(row.try_get("id").map_err(query_err)?),
        version: row.try_get("version").map_err(query_err)?,
        rights: rights.0,
        diff: diff.map(|d| d.0),
        proposal_id: proposal_id.map(ProposalId::from_uuid),
        is_current: row.try_get("is_current").map_err(query_err)?,
        created_at: row.try_get("created_at").map_err(query_err)?,
    })
}

/// Lock a proposal row for the rest of the transaction and return its status.
async fn lock_proposal_status(
    conn: &mut PgConnection,
    id: &ProposalId,
) -> StorageResult<Option<ProposalStatus>> {
    let row = sqlx::query("SELECT status FROM proposals WHERE id = $1 FOR UPDATE")
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(query_err)?;

    match row {
        Some(row) => {
            let status: String = row.try_get("status").map_err(query_err)?;
            Ok(Some(status.parse().map_err(invalid)?))
        }
        None => Ok(None),
    }
}

async fn adjust_in(
    conn: &mut PgConnection,
    id: &ProposalId,
    delta: TallyDelta,
    at: DateTime<Utc>,
) -> StorageResult<Option<Proposal>> {
    let sql = format!(
        "UPDATE proposals
         SET votes_for = GREATEST(votes_for + $2, 0),
             votes_against = GREATEST(votes_against + $3, 0),
             updated_at = $4
         WHERE id = $1
         RETURNING {PROPOSAL_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(id.as_uuid())
        .bind(delta.votes_for)
        .bind(delta.votes_against)
        .bind(at)
        .fetch_optional(&mut *conn)
        .await
        .map_err(query_err)?;

    row.as_ref().map(proposal_from_row).transpose()
}

async fn transition_in(
    conn: &mut PgConnection,
    id: &ProposalId,
    status: ProposalStatus,
    at: DateTime<Utc>,
) -> StorageResult<Transition> {
    if status.is_terminal() {
        let sql = format!(
            "UPDATE proposals
             SET status = $2::TEXT,
                 ratified_at = CASE WHEN $2::TEXT = 'ratified' THEN $3::TIMESTAMPTZ ELSE ratified_at END,
                 updated_at = $3::TIMESTAMPTZ
             WHERE id = $1 AND status = 'active'
             RETURNING {PROPOSAL_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(status.as_str())
            .bind(at)
            .fetch_optional(&mut *conn)
            .await
            .map_err(query_err)?;

        if let Some(row) = row {
            return Ok(Transition::Applied(proposal_from_row(&row)?));
        }
    }

    let row = sqlx::query("SELECT status FROM proposals WHERE id = $1")
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(query_err)?;

    match row {
        Some(row) => {
            let current: String = row.try_get("status").map_err(query_err)?;
            Ok(Transition::Unchanged(current.parse().map_err(invalid)?))
        }
        None => Ok(Transition::Missing),
    }
}

/// Head-checked append. `None` means the head moved.
async fn append_in(
    conn: &mut PgConnection,
    version: CharterVersion,
    expected_head: Option<CharterVersionId>,
) -> StorageResult<Option<CharterVersion>> {
    sqlx::query("LOCK TABLE charter_versions IN EXCLUSIVE MODE")
        .execute(&mut *conn)
        .await
        .map_err(query_err)?;

    let head: Option<Uuid> =
        sqlx::query("SELECT id FROM charter_versions ORDER BY seq DESC LIMIT 1")
            .fetch_optional(&mut *conn)
            .await
            .map_err(query_err)?
            .map(|row| row.try_get::<Uuid, _>("id"))
            .transpose()
            .map_err(query_err)?;

    if head != expected_head.map(|id| *id.as_uuid()) {
        return Ok(None);
    }

    sqlx::query("UPDATE charter_versions SET is_current = FALSE WHERE is_current")
        .execute(&mut *conn)
        .await
        .map_err(query_err)?;

    let sql = format!(
        "INSERT INTO charter_versions ({VERSION_COLUMNS})
         VALUES ($1, $2, $3, $4, $5, TRUE, $6)
         RETURNING {VERSION_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(version.id.as_uuid())
        .bind(&version.version)
        .bind(Json(&version.rights))
        .bind(version.diff.as_ref().map(Json))
        .bind(version.proposal_id.map(|id| *id.as_uuid()))
        .bind(version.created_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict(
                format!("charter version {} already exists", version.version),
            ),
            other => query_err(other),
        })?;

    version_from_row(&row).map(Some)
}

#[async_trait]
impl ProposalStorage for PostgresStorage {
    async fn insert_proposal(&self, proposal: Proposal) -> StorageResult<()> {
        let sql = format!(
            "INSERT INTO proposals ({PROPOSAL_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        );
        sqlx::query(&sql)
            .bind(proposal.id.as_uuid())
            .bind(proposal.agent_id.as_str())
            .bind(&proposal.title)
            .bind(&proposal.text)
            .bind(proposal.theme.as_str())
            .bind(proposal.status.as_str())
            .bind(i64::try_from(proposal.votes_for).map_err(invalid)?)
            .bind(i64::try_from(proposal.votes_against).map_err(invalid)?)
            .bind(proposal.created_at)
            .bind(proposal.expires_at)
            .bind(proposal.ratified_at)
            .bind(proposal.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    StorageError::Conflict(format!("proposal {} already exists", proposal.id))
                }
                other => query_err(other),
            })?;

        Ok(())
    }

    async fn get_proposal(&self, id: &ProposalId) -> StorageResult<Option<Proposal>> {
        let sql = format!("SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;

        row.as_ref().map(proposal_from_row).transpose()
    }

    async fn list_proposals(
        &self,
        filter: &ProposalFilter,
        page: PageRequest,
    ) -> StorageResult<(Vec<Proposal>, u64)> {
        let status = filter.status.map(|s| s.as_str());
        let theme = filter.theme.map(|t| t.as_str());
        let predicate = "($1::TEXT IS NULL OR status = $1) AND ($2::TEXT IS NULL OR theme = $2)";

        let total: i64 = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM proposals WHERE {predicate}"
        ))
        .bind(status)
        .bind(theme)
        .fetch_one(&self.pool)
        .await
        .map_err(query_err)?
        .try_get("total")
        .map_err(query_err)?;

        let sql = format!(
            "SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE {predicate}
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query(&sql)
            .bind(status)
            .bind(theme)
            .bind(i64::try_from(page.limit()).map_err(invalid)?)
            .bind(i64::try_from(page.offset()).map_err(invalid)?)
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;

        let items = rows
            .iter()
            .map(proposal_from_row)
            .collect::<StorageResult<Vec<_>>>()?;
        Ok((items, u64::try_from(total).map_err(invalid)?))
    }

    async fn adjust_tally(
        &self,
        id: &ProposalId,
        delta: TallyDelta,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<Proposal>> {
        let mut conn = self.connection().await?;
        adjust_in(&mut conn, id, delta, at).await
    }

    async fn overwrite_tally(
        &self,
        id: &ProposalId,
        tally: VoteTally,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<Proposal>> {
        let sql = format!(
            "UPDATE proposals SET votes_for = $2, votes_against = $3, updated_at = $4
             WHERE id = $1
             RETURNING {PROPOSAL_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(i64::try_from(tally.votes_for).map_err(invalid)?)
            .bind(i64::try_from(tally.votes_against).map_err(invalid)?)
            .bind(at)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;

        row.as_ref().map(proposal_from_row).transpose()
    }

    async fn transition_status(
        &self,
        id: &ProposalId,
        status: ProposalStatus,
        at: DateTime<Utc>,
    ) -> StorageResult<Transition> {
        let mut conn = self.connection().await?;
        transition_in(&mut conn, id, status, at).await
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> StorageResult<Vec<Proposal>> {
        let sql = format!(
            "SELECT {PROPOSAL_COLUMNS} FROM proposals
             WHERE status = 'active' AND expires_at < $1
             ORDER BY expires_at"
        );
        let rows = sqlx::query(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;

        rows.iter().map(proposal_from_row).collect()
    }
}

#[async_trait]
impl VoteStorage for PostgresStorage {
    async fn get_vote(
        &self,
        agent_id: &AgentId,
        proposal_id: &ProposalId,
    ) -> StorageResult<Option<Vote>> {
        let sql = format!("SELECT {VOTE_COLUMNS} FROM votes WHERE agent_id = $1 AND proposal_id = $2");
        let row = sqlx::query(&sql)
            .bind(agent_id.as_str())
            .bind(proposal_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;

        row.as_ref().map(vote_from_row).transpose()
    }

    async fn insert_vote(&self, vote: Vote) -> StorageResult<()> {
        let sql = format!(
            "INSERT INTO votes ({VOTE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (agent_id, proposal_id) DO NOTHING"
        );
        let result = sqlx::query(&sql)
            .bind(vote.id.as_uuid())
            .bind(vote.agent_id.as_str())
            .bind(vote.proposal_id.as_uuid())
            .bind(vote.choice.as_str())
            .bind(vote.created_at)
            .bind(vote.updated_at)
            .execute(&self.pool)
            .await
            .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict(format!(
                "agent {} already voted on {}",
                vote.agent_id, vote.proposal_id
            )));
        }
        Ok(())
    }

    async fn update_vote_choice(
        &self,
        id: &VoteId,
        choice: VoteChoice,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<Vote>> {
        let sql = format!(
            "UPDATE votes SET choice = $2, updated_at = $3 WHERE id = $1 RETURNING {VOTE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(choice.as_str())
            .bind(at)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;

        row.as_ref().map(vote_from_row).transpose()
    }

    async fn count_votes(&self, proposal_id: &ProposalId) -> StorageResult<VoteTally> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) FILTER (WHERE choice = 'for') AS votes_for,
                COUNT(*) FILTER (WHERE choice = 'against') AS votes_against
             FROM votes WHERE proposal_id = $1",
        )
        .bind(proposal_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(query_err)?;

        let votes_for: i64 = row.try_get("votes_for").map_err(query_err)?;
        let votes_against: i64 = row.try_get("votes_against").map_err(query_err)?;
        Ok(VoteTally {
            votes_for: u64::try_from(votes_for).map_err(invalid)?,
            votes_against: u64::try_from(votes_against).map_err(invalid)?,
        })
    }

    async fn record_vote(&self, vote: Vote) -> StorageResult<VoteWrite> {
        let mut tx = self.pool.begin().await.map_err(query_err)?;

        match lock_proposal_status(&mut tx, &vote.proposal_id).await? {
            None => return Ok(VoteWrite::MissingProposal),
            Some(status) if status != ProposalStatus::Active => {
                return Ok(VoteWrite::Closed(status))
            }
            Some(_) => {}
        }

        let sql = format!("SELECT {VOTE_COLUMNS} FROM votes WHERE agent_id = $1 AND proposal_id = $2");
        let existing = sqlx::query(&sql)
            .bind(vote.agent_id.as_str())
            .bind(vote.proposal_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_err)?;
        if let Some(row) = existing {
            return Ok(VoteWrite::Duplicate(vote_from_row(&row)?));
        }

        let sql = format!("INSERT INTO votes ({VOTE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)");
        sqlx::query(&sql)
            .bind(vote.id.as_uuid())
            .bind(vote.agent_id.as_str())
            .bind(vote.proposal_id.as_uuid())
            .bind(vote.choice.as_str())
            .bind(vote.created_at)
            .bind(vote.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        let proposal = adjust_in(
            &mut tx,
            &vote.proposal_id,
            TallyDelta::cast(vote.choice),
            vote.updated_at,
        )
        .await?
        .ok_or_else(|| StorageError::NotFound(format!("proposal {}", vote.proposal_id)))?;

        tx.commit().await.map_err(query_err)?;
        Ok(VoteWrite::Applied { vote, proposal })
    }

    async fn switch_vote(
        &self,
        id: &VoteId,
        choice: VoteChoice,
        at: DateTime<Utc>,
    ) -> StorageResult<VoteWrite> {
        let mut tx = self.pool.begin().await.map_err(query_err)?;

        let sql = format!("SELECT {VOTE_COLUMNS} FROM votes WHERE id = $1 FOR UPDATE");
        let Some(row) = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_err)?
        else {
            return Ok(VoteWrite::MissingVote);
        };
        let mut vote = vote_from_row(&row)?;

        match lock_proposal_status(&mut tx, &vote.proposal_id).await? {
            None => return Ok(VoteWrite::MissingProposal),
            Some(status) if status != ProposalStatus::Active => {
                return Ok(VoteWrite::Closed(status))
            }
            Some(_) => {}
        }

        let delta = TallyDelta::switch(vote.choice, choice);
        sqlx::query("UPDATE votes SET choice = $2, updated_at = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(choice.as_str())
            .bind(at)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        vote.choice = choice;
        vote.updated_at = at;

        let proposal = adjust_in(&mut tx, &vote.proposal_id, delta, at)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("proposal {}", vote.proposal_id)))?;

        tx.commit().await.map_err(query_err)?;
        Ok(VoteWrite::Applied { vote, proposal })
    }
}

#[async_trait]
impl CharterStorage for PostgresStorage {
    async fn latest_version(&self) -> StorageResult<Option<CharterVersion>> {
        let sql = format!("SELECT {VERSION_COLUMNS} FROM charter_versions ORDER BY seq DESC LIMIT 1");
        let row = sqlx::query(&sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;

        row.as_ref().map(version_from_row).transpose()
    }

    async fn current_version(&self) -> StorageResult<Option<CharterVersion>> {
        let sql = format!("SELECT {VERSION_COLUMNS} FROM charter_versions WHERE is_current");
        let row = sqlx::query(&sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;

        row.as_ref().map(version_from_row).transpose()
    }

    async fn get_version(&self, version: &str) -> StorageResult<Option<CharterVersion>> {
        let sql = format!("SELECT {VERSION_COLUMNS} FROM charter_versions WHERE version = $1");
        let row = sqlx::query(&sql)
            .bind(version)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;

        row.as_ref().map(version_from_row).transpose()
    }

    async fn list_versions(&self) -> StorageResult<Vec<CharterVersion>> {
        let sql = format!("SELECT {VERSION_COLUMNS} FROM charter_versions ORDER BY seq DESC");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;

        rows.iter().map(version_from_row).collect()
    }

    async fn append_version(
        &self,
        version: CharterVersion,
        expected_head: Option<CharterVersionId>,
    ) -> StorageResult<AppendOutcome> {
        let mut tx = self.pool.begin().await.map_err(query_err)?;
        match append_in(&mut tx, version, expected_head).await? {
            Some(appended) => {
                tx.commit().await.map_err(query_err)?;
                Ok(AppendOutcome::Appended(appended))
            }
            None => Ok(AppendOutcome::HeadMoved),
        }
    }
}

#[async_trait]
impl GovernanceStorage for PostgresStorage {
    async fn commit_ratification(
        &self,
        proposal_id: &ProposalId,
        ratified_at: DateTime<Utc>,
        version: CharterVersion,
        expected_head: Option<CharterVersionId>,
    ) -> StorageResult<RatifyCommit> {
        let mut tx = self.pool.begin().await.map_err(query_err)?;

        match lock_proposal_status(&mut tx, proposal_id).await? {
            None => return Ok(RatifyCommit::MissingProposal),
            Some(status) if status != ProposalStatus::Active => {
                return Ok(RatifyCommit::NotActive(status))
            }
            Some(_) => {}
        }

        let proposal =
            match transition_in(&mut tx, proposal_id, ProposalStatus::Ratified, ratified_at).await? {
                Transition::Applied(p) => p,
                Transition::Unchanged(status) => return Ok(RatifyCommit::NotActive(status)),
                Transition::Missing => return Ok(RatifyCommit::MissingProposal),
            };

        let Some(version) = append_in(&mut tx, version, expected_head).await? else {
            return Ok(RatifyCommit::HeadMoved);
        };

        tx.commit().await.map_err(query_err)?;
        Ok(RatifyCommit::Committed { proposal, version })
    }
}
