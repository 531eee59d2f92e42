//! Postgres Pull Request Store
//!
//! Persists pull requests and their reviewer links. Reassignment and merge
//! serialize on `SELECT ... FOR UPDATE` of the pull request row; reviewer
//! links and ledger rows are only written while that lock is held or while
//! the pull request is being inserted.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};

use crate::models::{NewPullRequest, PrStatus, PullRequest, PullRequestShort};
use crate::services::assignment::AssignmentError;
use crate::services::review_history;
use crate::services::store::{AssignmentBackend, PullRequestStore, UnitOfWork};

/// SQLSTATE raised when `lock_timeout` expires
const LOCK_NOT_AVAILABLE: &str = "55P03";

#[derive(Debug, FromRow)]
struct PullRequestRow {
    pr_id: String,
    pr_name: String,
    author_id: String,
    status: PrStatus,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
}

impl PullRequestRow {
    fn with_reviewers(self, assigned_reviewers: Vec<String>) -> PullRequest {
        PullRequest {
            pr_id: self.pr_id,
            name: self.pr_name,
            author_id: self.author_id,
            status: self.status,
            assigned_reviewers,
            created_at: self.created_at,
            merged_at: self.merged_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct PullRequestSnapshotRow {
    #[sqlx(flatten)]
    pr: PullRequestRow,
    reviewers: Vec<String>,
}

/// Postgres-backed [`AssignmentBackend`]
#[derive(Debug, Clone)]
pub struct PgAssignmentBackend {
    pool: PgPool,
    lock_timeout: Option<Duration>,
}

impl PgAssignmentBackend {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: None,
        }
    }

    /// Bound every row-lock wait with Postgres' `lock_timeout`
    pub fn with_lock_timeout(mut self, lock_timeout: Option<Duration>) -> Self {
        self.lock_timeout = lock_timeout.filter(|d| !d.is_zero());
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AssignmentBackend for PgAssignmentBackend {
    type Work = PgUnitOfWork;

    async fn begin(&self) -> Result<Self::Work, AssignmentError> {
        let mut tx = self.pool.begin().await?;

        if let Some(limit) = self.lock_timeout {
            // SET LOCAL does not take bind parameters
            let statement = format!("SET LOCAL lock_timeout = '{}ms'", limit.as_millis());
            sqlx::query(&statement).execute(&mut *tx).await?;
        }

        Ok(PgUnitOfWork {
            tx,
            lock_timeout: self.lock_timeout,
        })
    }

    async fn get(&self, pr_id: &str) -> Result<Option<PullRequest>, AssignmentError> {
        let row = sqlx::query_as::<_, PullRequestSnapshotRow>(
            r#"
            SELECT p.pr_id, p.pr_name, p.author_id, p.status, p.created_at, p.merged_at,
                   COALESCE(
                       array_agg(r.reviewer_id ORDER BY r.slot) FILTER (WHERE r.reviewer_id IS NOT NULL),
                       '{}'::text[]
                   ) AS reviewers
            FROM pull_requests p
            LEFT JOIN pr_reviewers r ON r.pr_id = p.pr_id
            WHERE p.pr_id = $1
            GROUP BY p.pr_id
            "#,
        )
        .bind(pr_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.pr.with_reviewers(r.reviewers)))
    }

    async fn reviews_for(&self, user_id: &str) -> Result<Vec<PullRequestShort>, AssignmentError> {
        let rows = sqlx::query_as::<_, PullRequestShort>(
            r#"
            SELECT p.pr_id, p.pr_name AS name, p.author_id, p.status
            FROM pr_reviewers r
            JOIN pull_requests p ON p.pr_id = r.pr_id
            WHERE r.reviewer_id = $1
            ORDER BY p.created_at, p.pr_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn review_count(&self, user_id: &str) -> Result<Option<i64>, AssignmentError> {
        Ok(review_history::review_count(&self.pool, user_id).await?)
    }
}

/// One Postgres transaction; rolled back by sqlx if dropped uncommitted
#[derive(Debug)]
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
    lock_timeout: Option<Duration>,
}

impl PgUnitOfWork {
    pub(crate) fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    fn classify(&self, err: sqlx::Error) -> AssignmentError {
        if let (sqlx::Error::Database(db), Some(limit)) = (&err, self.lock_timeout) {
            if db.code().as_deref() == Some(LOCK_NOT_AVAILABLE) {
                return AssignmentError::Timeout(limit);
            }
        }
        AssignmentError::Database(err)
    }
}

#[async_trait]
impl PullRequestStore for PgUnitOfWork {
    async fn exists(&mut self, pr_id: &str) -> Result<bool, AssignmentError> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT pr_id FROM pull_requests WHERE pr_id = $1")
                .bind(pr_id)
                .fetch_optional(self.conn())
                .await?;

        Ok(found.is_some())
    }

    async fn insert(
        &mut self,
        pr: &NewPullRequest,
        reviewers: &[String],
    ) -> Result<DateTime<Utc>, AssignmentError> {
        let inserted = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            INSERT INTO pull_requests (pr_id, pr_name, author_id, status, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING created_at
            "#,
        )
        .bind(&pr.pr_id)
        .bind(&pr.name)
        .bind(&pr.author_id)
        .bind(PrStatus::Open)
        .fetch_one(self.conn())
        .await;

        // A concurrent create with the same ID surfaces here, after the pre-check
        let created_at = match inserted {
            Ok(created_at) => created_at,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(AssignmentError::AlreadyExists(pr.pr_id.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        for (slot, reviewer) in reviewers.iter().enumerate() {
            sqlx::query("INSERT INTO pr_reviewers (pr_id, reviewer_id, slot) VALUES ($1, $2, $3)")
                .bind(&pr.pr_id)
                .bind(reviewer)
                .bind(slot as i16)
                .execute(self.conn())
                .await?;
        }

        Ok(created_at)
    }

    async fn lock(&mut self, pr_id: &str) -> Result<Option<PullRequest>, AssignmentError> {
        let row = sqlx::query_as::<_, PullRequestRow>(
            r#"
            SELECT pr_id, pr_name, author_id, status, created_at, merged_at
            FROM pull_requests
            WHERE pr_id = $1
            FOR UPDATE
            "#,
        )
        .bind(pr_id)
        .fetch_optional(self.conn())
        .await
        .map_err(|e| self.classify(e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let reviewers: Vec<String> = sqlx::query_scalar(
            "SELECT reviewer_id FROM pr_reviewers WHERE pr_id = $1 ORDER BY slot",
        )
        .bind(pr_id)
        .fetch_all(self.conn())
        .await?;

        Ok(Some(row.with_reviewers(reviewers)))
    }

    async fn replace_reviewer(
        &mut self,
        pr_id: &str,
        outgoing: &str,
        incoming: &str,
    ) -> Result<(), AssignmentError> {
        let result = sqlx::query(
            "UPDATE pr_reviewers SET reviewer_id = $3 WHERE pr_id = $1 AND reviewer_id = $2",
        )
        .bind(pr_id)
        .bind(outgoing)
        .bind(incoming)
        .execute(self.conn())
        .await?;

        if result.rows_affected() != 1 {
            return Err(AssignmentError::Internal(format!(
                "expected one reviewer link {outgoing} on {pr_id}, updated {}",
                result.rows_affected()
            )));
        }

        Ok(())
    }

    async fn mark_merged(&mut self, pr_id: &str) -> Result<DateTime<Utc>, AssignmentError> {
        let merged_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            UPDATE pull_requests
            SET status = $2, merged_at = NOW()
            WHERE pr_id = $1
            RETURNING merged_at
            "#,
        )
        .bind(pr_id)
        .bind(PrStatus::Merged)
        .fetch_optional(self.conn())
        .await?;

        merged_at.ok_or_else(|| AssignmentError::PrNotFound(pr_id.to_string()))
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self) -> Result<(), AssignmentError> {
        self.tx.commit().await?;
        Ok(())
    }
}

// ============================================================================
// Integration tests (require DATABASE_URL)
// Run with: cargo test -- --ignored
// ============================================================================
