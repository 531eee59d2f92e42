//! Storage seams for reviewer assignment
//!
//! The assignment engine talks to storage only through these traits, so it can
//! run against Postgres in production and against in-memory fakes in tests.
//!
//! A [`UnitOfWork`] owns one transaction. Every mutation goes through it, and
//! it only becomes visible on [`UnitOfWork::commit`]. Dropping a unit of work
//! without committing rolls it back and releases any row locks it holds; this
//! also covers cancellation, where the owning future is dropped mid-flight.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{NewPullRequest, PullRequest, PullRequestShort, TeamId, TeamMember};
use crate::services::assignment::AssignmentError;

/// Resolves users to teams and teams to members, scoped to one transaction
///
/// Reads run on the unit of work's own connection, so an operation never
/// needs a second pooled connection while it holds a row lock. They are not
/// locked: a member's activity flag may be a slightly stale committed snapshot.
#[async_trait]
pub trait TeamMembershipProvider: Send {
    /// Team the user belongs to, or `None` for an unknown user
    async fn team_of(&mut self, user_id: &str) -> Result<Option<TeamId>, AssignmentError>;

    /// All members of a team, active or not
    async fn members_of(&mut self, team_id: TeamId) -> Result<Vec<TeamMember>, AssignmentError>;
}

/// Pull request rows and their reviewer links, scoped to one transaction
#[async_trait]
pub trait PullRequestStore: Send {
    async fn exists(&mut self, pr_id: &str) -> Result<bool, AssignmentError>;

    /// Insert an OPEN pull request with its reviewer links.
    ///
    /// Fails with `AlreadyExists` when the ID is taken, including by a
    /// concurrent transaction. Returns the stored creation time.
    async fn insert(
        &mut self,
        pr: &NewPullRequest,
        reviewers: &[String],
    ) -> Result<DateTime<Utc>, AssignmentError>;

    /// Load a pull request and hold an exclusive row lock on it until the
    /// unit of work ends. Blocks while another unit of work holds the lock.
    async fn lock(&mut self, pr_id: &str) -> Result<Option<PullRequest>, AssignmentError>;

    /// Swap one reviewer link for another on the same slot
    async fn replace_reviewer(
        &mut self,
        pr_id: &str,
        outgoing: &str,
        incoming: &str,
    ) -> Result<(), AssignmentError>;

    /// Transition to MERGED and return the recorded merge time
    async fn mark_merged(&mut self, pr_id: &str) -> Result<DateTime<Utc>, AssignmentError>;
}

/// Per-user review counter, scoped to one transaction
#[async_trait]
pub trait ReviewHistoryLedger: Send {
    /// Create the entry at 1 or add 1 to it, as a single conflict-safe upsert.
    /// Returns the new count.
    async fn increment_or_init(&mut self, user_id: &str) -> Result<i64, AssignmentError>;

    /// Increment several users in user-ID order.
    ///
    /// Every caller locks ledger rows in the same order, so two transactions
    /// sharing reviewers cannot deadlock on them.
    async fn increment_each(&mut self, user_ids: &[String]) -> Result<(), AssignmentError> {
        let mut ordered: Vec<&str> = user_ids.iter().map(String::as_str).collect();
        ordered.sort_unstable();
        for user_id in ordered {
            self.increment_or_init(user_id).await?;
        }
        Ok(())
    }
}

/// One atomic unit of work over the store and the ledger
#[async_trait]
pub trait UnitOfWork: PullRequestStore + ReviewHistoryLedger + TeamMembershipProvider + Sized {
    async fn commit(self) -> Result<(), AssignmentError>;
}

/// Entry point to a storage backend
#[async_trait]
pub trait AssignmentBackend: Send + Sync {
    type Work: UnitOfWork;

    async fn begin(&self) -> Result<Self::Work, AssignmentError>;

    /// Committed snapshot of a pull request, without locking
    async fn get(&self, pr_id: &str) -> Result<Option<PullRequest>, AssignmentError>;

    /// Pull requests on which the user is currently a reviewer
    async fn reviews_for(&self, user_id: &str) -> Result<Vec<PullRequestShort>, AssignmentError>;

    /// Ledger value for a user, `None` if they were never assigned
    async fn review_count(&self, user_id: &str) -> Result<Option<i64>, AssignmentError>;
}
