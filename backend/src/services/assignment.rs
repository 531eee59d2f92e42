//! Reviewer Assignment Service
//!
//! Creates pull requests with initial reviewers, replaces reviewers on
//! request, and merges pull requests. Every operation runs inside one
//! [`UnitOfWork`]; reassignment and merge take an exclusive row lock on the
//! pull request first, so concurrent calls on the same pull request are
//! serialized while calls on different pull requests run in parallel.
//!
//! Nothing here retries. Domain errors and storage failures are returned to
//! the caller, who may rerun the whole operation from scratch.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{
    NewPullRequest, PrStatus, PullRequest, PullRequestShort, ReassignResponse, ReviewStat,
    TeamMember,
};
use crate::services::selector::ReviewerSelector;
use crate::services::store::{
    AssignmentBackend, PullRequestStore, ReviewHistoryLedger, TeamMembershipProvider, UnitOfWork,
};

/// Errors that can occur during reviewer assignment
#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error("Pull request not found: {0}")]
    PrNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Pull request already exists: {0}")]
    AlreadyExists(String),

    #[error("Pull request already merged: {0}")]
    AlreadyMerged(String),

    #[error("Reviewer {user_id} is not assigned to pull request {pr_id}")]
    NotAssigned { pr_id: String, user_id: String },

    #[error("No active replacement candidate for pull request {0}")]
    NoCandidate(String),

    #[error("Assignment did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AssignmentError {
    /// Whether the caller may retry the whole operation
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Internal(_) | Self::Database(_)
        )
    }
}

/// Whether a pull request's author may be picked as its reviewer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelfReview {
    /// Never pick the author
    Never,
    /// Skip the author for the initial reviewers, allow them as a replacement
    #[default]
    AsReplacement,
    /// Treat the author like any other member
    Always,
}

impl std::str::FromStr for SelfReview {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "never" => Ok(Self::Never),
            "replacement" | "as_replacement" => Ok(Self::AsReplacement),
            "always" => Ok(Self::Always),
            other => Err(format!("unknown self-review mode: {other}")),
        }
    }
}

/// Knobs that shape candidate eligibility and transaction bounds
#[derive(Debug, Clone)]
pub struct AssignmentPolicy {
    pub self_review: SelfReview,
    /// Upper bound for one operation, lock waits included
    pub deadline: Option<Duration>,
}

impl Default for AssignmentPolicy {
    fn default() -> Self {
        Self {
            self_review: SelfReview::default(),
            deadline: Some(Duration::from_secs(5)),
        }
    }
}

/// Service orchestrating reviewer selection, storage, and the review ledger
#[derive(Debug)]
pub struct AssignmentService<B, T> {
    backend: B,
    /// Team and user management, served next to the engine
    directory: T,
    selector: ReviewerSelector,
    policy: AssignmentPolicy,
}

impl<B, T> AssignmentService<B, T>
where
    B: AssignmentBackend,
{
    pub fn new(backend: B, directory: T, selector: ReviewerSelector, policy: AssignmentPolicy) -> Self {
        Self {
            backend,
            directory,
            selector,
            policy,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn directory(&self) -> &T {
        &self.directory
    }

    pub fn policy(&self) -> &AssignmentPolicy {
        &self.policy
    }

    /// Create a pull request and assign up to two reviewers from the author's team
    pub async fn create(&self, request: NewPullRequest) -> Result<PullRequest, AssignmentError> {
        self.bounded("pr_create", self.create_in_tx(request)).await
    }

    /// Replace `outgoing` on the pull request with another active team member
    pub async fn reassign(
        &self,
        pr_id: &str,
        outgoing: &str,
    ) -> Result<ReassignResponse, AssignmentError> {
        self.bounded("pr_reassign", self.reassign_in_tx(pr_id, outgoing))
            .await
    }

    /// Mark the pull request merged; repeated calls return the stored state
    pub async fn merge(&self, pr_id: &str) -> Result<PullRequest, AssignmentError> {
        self.bounded("pr_merge", self.merge_in_tx(pr_id)).await
    }

    /// Get a pull request by ID
    pub async fn get(&self, pr_id: &str) -> Result<PullRequest, AssignmentError> {
        self.backend
            .get(pr_id)
            .await?
            .ok_or_else(|| AssignmentError::PrNotFound(pr_id.to_string()))
    }

    /// Pull requests currently waiting on this reviewer
    pub async fn reviews_for(&self, user_id: &str) -> Result<Vec<PullRequestShort>, AssignmentError> {
        self.backend.reviews_for(user_id).await
    }

    /// Total assignments the user has received
    pub async fn review_stat(&self, user_id: &str) -> Result<ReviewStat, AssignmentError> {
        let review_count = self
            .backend
            .review_count(user_id)
            .await?
            .ok_or_else(|| AssignmentError::UserNotFound(user_id.to_string()))?;

        Ok(ReviewStat {
            user_id: user_id.to_string(),
            review_count,
        })
    }

    async fn create_in_tx(&self, request: NewPullRequest) -> Result<PullRequest, AssignmentError> {
        let mut work = self.backend.begin().await?;

        if work.exists(&request.pr_id).await? {
            return Err(AssignmentError::AlreadyExists(request.pr_id));
        }

        let team_id = work
            .team_of(&request.author_id)
            .await?
            .ok_or_else(|| AssignmentError::UserNotFound(request.author_id.clone()))?;
        let members = work.members_of(team_id).await?;

        let author_allowed = self.policy.self_review == SelfReview::Always;
        let candidates = eligible(&members, &request.author_id, author_allowed, &[]);
        let reviewers = self.selector.initial(&candidates);

        let created_at = work.insert(&request, &reviewers).await?;
        work.increment_each(&reviewers).await?;
        work.commit().await?;

        info!(
            pr_id = %request.pr_id,
            author_id = %request.author_id,
            team_id,
            reviewers = ?reviewers,
            "Pull request created"
        );

        Ok(PullRequest {
            pr_id: request.pr_id,
            name: request.name,
            author_id: request.author_id,
            status: PrStatus::Open,
            assigned_reviewers: reviewers,
            created_at,
            merged_at: None,
        })
    }

    async fn reassign_in_tx(
        &self,
        pr_id: &str,
        outgoing: &str,
    ) -> Result<ReassignResponse, AssignmentError> {
        let mut work = self.backend.begin().await?;

        // Held until commit or drop; later checks see the latest committed state
        let mut pr = work
            .lock(pr_id)
            .await?
            .ok_or_else(|| AssignmentError::PrNotFound(pr_id.to_string()))?;

        if pr.is_merged() {
            debug!(pr_id, outgoing, "Reassignment rejected: pull request merged");
            return Err(AssignmentError::AlreadyMerged(pr_id.to_string()));
        }

        if !pr.has_reviewer(outgoing) {
            debug!(pr_id, outgoing, "Reassignment rejected: reviewer not assigned");
            return Err(AssignmentError::NotAssigned {
                pr_id: pr_id.to_string(),
                user_id: outgoing.to_string(),
            });
        }

        let team_id = work
            .team_of(outgoing)
            .await?
            .ok_or_else(|| AssignmentError::UserNotFound(outgoing.to_string()))?;
        let members = work.members_of(team_id).await?;

        let author_allowed = self.policy.self_review != SelfReview::Never;
        let candidates = eligible(&members, &pr.author_id, author_allowed, &pr.assigned_reviewers);
        let incoming = self
            .selector
            .replacement(&candidates)
            .ok_or_else(|| AssignmentError::NoCandidate(pr_id.to_string()))?;

        work.replace_reviewer(pr_id, outgoing, &incoming).await?;
        let review_count = work.increment_or_init(&incoming).await?;
        work.commit().await?;

        info!(
            pr_id,
            outgoing,
            incoming = %incoming,
            review_count,
            "Reviewer reassigned"
        );

        for reviewer in pr.assigned_reviewers.iter_mut() {
            if *reviewer == outgoing {
                *reviewer = incoming.clone();
            }
        }

        Ok(ReassignResponse {
            pr,
            replaced_by: incoming,
        })
    }

    async fn merge_in_tx(&self, pr_id: &str) -> Result<PullRequest, AssignmentError> {
        let mut work = self.backend.begin().await?;

        let mut pr = work
            .lock(pr_id)
            .await?
            .ok_or_else(|| AssignmentError::PrNotFound(pr_id.to_string()))?;

        if pr.is_merged() {
            debug!(pr_id, "Pull request already merged");
            return Ok(pr);
        }

        let merged_at = work.mark_merged(pr_id).await?;
        work.commit().await?;

        info!(pr_id, "Pull request merged");

        pr.status = PrStatus::Merged;
        pr.merged_at = Some(merged_at);
        Ok(pr)
    }

    async fn bounded<F, R>(&self, action: &'static str, operation: F) -> Result<R, AssignmentError>
    where
        F: Future<Output = Result<R, AssignmentError>>,
    {
        let Some(limit) = self.policy.deadline else {
            return operation.await;
        };

        match tokio::time::timeout(limit, operation).await {
            Ok(result) => result,
            Err(_) => {
                // The unit of work was dropped with the future and rolled back
                warn!(action, ?limit, "Assignment deadline expired");
                Err(AssignmentError::Timeout(limit))
            }
        }
    }
}

/// Active members who may take a review slot on a pull request, in pool order
fn eligible(
    members: &[TeamMember],
    author_id: &str,
    author_allowed: bool,
    assigned: &[String],
) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::with_capacity(members.len());
    for member in members {
        if !member.is_active {
            continue;
        }
        if !author_allowed && member.user_id == author_id {
            continue;
        }
        if assigned.contains(&member.user_id) || candidates.contains(&member.user_id) {
            continue;
        }
        candidates.push(member.user_id.clone());
    }
    candidates
}
