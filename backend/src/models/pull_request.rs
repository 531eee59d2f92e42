//! Pull Request model and related types
//!
//! Data structures for PR creation, reviewer reassignment, and merging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pull request status
///
/// `Merged` is terminal: no reviewer mutation is accepted afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "pr_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PrStatus {
    #[default]
    Open,
    Merged,
}

/// Pull request entity together with its current reviewer set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    #[serde(rename = "pull_request_id")]
    pub pr_id: String,
    #[serde(rename = "pull_request_name")]
    pub name: String,
    pub author_id: String,
    pub status: PrStatus,
    pub assigned_reviewers: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.status == PrStatus::Merged
    }

    pub fn has_reviewer(&self, user_id: &str) -> bool {
        self.assigned_reviewers.iter().any(|r| r == user_id)
    }
}

/// Condensed PR view used when listing a reviewer's queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PullRequestShort {
    #[serde(rename = "pull_request_id")]
    pub pr_id: String,
    #[serde(rename = "pull_request_name")]
    pub name: String,
    pub author_id: String,
    pub status: PrStatus,
}

impl From<&PullRequest> for PullRequestShort {
    fn from(pr: &PullRequest) -> Self {
        Self {
            pr_id: pr.pr_id.clone(),
            name: pr.name.clone(),
            author_id: pr.author_id.clone(),
            status: pr.status,
        }
    }
}

/// Values written when a pull request is first stored
#[derive(Debug, Clone)]
pub struct NewPullRequest {
    pub pr_id: String,
    pub name: String,
    pub author_id: String,
}

/// Request payload for PR creation
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePrRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

/// Request payload for merge
#[derive(Debug, Clone, Deserialize)]
pub struct MergePrRequest {
    pub pull_request_id: String,
}

/// Request payload for reviewer reassignment
#[derive(Debug, Clone, Deserialize)]
pub struct ReassignRequest {
    pub pull_request_id: String,
    pub old_user_id: String,
}

/// Query parameters for PR lookup
#[derive(Debug, Clone, Deserialize)]
pub struct PrQuery {
    pub pull_request_id: String,
}

/// Outcome of a successful reassignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignResponse {
    pub pr: PullRequest,
    pub replaced_by: String,
}
