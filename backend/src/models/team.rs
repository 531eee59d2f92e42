//! Team and user directory types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::PullRequestShort;

/// Database identifier of a team
pub type TeamId = i64;

/// A team member as seen by reviewer selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TeamMember {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

impl TeamMember {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, is_active: bool) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            is_active,
        }
    }
}

/// Team with its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub team_name: String,
    pub members: Vec<TeamMember>,
}

/// User entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub team_name: String,
    pub is_active: bool,
}

/// Request payload for team creation
#[derive(Debug, Clone, Deserialize)]
pub struct AddTeamRequest {
    pub team_name: String,
    #[serde(default)]
    pub members: Vec<TeamMember>,
}

/// Query parameters for team lookup
#[derive(Debug, Clone, Deserialize)]
pub struct TeamQuery {
    pub team_name: String,
}

/// Request payload for team deactivation
#[derive(Debug, Clone, Deserialize)]
pub struct DeactivateTeamRequest {
    pub team_name: String,
}

/// Request payload for toggling a user's activity flag
#[derive(Debug, Clone, Deserialize)]
pub struct SetUserActiveRequest {
    pub user_id: String,
    pub is_active: bool,
}

/// Query parameters for per-user endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

/// Pull requests currently waiting on a reviewer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReviews {
    pub user_id: String,
    pub pull_requests: Vec<PullRequestShort>,
}

/// Total review assignments a user has received
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStat {
    pub user_id: String,
    pub review_count: i64,
}
