//! Team Directory Service
//!
//! Manages teams and users: team creation with member upsert, lookups, and
//! the `is_active` flag that decides reviewer eligibility. The assignment
//! engine's membership queries run here too, on its own transaction.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool};
use thiserror::Error;
use tracing::info;

use crate::models::{AddTeamRequest, Team, TeamId, TeamMember, User};
use crate::services::assignment::AssignmentError;
use crate::services::pull_request_store::PgUnitOfWork;
use crate::services::store::TeamMembershipProvider;

/// Maximum length for team names and user IDs
const MAX_NAME_LENGTH: usize = 255;

/// Errors that can occur during directory operations
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Team already exists: {0}")]
    TeamExists(String),

    #[error("Team not found: {0}")]
    TeamNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Team and user management
#[async_trait]
pub trait TeamDirectory: Send + Sync {
    /// Create a team and upsert its members.
    ///
    /// Members that already exist elsewhere are moved into the new team and
    /// take the username and activity flag from the request.
    async fn add_team(&self, request: AddTeamRequest) -> Result<Team, DirectoryError>;

    async fn get_team(&self, team_name: &str) -> Result<Team, DirectoryError>;

    /// Mark every member of the team inactive
    async fn deactivate_team(&self, team_name: &str) -> Result<Team, DirectoryError>;

    async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User, DirectoryError>;
}

/// Postgres-backed team and user directory
#[derive(Debug, Clone)]
pub struct TeamDirectoryService {
    pool: PgPool,
}

impl TeamDirectoryService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn team_id(&self, team_name: &str) -> Result<TeamId, DirectoryError> {
        sqlx::query_scalar::<_, TeamId>("SELECT id FROM teams WHERE team_name = $1")
            .bind(team_name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DirectoryError::TeamNotFound(team_name.to_string()))
    }
}

async fn team_of_user<'e>(
    executor: impl PgExecutor<'e>,
    user_id: &str,
) -> Result<Option<TeamId>, sqlx::Error> {
    sqlx::query_scalar::<_, TeamId>("SELECT team_id FROM users WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await
}

async fn load_members<'e>(
    executor: impl PgExecutor<'e>,
    team_id: TeamId,
) -> Result<Vec<TeamMember>, sqlx::Error> {
    sqlx::query_as::<_, TeamMember>(
        "SELECT user_id, username, is_active FROM users WHERE team_id = $1 ORDER BY user_id",
    )
    .bind(team_id)
    .fetch_all(executor)
    .await
}

#[async_trait]
impl TeamDirectory for TeamDirectoryService {
    async fn add_team(&self, request: AddTeamRequest) -> Result<Team, DirectoryError> {
        validate_add_team(&request)?;

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_scalar::<_, TeamId>(
            "INSERT INTO teams (team_name, created_at) VALUES ($1, NOW()) RETURNING id",
        )
        .bind(&request.team_name)
        .fetch_one(&mut *tx)
        .await;

        let team_id = match inserted {
            Ok(id) => id,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(DirectoryError::TeamExists(request.team_name));
            }
            Err(e) => return Err(e.into()),
        };

        for member in &request.members {
            sqlx::query(
                r#"
                INSERT INTO users (user_id, username, team_id, is_active)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (user_id) DO UPDATE
                SET username = EXCLUDED.username,
                    team_id = EXCLUDED.team_id,
                    is_active = EXCLUDED.is_active
                "#,
            )
            .bind(&member.user_id)
            .bind(&member.username)
            .bind(team_id)
            .bind(member.is_active)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            team_name = %request.team_name,
            team_id,
            members = request.members.len(),
            "Team created"
        );

        let mut members = request.members;
        members.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(Team {
            team_name: request.team_name,
            members,
        })
    }

    async fn get_team(&self, team_name: &str) -> Result<Team, DirectoryError> {
        let team_id = self.team_id(team_name).await?;
        let members = load_members(&self.pool, team_id).await?;

        Ok(Team {
            team_name: team_name.to_string(),
            members,
        })
    }

    async fn deactivate_team(&self, team_name: &str) -> Result<Team, DirectoryError> {
        let team_id = self.team_id(team_name).await?;

        let result = sqlx::query("UPDATE users SET is_active = FALSE WHERE team_id = $1")
            .bind(team_id)
            .execute(&self.pool)
            .await?;

        info!(
            team_name,
            deactivated = result.rows_affected(),
            "Team deactivated"
        );

        let members = load_members(&self.pool, team_id).await?;
        Ok(Team {
            team_name: team_name.to_string(),
            members,
        })
    }

    async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User, DirectoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users u
            SET is_active = $2
            FROM teams t
            WHERE u.user_id = $1 AND t.id = u.team_id
            RETURNING u.user_id, u.username, t.team_name, u.is_active
            "#,
        )
        .bind(user_id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DirectoryError::UserNotFound(user_id.to_string()))?;

        info!(user_id, is_active, "User activity updated");
        Ok(user)
    }
}

#[async_trait]
impl TeamMembershipProvider for PgUnitOfWork {
    async fn team_of(&mut self, user_id: &str) -> Result<Option<TeamId>, AssignmentError> {
        Ok(team_of_user(self.conn(), user_id).await?)
    }

    async fn members_of(&mut self, team_id: TeamId) -> Result<Vec<TeamMember>, AssignmentError> {
        Ok(load_members(self.conn(), team_id).await?)
    }
}

pub(crate) fn validate_add_team(request: &AddTeamRequest) -> Result<(), DirectoryError> {
    validate_name("team_name", &request.team_name)?;

    let mut seen = HashSet::new();
    for member in &request.members {
        validate_name("user_id", &member.user_id)?;
        if !seen.insert(member.user_id.as_str()) {
            return Err(DirectoryError::Validation(format!(
                "duplicate member: {}",
                member.user_id
            )));
        }
    }

    Ok(())
}

fn validate_name(field: &str, value: &str) -> Result<(), DirectoryError> {
    if value.trim().is_empty() {
        return Err(DirectoryError::Validation(format!("{field} must not be empty")));
    }
    if value.len() > MAX_NAME_LENGTH {
        return Err(DirectoryError::Validation(format!(
            "{field} exceeds {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(team_name: &str, ids: &[&str]) -> AddTeamRequest {
        AddTeamRequest {
            team_name: team_name.to_string(),
            members: ids.iter().map(|id| TeamMember::new(*id, *id, true)).collect(),
        }
    }

    #[test]
    fn test_validate_accepts_plain_team() {
        assert!(validate_add_team(&request("backend", &["u1", "u2"])).is_ok());
    }

    #[test]
    fn test_validate_accepts_team_without_members() {
        assert!(validate_add_team(&request("empty", &[])).is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_team_name() {
        let err = validate_add_team(&request("  ", &["u1"])).unwrap_err();
        assert!(matches!(err, DirectoryError::Validation(_)));
    }

    #[test]
    fn test_validate_rejects_blank_user_id() {
        let err = validate_add_team(&request("backend", &["u1", ""])).unwrap_err();
        assert!(matches!(err, DirectoryError::Validation(_)));
    }

    #[test]
    fn test_validate_rejects_duplicate_member() {
        let err = validate_add_team(&request("backend", &["u1", "u1"])).unwrap_err();
        assert!(err.to_string().contains("duplicate member: u1"));
    }

    #[test]
    fn test_validate_rejects_long_team_name() {
        let name = "t".repeat(MAX_NAME_LENGTH + 1);
        let err = validate_add_team(&request(&name, &[])).unwrap_err();
        assert!(matches!(err, DirectoryError::Validation(_)));
    }
}

// ============================================================================
// Integration tests (require DATABASE_URL)
// ============================================================================
