pub mod pulls;
pub mod teams;
pub mod users;

#[cfg(test)]
mod pulls_http_tests;

use actix_web::web;
use serde::Serialize;

use crate::error::AppError;
use crate::services::{AssignmentBackend, AssignmentError, DirectoryError, TeamDirectory};

pub use pulls::configure_pull_routes;
pub use teams::configure_team_routes;
pub use users::configure_user_routes;

/// Standard API response wrapper
#[derive(Serialize)]
pub(crate) struct ApiResponse<T: Serialize> {
    data: T,
    meta: ResponseMeta,
}

#[derive(Serialize)]
struct ResponseMeta {
    request_id: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub(crate) fn new(data: T) -> Self {
        Self {
            data,
            meta: ResponseMeta {
                request_id: uuid::Uuid::new_v4().to_string(),
            },
        }
    }
}

/// Register every route against one assignment service
pub fn configure_routes<B, D>(cfg: &mut web::ServiceConfig)
where
    B: AssignmentBackend + 'static,
    D: TeamDirectory + 'static,
{
    cfg.app_data(json_config())
        .app_data(query_config())
        .configure(configure_team_routes::<B, D>)
        .configure(configure_user_routes::<B, D>)
        .configure(configure_pull_routes::<B, D>);
}

/// Malformed JSON bodies render through the standard error envelope
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| AppError::Validation(err.to_string()).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| AppError::Validation(err.to_string()).into())
}

/// Reject blank identifiers before they reach storage
pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Map assignment errors to application errors
pub(crate) fn map_assignment_error(e: AssignmentError) -> AppError {
    match e {
        AssignmentError::PrNotFound(id) => {
            AppError::NotFound(format!("Pull request not found: {id}"))
        }
        AssignmentError::UserNotFound(id) => AppError::NotFound(format!("User not found: {id}")),
        AssignmentError::AlreadyExists(id) => AppError::PrExists(id),
        AssignmentError::AlreadyMerged(id) => AppError::PrMerged(id),
        AssignmentError::NotAssigned { pr_id, user_id } => {
            AppError::NotAssigned(format!("{user_id} on {pr_id}"))
        }
        AssignmentError::NoCandidate(id) => AppError::NoCandidate(id),
        AssignmentError::Timeout(limit) => AppError::Timeout(format!("gave up after {limit:?}")),
        AssignmentError::Internal(msg) => AppError::Internal(msg),
        AssignmentError::Database(e) => AppError::Database(e),
    }
}

/// Map directory errors to application errors
pub(crate) fn map_directory_error(e: DirectoryError) -> AppError {
    match e {
        DirectoryError::TeamExists(name) => AppError::TeamExists(name),
        DirectoryError::TeamNotFound(name) => AppError::NotFound(format!("Team not found: {name}")),
        DirectoryError::UserNotFound(id) => AppError::NotFound(format!("User not found: {id}")),
        DirectoryError::Validation(msg) => AppError::Validation(msg),
        DirectoryError::Database(e) => AppError::Database(e),
    }
}
