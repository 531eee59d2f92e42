use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

/// Application-level error type
#[derive(Debug)]
pub enum AppError {
    /// Database error
    Database(sqlx::Error),
    /// Validation error
    Validation(String),
    /// Not found error (pull request, team, or user)
    NotFound(String),
    /// Pull request ID already taken
    PrExists(String),
    /// Team name already taken
    TeamExists(String),
    /// Mutation attempted on a merged pull request
    PrMerged(String),
    /// Reassign target is not a current reviewer
    NotAssigned(String),
    /// No eligible replacement reviewer
    NoCandidate(String),
    /// Operation exceeded its deadline
    Timeout(String),
    /// Internal server error
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
    meta: ErrorMeta,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ErrorMeta {
    request_id: String,
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) | Self::Internal(_) => "INTERNAL_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::PrExists(_) => "PR_EXISTS",
            Self::TeamExists(_) => "TEAM_EXISTS",
            Self::PrMerged(_) => "PR_MERGED",
            Self::NotAssigned(_) => "NOT_ASSIGNED",
            Self::NoCandidate(_) => "NO_CANDIDATE",
            Self::Timeout(_) => "TIMEOUT",
        }
    }

    /// Message sent to the client; storage details stay in the logs
    fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(e) => write!(f, "Database error: {e}"),
            Self::Validation(msg) => write!(f, "Validation error: {msg}"),
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::PrExists(id) => write!(f, "Pull request already exists: {id}"),
            Self::TeamExists(name) => write!(f, "Team already exists: {name}"),
            Self::PrMerged(id) => write!(f, "Pull request is merged: {id}"),
            Self::NotAssigned(msg) => write!(f, "Reviewer is not assigned: {msg}"),
            Self::NoCandidate(id) => write!(f, "No active replacement candidate for {id}"),
            Self::Timeout(msg) => write!(f, "Timed out: {msg}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) | Self::TeamExists(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PrExists(_) | Self::PrMerged(_) | Self::NotAssigned(_) | Self::NoCandidate(_) => {
                StatusCode::CONFLICT
            }
            Self::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();

        if matches!(self, Self::Database(_) | Self::Internal(_)) {
            tracing::error!(request_id = %request_id, error = %self, "Request failed");
        }

        let error_response = ErrorResponse {
            error: ErrorBody {
                code: self.error_code().to_string(),
                message: self.public_message(),
                details: None,
            },
            meta: ErrorMeta { request_id },
        };

        HttpResponse::build(self.status_code()).json(error_response)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}
