//! PR Rota - reviewer assignment for team pull requests
//!
//! This library provides the assignment engine, its Postgres and in-memory
//! storage backends, and the HTTP handlers that expose them.

use actix_web::HttpResponse;

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::AppError;

pub use models::{PrStatus, PullRequest, PullRequestShort, ReassignResponse, Team, TeamMember, User};

pub use services::{
    AssignmentError, AssignmentPolicy, AssignmentService, DirectoryError, MemoryBackend,
    MemoryTeamDirectory, PgAssignmentBackend, ReviewerSelector, SelfReview, TeamDirectory,
    TeamDirectoryService,
};

/// Assignment service wired to Postgres
pub type PgAssignmentService = AssignmentService<PgAssignmentBackend, TeamDirectoryService>;

/// Assignment service wired to the in-memory backend
pub type MemoryAssignmentService = AssignmentService<MemoryBackend, MemoryTeamDirectory>;

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "pr-rota"
    }))
}
