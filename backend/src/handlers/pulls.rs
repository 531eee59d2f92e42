//! Pull Request handlers
//!
//! HTTP handlers for creating pull requests with automatic reviewer
//! assignment, reassigning a reviewer, merging, and lookup.

use actix_web::{HttpResponse, web};

use crate::error::AppError;
use crate::handlers::{ApiResponse, map_assignment_error, require_non_empty};
use crate::models::{CreatePrRequest, MergePrRequest, NewPullRequest, PrQuery, ReassignRequest};
use crate::services::{AssignmentBackend, AssignmentService, TeamDirectory};

/// POST /pullRequest/create
///
/// Create a pull request and assign up to two active reviewers from the
/// author's team.
pub async fn create_pr<B, D>(
    service: web::Data<AssignmentService<B, D>>,
    body: web::Json<CreatePrRequest>,
) -> Result<HttpResponse, AppError>
where
    B: AssignmentBackend + 'static,
    D: TeamDirectory + 'static,
{
    let request = body.into_inner();
    require_non_empty("pull_request_id", &request.pull_request_id)?;
    require_non_empty("pull_request_name", &request.pull_request_name)?;
    require_non_empty("author_id", &request.author_id)?;

    let pr = service
        .create(NewPullRequest {
            pr_id: request.pull_request_id,
            name: request.pull_request_name,
            author_id: request.author_id,
        })
        .await
        .map_err(map_assignment_error)?;

    Ok(HttpResponse::Created().json(ApiResponse::new(pr)))
}

/// GET /pullRequest/get?pull_request_id=
pub async fn get_pr<B, D>(
    service: web::Data<AssignmentService<B, D>>,
    query: web::Query<PrQuery>,
) -> Result<HttpResponse, AppError>
where
    B: AssignmentBackend + 'static,
    D: TeamDirectory + 'static,
{
    let pr = service
        .get(&query.pull_request_id)
        .await
        .map_err(map_assignment_error)?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(pr)))
}

/// POST /pullRequest/merge
///
/// Idempotent: merging a merged pull request returns it unchanged.
pub async fn merge_pr<B, D>(
    service: web::Data<AssignmentService<B, D>>,
    body: web::Json<MergePrRequest>,
) -> Result<HttpResponse, AppError>
where
    B: AssignmentBackend + 'static,
    D: TeamDirectory + 'static,
{
    let pr = service
        .merge(&body.pull_request_id)
        .await
        .map_err(map_assignment_error)?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(pr)))
}

/// POST /pullRequest/reassign
///
/// Replace `old_user_id` with another active member of their team.
pub async fn reassign_reviewer<B, D>(
    service: web::Data<AssignmentService<B, D>>,
    body: web::Json<ReassignRequest>,
) -> Result<HttpResponse, AppError>
where
    B: AssignmentBackend + 'static,
    D: TeamDirectory + 'static,
{
    let request = body.into_inner();
    require_non_empty("old_user_id", &request.old_user_id)?;

    let response = service
        .reassign(&request.pull_request_id, &request.old_user_id)
        .await
        .map_err(map_assignment_error)?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(response)))
}

/// Configure pull request routes
pub fn configure_pull_routes<B, D>(cfg: &mut web::ServiceConfig)
where
    B: AssignmentBackend + 'static,
    D: TeamDirectory + 'static,
{
    cfg.service(
        web::scope("/pullRequest")
            .route("/create", web::post().to(create_pr::<B, D>))
            .route("/get", web::get().to(get_pr::<B, D>))
            .route("/merge", web::post().to(merge_pr::<B, D>))
            .route("/reassign", web::post().to(reassign_reviewer::<B, D>)),
    );
}
