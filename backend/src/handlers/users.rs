//! User handlers
//!
//! Activity toggling plus the per-user review queue and ledger count.

use actix_web::{HttpResponse, web};

use crate::error::AppError;
use crate::handlers::{ApiResponse, map_assignment_error, map_directory_error};
use crate::models::{SetUserActiveRequest, UserQuery, UserReviews};
use crate::services::{AssignmentBackend, AssignmentService, TeamDirectory};

/// POST /users/setIsActive
///
/// Inactive users are skipped by every later reviewer selection. Existing
/// assignments are left as they are.
pub async fn set_is_active<B, D>(
    service: web::Data<AssignmentService<B, D>>,
    body: web::Json<SetUserActiveRequest>,
) -> Result<HttpResponse, AppError>
where
    B: AssignmentBackend + 'static,
    D: TeamDirectory + 'static,
{
    let user = service
        .directory()
        .set_user_active(&body.user_id, body.is_active)
        .await
        .map_err(map_directory_error)?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(user)))
}

/// GET /users/getReview?user_id=
pub async fn get_reviews<B, D>(
    service: web::Data<AssignmentService<B, D>>,
    query: web::Query<UserQuery>,
) -> Result<HttpResponse, AppError>
where
    B: AssignmentBackend + 'static,
    D: TeamDirectory + 'static,
{
    let user_id = query.into_inner().user_id;
    let pull_requests = service
        .reviews_for(&user_id)
        .await
        .map_err(map_assignment_error)?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(UserReviews {
        user_id,
        pull_requests,
    })))
}

/// GET /users/getStat?user_id=
pub async fn get_stat<B, D>(
    service: web::Data<AssignmentService<B, D>>,
    query: web::Query<UserQuery>,
) -> Result<HttpResponse, AppError>
where
    B: AssignmentBackend + 'static,
    D: TeamDirectory + 'static,
{
    let stat = service
        .review_stat(&query.user_id)
        .await
        .map_err(map_assignment_error)?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(stat)))
}

/// Configure user routes
pub fn configure_user_routes<B, D>(cfg: &mut web::ServiceConfig)
where
    B: AssignmentBackend + 'static,
    D: TeamDirectory + 'static,
{
    cfg.service(
        web::scope("/users")
            .route("/setIsActive", web::post().to(set_is_active::<B, D>))
            .route("/getReview", web::get().to(get_reviews::<B, D>))
            .route("/getStat", web::get().to(get_stat::<B, D>)),
    );
}
