//! Team handlers

use actix_web::{HttpResponse, web};

use crate::error::AppError;
use crate::handlers::{ApiResponse, map_directory_error};
use crate::models::{AddTeamRequest, DeactivateTeamRequest, TeamQuery};
use crate::services::{AssignmentBackend, AssignmentService, TeamDirectory};

/// POST /team/add
///
/// Create a team; listed users are created or moved into it.
pub async fn add_team<B, D>(
    service: web::Data<AssignmentService<B, D>>,
    body: web::Json<AddTeamRequest>,
) -> Result<HttpResponse, AppError>
where
    B: AssignmentBackend + 'static,
    D: TeamDirectory + 'static,
{
    let team = service
        .directory()
        .add_team(body.into_inner())
        .await
        .map_err(map_directory_error)?;

    Ok(HttpResponse::Created().json(ApiResponse::new(team)))
}

/// GET /team/get?team_name=
pub async fn get_team<B, D>(
    service: web::Data<AssignmentService<B, D>>,
    query: web::Query<TeamQuery>,
) -> Result<HttpResponse, AppError>
where
    B: AssignmentBackend + 'static,
    D: TeamDirectory + 'static,
{
    let team = service
        .directory()
        .get_team(&query.team_name)
        .await
        .map_err(map_directory_error)?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(team)))
}

/// POST /team/deactivate
pub async fn deactivate_team<B, D>(
    service: web::Data<AssignmentService<B, D>>,
    body: web::Json<DeactivateTeamRequest>,
) -> Result<HttpResponse, AppError>
where
    B: AssignmentBackend + 'static,
    D: TeamDirectory + 'static,
{
    let team = service
        .directory()
        .deactivate_team(&body.team_name)
        .await
        .map_err(map_directory_error)?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(team)))
}

/// Configure team routes
pub fn configure_team_routes<B, D>(cfg: &mut web::ServiceConfig)
where
    B: AssignmentBackend + 'static,
    D: TeamDirectory + 'static,
{
    cfg.service(
        web::scope("/team")
            .route("/add", web::post().to(add_team::<B, D>))
            .route("/get", web::get().to(get_team::<B, D>))
            .route("/deactivate", web::post().to(deactivate_team::<B, D>)),
    );
}
