use actix_web::{App, HttpServer, middleware, web};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pr_rota::handlers;
use pr_rota::services::{PgAssignmentBackend, ReviewerSelector, TeamDirectoryService};
use pr_rota::{Config, PgAssignmentService, health_check};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pr_rota=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    info!("Starting PR Rota server on {}:{}", config.host, config.port);

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to create database pool");

    info!("Database connection pool established");

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");

    info!("Database migrations completed");

    let policy = config.assignment_policy();
    info!(
        self_review = ?policy.self_review,
        deadline = ?policy.deadline,
        lock_timeout = ?config.lock_timeout(),
        seeded = config.reviewer_selection_seed.is_some(),
        "Assignment policy loaded"
    );

    let service: web::Data<PgAssignmentService> = web::Data::new(PgAssignmentService::new(
        PgAssignmentBackend::new(db_pool.clone()).with_lock_timeout(config.lock_timeout()),
        TeamDirectoryService::new(db_pool.clone()),
        ReviewerSelector::from_seed_option(config.reviewer_selection_seed),
        policy,
    ));

    let server_addr = format!("{}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .route("/health", web::get().to(health_check))
            .configure(handlers::configure_routes::<PgAssignmentBackend, TeamDirectoryService>)
    })
    .bind(&server_addr)?
    .run()
    .await
}
