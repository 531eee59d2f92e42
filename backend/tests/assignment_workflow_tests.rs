//! Assignment Workflow Tests
//!
//! Exercise the public API end to end: team setup, creation, reassignment,
//! deactivation, merge, and the per-user ledger. The in-memory tests run by
//! default; the Postgres workflow needs DATABASE_URL.
//! Run the database tests with: `cargo test --test assignment_workflow_tests -- --ignored`

use std::collections::HashSet;
use std::sync::Arc;

use actix_web::{App, test, web};
use serde_json::{Value, json};
use sqlx::PgPool;

use pr_rota::handlers::configure_routes;
use pr_rota::models::{AddTeamRequest, NewPullRequest};
use pr_rota::{
    AssignmentError, AssignmentPolicy, AssignmentService, MemoryAssignmentService, MemoryBackend,
    MemoryTeamDirectory, PgAssignmentBackend, PgAssignmentService, PrStatus, ReviewerSelector,
    TeamDirectory, TeamDirectoryService, TeamMember,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn memory_service(seed: u64) -> MemoryAssignmentService {
    let directory = MemoryTeamDirectory::new();
    AssignmentService::new(
        MemoryBackend::with_directory(&directory),
        directory,
        ReviewerSelector::seeded(seed),
        AssignmentPolicy::default(),
    )
}

fn team_request(team_name: &str, ids: &[&str]) -> AddTeamRequest {
    AddTeamRequest {
        team_name: team_name.to_string(),
        members: ids
            .iter()
            .map(|id| TeamMember::new(*id, format!("user {id}"), true))
            .collect(),
    }
}

fn new_pr(pr_id: &str, author_id: &str) -> NewPullRequest {
    NewPullRequest {
        pr_id: pr_id.to_string(),
        name: format!("{pr_id} change"),
        author_id: author_id.to_string(),
    }
}

/// Helper to create a test database pool
async fn try_create_test_pool() -> Option<PgPool> {
    let _ = dotenvy::from_filename("backend/.env");
    let _ = dotenvy::dotenv();

    let database_url = std::env::var("DATABASE_URL").ok()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(8)
        .connect(&database_url)
        .await
        .ok()?;

    sqlx::migrate!("./migrations").run(&pool).await.ok()?;
    Some(pool)
}

// ============================================================================
// In-memory workflows
// ============================================================================

#[tokio::test]
async fn workflow_team_lifecycle_with_memory_backend() {
    let svc = memory_service(3);
    let directory = svc.directory();
    directory
        .add_team(team_request("platform", &["p1", "p2", "p3", "p4"]))
        .await
        .expect("add team");

    let pr = svc.create(new_pr("pr-100", "p1")).await.expect("create");
    assert_eq!(pr.status, PrStatus::Open);
    assert_eq!(pr.assigned_reviewers.len(), 2);
    assert!(!pr.has_reviewer("p1"));

    // Take one reviewer out of rotation, then replace them
    let outgoing = pr.assigned_reviewers[0].clone();
    directory
        .set_user_active(&outgoing, false)
        .await
        .expect("deactivate reviewer");

    let reassigned = svc.reassign("pr-100", &outgoing).await.expect("reassign");
    assert_ne!(reassigned.replaced_by, outgoing);
    assert!(!reassigned.pr.has_reviewer(&outgoing));
    assert_eq!(reassigned.pr.assigned_reviewers.len(), 2);

    // Every review counted once, including the replacement
    let mut total = 0;
    for user in ["p1", "p2", "p3", "p4"] {
        if let Ok(stat) = svc.review_stat(user).await {
            total += stat.review_count;
        }
    }
    assert_eq!(total, 3);

    let merged = svc.merge("pr-100").await.expect("merge");
    assert_eq!(merged.status, PrStatus::Merged);
    assert_eq!(svc.get("pr-100").await.expect("get"), merged);

    let queue = svc
        .reviews_for(&reassigned.replaced_by)
        .await
        .expect("reviews");
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].status, PrStatus::Merged);
}

#[tokio::test]
async fn workflow_deactivated_team_gets_no_reviewers() {
    let svc = memory_service(5);
    svc.directory()
        .add_team(team_request("mobile", &["m1", "m2", "m3"]))
        .await
        .expect("add team");
    svc.directory()
        .deactivate_team("mobile")
        .await
        .expect("deactivate team");

    let pr = svc.create(new_pr("pr-200", "m1")).await.expect("create");
    assert!(pr.assigned_reviewers.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn workflow_parallel_creates_keep_ledger_consistent() {
    let svc = Arc::new(memory_service(9));
    svc.directory()
        .add_team(team_request("infra", &["i1", "i2", "i3", "i4", "i5"]))
        .await
        .expect("add team");

    let mut tasks = tokio::task::JoinSet::new();
    for n in 0..20 {
        let svc = svc.clone();
        tasks.spawn(async move { svc.create(new_pr(&format!("pr-{n}"), "i1")).await });
    }

    let mut assigned = 0;
    while let Some(joined) = tasks.join_next().await {
        let pr = joined.expect("task panicked").expect("create");
        let unique: HashSet<&String> = pr.assigned_reviewers.iter().collect();
        assert_eq!(unique.len(), 2);
        assigned += pr.assigned_reviewers.len() as i64;
    }

    let mut counted = 0;
    for user in ["i2", "i3", "i4", "i5"] {
        if let Ok(stat) = svc.review_stat(user).await {
            counted += stat.review_count;
        }
    }
    assert_eq!(counted, assigned);

    let duplicate = svc.create(new_pr("pr-0", "i1")).await;
    assert!(matches!(duplicate, Err(AssignmentError::AlreadyExists(_))));
}

// ============================================================================
// Postgres workflow over HTTP
// ============================================================================

#[ignore]
#[actix_rt::test]
async fn workflow_http_against_postgres() {
    let pool = match try_create_test_pool().await {
        Some(p) => p,
        None => {
            eprintln!("Skipping test: database not available");
            return;
        }
    };

    let service: web::Data<PgAssignmentService> = web::Data::new(AssignmentService::new(
        PgAssignmentBackend::new(pool.clone()),
        TeamDirectoryService::new(pool.clone()),
        ReviewerSelector::from_entropy(),
        AssignmentPolicy::default(),
    ));
    let app = test::init_service(
        App::new()
            .app_data(service)
            .configure(configure_routes::<PgAssignmentBackend, TeamDirectoryService>),
    )
    .await;

    let tag = uuid::Uuid::new_v4().simple().to_string();
    let ids: Vec<String> = (1..=3).map(|i| format!("{tag}-u{i}")).collect();
    let pr_id = format!("{tag}-pr");

    let req = test::TestRequest::post()
        .uri("/team/add")
        .set_json(json!({
            "team_name": format!("team-{tag}"),
            "members": ids.iter().map(|id| json!({
                "user_id": id, "username": id, "is_active": true
            })).collect::<Vec<_>>()
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let req = test::TestRequest::post()
        .uri("/pullRequest/create")
        .set_json(json!({
            "pull_request_id": pr_id,
            "pull_request_name": "Workflow change",
            "author_id": ids[0]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["assigned_reviewers"].as_array().map(Vec::len), Some(2));

    let req = test::TestRequest::post()
        .uri("/pullRequest/reassign")
        .set_json(json!({"pull_request_id": pr_id, "old_user_id": ids[1]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["replaced_by"], ids[0].as_str());

    let req = test::TestRequest::post()
        .uri("/pullRequest/merge")
        .set_json(json!({"pull_request_id": pr_id}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::get()
        .uri(&format!("/users/getStat?user_id={}", ids[2]))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"]["review_count"], 1);
}
