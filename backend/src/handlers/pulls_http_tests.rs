//! HTTP Tests for the pull request routes
//!
//! These run the full actix-web stack against the in-memory backend, so they
//! need no database.

#[cfg(test)]
mod http_tests {
    use actix_web::{App, test, web};
    use serde_json::{Value, json};

    use crate::handlers::configure_routes;
    use crate::models::TeamMember;
    use crate::services::{
        AssignmentPolicy, AssignmentService, MemoryBackend, MemoryTeamDirectory, ReviewerSelector,
        SelfReview,
    };
    use crate::MemoryAssignmentService;

    fn service_for(members: &[(&str, bool)], policy: AssignmentPolicy) -> web::Data<MemoryAssignmentService> {
        let members = members
            .iter()
            .map(|(id, active)| TeamMember::new(*id, format!("user {id}"), *active))
            .collect();

        let directory = MemoryTeamDirectory::new().with_team("payments", members);
        web::Data::new(AssignmentService::new(
            MemoryBackend::with_directory(&directory),
            directory,
            ReviewerSelector::seeded(11),
            policy,
        ))
    }

    fn payments_team() -> web::Data<MemoryAssignmentService> {
        service_for(
            &[("u1", true), ("u2", true), ("u3", true)],
            AssignmentPolicy::default(),
        )
    }

    fn create_body(pr_id: &str, author_id: &str) -> Value {
        json!({
            "pull_request_id": pr_id,
            "pull_request_name": format!("{pr_id} change"),
            "author_id": author_id
        })
    }

    fn reviewers(body: &Value) -> Vec<String> {
        body["assigned_reviewers"]
            .as_array()
            .expect("assigned_reviewers array")
            .iter()
            .map(|v| v.as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[actix_rt::test]
    async fn http_create_assigns_two_reviewers() {
        let app = test::init_service(
            App::new()
                .app_data(payments_team())
                .configure(configure_routes::<MemoryBackend, MemoryTeamDirectory>),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/pullRequest/create")
            .set_json(create_body("pr-1", "u1"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["pull_request_id"], "pr-1");
        assert_eq!(body["data"]["status"], "OPEN");
        assert!(body["meta"]["request_id"].is_string());

        let mut assigned = reviewers(&body["data"]);
        assigned.sort();
        assert_eq!(assigned, vec!["u2", "u3"]);
    }

    #[actix_rt::test]
    async fn http_create_duplicate_returns_409() {
        let app = test::init_service(
            App::new()
                .app_data(payments_team())
                .configure(configure_routes::<MemoryBackend, MemoryTeamDirectory>),
        )
        .await;

        for expected in [201, 409] {
            let req = test::TestRequest::post()
                .uri("/pullRequest/create")
                .set_json(create_body("pr-dup", "u1"))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), expected);

            if expected == 409 {
                let body: Value = test::read_body_json(resp).await;
                assert_eq!(body["error"]["code"], "PR_EXISTS");
            }
        }
    }

    #[actix_rt::test]
    async fn http_create_unknown_author_returns_404() {
        let app = test::init_service(
            App::new()
                .app_data(payments_team())
                .configure(configure_routes::<MemoryBackend, MemoryTeamDirectory>),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/pullRequest/create")
            .set_json(create_body("pr-1", "ghost"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[actix_rt::test]
    async fn http_create_rejects_blank_id_and_bad_json() {
        let app = test::init_service(
            App::new()
                .app_data(payments_team())
                .configure(configure_routes::<MemoryBackend, MemoryTeamDirectory>),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/pullRequest/create")
            .set_json(create_body(" ", "u1"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let req = test::TestRequest::post()
            .uri("/pullRequest/create")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"pull_request_id\": 7")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[actix_rt::test]
    async fn http_reassign_picks_remaining_member() {
        let app = test::init_service(
            App::new()
                .app_data(payments_team())
                .configure(configure_routes::<MemoryBackend, MemoryTeamDirectory>),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/pullRequest/create")
            .set_json(create_body("pr-1", "u1"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 201);

        // u3 stays, u1 is the only member not yet assigned
        let req = test::TestRequest::post()
            .uri("/pullRequest/reassign")
            .set_json(json!({"pull_request_id": "pr-1", "old_user_id": "u2"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["replaced_by"], "u1");
        let mut assigned = reviewers(&body["data"]["pr"]);
        assigned.sort();
        assert_eq!(assigned, vec!["u1", "u3"]);

        let req = test::TestRequest::post()
            .uri("/pullRequest/reassign")
            .set_json(json!({"pull_request_id": "pr-1", "old_user_id": "u2"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 409);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "NOT_ASSIGNED");
    }

    #[actix_rt::test]
    async fn http_reassign_without_candidate_returns_409() {
        let strict = AssignmentPolicy {
            self_review: SelfReview::Never,
            ..AssignmentPolicy::default()
        };
        let app = test::init_service(
            App::new()
                .app_data(service_for(&[("u1", true), ("u2", true)], strict))
                .configure(configure_routes::<MemoryBackend, MemoryTeamDirectory>),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/pullRequest/create")
            .set_json(create_body("pr-1", "u1"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 201);

        let req = test::TestRequest::post()
            .uri("/pullRequest/reassign")
            .set_json(json!({"pull_request_id": "pr-1", "old_user_id": "u2"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 409);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "NO_CANDIDATE");
    }

    #[actix_rt::test]
    async fn http_merge_is_idempotent_and_blocks_reassign() {
        let app = test::init_service(
            App::new()
                .app_data(payments_team())
                .configure(configure_routes::<MemoryBackend, MemoryTeamDirectory>),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/pullRequest/create")
            .set_json(create_body("pr-1", "u1"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 201);

        let mut merged_bodies = Vec::new();
        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri("/pullRequest/merge")
                .set_json(json!({"pull_request_id": "pr-1"}))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 200);
            let body: Value = test::read_body_json(resp).await;
            merged_bodies.push(body["data"].clone());
        }
        assert_eq!(merged_bodies[0], merged_bodies[1]);
        assert_eq!(merged_bodies[0]["status"], "MERGED");
        assert!(merged_bodies[0]["merged_at"].is_string());

        let req = test::TestRequest::post()
            .uri("/pullRequest/reassign")
            .set_json(json!({"pull_request_id": "pr-1", "old_user_id": "u3"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 409);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "PR_MERGED");
    }

    #[actix_rt::test]
    async fn http_get_and_merge_unknown_return_404() {
        let app = test::init_service(
            App::new()
                .app_data(payments_team())
                .configure(configure_routes::<MemoryBackend, MemoryTeamDirectory>),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/pullRequest/get?pull_request_id=missing")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);

        let req = test::TestRequest::post()
            .uri("/pullRequest/merge")
            .set_json(json!({"pull_request_id": "missing"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);

        let req = test::TestRequest::get().uri("/pullRequest/get").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_rt::test]
    async fn http_team_and_user_routes() {
        let app = test::init_service(
            App::new()
                .app_data(service_for(&[], AssignmentPolicy::default()))
                .configure(configure_routes::<MemoryBackend, MemoryTeamDirectory>),
        )
        .await;

        let team = json!({
            "team_name": "backend",
            "members": [
                {"user_id": "b1", "username": "Alice", "is_active": true},
                {"user_id": "b2", "username": "Bob", "is_active": true},
                {"user_id": "b3", "username": "Carol", "is_active": true}
            ]
        });
        let req = test::TestRequest::post().uri("/team/add").set_json(&team).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 201);

        let req = test::TestRequest::post().uri("/team/add").set_json(&team).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "TEAM_EXISTS");

        let req = test::TestRequest::post()
            .uri("/users/setIsActive")
            .set_json(json!({"user_id": "b3", "is_active": false}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["team_name"], "backend");
        assert_eq!(body["data"]["is_active"], false);

        // b3 is inactive, so b2 is the only candidate
        let req = test::TestRequest::post()
            .uri("/pullRequest/create")
            .set_json(create_body("pr-b", "b1"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(reviewers(&body["data"]), vec!["b2"]);

        let req = test::TestRequest::get().uri("/users/getReview?user_id=b2").to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["data"]["user_id"], "b2");
        assert_eq!(body["data"]["pull_requests"][0]["pull_request_id"], "pr-b");

        let req = test::TestRequest::get().uri("/users/getStat?user_id=b2").to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["data"]["review_count"], 1);

        let req = test::TestRequest::get().uri("/users/getStat?user_id=b1").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);

        let req = test::TestRequest::post()
            .uri("/team/deactivate")
            .set_json(json!({"team_name": "backend"}))
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        let members = body["data"]["members"].as_array().expect("members array");
        assert_eq!(members.len(), 3);
        assert!(members.iter().all(|m| m["is_active"] == false));

        let req = test::TestRequest::get().uri("/team/get?team_name=backend").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);

        let req = test::TestRequest::get().uri("/team/get?team_name=nobody").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}
