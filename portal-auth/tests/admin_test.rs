mod common;

use axum::http::StatusCode;
use common::{TestApp, TEST_PASSWORD};
use portal_auth::{models::Role, services::UserDirectory};
use serde_json::json;

#[tokio::test]
async fn gated_routes_require_a_session() {
    let app = TestApp::spawn();

    for uri in ["/api/users/me", "/api/users", "/api/auth/user"] {
        let (status, _) = app.get(uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);

        let (status, _) = app.get(uri, Some("not-a-session")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn current_user_is_returned_without_hash() {
    let app = TestApp::spawn();
    let (user, token) = app.login_as("henry", Role::User).await;

    let (status, body) = app.get("/api/users/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user.id.as_str());
    assert!(body["user"].get("password_hash").is_none());

    let (status, body) = app.get("/api/auth/user", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "henry@example.com");
}

#[tokio::test]
async fn non_admins_are_forbidden_from_admin_routes() {
    let app = TestApp::spawn();
    let target = app.seed_user("ivy", Role::User, false).await;

    for role in [Role::User, Role::Editor] {
        let (_, token) = app
            .login_as(&format!("{}-caller", role), role)
            .await;

        let (status, _) = app.get("/api/users", Some(&token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .request_with_token(
                "PUT",
                &format!("/api/users/{}/approve", target.id),
                Some(&token),
                Some(json!({ "approved": true })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    let stored = app.users.find_by_id(&target.id).await.unwrap().unwrap();
    assert!(!stored.approved);
}

#[tokio::test]
async fn admin_approves_pending_user_who_can_then_log_in() {
    let app = TestApp::spawn();
    let (_, admin_token) = app.login_as("admin", Role::Admin).await;
    let pending = app.seed_user("jack", Role::User, false).await;

    let (status, body) = app
        .request_with_token(
            "PUT",
            &format!("/api/users/{}/approve", pending.id),
            Some(&admin_token),
            Some(json!({ "approved": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["approved"], true);

    let (status, _) = app
        .post_json(
            "/api/auth/login",
            json!({ "username": "jack", "password": TEST_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_lists_users() {
    let app = TestApp::spawn();
    let (_, admin_token) = app.login_as("admin", Role::Admin).await;
    app.seed_user("kate", Role::User, false).await;
    app.seed_user("liam", Role::Editor, true).await;

    let (status, body) = app.get("/api/users", Some(&admin_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    let users = body["users"].as_array().unwrap();
    assert!(users.iter().all(|u| u.get("password_hash").is_none()));
}

#[tokio::test]
async fn role_changes_are_limited_to_user_and_editor() {
    let app = TestApp::spawn();
    let (_, admin_token) = app.login_as("admin", Role::Admin).await;
    let target = app.seed_user("mia", Role::User, true).await;
    let uri = format!("/api/users/{}/role", target.id);

    let (status, body) = app
        .request_with_token("PUT", &uri, Some(&admin_token), Some(json!({ "role": "editor" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "editor");

    let (status, _) = app
        .request_with_token("PUT", &uri, Some(&admin_token), Some(json!({ "role": "admin" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .request_with_token("PUT", &uri, Some(&admin_token), Some(json!({ "role": "owner" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stored = app.users.find_by_id(&target.id).await.unwrap().unwrap();
    assert_eq!(stored.role, Role::Editor);
}

#[tokio::test]
async fn admin_accounts_are_immutable() {
    let app = TestApp::spawn();
    let (_, admin_token) = app.login_as("admin", Role::Admin).await;
    let other_admin = app.seed_user("nora", Role::Admin, true).await;

    let (status, _) = app
        .request_with_token(
            "PUT",
            &format!("/api/users/{}/approve", other_admin.id),
            Some(&admin_token),
            Some(json!({ "approved": false })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request_with_token(
            "PUT",
            &format!("/api/users/{}/role", other_admin.id),
            Some(&admin_token),
            Some(json!({ "role": "user" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let stored = app.users.find_by_id(&other_admin.id).await.unwrap().unwrap();
    assert_eq!(stored.role, Role::Admin);
    assert!(stored.approved);
}

#[tokio::test]
async fn unknown_target_is_not_found() {
    let app = TestApp::spawn();
    let (_, admin_token) = app.login_as("admin", Role::Admin).await;

    let (status, _) = app
        .request_with_token(
            "PUT",
            "/api/users/does-not-exist/approve",
            Some(&admin_token),
            Some(json!({ "approved": true })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn role_change_applies_to_live_sessions() {
    let app = TestApp::spawn();
    let (_, admin_token) = app.login_as("admin", Role::Admin).await;
    let (promoted, token) = app.login_as("owen", Role::User).await;

    let (status, _) = app.get("/api/users", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Promote directly in the directory; admin cannot be granted over HTTP.
    let mut record = app.users.find_by_id(&promoted.id).await.unwrap().unwrap();
    record.role = Role::Admin;
    app.users.update(&record).await.unwrap();

    let (status, _) = app.get("/api/users", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/users", Some(&admin_token)).await;
    assert_eq!(status, StatusCode::OK);
}
