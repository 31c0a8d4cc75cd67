//! API-level tests over the real router.

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};

use common::{spawn_app, spawn_open_app};

#[tokio::test]
async fn test_health_is_public() {
    let app = spawn_app().await;
    let server = TestServer::new(app.router.clone()).unwrap();

    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_api_denies_anonymous_with_401() {
    let app = spawn_app().await;
    let server = TestServer::new(app.router.clone()).unwrap();

    for path in ["/api/me", "/api/me/workspaces", "/api/admin/users"] {
        let response = server.get(path).await;
        assert_eq!(
            response.status_code(),
            StatusCode::UNAUTHORIZED,
            "{path} should be denied"
        );
    }
}

#[tokio::test]
async fn test_ui_redirects_anonymous_to_login() {
    let app = spawn_app().await;
    let server = TestServer::new(app.router.clone()).unwrap();

    let response = server.get("/auth/client").await;
    assert_eq!(response.status_code(), StatusCode::FOUND);
    assert_eq!(response.header("location"), "/login");

    // The denied URL is stashed for post-login replay.
    let cookie = response.header("set-cookie");
    let cookie = cookie.to_str().unwrap();
    assert!(cookie.starts_with("weir-next=/auth/client"));
}

#[tokio::test]
async fn test_password_login_and_bearer_auth() {
    let app = spawn_app().await;
    let server = TestServer::new(app.router.clone()).unwrap();
    app.seed_user("user@example.com", "hunter2hunter2", false)
        .await;

    // Wrong password is rejected.
    let response = server
        .post("/auth/login")
        .json(&json!({"email": "user@example.com", "password": "wrong"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    // Correct credentials issue a user-kind token.
    let response = server
        .post("/auth/login")
        .json(&json!({"email": "user@example.com", "password": "hunter2hunter2"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    let token = body["access_token"].as_str().unwrap();
    assert!(token.starts_with("wru_"));
    assert_eq!(body["token_type"], "bearer");

    // The token works over the Authorization header.
    let response = server
        .get("/api/me")
        .add_header("authorization", format!("Bearer {token}"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let me: Value = response.json();
    assert_eq!(me["email"], "user@example.com");
    assert!(me.get("hashed_password").is_none());
}

#[tokio::test]
async fn test_cookie_transport() {
    let app = spawn_app().await;
    let server = TestServer::new(app.router.clone()).unwrap();
    let user = app.seed_user("cookie@example.com", "hunter2hunter2", false).await;
    let token = app.issue_token(&user).await;

    let response = server
        .get("/api/me")
        .add_header("cookie", format!("weir-auth={token}"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    // Unknown token resolves to no principal, so the policy denies.
    let response = server
        .get("/api/me")
        .add_header("cookie", "weir-auth=wru_bogus")
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_require_superuser() {
    let app = spawn_app().await;
    let server = TestServer::new(app.router.clone()).unwrap();

    let user = app.seed_user("user@example.com", "hunter2hunter2", false).await;
    let admin = app.seed_user("admin@example.com", "hunter2hunter2", true).await;
    let user_token = app.issue_token(&user).await;
    let admin_token = app.issue_token(&admin).await;

    // Authenticated non-superuser is stopped by the route policy.
    let response = server
        .get("/api/admin/users")
        .add_header("authorization", format!("Bearer {user_token}"))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    // Non-admin paths stay reachable for the same caller.
    let response = server
        .get("/api/me/workspaces")
        .add_header("authorization", format!("Bearer {user_token}"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    // Superuser passes.
    let response = server
        .get("/api/admin/users")
        .add_header("authorization", format!("Bearer {admin_token}"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let users: Value = response.json();
    assert_eq!(users.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_admin_user_crud() {
    let app = spawn_app().await;
    let server = TestServer::new(app.router.clone()).unwrap();
    let admin = app.seed_user("admin@example.com", "hunter2hunter2", true).await;
    let token = app.issue_token(&admin).await;

    // Create.
    let response = server
        .post("/api/admin/users")
        .add_header("authorization", format!("Bearer {token}"))
        .json(&json!({"email": "new@example.com", "password": "secret-password"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let created: Value = response.json();
    let new_id = created["id"].as_str().unwrap().to_string();

    // Duplicate email conflicts.
    let response = server
        .post("/api/admin/users")
        .add_header("authorization", format!("Bearer {token}"))
        .json(&json!({"email": "new@example.com"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    // Deactivate, then the account's credentials stop working.
    let response = server
        .post(&format!("/api/admin/users/{new_id}/deactivate"))
        .add_header("authorization", format!("Bearer {token}"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = server
        .post("/auth/login")
        .json(&json!({"email": "new@example.com", "password": "secret-password"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    // Delete.
    let response = server
        .delete(&format!("/api/admin/users/{new_id}"))
        .add_header("authorization", format!("Bearer {token}"))
        .await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    assert!(app.users().get(&new_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_admin_model_views_mask_secrets() {
    let app = spawn_app().await;
    let server = TestServer::new(app.router.clone()).unwrap();
    let admin = app.seed_user("admin@example.com", "hunter2hunter2", true).await;
    let token = app.issue_token(&admin).await;

    let response = server
        .get("/api/admin/models")
        .add_header("authorization", format!("Bearer {token}"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let models: Value = response.json();
    let names: Vec<&str> = models
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"users"));
    assert!(names.contains(&"access-tokens"));

    let response = server
        .get("/api/admin/models/users/rows")
        .add_header("authorization", format!("Bearer {token}"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let page: Value = response.json();
    assert_eq!(page["total"], 1);
    assert_eq!(page["rows"][0]["email"], "admin@example.com");
    assert_eq!(page["rows"][0]["hashed_password"], "********");

    // Unregistered tables are refused.
    let response = server
        .get("/api/admin/models/sqlite_master/rows")
        .add_header("authorization", format!("Bearer {token}"))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cloud_shim_endpoints() {
    let app = spawn_app().await;
    let server = TestServer::new(app.router.clone()).unwrap();
    let user = app.seed_user("user@example.com", "hunter2hunter2", false).await;
    let token = app.issue_token(&user).await;

    // Workspace listing derives from the caller.
    let response = server
        .get("/api/me/workspaces")
        .add_header("authorization", format!("Bearer {token}"))
        .await;
    let workspaces: Value = response.json();
    assert_eq!(workspaces[0]["account_id"], user.id.as_str());
    assert_eq!(workspaces[0]["workspace_name"], "user@example.com");

    // Cloud-shaped API paths redirect to the flat layout.
    let response = server
        .get("/api/accounts/a1/workspaces/w1/flows/filter")
        .add_header("authorization", format!("Bearer {token}"))
        .await;
    assert_eq!(response.status_code(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.header("location"), "/api/flows/filter");

    // Automations read as absent.
    let response = server
        .post("/api/automations/filter")
        .add_header("authorization", format!("Bearer {token}"))
        .json(&json!({}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({}));
}

#[tokio::test]
async fn test_oauth_authorize_creates_state() {
    let app = spawn_app().await;
    let server = TestServer::new(app.router.clone()).unwrap();

    let response = server.get("/auth/bearer/authorize").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    let url = body["authorization_url"].as_str().unwrap();
    assert!(url.starts_with("https://idp.test/authorize?"));
    assert!(url.contains("client_id=weir-test"));
    assert!(url.contains("redirect_uri="));

    // The browser entry point redirects straight to the provider.
    let response = server.get("/login").await;
    assert_eq!(response.status_code(), StatusCode::FOUND);
    let location = response.header("location");
    assert!(location.to_str().unwrap().starts_with("https://idp.test/authorize?"));
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = spawn_app().await;
    let server = TestServer::new(app.router.clone()).unwrap();
    let user = app.seed_user("user@example.com", "hunter2hunter2", false).await;
    let token = app.issue_token(&user).await;

    let response = server
        .post("/auth/logout")
        .add_header("authorization", format!("Bearer {token}"))
        .await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let response = server
        .get("/api/me")
        .add_header("authorization", format!("Bearer {token}"))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_open_server_without_identity_provider() {
    let app = spawn_open_app().await;
    let server = TestServer::new(app.router.clone()).unwrap();

    // No policy layers: anonymous requests reach the handlers.
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    // Handler-level extractors still guard identity-bound endpoints.
    let response = server.get("/api/me").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    // The login entry point reads as absent.
    let response = server.get("/login").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}
