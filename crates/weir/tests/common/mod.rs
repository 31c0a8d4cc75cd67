//! Test utilities and common setup.
#![allow(clippy::field_reassign_with_default)]

use axum::Router;
use tempfile::TempDir;
use weir::api::routes::create_router;
use weir::api::state::AppState;
use weir::auth::{AuthState, OidcClient, TokenKind};
use weir::config::WeirConfig;
use weir::db;
use weir::user::{CreateUserRequest, User, UserRepository};

/// A running test application over a throwaway database.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    // Dropped last; keeps the SQLite file alive for the test.
    _db_dir: TempDir,
}

fn oidc_client() -> OidcClient {
    OidcClient::with_endpoints(
        "weir-test".to_string(),
        "secret".to_string(),
        weir::auth::OidcEndpoints {
            authorization_endpoint: "https://idp.test/authorize".to_string(),
            token_endpoint: "https://idp.test/token".to_string(),
            userinfo_endpoint: "https://idp.test/userinfo".to_string(),
        },
    )
}

async fn build(auth_enabled: bool) -> TestApp {
    let db_dir = tempfile::tempdir().expect("create temp dir");
    let db_path = db_dir.path().join("weir-test.db");

    let mut config = WeirConfig::default();
    config.database_url = format!("sqlite://{}", db_path.display());

    let pool = db::connect(&config.database_url).await.expect("open db");
    db::migrate(&pool).await.expect("migrate");

    let auth = if auth_enabled {
        AuthState::with_client(&config.auth, oidc_client())
    } else {
        AuthState::disabled(&config.auth)
    };

    let state = AppState::new(&config, pool, auth, reqwest::Client::new()).expect("state");
    let router = create_router(state.clone());

    TestApp {
        router,
        state,
        _db_dir: db_dir,
    }
}

/// App with policies enforced (identity provider configured).
pub async fn spawn_app() -> TestApp {
    build(true).await
}

/// App with no identity provider: policies are not attached.
pub async fn spawn_open_app() -> TestApp {
    build(false).await
}

impl TestApp {
    /// Seed a user with a bcrypt-hashed password.
    pub async fn seed_user(&self, email: &str, password: &str, superuser: bool) -> User {
        let hash = bcrypt::hash(password, 4).expect("hash password");
        self.state
            .users
            .create(CreateUserRequest {
                email: email.to_string(),
                password: Some(hash),
                is_superuser: superuser,
                is_active: true,
                is_verified: true,
            })
            .await
            .expect("seed user")
    }

    /// Issue a bearer token for a user.
    pub async fn issue_token(&self, user: &User) -> String {
        self.state
            .tokens
            .create(&user.id, TokenKind::User)
            .await
            .expect("issue token")
            .token
    }

    pub fn users(&self) -> &UserRepository {
        &self.state.users
    }
}
