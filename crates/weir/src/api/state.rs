//! Application state shared across handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;
use weir_policy::PolicyStore;

use crate::admin::{AdminSite, default_views};
use crate::auth::{AuthState, TokenRepository};
use crate::config::WeirConfig;
use crate::policy::{self, PolicyReason};
use crate::user::UserRepository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// User and OAuth-account store.
    pub users: UserRepository,
    /// Access token store.
    pub tokens: TokenRepository,
    /// Authentication state (cookie settings, optional OIDC client).
    pub auth: AuthState,
    /// Published route policies, selected by group name.
    pub policies: Arc<PolicyStore<PolicyReason>>,
    /// Generic CRUD admin over registered models.
    pub admin: AdminSite,
    /// Outbound HTTP client (OIDC, CLI key handoff).
    pub http_client: reqwest::Client,
    /// Where the workflow UI lives.
    pub ui_url: String,
    /// Externally visible base URL of this server.
    pub public_url: String,
    /// Origins allowed to call the API cross-origin.
    pub allowed_origins: Vec<String>,
    /// Optional built UI bundle served by the UI group.
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        config: &WeirConfig,
        pool: SqlitePool,
        auth: AuthState,
        http_client: reqwest::Client,
    ) -> Result<Self> {
        let policies = Arc::new(policy::build_store(&config.policy)?);

        Ok(Self {
            users: UserRepository::new(pool.clone()),
            tokens: TokenRepository::new(pool.clone(), config.auth.token_lifetime_secs),
            auth,
            policies,
            admin: AdminSite::new(pool, default_views()),
            http_client,
            ui_url: config.ui_url.clone(),
            public_url: config.public_url.trim_end_matches('/').to_string(),
            allowed_origins: config.allowed_origins.clone(),
            static_dir: config.static_dir.clone(),
        })
    }
}
