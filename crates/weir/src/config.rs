//! Server configuration.
//!
//! Loaded once at startup from an optional TOML file plus `WEIR__`-prefixed
//! environment variables (`WEIR__AUTH__OIDC_CLIENT_ID=...`). Every field has
//! a default so a bare `weir serve` works out of the box.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use weir_policy::RuleSetConfig;

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeirConfig {
    /// Address the HTTP server binds to.
    pub listen: String,
    /// SQLite database for users, OAuth accounts and access tokens.
    pub database_url: String,
    /// Where the workflow UI lives; post-login and CLI handoff redirects
    /// land here.
    pub ui_url: String,
    /// Externally visible base URL of this server, used to build OAuth
    /// redirect URIs.
    pub public_url: String,
    /// Origins allowed to call the API cross-origin.
    pub allowed_origins: Vec<String>,
    /// Optional directory with the built UI bundle, served as the UI
    /// group's fallback.
    pub static_dir: Option<PathBuf>,
    pub auth: AuthSettings,
    pub policy: PolicySettings,
}

impl Default for WeirConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:4200".to_string(),
            database_url: "sqlite://weir.db".to_string(),
            ui_url: "http://127.0.0.1:4200".to_string(),
            public_url: "http://127.0.0.1:4200".to_string(),
            allowed_origins: Vec::new(),
            static_dir: None,
            auth: AuthSettings::default(),
            policy: PolicySettings::default(),
        }
    }
}

/// Authentication settings.
///
/// OpenID Connect is enabled only when all three `oidc_*` values are set;
/// otherwise the server runs open and route policies are not attached.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub oidc_client_id: Option<String>,
    pub oidc_client_secret: Option<String>,
    /// OpenID Connect discovery document URL
    /// (`https://idp.example.com/.well-known/openid-configuration`).
    pub oidc_url: Option<String>,
    pub cookie_name: String,
    /// Auth cookie lifetime in seconds.
    pub cookie_max_age: i64,
    /// Access token lifetime in seconds.
    pub token_lifetime_secs: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            oidc_client_id: None,
            oidc_client_secret: None,
            oidc_url: None,
            cookie_name: "weir-auth".to_string(),
            cookie_max_age: 60 * 60 * 24,
            token_lifetime_secs: 60 * 60 * 24,
        }
    }
}

/// Route policy rule lists, one set per route group.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    pub api: RuleSetConfig,
    pub ui: RuleSetConfig,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            api: RuleSetConfig {
                allow: Vec::new(),
                protect: vec!["*".to_string()],
                superuser: vec!["*/admin/*".to_string()],
            },
            ui: RuleSetConfig {
                allow: Vec::new(),
                protect: vec!["*".to_string()],
                superuser: Vec::new(),
            },
        }
    }
}

impl WeirConfig {
    /// Load configuration from an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        } else {
            builder = builder.add_source(File::with_name("weir").required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("WEIR")
                .prefix_separator("__")
                .separator("__"),
        );

        builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WeirConfig::default();
        assert_eq!(config.listen, "127.0.0.1:4200");
        assert!(config.auth.oidc_client_id.is_none());
        assert_eq!(config.auth.cookie_name, "weir-auth");
        assert_eq!(config.policy.api.protect, vec!["*"]);
        assert_eq!(config.policy.api.superuser, vec!["*/admin/*"]);
        assert!(config.policy.ui.superuser.is_empty());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = WeirConfig::load(None).unwrap();
        assert_eq!(config.auth.token_lifetime_secs, 86400);
    }
}
