//! Authentication.
//!
//! Opaque database-backed access tokens carried over bearer headers or the
//! auth cookie, an OpenID Connect client for browser/CLI login, and the
//! middlewares that attach the optional principal and enforce route
//! policies.

mod error;
mod middleware;
mod oidc;
mod tokens;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use crate::config::AuthSettings;

pub use error::AuthError;
pub use middleware::{
    CurrentUser, NEXT_COOKIE, RequireSuperuser, api_policy_middleware, identify_middleware,
    request_token, ui_policy_middleware,
};
pub use oidc::{OidcClient, OidcEndpoints, OidcTokens, OidcUserInfo};
pub use tokens::{AccessToken, TokenKind, TokenRepository};

/// Authentication state shared across handlers.
///
/// Built once at startup. When the OIDC settings are absent the provider is
/// `None`, `enabled()` is false, and route policies are not attached — the
/// server runs open.
#[derive(Clone)]
pub struct AuthState {
    pub cookie_name: String,
    pub cookie_max_age: i64,
    oidc: Option<Arc<OidcClient>>,
}

impl AuthState {
    /// Resolve settings into runtime state, fetching the OIDC discovery
    /// document eagerly when a provider is configured.
    pub async fn from_settings(settings: &AuthSettings, http: &reqwest::Client) -> Result<Self> {
        let oidc = match (
            &settings.oidc_client_id,
            &settings.oidc_client_secret,
            &settings.oidc_url,
        ) {
            (Some(client_id), Some(client_secret), Some(url)) => {
                let client = OidcClient::discover(http, client_id.clone(), client_secret.clone(), url)
                    .await
                    .with_context(|| format!("OIDC discovery failed for {url}"))?;
                Some(Arc::new(client))
            }
            _ => {
                warn!(
                    "OpenID Connect is disabled. To enable it, set auth.oidc_client_id, \
                     auth.oidc_client_secret and auth.oidc_url"
                );
                None
            }
        };

        Ok(Self {
            cookie_name: settings.cookie_name.clone(),
            cookie_max_age: settings.cookie_max_age,
            oidc,
        })
    }

    /// State with no identity provider, for tests and open deployments.
    pub fn disabled(settings: &AuthSettings) -> Self {
        Self {
            cookie_name: settings.cookie_name.clone(),
            cookie_max_age: settings.cookie_max_age,
            oidc: None,
        }
    }

    /// State around an already-built provider client, skipping discovery.
    pub fn with_client(settings: &AuthSettings, client: OidcClient) -> Self {
        Self {
            cookie_name: settings.cookie_name.clone(),
            cookie_max_age: settings.cookie_max_age,
            oidc: Some(Arc::new(client)),
        }
    }

    /// Whether an identity provider is configured.
    pub fn enabled(&self) -> bool {
        self.oidc.is_some()
    }

    pub fn oidc(&self) -> Option<&OidcClient> {
        self.oidc.as_deref()
    }
}
