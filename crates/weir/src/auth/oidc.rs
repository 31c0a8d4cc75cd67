//! Minimal OpenID Connect client.
//!
//! Covers exactly what the login flows need: discovery, the authorization
//! redirect, the code exchange and the userinfo fetch. Identity claims come
//! from the userinfo endpoint; this server never decodes provider JWTs.

use reqwest::Url;
use serde::Deserialize;
use tracing::instrument;

use super::error::AuthError;

/// Endpoints from the provider's discovery document.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcEndpoints {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
}

/// Token response from the code exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Claims fetched from the userinfo endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcUserInfo {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
}

/// A configured OpenID Connect provider.
#[derive(Debug, Clone)]
pub struct OidcClient {
    client_id: String,
    client_secret: String,
    endpoints: OidcEndpoints,
}

impl OidcClient {
    /// Fetch the discovery document and build a client.
    #[instrument(skip(http, client_id, client_secret))]
    pub async fn discover(
        http: &reqwest::Client,
        client_id: String,
        client_secret: String,
        config_url: &str,
    ) -> Result<Self, AuthError> {
        let endpoints: OidcEndpoints = http
            .get(config_url)
            .send()
            .await
            .map_err(|e| AuthError::Oidc(e.to_string()))?
            .error_for_status()
            .map_err(|e| AuthError::Oidc(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::Oidc(format!("invalid discovery document: {e}")))?;

        Ok(Self {
            client_id,
            client_secret,
            endpoints,
        })
    }

    /// Client with known endpoints, for tests.
    pub fn with_endpoints(
        client_id: String,
        client_secret: String,
        endpoints: OidcEndpoints,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            endpoints,
        }
    }

    /// Build the authorization redirect URL.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, AuthError> {
        let url = Url::parse_with_params(
            &self.endpoints.authorization_endpoint,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("scope", "openid email profile"),
                ("state", state),
            ],
        )
        .map_err(|e| AuthError::Oidc(format!("invalid authorization endpoint: {e}")))?;

        Ok(url.into())
    }

    /// Exchange an authorization code for provider tokens.
    #[instrument(skip(self, http, code))]
    pub async fn exchange_code(
        &self,
        http: &reqwest::Client,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OidcTokens, AuthError> {
        let response = http
            .post(&self.endpoints.token_endpoint)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Oidc(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Oidc(format!(
                "code exchange failed with {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Oidc(format!("invalid token response: {e}")))
    }

    /// Fetch identity claims for an access token.
    #[instrument(skip(self, http, access_token))]
    pub async fn userinfo(
        &self,
        http: &reqwest::Client,
        access_token: &str,
    ) -> Result<OidcUserInfo, AuthError> {
        http.get(&self.endpoints.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Oidc(e.to_string()))?
            .error_for_status()
            .map_err(|e| AuthError::Oidc(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::Oidc(format!("invalid userinfo response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OidcClient {
        OidcClient::with_endpoints(
            "weir".to_string(),
            "secret".to_string(),
            OidcEndpoints {
                authorization_endpoint: "https://idp.example.com/authorize".to_string(),
                token_endpoint: "https://idp.example.com/token".to_string(),
                userinfo_endpoint: "https://idp.example.com/userinfo".to_string(),
            },
        )
    }

    #[test]
    fn test_authorization_url() {
        let url = client()
            .authorization_url("http://localhost:4200/auth/cookie/callback", "abc123")
            .unwrap();

        assert!(url.starts_with("https://idp.example.com/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=weir"));
        assert!(url.contains("state=abc123"));
        // The redirect URI must be query-encoded.
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A4200%2Fauth%2Fcookie%2Fcallback"));
    }

    #[test]
    fn test_userinfo_claims_parse_with_missing_fields() {
        let info: OidcUserInfo = serde_json::from_str(r#"{"sub": "abc"}"#).unwrap();
        assert_eq!(info.sub, "abc");
        assert!(info.email.is_none());
    }
}
