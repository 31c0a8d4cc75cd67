//! Authentication errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No usable credentials on the request.
    #[error("missing credentials")]
    MissingCredentials,

    /// Invalid authorization header format.
    #[error("invalid authorization header format")]
    InvalidAuthHeader,

    /// Unknown or expired access token.
    #[error("invalid or expired token")]
    InvalidToken,

    /// Invalid credentials.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Account exists but is deactivated.
    #[error("account is inactive")]
    InactiveUser,

    /// Route policy refused the request.
    #[error("not authorized")]
    NotAuthorized,

    /// Caller lacks the superuser flag.
    #[error("superuser privileges required")]
    SuperuserRequired,

    /// No path could be determined for the request.
    #[error("malformed request")]
    MalformedRequest,

    /// OAuth state mismatch or reuse.
    #[error("invalid authorization state")]
    InvalidState,

    /// Login attempted while no identity provider is configured.
    #[error("authentication is not configured")]
    OidcDisabled,

    /// Identity provider interaction failed.
    #[error("identity provider error: {0}")]
    Oidc(String),

    /// Internal error.
    #[error("internal auth error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct AuthErrorResponse {
    pub error: String,
    pub error_code: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            AuthError::MissingCredentials => (StatusCode::UNAUTHORIZED, "missing_credentials"),
            AuthError::InvalidAuthHeader => (StatusCode::UNAUTHORIZED, "invalid_auth_header"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token"),
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            AuthError::InactiveUser => (StatusCode::UNAUTHORIZED, "inactive_user"),
            AuthError::NotAuthorized => (StatusCode::UNAUTHORIZED, "not_authorized"),
            AuthError::SuperuserRequired => (StatusCode::FORBIDDEN, "superuser_required"),
            AuthError::MalformedRequest => (StatusCode::BAD_REQUEST, "malformed_request"),
            AuthError::InvalidState => (StatusCode::BAD_REQUEST, "invalid_state"),
            // Mirrors an unmounted login route rather than advertising the
            // missing configuration.
            AuthError::OidcDisabled => (StatusCode::NOT_FOUND, "not_found"),
            AuthError::Oidc(_) => (StatusCode::BAD_GATEWAY, "identity_provider_error"),
            AuthError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(AuthErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
        });

        (status, body).into_response()
    }
}
