//! Authentication handlers: password login, OIDC flows, logout, profile.

use axum::{
    Json,
    extract::{Query, State},
    http::{
        HeaderMap, StatusCode,
        header::{LOCATION, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::auth::{AuthError, CurrentUser, NEXT_COOKIE, OidcClient, TokenKind};
use crate::user::{OAuthLogin, User, UserInfo};

const OIDC_PROVIDER: &str = "openid";

/// Password login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Issued bearer token.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// Password login; issues a bearer token.
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user = state
        .users
        .get_by_email(&request.email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !user.verify_password(&request.password) {
        return Err(AuthError::InvalidCredentials.into());
    }
    if !user.is_active {
        return Err(AuthError::InactiveUser.into());
    }

    let token = state.tokens.create(&user.id, TokenKind::User).await?;
    state.users.touch_last_login(&user.id).await?;
    info!(user_id = %user.id, "password login");

    Ok(Json(TokenResponse::bearer(token.token)))
}

/// Revoke the presented token and clear the auth cookie.
#[instrument(skip(state, headers))]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    if let Some(token) = crate::auth::request_token(&headers, &state.auth.cookie_name) {
        state.tokens.revoke(token).await?;
    }

    let mut response = StatusCode::NO_CONTENT.into_response();
    append_cookie(&mut response, &clear_cookie(&state.auth.cookie_name));
    Ok(response)
}

/// Current user profile.
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<UserInfo> {
    Json(user.into())
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub authorization_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

/// Start the bearer (CLI) OAuth flow.
#[instrument(skip(state))]
pub async fn authorize_bearer(
    State(state): State<AppState>,
) -> ApiResult<Json<AuthorizeResponse>> {
    let url = authorization_url(&state, "bearer").await?;
    Ok(Json(AuthorizeResponse {
        authorization_url: url,
    }))
}

/// Start the cookie (browser) OAuth flow.
#[instrument(skip(state))]
pub async fn authorize_cookie(
    State(state): State<AppState>,
) -> ApiResult<Json<AuthorizeResponse>> {
    let url = authorization_url(&state, "cookie").await?;
    Ok(Json(AuthorizeResponse {
        authorization_url: url,
    }))
}

/// Browser login entry point: straight 302 to the identity provider.
#[instrument(skip(state))]
pub async fn oidc_login(State(state): State<AppState>) -> ApiResult<Response> {
    let url = authorization_url(&state, "cookie").await?;
    Ok(found(&url))
}

/// Finish the bearer flow: exchange the code and hand back an API token.
#[instrument(skip(state, params))]
pub async fn callback_bearer(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> ApiResult<Json<TokenResponse>> {
    let user = finish_oauth(&state, &params, "bearer").await?;
    let token = state.tokens.create(&user.id, TokenKind::User).await?;
    Ok(Json(TokenResponse::bearer(token.token)))
}

/// Finish the cookie flow: set the auth cookie and send the browser back
/// to wherever it was denied, or to the UI.
#[instrument(skip(state, headers, params))]
pub async fn callback_cookie(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> ApiResult<Response> {
    let user = finish_oauth(&state, &params, "cookie").await?;
    let token = state.tokens.create(&user.id, TokenKind::User).await?;

    let next = next_from_cookies(&headers).unwrap_or_else(|| state.ui_url.clone());

    // 307, preserving the replayed request.
    let mut response = StatusCode::TEMPORARY_REDIRECT.into_response();
    response.headers_mut().insert(
        LOCATION,
        next.parse()
            .map_err(|_| ApiError::bad_request("invalid redirect target"))?,
    );
    append_cookie(
        &mut response,
        &auth_cookie(&state.auth.cookie_name, &token.token, state.auth.cookie_max_age),
    );
    append_cookie(&mut response, &clear_cookie(NEXT_COOKIE));
    Ok(response)
}

fn oidc_client(state: &AppState) -> Result<&OidcClient, AuthError> {
    state.auth.oidc().ok_or(AuthError::OidcDisabled)
}

/// Build the provider redirect for a flow, stashing a one-shot state.
async fn authorization_url(state: &AppState, flow: &str) -> ApiResult<String> {
    let oidc = oidc_client(state)?;

    let nonce: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    state.tokens.insert_oauth_state(&nonce).await?;

    let redirect_uri = callback_uri(state, flow);
    Ok(oidc.authorization_url(&redirect_uri, &nonce)?)
}

fn callback_uri(state: &AppState, flow: &str) -> String {
    format!("{}/auth/{flow}/callback", state.public_url)
}

/// Shared callback tail: verify state, exchange the code, resolve the user.
async fn finish_oauth(
    state: &AppState,
    params: &CallbackParams,
    flow: &str,
) -> ApiResult<User> {
    let oidc = oidc_client(state)?;

    if !state.tokens.consume_oauth_state(&params.state).await? {
        warn!("authorization state rejected");
        return Err(AuthError::InvalidState.into());
    }

    let redirect_uri = callback_uri(state, flow);
    let tokens = oidc
        .exchange_code(&state.http_client, &params.code, &redirect_uri)
        .await?;
    let claims = oidc
        .userinfo(&state.http_client, &tokens.access_token)
        .await?;

    let email = claims
        .email
        .clone()
        .or(claims.preferred_username.clone())
        .ok_or_else(|| ApiError::bad_request("identity provider returned no email"))?;

    let expires_at = tokens
        .expires_in
        .map(|secs| (chrono::Utc::now() + chrono::Duration::seconds(secs)).to_rfc3339());

    let user = state
        .users
        .resolve_oauth_login(OAuthLogin {
            provider: OIDC_PROVIDER.to_string(),
            account_id: claims.sub.clone(),
            email,
            access_token: Some(tokens.access_token.clone()),
            refresh_token: tokens.refresh_token.clone(),
            expires_at,
        })
        .await?;

    if !user.is_active {
        return Err(AuthError::InactiveUser.into());
    }

    state.users.touch_last_login(&user.id).await?;
    info!(user_id = %user.id, flow, "OIDC login");
    Ok(user)
}

fn next_from_cookies(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    cookies.split(';').map(str::trim).find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name.trim() == NEXT_COOKIE && !value.is_empty()).then(|| value.trim().to_string())
    })
}

fn auth_cookie(name: &str, token: &str, max_age: i64) -> String {
    format!("{name}={token}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax")
}

fn clear_cookie(name: &str) -> String {
    format!("{name}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}

fn append_cookie(response: &mut Response, cookie: &str) {
    if let Ok(value) = cookie.parse() {
        response.headers_mut().append(SET_COOKIE, value);
    }
}

/// Plain 302.
fn found(location: &str) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    if let Ok(value) = location.parse() {
        response.headers_mut().insert(LOCATION, value);
    }
    response
}
