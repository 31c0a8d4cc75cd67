//! Identification and policy-enforcement middleware.

use axum::{
    body::Body,
    extract::{FromRequestParts, OriginalUri, Request, State},
    http::{
        HeaderMap, StatusCode,
        header::{AUTHORIZATION, COOKIE, LOCATION, SET_COOKIE},
        request::Parts,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};
use weir_policy::{Decision, Denial};

use super::error::AuthError;
use crate::api::state::AppState;
use crate::policy::{API_POLICY, PolicyReason, UI_POLICY};
use crate::user::User;

/// Cookie stashing the URL a browser was denied on, replayed after login.
pub const NEXT_COOKIE: &str = "weir-next";

/// Extract a Bearer token from an Authorization header value.
fn bearer_token_from_header(header_value: &str) -> Result<&str, AuthError> {
    let mut parts = header_value.split_whitespace();
    let scheme = parts.next().ok_or(AuthError::InvalidAuthHeader)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidAuthHeader);
    }

    let token = parts.next().ok_or(AuthError::InvalidAuthHeader)?;
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }

    if parts.next().is_some() {
        return Err(AuthError::InvalidAuthHeader);
    }

    Ok(token)
}

fn token_from_cookie_header<'a>(cookie_header: &'a str, cookie_name: &str) -> Option<&'a str> {
    cookie_header.split(';').map(str::trim).find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        if name.trim() == cookie_name {
            Some(value.trim())
        } else {
            None
        }
    })
}

/// The token presented on a request, from either transport.
pub fn request_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| bearer_token_from_header(h).ok());

    // Browser clients carry the token in the auth cookie instead.
    bearer.or_else(|| {
        headers
            .get(COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|cookies| token_from_cookie_header(cookies, cookie_name))
    })
}

/// Authenticated user attached to the request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn email(&self) -> &str {
        &self.0.email
    }

    pub fn is_superuser(&self) -> bool {
        self.0.is_superuser
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::MissingCredentials)
    }
}

/// Require the superuser flag.
///
/// Handlers behind `*/admin/*` are already covered by the route policy;
/// this extractor keeps the requirement visible at the handler seam too.
#[derive(Debug, Clone)]
pub struct RequireSuperuser(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireSuperuser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::MissingCredentials)?;

        if !user.is_superuser() {
            return Err(AuthError::SuperuserRequired);
        }

        Ok(RequireSuperuser(user))
    }
}

/// Resolve the optional principal for a request.
///
/// Never rejects: route policies decide what an anonymous caller may do.
/// Inactive accounts and stale tokens both resolve to "no principal".
pub async fn identify_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(user) = resolve_user(&state, req.headers()).await {
        req.extensions_mut().insert(CurrentUser(user));
    }
    next.run(req).await
}

async fn resolve_user(state: &AppState, headers: &HeaderMap) -> Option<User> {
    let token = request_token(headers, &state.auth.cookie_name)?;

    let access = match state.tokens.get_valid(token).await {
        Ok(access) => access?,
        Err(err) => {
            warn!("token lookup failed: {err:#}");
            return None;
        }
    };

    let user = match state.users.get(&access.user_id).await {
        Ok(user) => user?,
        Err(err) => {
            warn!("user lookup failed: {err:#}");
            return None;
        }
    };

    user.is_active.then_some(user)
}

/// Full request path as the client sent it, surviving router nesting.
fn request_path(req: &Request<Body>) -> Option<String> {
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.path())
        .unwrap_or_else(|| req.uri().path());

    (!path.is_empty()).then(|| path.to_string())
}

/// Enforce the API policy: violations are hard 401s.
pub async fn api_policy_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    enforce(API_POLICY, state, req, next).await
}

/// Enforce the UI policy: violations bounce the browser to `/login`.
pub async fn ui_policy_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    enforce(UI_POLICY, state, req, next).await
}

async fn enforce(policy_name: &str, state: AppState, req: Request<Body>, next: Next) -> Response {
    let Some(policy) = state.policies.get(policy_name) else {
        // Policies are published at startup; a missing one is a wiring bug
        // and must fail closed.
        warn!("no policy published under {policy_name:?}, refusing request");
        return AuthError::Internal(format!("policy {policy_name} missing")).into_response();
    };

    let path = request_path(&req);
    let principal = req.extensions().get::<CurrentUser>().map(|u| u.0.clone());

    match policy.evaluate(path.as_deref(), principal.as_ref()) {
        Decision::Permit => next.run(req).await,
        Decision::Deny(Denial::MalformedRequest) => AuthError::MalformedRequest.into_response(),
        Decision::Deny(Denial::Violation(reason)) => {
            debug!(
                policy = policy_name,
                path = path.as_deref().unwrap_or(""),
                "request denied by route policy"
            );
            match reason {
                PolicyReason::Unauthorized => AuthError::NotAuthorized.into_response(),
                PolicyReason::RequiresLogin => {
                    redirect_login(path.as_deref().unwrap_or("/"), &req)
                }
            }
        }
    }
}

/// 302 to the login flow, remembering the denied URL for post-login replay.
fn redirect_login(path: &str, req: &Request<Body>) -> Response {
    let next = match req.uri().query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };

    let mut response = StatusCode::FOUND.into_response();
    response
        .headers_mut()
        .insert(LOCATION, "/login".parse().expect("static header value"));
    if let Ok(cookie) =
        format!("{NEXT_COOKIE}={next}; Path=/; Max-Age=600; HttpOnly; SameSite=Lax").parse()
    {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    response
}
