//! Admin-only handlers (superuser required).

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::auth::{AccessToken, RequireSuperuser};
use crate::user::{CreateUserRequest, UpdateUserRequest, UserInfo, UserListQuery, UserStats};

/// Aggregate counts for the admin overview.
#[instrument(skip(state, _user))]
pub async fn admin_stats(
    State(state): State<AppState>,
    RequireSuperuser(_user): RequireSuperuser,
) -> ApiResult<Json<UserStats>> {
    Ok(Json(state.users.stats().await?))
}

/// List users.
#[instrument(skip(state, _user, query))]
pub async fn list_users(
    State(state): State<AppState>,
    RequireSuperuser(_user): RequireSuperuser,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Json<Vec<UserInfo>>> {
    let users = state.users.list(query).await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// Create a user.
#[instrument(skip(state, user, request), fields(email = %request.email))]
pub async fn create_user(
    State(state): State<AppState>,
    RequireSuperuser(user): RequireSuperuser,
    Json(mut request): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserInfo>)> {
    if state.users.get_by_email(&request.email).await?.is_some() {
        return Err(ApiError::conflict(format!(
            "user {} already exists",
            request.email
        )));
    }

    if let Some(password) = request.password.take() {
        let hash = bcrypt::hash(&password, bcrypt::DEFAULT_COST)
            .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
        request.password = Some(hash);
    }

    let created = state.users.create(request).await?;
    info!(admin = %user.id(), user_id = %created.id, "admin created user");
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// Get a user.
#[instrument(skip(state, _user))]
pub async fn get_user(
    State(state): State<AppState>,
    RequireSuperuser(_user): RequireSuperuser,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserInfo>> {
    state
        .users
        .get(&user_id)
        .await?
        .map(|u| Json(u.into()))
        .ok_or_else(|| ApiError::not_found(format!("user {user_id} not found")))
}

/// Update a user.
#[instrument(skip(state, user, request))]
pub async fn update_user(
    State(state): State<AppState>,
    RequireSuperuser(user): RequireSuperuser,
    Path(user_id): Path<String>,
    Json(mut request): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserInfo>> {
    if let Some(password) = request.password.take() {
        let hash = bcrypt::hash(&password, bcrypt::DEFAULT_COST)
            .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
        request.password = Some(hash);
    }

    let updated = state
        .users
        .update(&user_id, request)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("user {user_id} not found")))?;

    info!(admin = %user.id(), user_id = %user_id, "admin updated user");
    Ok(Json(updated.into()))
}

/// Delete a user.
#[instrument(skip(state, user))]
pub async fn delete_user(
    State(state): State<AppState>,
    RequireSuperuser(user): RequireSuperuser,
    Path(user_id): Path<String>,
) -> ApiResult<StatusCode> {
    if user.id() == user_id {
        return Err(ApiError::bad_request("cannot delete the calling account"));
    }

    if !state.users.delete(&user_id).await? {
        return Err(ApiError::not_found(format!("user {user_id} not found")));
    }

    info!(admin = %user.id(), user_id = %user_id, "admin deleted user");
    Ok(StatusCode::NO_CONTENT)
}

/// Reactivate a user.
#[instrument(skip(state, _user))]
pub async fn activate_user(
    State(state): State<AppState>,
    RequireSuperuser(_user): RequireSuperuser,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserInfo>> {
    set_active(&state, &user_id, true).await
}

/// Deactivate a user; their tokens stop resolving immediately.
#[instrument(skip(state, _user))]
pub async fn deactivate_user(
    State(state): State<AppState>,
    RequireSuperuser(_user): RequireSuperuser,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserInfo>> {
    set_active(&state, &user_id, false).await
}

async fn set_active(state: &AppState, user_id: &str, active: bool) -> ApiResult<Json<UserInfo>> {
    state
        .users
        .set_active(user_id, active)
        .await?
        .map(|u| Json(u.into()))
        .ok_or_else(|| ApiError::not_found(format!("user {user_id} not found")))
}

/// List issued access tokens.
#[instrument(skip(state, _user))]
pub async fn list_tokens(
    State(state): State<AppState>,
    RequireSuperuser(_user): RequireSuperuser,
) -> ApiResult<Json<Vec<TokenSummary>>> {
    let tokens = state.tokens.list().await?;
    Ok(Json(tokens.into_iter().map(Into::into).collect()))
}

/// Token metadata with the secret truncated to its kind prefix.
#[derive(Debug, serde::Serialize)]
pub struct TokenSummary {
    pub token_prefix: String,
    pub user_id: String,
    pub created_at: String,
}

impl From<AccessToken> for TokenSummary {
    fn from(token: AccessToken) -> Self {
        let token_prefix = token.token.chars().take(8).collect();
        Self {
            token_prefix,
            user_id: token.user_id,
            created_at: token.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RevokeTokenRequest {
    pub token: String,
}

/// Revoke a token by its full value.
#[instrument(skip(state, user, request))]
pub async fn revoke_token(
    State(state): State<AppState>,
    RequireSuperuser(user): RequireSuperuser,
    Json(request): Json<RevokeTokenRequest>,
) -> ApiResult<StatusCode> {
    if !state.tokens.revoke(&request.token).await? {
        return Err(ApiError::not_found("token not found"));
    }

    info!(admin = %user.id(), "admin revoked token");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct RowPageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Registered model views.
#[instrument(skip(state, _user))]
pub async fn admin_list_models(
    State(state): State<AppState>,
    RequireSuperuser(_user): RequireSuperuser,
) -> Json<Vec<crate::admin::ModelView>> {
    Json(state.admin.views().to_vec())
}

/// One page of rows from a registered model.
#[instrument(skip(state, _user, query))]
pub async fn admin_list_rows(
    State(state): State<AppState>,
    RequireSuperuser(_user): RequireSuperuser,
    Path(model): Path<String>,
    Query(query): Query<RowPageQuery>,
) -> ApiResult<Json<crate::admin::RowPage>> {
    let view = state
        .admin
        .view(&model)
        .ok_or_else(|| ApiError::not_found(format!("model {model} not registered")))?
        .clone();

    let page = state
        .admin
        .list_rows(&view, query.limit.unwrap_or(50), query.offset.unwrap_or(0))
        .await?;
    Ok(Json(page))
}

/// A single row by primary key.
#[instrument(skip(state, _user))]
pub async fn admin_get_row(
    State(state): State<AppState>,
    RequireSuperuser(_user): RequireSuperuser,
    Path((model, key)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let view = state
        .admin
        .view(&model)
        .ok_or_else(|| ApiError::not_found(format!("model {model} not registered")))?
        .clone();

    state
        .admin
        .get_row(&view, &key)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("row {key} not found in {model}")))
}

/// Delete a row by primary key.
#[instrument(skip(state, user))]
pub async fn admin_delete_row(
    State(state): State<AppState>,
    RequireSuperuser(user): RequireSuperuser,
    Path((model, key)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let view = state
        .admin
        .view(&model)
        .ok_or_else(|| ApiError::not_found(format!("model {model} not registered")))?
        .clone();

    if !state.admin.delete_row(&view, &key).await? {
        return Err(ApiError::not_found(format!("row {key} not found in {model}")));
    }

    info!(admin = %user.id(), model = %model, "admin deleted row");
    Ok(StatusCode::NO_CONTENT)
}
