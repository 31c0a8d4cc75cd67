//! Cloud-compatibility shim.
//!
//! CLI and UI builds pointed at the hosted service expect a handful of
//! account/workspace-shaped endpoints. This module fakes just enough of
//! them for those clients to work against a self-hosted server.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::auth::{CurrentUser, TokenKind};

/// Workspace entry as the hosted API shapes it.
#[derive(Debug, Serialize)]
pub struct WorkspaceInfo {
    pub account_id: String,
    pub account_name: String,
    pub account_handle: String,
    pub workspace_id: String,
    pub workspace_name: String,
    pub workspace_description: String,
    pub workspace_handle: String,
}

/// CLI key handoff: mint a token and deliver it to the waiting CLI.
///
/// The CLI starts a local HTTP server and passes its base URL as
/// `callback`; we POST the new API key to `<callback>/success` (or an error
/// to `<callback>/failure`) and then send the browser to the UI.
#[instrument(skip(state, user, params))]
pub async fn auth_client(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let Some(callback) = params.get("callback") else {
        return Err(ApiError::bad_request("missing callback parameter"));
    };
    let success_url = format!("{callback}/success");
    let failure_url = format!("{callback}/failure");

    let token = state.tokens.create(&user.id, TokenKind::User).await?;

    let delivery = state
        .http_client
        .post(&success_url)
        .json(&json!({ "api_key": token.token }))
        .send()
        .await;

    match delivery {
        Ok(response) if response.status().is_success() => {
            info!(user_id = %user.id, "delivered API key to CLI");
        }
        Ok(response) => {
            let reason = response.text().await.unwrap_or_default();
            warn!("CLI rejected API key delivery: {reason}");
            let _ = state
                .http_client
                .post(&failure_url)
                .json(&json!({ "reason": reason }))
                .send()
                .await;
            return Err(ApiError::bad_request("key delivery failed"));
        }
        Err(err) => {
            warn!("could not reach CLI callback: {err}");
            return Err(ApiError::bad_request("key delivery failed"));
        }
    }

    let mut response = StatusCode::FOUND.into_response();
    if let Ok(value) = state.ui_url.parse() {
        response.headers_mut().insert(LOCATION, value);
    }
    Ok(response)
}

/// Hosted UI links carry account/workspace segments; strip them.
pub async fn cloud_ui_redirect(
    Path((_account_id, _workspace_id, path)): Path<(String, String, String)>,
) -> Redirect {
    Redirect::temporary(&format!("/{path}"))
}

/// Hosted API links carry account/workspace segments; strip them.
pub async fn cloud_api_redirect(
    Path((_account_id, _workspace_id, path)): Path<(String, String, String)>,
) -> Redirect {
    Redirect::temporary(&format!("/api/{path}"))
}

/// Automations do not exist on the self-hosted server; answer all of it
/// with an empty object so clients treat the feature as absent.
pub async fn automations_catchall(Path(_path): Path<String>) -> Json<Value> {
    Json(json!({}))
}

/// The single synthetic workspace backing this server.
#[instrument(skip(user))]
pub async fn my_workspaces(CurrentUser(user): CurrentUser) -> Json<Vec<WorkspaceInfo>> {
    Json(vec![WorkspaceInfo {
        account_id: user.id.clone(),
        account_name: user.email.clone(),
        account_handle: "weir".to_string(),
        workspace_id: user.id,
        workspace_name: user.email,
        workspace_description: "weir".to_string(),
        workspace_handle: "weir".to_string(),
    }])
}
