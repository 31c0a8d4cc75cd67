//! API request handlers, organized by domain:
//! - `auth`: password and OIDC login flows, logout, profile
//! - `cloud`: cloud-compatibility shim (CLI key handoff, redirects)
//! - `admin`: superuser-only user/token/model management
//! - `misc`: health check

mod admin;
mod auth;
mod cloud;
mod misc;

pub use admin::{
    admin_delete_row, admin_get_row, admin_list_models, admin_list_rows, admin_stats,
    activate_user, create_user, delete_user, get_user, list_tokens, list_users, revoke_token,
    deactivate_user, update_user,
};
pub use auth::{
    LoginRequest, TokenResponse, authorize_bearer, authorize_cookie, callback_bearer,
    callback_cookie, get_me, login, logout, oidc_login,
};
pub use cloud::{
    auth_client, automations_catchall, cloud_api_redirect, cloud_ui_redirect, my_workspaces,
};
pub use misc::{HealthResponse, health};
