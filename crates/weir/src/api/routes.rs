//! API route definitions.

use axum::http::{HeaderValue, Method, header};
use axum::{
    Router, middleware,
    routing::{any, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, warn};

use crate::auth::{api_policy_middleware, identify_middleware, ui_policy_middleware};
use crate::middleware::{RouteHooks, route_hooks_middleware};

use super::handlers;
use super::state::AppState;

/// Create the application router.
///
/// Three groups, mirroring the deployment shape: public auth endpoints, the
/// `/api` group (hard 401 on policy violations) and the UI group (redirect
/// to login). Policy layers are attached only when an identity provider is
/// configured; without one the server runs open.
pub fn create_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let cors = build_cors_layer(&state);

    // Auth endpoints stay reachable for anonymous callers even though the
    // policy layers would permit them anyway on allow-listed setups.
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/login", get(handlers::oidc_login))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/bearer/authorize", get(handlers::authorize_bearer))
        .route("/auth/bearer/callback", get(handlers::callback_bearer))
        .route("/auth/cookie/authorize", get(handlers::authorize_cookie))
        .route("/auth/cookie/callback", get(handlers::callback_cookie))
        .with_state(state.clone());

    // Observation hook around workflow filter traffic.
    let filter_hooks = RouteHooks::new("*/filter")
        .expect("static pattern")
        .methods([Method::POST])
        .after(|method, path, status| {
            debug!(%method, path, %status, "observed filter response");
        });

    let mut api_routes = Router::new()
        .route("/me", get(handlers::get_me))
        .route("/me/workspaces", get(handlers::my_workspaces))
        .route("/automations/{*path}", any(handlers::automations_catchall))
        .route(
            "/accounts/{account_id}/workspaces/{workspace_id}/{*path}",
            any(handlers::cloud_api_redirect),
        )
        // Admin routes - stats and user management
        .route("/admin/stats", get(handlers::admin_stats))
        .route(
            "/admin/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route(
            "/admin/users/{user_id}",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .route(
            "/admin/users/{user_id}/activate",
            post(handlers::activate_user),
        )
        .route(
            "/admin/users/{user_id}/deactivate",
            post(handlers::deactivate_user),
        )
        // Admin routes - access tokens
        .route("/admin/tokens", get(handlers::list_tokens))
        .route("/admin/tokens/revoke", post(handlers::revoke_token))
        // Admin routes - generic model views
        .route("/admin/models", get(handlers::admin_list_models))
        .route("/admin/models/{model}/rows", get(handlers::admin_list_rows))
        .route(
            "/admin/models/{model}/rows/{key}",
            get(handlers::admin_get_row).delete(handlers::admin_delete_row),
        )
        .layer(middleware::from_fn_with_state(
            filter_hooks,
            route_hooks_middleware,
        ))
        .with_state(state.clone());

    if state.auth.enabled() {
        api_routes = api_routes.layer(middleware::from_fn_with_state(
            state.clone(),
            api_policy_middleware,
        ));
    }

    let mut ui_routes = Router::new()
        .route("/auth/client", get(handlers::auth_client))
        .route(
            "/account/{account_id}/workspace/{workspace_id}/{*path}",
            get(handlers::cloud_ui_redirect),
        )
        .with_state(state.clone());

    // The built front-end is the UI group's fallback, declared after the
    // auth routes so it inherits the policy layer below.
    if let Some(static_dir) = &state.static_dir {
        ui_routes = ui_routes.fallback_service(ServeDir::new(static_dir));
    }

    if state.auth.enabled() {
        ui_routes = ui_routes.layer(middleware::from_fn_with_state(
            state.clone(),
            ui_policy_middleware,
        ));
    }

    Router::new()
        .merge(public_routes)
        .nest("/api", api_routes)
        .merge(ui_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            identify_middleware,
        ))
        .layer(cors)
        .layer(trace_layer)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(state: &AppState) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::PATCH,
        Method::OPTIONS,
    ];

    let headers = [
        header::AUTHORIZATION,
        header::CONTENT_TYPE,
        header::ACCEPT,
        header::ORIGIN,
        header::COOKIE,
    ];

    let origins: Vec<HeaderValue> = state
        .allowed_origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                warn!("CORS: invalid origin in config: {}", origin);
                None
            })
        })
        .collect();

    if origins.is_empty() {
        // Same-origin deployments need no CORS at all.
        CorsLayer::new()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true)
    }
}
