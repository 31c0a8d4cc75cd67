//! Route-scoped hook middleware.
//!
//! Hooks fire around the inner service only when the request path matches a
//! compiled glob pattern and the method is in the configured list. The
//! server uses this to observe workflow filter traffic without touching the
//! proxied handlers themselves.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use glob::Pattern;

type BeforeHook = Arc<dyn Fn(&Method, &str) + Send + Sync>;
type AfterHook = Arc<dyn Fn(&Method, &str, StatusCode) + Send + Sync>;

/// A glob-and-method scoped pair of request/response hooks.
#[derive(Clone)]
pub struct RouteHooks {
    pattern: Pattern,
    methods: Vec<Method>,
    before: Option<BeforeHook>,
    after: Option<AfterHook>,
}

impl RouteHooks {
    /// Hooks for paths matching `pattern`, with the default method list.
    pub fn new(pattern: &str) -> Result<Self, glob::PatternError> {
        Ok(Self {
            pattern: Pattern::new(pattern)?,
            methods: vec![Method::GET, Method::POST, Method::PATCH, Method::DELETE],
            before: None,
            after: None,
        })
    }

    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    pub fn before(mut self, hook: impl Fn(&Method, &str) + Send + Sync + 'static) -> Self {
        self.before = Some(Arc::new(hook));
        self
    }

    pub fn after(mut self, hook: impl Fn(&Method, &str, StatusCode) + Send + Sync + 'static) -> Self {
        self.after = Some(Arc::new(hook));
        self
    }

    fn applies(&self, method: &Method, path: &str) -> bool {
        self.pattern.matches(path) && self.methods.contains(method)
    }
}

/// Middleware entry point; attach with `middleware::from_fn_with_state`.
pub async fn route_hooks_middleware(
    State(hooks): State<RouteHooks>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let applies = hooks.applies(&method, &path);

    if applies && let Some(before) = &hooks.before {
        before(&method, &path);
    }

    let response = next.run(req).await;

    if applies && let Some(after) = &hooks.after {
        after(&method, &path, response.status());
    }

    response
}
