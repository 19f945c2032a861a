use crate::{
    artifact, auth, auth::IdentityProvider, checker::Checker, middleware::authorize, upstream,
    upstream::Upstream,
};
use axum::{Router, middleware::from_fn, middleware::from_fn_with_state, routing::any};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub checker: Checker,
    pub upstream: Option<Upstream>,
}

/// Identity, then artifact parsing, then authorization, then the registry.
pub fn build_router(state: AppState) -> Router {
    protect(
        Router::new()
            .fallback(any(upstream::forward))
            .with_state(state.clone()),
        &state,
    )
}

/// Wraps any registry router with the authorization pipeline.
pub fn protect(router: Router, state: &AppState) -> Router {
    router
        .layer(from_fn_with_state(state.checker.clone(), authorize))
        .layer(from_fn(artifact::attach_artifact_info))
        .layer(from_fn_with_state(
            state.identity.clone(),
            auth::attach_security_context,
        ))
}
