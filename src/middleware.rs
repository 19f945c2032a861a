use crate::{
    artifact::RouteKind,
    checker::Checker,
    classifier::classify,
    error::AuthzError,
    models::ArtifactInfo,
    security::{SharedSecurityContext, display_name},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument, warn};

/// Authorizes a registry request using the security context and artifact
/// descriptor that earlier stages stored in the request extensions. Allowed
/// requests pass through untouched; everything else gets a bare 401.
#[instrument(skip_all, fields(method = %req.method(), path = req.uri().path()))]
pub async fn authorize(State(checker): State<Checker>, req: Request, next: Next) -> Response {
    let Some(ctx) = req.extensions().get::<SharedSecurityContext>().cloned() else {
        warn!("request reached authorization without a security context");
        return AuthzError::classification("missing security context").into_response();
    };

    let route = RouteKind::from_path(req.uri().path());
    let demands = classify(req.method(), route, req.extensions().get::<ArtifactInfo>());

    match checker.check(ctx.as_ref(), &demands).await {
        Ok(()) => {
            debug!(
                user = display_name(ctx.as_ref()),
                route = route.as_str(),
                "request authorized"
            );
            next.run(req).await
        }
        Err(err) => {
            warn!(
                user = display_name(ctx.as_ref()),
                context = ctx.name(),
                route = route.as_str(),
                denial = err.kind(),
                reason = %err,
                "request denied"
            );
            err.into_response()
        }
    }
}
