use crate::{
    config::{RobotConfig, UserConfig},
    policy::{HttpPolicy, PolicyContext},
    security::{AnonymousContext, LocalUserContext, RobotContext, SharedSecurityContext},
};
use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, instrument, warn};

/// Credentials were presented but did not identify anyone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid credentials")]
pub struct InvalidCredentials;

impl IntoResponse for InvalidCredentials {
    fn into_response(self) -> Response {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

/// Establishes who is calling. Runs before authorization and never makes
/// permission decisions itself.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn security_context(
        &self,
        headers: &HeaderMap,
    ) -> Result<SharedSecurityContext, InvalidCredentials>;
}

/// Maps configured tokens to users and robot accounts. Accepts
/// `Bearer <token>` and `Basic base64(name:token)`; the basic form must
/// name the token's owner.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    by_token: HashMap<String, (String, SharedSecurityContext)>,
    policy: Option<HttpPolicy>,
}

impl StaticIdentityProvider {
    pub fn new(users: &[UserConfig], robots: &[RobotConfig]) -> Self {
        let mut by_token: HashMap<String, (String, SharedSecurityContext)> = HashMap::new();
        for user in users {
            let ctx: SharedSecurityContext = Arc::new(LocalUserContext::new(
                user.username.clone(),
                user.sys_admin,
                user.project_roles.clone(),
            ));
            by_token.insert(user.token.clone(), (user.username.clone(), ctx));
        }
        for robot in robots {
            let ctx: SharedSecurityContext = Arc::new(RobotContext::new(
                robot.name.clone(),
                robot.permissions.clone(),
            ));
            by_token.insert(robot.token.clone(), (robot.name.clone(), ctx));
        }
        Self {
            by_token,
            policy: None,
        }
    }

    /// Delegate capability checks of every identity to a remote policy.
    pub fn with_policy(mut self, policy: HttpPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    fn lookup(&self, token: &str, claimed_name: Option<&str>) -> Option<SharedSecurityContext> {
        let (owner, ctx) = self.by_token.get(token)?;
        if claimed_name.is_some_and(|name| name != owner) {
            return None;
        }
        let ctx: SharedSecurityContext = match &self.policy {
            Some(policy) => Arc::new(PolicyContext::new(ctx.clone(), policy.clone())),
            None => ctx.clone(),
        };
        Some(ctx)
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn security_context(
        &self,
        headers: &HeaderMap,
    ) -> Result<SharedSecurityContext, InvalidCredentials> {
        let Some(raw) = headers.get(header::AUTHORIZATION) else {
            return Ok(Arc::new(AnonymousContext));
        };
        let raw = raw.to_str().map_err(|_| InvalidCredentials)?;
        let credentials = parse_credentials(raw).ok_or_else(|| {
            warn!(
                authorization_scheme = raw.split_whitespace().next().unwrap_or("<unknown>"),
                "malformed authorization header"
            );
            InvalidCredentials
        })?;

        let ctx = self
            .lookup(&credentials.token, credentials.name.as_deref())
            .ok_or_else(|| {
                warn!("credentials rejected");
                InvalidCredentials
            })?;
        debug!(user = ctx.username().unwrap_or_default(), "credentials accepted");
        Ok(ctx)
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Credentials {
    name: Option<String>,
    token: String,
}

fn parse_credentials(value: &str) -> Option<Credentials> {
    let (scheme, rest) = value.trim().split_once(' ')?;
    let rest = rest.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !rest.is_empty() {
        return Some(Credentials {
            name: None,
            token: rest.to_string(),
        });
    }
    if scheme.eq_ignore_ascii_case("basic") {
        let decoded = B64.decode(rest).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (name, token) = decoded.split_once(':')?;
        if name.is_empty() || token.is_empty() {
            return None;
        }
        return Some(Credentials {
            name: Some(name.to_string()),
            token: token.to_string(),
        });
    }
    None
}

/// Stores the caller's security context in the request extensions.
#[instrument(skip_all, fields(method = %req.method(), path = req.uri().path()))]
pub async fn attach_security_context(
    State(provider): State<Arc<dyn IdentityProvider>>,
    mut req: Request,
    next: Next,
) -> Response {
    match provider.security_context(req.headers()).await {
        Ok(ctx) => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Err(err) => err.into_response(),
    }
}
