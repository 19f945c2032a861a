use crate::{
    config::{HttpPolicyConfig, normalize_endpoint},
    error::ServiceError,
    models::{Action, Resource},
    security::{SecurityContext, SharedSecurityContext},
};
use async_trait::async_trait;
use axum::http::StatusCode;
use reqwest::{Client, redirect::Policy};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Remote capability predicate. Any failure to reach a decision is a denial.
#[derive(Debug, Clone)]
pub struct HttpPolicy {
    endpoint_url: String,
    client: Client,
}

impl HttpPolicy {
    pub fn new(cfg: &HttpPolicyConfig) -> Result<Self, ServiceError> {
        let base_url = cfg.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ServiceError::Config(
                "policy.http.baseUrl is required when policy.backend=http".to_string(),
            ));
        }

        let timeout = Duration::from_millis(cfg.timeout_ms.max(250));
        let connect_timeout = timeout.min(Duration::from_secs(3));
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(15))
            .pool_max_idle_per_host(2)
            .tcp_keepalive(Duration::from_secs(30))
            .http1_only()
            .redirect(Policy::limited(3))
            .build()
            .map_err(|_| ServiceError::Internal)?;

        debug!(
            base_url,
            decision_endpoint = cfg.decision_endpoint,
            timeout_ms = cfg.timeout_ms,
            "initialized external policy backend"
        );
        Ok(Self {
            endpoint_url: format!("{base_url}{}", normalize_endpoint(&cfg.decision_endpoint)),
            client,
        })
    }

    pub async fn decide(
        &self,
        ctx: &dyn SecurityContext,
        action: Action,
        resource: &Resource,
    ) -> bool {
        let payload = json!({
            "action": action.as_str(),
            "resource": resource.path(),
            "project_id": resource.project_id,
            "username": ctx.username(),
            "context": ctx.name(),
            "sysadmin": ctx.is_sys_admin(),
        });

        let response = match self.client.post(&self.endpoint_url).json(&payload).send().await {
            Ok(response) => response,
            Err(err) => {
                error!(
                    error = ?err,
                    action = action.as_str(),
                    project_id = resource.project_id,
                    "external policy backend unavailable"
                );
                return false;
            }
        };

        if response.status() == StatusCode::UNAUTHORIZED
            || response.status() == StatusCode::FORBIDDEN
        {
            return false;
        }
        if !response.status().is_success() {
            warn!(
                status = response.status().as_u16(),
                action = action.as_str(),
                project_id = resource.project_id,
                "external policy backend returned non-success"
            );
            return false;
        }

        let payload = match response.json::<Value>().await {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = ?err, "external policy backend returned invalid JSON");
                return false;
            }
        };
        payload
            .get("allowed")
            .and_then(Value::as_bool)
            .or_else(|| payload.as_bool())
            .unwrap_or(false)
    }
}

/// Keeps the identity of `inner` but asks the remote policy for capabilities.
#[derive(Debug, Clone)]
pub struct PolicyContext {
    inner: SharedSecurityContext,
    policy: HttpPolicy,
}

impl PolicyContext {
    pub fn new(inner: SharedSecurityContext, policy: HttpPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl SecurityContext for PolicyContext {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn username(&self) -> Option<&str> {
        self.inner.username()
    }

    fn is_authenticated(&self) -> bool {
        self.inner.is_authenticated()
    }

    fn is_sys_admin(&self) -> bool {
        self.inner.is_sys_admin()
    }

    async fn can(&self, action: Action, resource: &Resource) -> bool {
        self.policy.decide(self.inner.as_ref(), action, resource).await
    }
}
