use crate::{
    config::{HttpResolverConfig, normalize_endpoint},
    constants::HEADER_IS_RESOURCE_NAME,
    error::{ResolveError, ServiceError},
    models::{Project, ProjectRef},
};
use async_trait::async_trait;
use axum::http::StatusCode;
use reqwest::{Client, redirect::Policy};
use serde_json::Value;
use std::{collections::HashMap, time::Duration};
use tracing::{debug, instrument, warn};

/// Looks up the project that owns a namespace. `Ok(None)` means the project
/// does not exist, which is not an error.
#[async_trait]
pub trait ProjectResolver: Send + Sync {
    async fn resolve(&self, project: &ProjectRef) -> Result<Option<Project>, ResolveError>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticProjectResolver {
    by_id: HashMap<i64, Project>,
    ids_by_name: HashMap<String, i64>,
}

impl StaticProjectResolver {
    pub fn new(projects: impl IntoIterator<Item = Project>) -> Self {
        let mut resolver = Self::default();
        for project in projects {
            resolver.ids_by_name.insert(project.name.clone(), project.id);
            resolver.by_id.insert(project.id, project);
        }
        resolver
    }
}

#[async_trait]
impl ProjectResolver for StaticProjectResolver {
    async fn resolve(&self, project: &ProjectRef) -> Result<Option<Project>, ResolveError> {
        let id = match project {
            ProjectRef::ById(id) => Some(*id),
            ProjectRef::ByName(name) => self.ids_by_name.get(name).copied(),
        };
        Ok(id.and_then(|id| self.by_id.get(&id).cloned()))
    }
}

/// Resolves projects against a metadata service:
/// `GET {base_url}{projects_endpoint}/{name or id}`.
#[derive(Debug, Clone)]
pub struct HttpProjectResolver {
    base_url: String,
    projects_endpoint: String,
    client: Client,
}

impl HttpProjectResolver {
    pub fn new(cfg: &HttpResolverConfig) -> Result<Self, ServiceError> {
        let base_url = cfg.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ServiceError::Config(
                "resolver.http.baseUrl is required when resolver.backend=http".to_string(),
            ));
        }

        let timeout = Duration::from_millis(cfg.timeout_ms.max(250));
        let connect_timeout = timeout.min(Duration::from_secs(3));
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(15))
            .tcp_keepalive(Duration::from_secs(30))
            .redirect(Policy::limited(3))
            .build()
            .map_err(|_| ServiceError::Internal)?;

        let resolver = Self {
            base_url,
            projects_endpoint: normalize_endpoint(&cfg.projects_endpoint),
            client,
        };
        debug!(
            base_url = resolver.base_url,
            projects_endpoint = resolver.projects_endpoint,
            timeout_ms = cfg.timeout_ms,
            "initialized project metadata resolver"
        );
        Ok(resolver)
    }

    fn project_url(&self, project: &ProjectRef) -> (String, bool) {
        let (key, is_name) = match project {
            ProjectRef::ByName(name) => (urlencoding::encode(name).into_owned(), true),
            ProjectRef::ById(id) => (id.to_string(), false),
        };
        (
            format!("{}{}/{}", self.base_url, self.projects_endpoint, key),
            is_name,
        )
    }
}

#[async_trait]
impl ProjectResolver for HttpProjectResolver {
    #[instrument(skip(self), fields(project = %project))]
    async fn resolve(&self, project: &ProjectRef) -> Result<Option<Project>, ResolveError> {
        let (url, is_name) = self.project_url(project);
        let response = self
            .client
            .get(url)
            .header(HEADER_IS_RESOURCE_NAME, if is_name { "true" } else { "false" })
            .send()
            .await
            .map_err(|err| {
                warn!(error = ?err, "project metadata service unavailable");
                ResolveError::Unavailable
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("project not found");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ResolveError::Status(response.status().as_u16()));
        }

        let payload = response
            .json::<Value>()
            .await
            .map_err(|_| ResolveError::InvalidPayload)?;
        parse_project(&payload).map(Some)
    }
}

fn parse_project(payload: &Value) -> Result<Project, ResolveError> {
    let id = payload
        .get("id")
        .or_else(|| payload.get("project_id"))
        .and_then(Value::as_i64)
        .ok_or(ResolveError::InvalidPayload)?;
    let name = payload
        .get("name")
        .and_then(Value::as_str)
        .ok_or(ResolveError::InvalidPayload)?
        .to_string();
    let public = payload
        .get("public")
        .and_then(Value::as_bool)
        .or_else(|| {
            payload
                .get("metadata")
                .and_then(|metadata| metadata.get("public"))
                .and_then(|value| match value {
                    Value::Bool(flag) => Some(*flag),
                    Value::String(raw) => Some(raw.eq_ignore_ascii_case("true")),
                    _ => None,
                })
        })
        .unwrap_or(false);
    Ok(Project { id, name, public })
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolver() -> StaticProjectResolver {
        StaticProjectResolver::new(vec![
            Project {
                id: 1,
                name: "library".to_string(),
                public: true,
            },
            Project {
                id: 2,
                name: "team".to_string(),
                public: false,
            },
        ])
    }

    #[tokio::test]
    async fn static_resolver_finds_by_name_and_id() {
        let resolver = resolver();
        let by_name = resolver.resolve(&"team".into()).await.expect("resolve");
        assert_eq!(by_name.map(|project| project.id), Some(2));
        let by_id = resolver.resolve(&ProjectRef::ById(1)).await.expect("resolve");
        assert_eq!(by_id.map(|project| project.name), Some("library".to_string()));
    }

    #[tokio::test]
    async fn static_resolver_reports_unknown_projects_as_missing() {
        let resolver = resolver();
        assert_eq!(resolver.resolve(&"ghost".into()).await, Ok(None));
        assert_eq!(resolver.resolve(&ProjectRef::ById(99)).await, Ok(None));
    }

    #[test]
    fn parses_payload_with_nested_public_flag() {
        let project = parse_project(&json!({
            "project_id": 5,
            "name": "infra",
            "metadata": { "public": "true" }
        }))
        .expect("project");
        assert_eq!(
            project,
            Project {
                id: 5,
                name: "infra".to_string(),
                public: true
            }
        );
    }

    #[test]
    fn rejects_payload_without_id() {
        assert_eq!(
            parse_project(&json!({ "name": "infra" })),
            Err(ResolveError::InvalidPayload)
        );
    }
}
