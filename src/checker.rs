use crate::{
    classifier::{Demand, Demands},
    error::{AuthzError, ResolutionCause},
    models::{Action, ProjectRef, Resource},
    project::ProjectResolver,
    security::{SecurityContext, display_name},
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[derive(Clone)]
pub struct Checker {
    resolver: Arc<dyn ProjectResolver>,
}

impl std::fmt::Debug for Checker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checker").finish_non_exhaustive()
    }
}

impl Checker {
    pub fn new(resolver: Arc<dyn ProjectResolver>) -> Self {
        Self { resolver }
    }

    /// Succeeds only when every demand holds; stops at the first denial.
    #[instrument(skip_all, fields(user = display_name(ctx), demands = demands.iter().count()))]
    pub async fn check(
        &self,
        ctx: &dyn SecurityContext,
        demands: &Demands,
    ) -> Result<(), AuthzError> {
        if demands.is_deny() {
            return Err(AuthzError::classification("no authorization rule matched"));
        }
        for demand in demands.iter() {
            self.check_demand(ctx, demand).await?;
        }
        Ok(())
    }

    async fn check_demand(
        &self,
        ctx: &dyn SecurityContext,
        demand: &Demand,
    ) -> Result<(), AuthzError> {
        match demand {
            Demand::SystemAdmin => {
                if ctx.is_sys_admin() {
                    return Ok(());
                }
                if !ctx.is_authenticated() {
                    return Err(AuthzError::Unauthenticated);
                }
                Err(AuthzError::capability(Action::List, "catalog"))
            }
            Demand::Authenticated => {
                if ctx.is_authenticated() {
                    Ok(())
                } else {
                    Err(AuthzError::Unauthenticated)
                }
            }
            Demand::Project { action, project } => {
                self.check_project(ctx, *action, project).await
            }
        }
    }

    async fn check_project(
        &self,
        ctx: &dyn SecurityContext,
        action: Action,
        project_ref: &ProjectRef,
    ) -> Result<(), AuthzError> {
        let project = match self.resolver.resolve(project_ref).await {
            Ok(Some(project)) => project,
            Ok(None) => {
                return Err(AuthzError::ResolutionFailure {
                    project: project_ref.to_string(),
                    cause: ResolutionCause::NotFound,
                });
            }
            Err(err) => {
                warn!(project = %project_ref, error = %err, "project resolution failed");
                return Err(AuthzError::ResolutionFailure {
                    project: project_ref.to_string(),
                    cause: err.into(),
                });
            }
        };

        if action == Action::Pull && project.public {
            debug!(project = project.name, "public project read");
            return Ok(());
        }
        if !ctx.is_authenticated() {
            return Err(AuthzError::Unauthenticated);
        }

        let resource = Resource::repository(project.id);
        if ctx.can(action, &resource).await {
            debug!(
                project = project.name,
                resource = resource.path(),
                action = action.as_str(),
                "capability granted"
            );
            return Ok(());
        }
        Err(AuthzError::capability(action, project.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ResolveError,
        models::Project,
        project::StaticProjectResolver,
        security::{AnonymousContext, LocalUserContext, Role},
    };
    use async_trait::async_trait;
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    fn projects() -> StaticProjectResolver {
        StaticProjectResolver::new(vec![
            Project {
                id: 1,
                name: "library".to_string(),
                public: true,
            },
            Project {
                id: 2,
                name: "private".to_string(),
                public: false,
            },
        ])
    }

    fn checker() -> Checker {
        Checker::new(Arc::new(projects()))
    }

    fn demand(action: Action, project: &str) -> Demands {
        let artifact = crate::models::ArtifactInfo {
            repository: format!("{project}/app"),
            reference: "latest".to_string(),
            project_name: project.to_string(),
            blob_mount: None,
        };
        let method = match action {
            Action::Pull => axum::http::Method::GET,
            _ => axum::http::Method::PUT,
        };
        crate::classifier::classify(
            &method,
            crate::artifact::RouteKind::Manifest,
            Some(&artifact),
        )
    }

    #[tokio::test]
    async fn public_pull_bypasses_authentication() {
        let result = checker()
            .check(&AnonymousContext, &demand(Action::Pull, "library"))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn public_push_still_requires_authentication() {
        let result = checker()
            .check(&AnonymousContext, &demand(Action::Push, "library"))
            .await;
        assert!(matches!(result, Err(AuthzError::Unauthenticated)));
    }

    #[tokio::test]
    async fn private_project_uses_capability_predicate() {
        let guest = LocalUserContext::new("bob", false, HashMap::from([(2, Role::Guest)]));
        assert!(
            checker()
                .check(&guest, &demand(Action::Pull, "private"))
                .await
                .is_ok()
        );
        let denied = checker()
            .check(&guest, &demand(Action::Push, "private"))
            .await;
        assert!(matches!(denied, Err(AuthzError::CapabilityDenied { .. })));
    }

    #[tokio::test]
    async fn unknown_project_denies_even_for_admins() {
        let admin = LocalUserContext::new("admin", true, HashMap::new());
        let denied = checker().check(&admin, &demand(Action::Pull, "ghost")).await;
        assert!(matches!(
            denied,
            Err(AuthzError::ResolutionFailure {
                cause: ResolutionCause::NotFound,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn empty_demands_deny() {
        let admin = LocalUserContext::new("admin", true, HashMap::new());
        let denied = checker().check(&admin, &Demands::deny()).await;
        assert!(matches!(
            denied,
            Err(AuthzError::ClassificationFailure { .. })
        ));
    }

    #[tokio::test]
    async fn catalog_demand_needs_system_admin() {
        let catalog = crate::classifier::classify(
            &axum::http::Method::GET,
            crate::artifact::RouteKind::Catalog,
            None,
        );
        let admin = LocalUserContext::new("admin", true, HashMap::new());
        let user = LocalUserContext::new("alice", false, HashMap::from([(2, Role::ProjectAdmin)]));
        assert!(checker().check(&admin, &catalog).await.is_ok());
        assert!(matches!(
            checker().check(&user, &catalog).await,
            Err(AuthzError::CapabilityDenied { .. })
        ));
        assert!(matches!(
            checker().check(&AnonymousContext, &catalog).await,
            Err(AuthzError::Unauthenticated)
        ));
    }

    struct FailingResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProjectResolver for FailingResolver {
        async fn resolve(&self, _project: &ProjectRef) -> Result<Option<Project>, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ResolveError::Unavailable)
        }
    }

    #[tokio::test]
    async fn resolver_errors_deny_without_retry() {
        let resolver = Arc::new(FailingResolver {
            calls: AtomicUsize::new(0),
        });
        let checker = Checker::new(resolver.clone());
        let admin = LocalUserContext::new("admin", true, HashMap::new());
        let denied = checker.check(&admin, &demand(Action::Pull, "library")).await;
        assert!(matches!(
            denied,
            Err(AuthzError::ResolutionFailure {
                cause: ResolutionCause::Error(ResolveError::Unavailable),
                ..
            })
        ));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }
}
