use crate::{
    app::{AppState, build_router},
    auth::{IdentityProvider, StaticIdentityProvider},
    checker::Checker,
    config::{Config, PolicyBackend, ResolverBackend},
    error::ServiceError,
    observability,
    policy::HttpPolicy,
    project::{HttpProjectResolver, ProjectResolver, StaticProjectResolver},
    upstream::Upstream,
};
use std::sync::Arc;
use tracing::instrument;

#[instrument(skip(config))]
pub fn build_state(config: &Config) -> Result<AppState, ServiceError> {
    let resolver: Arc<dyn ProjectResolver> = match config.resolver.backend {
        ResolverBackend::Static => Arc::new(StaticProjectResolver::new(config.projects.clone())),
        ResolverBackend::Http => {
            let http = config.resolver.http.as_ref().ok_or_else(|| {
                ServiceError::Config("resolver.backend=http without resolver.http".to_string())
            })?;
            Arc::new(HttpProjectResolver::new(http)?)
        }
    };

    let mut identity = StaticIdentityProvider::new(&config.users, &config.robots);
    if config.policy.backend == PolicyBackend::Http {
        let http = config.policy.http.as_ref().ok_or_else(|| {
            ServiceError::Config("policy.backend=http without policy.http".to_string())
        })?;
        identity = identity.with_policy(HttpPolicy::new(http)?);
    }
    let identity: Arc<dyn IdentityProvider> = Arc::new(identity);

    Ok(AppState {
        identity,
        checker: Checker::new(resolver),
        upstream: Upstream::new(&config.upstream)?,
    })
}

pub async fn run(config: Config) -> Result<(), ServiceError> {
    let bind = config.bind;
    let state = build_state(&config)?;
    let upstream = state
        .upstream
        .as_ref()
        .map(|upstream| upstream.base_url().to_string())
        .unwrap_or_else(|| "<none>".to_string());
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;

    if config.upstream.url.is_none() {
        tracing::warn!("no upstream registry configured; authorized requests will receive 404");
    }

    tracing::info!(
        bind = %bind,
        upstream,
        resolver = ?config.resolver.backend,
        policy = ?config.policy.backend,
        projects = config.projects.len(),
        users = config.users.len(),
        robots = config.robots.len(),
        "regauthz listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServiceError::Io)
}

pub async fn run_standalone(config: Config) -> Result<(), ServiceError> {
    let default_level = startup_log_level(&config).to_string();
    let tracing_settings = observability::init_from_env(&default_level);
    tracing::debug!(
        log_filter = tracing_settings.filter,
        log_format = tracing_settings.log_format.as_str(),
        "initialized tracing subscriber"
    );
    run(config).await
}

pub async fn run_from_env() -> Result<(), ServiceError> {
    let config = Config::from_env().map_err(ServiceError::Config)?;
    run_standalone(config).await
}

fn startup_log_level(config: &Config) -> &str {
    config.log_level.as_str()
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let ctrl_c = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        let terminate = async {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                let _ = sigterm.recv().await;
            }
        };
        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
