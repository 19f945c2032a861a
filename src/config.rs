use crate::{
    constants::{DEFAULT_BIND, DEFAULT_DECISION_ENDPOINT, DEFAULT_PROJECTS_ENDPOINT},
    models::{Action, Project},
    security::Role,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use config::{Config as SettingsLoader, Environment};
use serde::Deserialize;
use std::{
    collections::{HashMap, HashSet},
    net::SocketAddr,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverBackend {
    Static,
    Http,
}

impl ResolverBackend {
    fn from_str(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("http") {
            Self::Http
        } else {
            Self::Static
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResolverConfig {
    pub base_url: String,
    pub projects_endpoint: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub backend: ResolverBackend,
    pub http: Option<HttpResolverConfig>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            backend: ResolverBackend::Static,
            http: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyBackend {
    Local,
    Http,
}

impl PolicyBackend {
    fn from_str(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("http") {
            Self::Http
        } else {
            Self::Local
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpPolicyConfig {
    pub base_url: String,
    pub decision_endpoint: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    pub backend: PolicyBackend,
    pub http: Option<HttpPolicyConfig>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            backend: PolicyBackend::Local,
            http: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    pub url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: 300_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserConfig {
    pub username: String,
    pub token: String,
    pub sys_admin: bool,
    pub project_roles: HashMap<i64, Role>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobotConfig {
    pub name: String,
    pub token: String,
    pub permissions: HashMap<i64, HashSet<Action>>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub log_level: String,
    pub upstream: UpstreamConfig,
    pub projects: Vec<Project>,
    pub resolver: ResolverConfig,
    pub users: Vec<UserConfig>,
    pub robots: Vec<RobotConfig>,
    pub policy: PolicyConfig,
}

#[derive(Debug)]
struct RawEnvConfig {
    config: Option<String>,
    config_base64: Option<String>,
    bind: Option<String>,
    log_level: Option<String>,
    upstream: Option<String>,
    upstream_timeout_ms: Option<String>,
    resolver_backend: Option<String>,
    resolver_http_base_url: Option<String>,
    resolver_http_projects_endpoint: Option<String>,
    resolver_http_timeout_ms: Option<String>,
    policy_backend: Option<String>,
    policy_http_base_url: Option<String>,
    policy_http_decision_endpoint: Option<String>,
    policy_http_timeout_ms: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let env_cfg = load_regauthz_env()?;
        let mut cfg = Self::defaults();
        cfg.apply_env_config_sources_if_present(&env_cfg)?;
        cfg.apply_env_overrides(&env_cfg);
        cfg.apply_port_override(load_process_env_value("port")?);
        Ok(cfg)
    }

    pub fn from_env_with_config_file(config_path: PathBuf) -> Result<Self, String> {
        let env_cfg = load_regauthz_env()?;
        let mut cfg = Self::defaults();
        cfg.apply_env_config_sources_if_present(&env_cfg)?;
        cfg.apply_yaml_overrides(Self::from_yaml_file(config_path)?);
        cfg.apply_env_overrides(&env_cfg);
        cfg.apply_port_override(load_process_env_value("port")?);
        Ok(cfg)
    }

    pub fn defaults() -> Self {
        Self {
            bind: DEFAULT_BIND.parse().expect("valid default bind"),
            log_level: "info".to_string(),
            upstream: UpstreamConfig::default(),
            projects: Vec::new(),
            resolver: ResolverConfig::default(),
            users: Vec::new(),
            robots: Vec::new(),
            policy: PolicyConfig::default(),
        }
    }

    fn apply_env_config_sources_if_present(
        &mut self,
        env_cfg: &RawEnvConfig,
    ) -> Result<(), String> {
        let config_path = env_cfg
            .config
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let config_b64 = env_cfg
            .config_base64
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());

        match (config_path, config_b64) {
            (Some(_), Some(_)) => Err(
                "REGAUTHZ_CONFIG and REGAUTHZ_CONFIG_BASE64 are both set; use only one".to_string(),
            ),
            (Some(path), None) => {
                let loaded = Self::from_yaml_file(PathBuf::from(path))
                    .map_err(|err| format!("failed to load REGAUTHZ_CONFIG={path}: {err}"))?;
                self.apply_yaml_overrides(loaded);
                Ok(())
            }
            (None, Some(value)) => {
                let compact = value
                    .chars()
                    .filter(|ch| !ch.is_ascii_whitespace())
                    .collect::<String>();
                let decoded = B64
                    .decode(compact)
                    .map_err(|err| format!("failed to decode REGAUTHZ_CONFIG_BASE64: {err}"))?;
                let yaml = String::from_utf8(decoded).map_err(|err| {
                    format!(
                        "failed to decode REGAUTHZ_CONFIG_BASE64: decoded bytes are not UTF-8 ({err})"
                    )
                })?;
                let loaded = Self::from_yaml_str("REGAUTHZ_CONFIG_BASE64", &yaml)
                    .map_err(|err| format!("failed to load REGAUTHZ_CONFIG_BASE64: {err}"))?;
                self.apply_yaml_overrides(loaded);
                Ok(())
            }
            (None, None) => Ok(()),
        }
    }

    fn apply_env_overrides(&mut self, env_cfg: &RawEnvConfig) {
        if let Some(bind) = parse_env_value::<SocketAddr>(env_cfg.bind.as_deref()) {
            self.bind = bind;
        }
        if let Some(value) = env_cfg.log_level.as_deref()
            && !value.trim().is_empty()
        {
            self.log_level = value.to_string();
        }

        if let Some(raw_upstream) = env_cfg.upstream.as_deref() {
            self.upstream.url = normalize_base_url(raw_upstream);
        }
        if let Some(parsed) = parse_env_value::<u64>(env_cfg.upstream_timeout_ms.as_deref()) {
            self.upstream.timeout_ms = parsed;
        }

        self.apply_resolver_env_overrides(env_cfg);
        self.apply_policy_env_overrides(env_cfg);
    }

    fn apply_port_override(&mut self, port_value: Option<String>) {
        // Container platforms inject PORT; listen publicly on it.
        if let Some(port) = parse_env_value::<u16>(port_value.as_deref()) {
            self.bind = SocketAddr::from(([0, 0, 0, 0], port));
        }
    }

    fn apply_resolver_env_overrides(&mut self, env_cfg: &RawEnvConfig) {
        if let Some(value) = env_cfg.resolver_backend.as_deref() {
            self.resolver.backend = ResolverBackend::from_str(value);
        }
        if self.resolver.backend == ResolverBackend::Static {
            self.resolver.http = None;
            return;
        }

        let mut http = self
            .resolver
            .http
            .clone()
            .unwrap_or_else(default_http_resolver_config);
        if let Some(value) = env_cfg.resolver_http_base_url.as_deref() {
            http.base_url = value.to_string();
        }
        if let Some(value) = env_cfg.resolver_http_projects_endpoint.as_deref()
            && !value.trim().is_empty()
        {
            http.projects_endpoint = value.to_string();
        }
        if let Some(parsed) = parse_env_value::<u64>(env_cfg.resolver_http_timeout_ms.as_deref()) {
            http.timeout_ms = parsed;
        }
        self.resolver.http = Some(http);
    }

    fn apply_policy_env_overrides(&mut self, env_cfg: &RawEnvConfig) {
        if let Some(value) = env_cfg.policy_backend.as_deref() {
            self.policy.backend = PolicyBackend::from_str(value);
        }
        if self.policy.backend == PolicyBackend::Local {
            self.policy.http = None;
            return;
        }

        let mut http = self
            .policy
            .http
            .clone()
            .unwrap_or_else(default_http_policy_config);
        if let Some(value) = env_cfg.policy_http_base_url.as_deref() {
            http.base_url = value.to_string();
        }
        if let Some(value) = env_cfg.policy_http_decision_endpoint.as_deref()
            && !value.trim().is_empty()
        {
            http.decision_endpoint = value.to_string();
        }
        if let Some(parsed) = parse_env_value::<u64>(env_cfg.policy_http_timeout_ms.as_deref()) {
            http.timeout_ms = parsed;
        }
        self.policy.http = Some(http);
    }

    fn apply_yaml_overrides(&mut self, loaded: Self) {
        self.bind = loaded.bind;
        self.log_level = loaded.log_level;
        self.upstream = loaded.upstream;
        self.projects = loaded.projects;
        self.resolver = loaded.resolver;
        self.users = loaded.users;
        self.robots = loaded.robots;
        self.policy = loaded.policy;
    }

    pub fn from_yaml_file(path: PathBuf) -> Result<Self, String> {
        let parsed = load_yaml_config(&path)?;
        Self::from_yaml_config(parsed)
    }

    pub fn from_yaml_str(source: &str, text: &str) -> Result<Self, String> {
        let parsed = serde_yaml::from_str::<YamlConfig>(text)
            .map_err(|err| format!("failed to parse {source}: {err}"))?;
        Self::from_yaml_config(parsed)
    }

    fn from_yaml_config(parsed: YamlConfig) -> Result<Self, String> {
        let bind = parse_bind(parsed.listen.as_deref())?;
        let log_level = parsed
            .log
            .and_then(|log| log.level)
            .unwrap_or_else(|| "info".to_string());
        let upstream = parsed
            .upstream
            .map(|upstream| UpstreamConfig {
                url: upstream.url.as_deref().and_then(normalize_base_url),
                timeout_ms: upstream.timeout_ms.unwrap_or(300_000),
            })
            .unwrap_or_default();

        let projects = parse_projects(parsed.projects.unwrap_or_default())?;
        let users = parse_users(parsed.users.unwrap_or_default())?;
        let robots = parse_robots(parsed.robots.unwrap_or_default())?;
        ensure_unique_tokens(&users, &robots)?;

        Ok(Self {
            bind,
            log_level,
            upstream,
            projects,
            resolver: parse_resolver_from_yaml(parsed.resolver)?,
            users,
            robots,
            policy: parse_policy_from_yaml(parsed.policy)?,
        })
    }
}

fn load_yaml_config(path: &Path) -> Result<YamlConfig, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    serde_yaml::from_str::<YamlConfig>(&text)
        .map_err(|err| format!("failed to parse {}: {err}", path.display()))
}

fn load_regauthz_env() -> Result<RawEnvConfig, String> {
    let settings = SettingsLoader::builder()
        .add_source(Environment::with_prefix("REGAUTHZ").try_parsing(false))
        .build()
        .map_err(|err| format!("failed to load REGAUTHZ_* environment: {err}"))?;

    Ok(RawEnvConfig {
        config: env_value_for_var(&settings, "REGAUTHZ_CONFIG"),
        config_base64: env_value_for_var(&settings, "REGAUTHZ_CONFIG_BASE64"),
        bind: env_value_for_var(&settings, "REGAUTHZ_BIND"),
        log_level: env_value_for_var(&settings, "REGAUTHZ_LOG_LEVEL"),
        upstream: env_value_for_var(&settings, "REGAUTHZ_UPSTREAM"),
        upstream_timeout_ms: env_value_for_var(&settings, "REGAUTHZ_UPSTREAM_TIMEOUT_MS"),
        resolver_backend: env_value_for_var(&settings, "REGAUTHZ_RESOLVER_BACKEND"),
        resolver_http_base_url: env_value_for_var(&settings, "REGAUTHZ_RESOLVER_HTTP_BASE_URL"),
        resolver_http_projects_endpoint: env_value_for_var(
            &settings,
            "REGAUTHZ_RESOLVER_HTTP_PROJECTS_ENDPOINT",
        ),
        resolver_http_timeout_ms: env_value_for_var(
            &settings,
            "REGAUTHZ_RESOLVER_HTTP_TIMEOUT_MS",
        ),
        policy_backend: env_value_for_var(&settings, "REGAUTHZ_POLICY_BACKEND"),
        policy_http_base_url: env_value_for_var(&settings, "REGAUTHZ_POLICY_HTTP_BASE_URL"),
        policy_http_decision_endpoint: env_value_for_var(
            &settings,
            "REGAUTHZ_POLICY_HTTP_DECISION_ENDPOINT",
        ),
        policy_http_timeout_ms: env_value_for_var(&settings, "REGAUTHZ_POLICY_HTTP_TIMEOUT_MS"),
    })
}

fn load_process_env_value(key: &str) -> Result<Option<String>, String> {
    let settings = SettingsLoader::builder()
        .add_source(Environment::default().try_parsing(false))
        .build()
        .map_err(|err| format!("failed to load process environment: {err}"))?;
    Ok(env_value(&settings, key))
}

fn env_value(settings: &SettingsLoader, key: &str) -> Option<String> {
    settings
        .get_string(key)
        .ok()
        .or_else(|| settings.get_string(&key.to_ascii_uppercase()).ok())
}

fn env_value_for_var(settings: &SettingsLoader, env_var: &str) -> Option<String> {
    let key = env_var
        .strip_prefix("REGAUTHZ_")
        .unwrap_or(env_var)
        .to_ascii_lowercase();
    env_value(settings, &key)
}

fn parse_env_value<T>(raw: Option<&str>) -> Option<T>
where
    T: std::str::FromStr,
{
    raw.and_then(|value| value.trim().parse::<T>().ok())
}

fn default_http_resolver_config() -> HttpResolverConfig {
    HttpResolverConfig {
        base_url: String::new(),
        projects_endpoint: DEFAULT_PROJECTS_ENDPOINT.to_string(),
        timeout_ms: 3_000,
    }
}

fn default_http_policy_config() -> HttpPolicyConfig {
    HttpPolicyConfig {
        base_url: String::new(),
        decision_endpoint: DEFAULT_DECISION_ENDPOINT.to_string(),
        timeout_ms: 3_000,
    }
}

/// `/path` form with no trailing slash, so it can be appended to a base URL.
pub(crate) fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn normalize_base_url(raw: &str) -> Option<String> {
    let url = raw.trim().trim_end_matches('/');
    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}

fn parse_bind(listen: Option<&str>) -> Result<SocketAddr, String> {
    let value = listen.unwrap_or(DEFAULT_BIND).trim();
    value
        .parse()
        .map_err(|err| format!("invalid listen address '{value}': {err}"))
}

fn parse_resolver_from_yaml(resolver: Option<YamlResolver>) -> Result<ResolverConfig, String> {
    let Some(resolver) = resolver else {
        return Ok(ResolverConfig::default());
    };
    let backend = resolver
        .backend
        .as_deref()
        .map(ResolverBackend::from_str)
        .unwrap_or(ResolverBackend::Static);

    match backend {
        ResolverBackend::Static => Ok(ResolverConfig {
            backend,
            http: None,
        }),
        ResolverBackend::Http => {
            let http = resolver.http.ok_or_else(|| {
                "resolver.http section is required when resolver.backend=http".to_string()
            })?;
            Ok(ResolverConfig {
                backend,
                http: Some(HttpResolverConfig {
                    base_url: http.base_url,
                    projects_endpoint: http
                        .projects_endpoint
                        .unwrap_or_else(|| DEFAULT_PROJECTS_ENDPOINT.to_string()),
                    timeout_ms: http.timeout_ms.unwrap_or(3_000),
                }),
            })
        }
    }
}

fn parse_policy_from_yaml(policy: Option<YamlPolicy>) -> Result<PolicyConfig, String> {
    let Some(policy) = policy else {
        return Ok(PolicyConfig::default());
    };
    let backend = policy
        .backend
        .as_deref()
        .map(PolicyBackend::from_str)
        .unwrap_or(PolicyBackend::Local);

    match backend {
        PolicyBackend::Local => Ok(PolicyConfig {
            backend,
            http: None,
        }),
        PolicyBackend::Http => {
            let http = policy.http.ok_or_else(|| {
                "policy.http section is required when policy.backend=http".to_string()
            })?;
            Ok(PolicyConfig {
                backend,
                http: Some(HttpPolicyConfig {
                    base_url: http.base_url,
                    decision_endpoint: http
                        .decision_endpoint
                        .unwrap_or_else(|| DEFAULT_DECISION_ENDPOINT.to_string()),
                    timeout_ms: http.timeout_ms.unwrap_or(3_000),
                }),
            })
        }
    }
}

fn parse_projects(items: Vec<YamlProject>) -> Result<Vec<Project>, String> {
    let mut ids = HashSet::new();
    let mut names = HashSet::new();
    let mut projects = Vec::with_capacity(items.len());
    for item in items {
        let name = item.name.trim().to_string();
        if name.is_empty() || name.contains('/') {
            return Err(format!("invalid project name '{}'", item.name));
        }
        if !ids.insert(item.id) {
            return Err(format!("duplicate project id {}", item.id));
        }
        if !names.insert(name.clone()) {
            return Err(format!("duplicate project name '{name}'"));
        }
        projects.push(Project {
            id: item.id,
            name,
            public: item.public.unwrap_or(false),
        });
    }
    Ok(projects)
}

fn parse_users(items: Vec<YamlUser>) -> Result<Vec<UserConfig>, String> {
    items
        .into_iter()
        .map(|item| {
            let username = item.username.trim().to_string();
            if username.is_empty() {
                return Err("user entries require a username".to_string());
            }
            let mut project_roles = HashMap::new();
            for binding in item.project_roles.unwrap_or_default() {
                if project_roles.insert(binding.project, binding.role).is_some() {
                    return Err(format!(
                        "user '{username}' has more than one role on project {}",
                        binding.project
                    ));
                }
            }
            Ok(UserConfig {
                username,
                token: item.token,
                sys_admin: item.sysadmin.unwrap_or(false),
                project_roles,
            })
        })
        .collect()
}

fn parse_robots(items: Vec<YamlRobot>) -> Result<Vec<RobotConfig>, String> {
    items
        .into_iter()
        .map(|item| {
            let name = item.name.trim().to_string();
            if name.is_empty() {
                return Err("robot entries require a name".to_string());
            }
            let mut permissions: HashMap<i64, HashSet<Action>> = HashMap::new();
            for grant in item.permissions.unwrap_or_default() {
                permissions
                    .entry(grant.project)
                    .or_default()
                    .extend(grant.actions);
            }
            Ok(RobotConfig {
                name,
                token: item.token,
                permissions,
            })
        })
        .collect()
}

fn ensure_unique_tokens(users: &[UserConfig], robots: &[RobotConfig]) -> Result<(), String> {
    let mut seen = HashSet::new();
    let tokens = users
        .iter()
        .map(|user| (user.username.as_str(), user.token.as_str()))
        .chain(
            robots
                .iter()
                .map(|robot| (robot.name.as_str(), robot.token.as_str())),
        );
    for (owner, token) in tokens {
        if token.trim().is_empty() {
            return Err(format!("'{owner}' has an empty token"));
        }
        if !seen.insert(token) {
            return Err(format!("token of '{owner}' is already assigned"));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct YamlConfig {
    listen: Option<String>,
    log: Option<YamlLog>,
    upstream: Option<YamlUpstream>,
    projects: Option<Vec<YamlProject>>,
    resolver: Option<YamlResolver>,
    users: Option<Vec<YamlUser>>,
    robots: Option<Vec<YamlRobot>>,
    policy: Option<YamlPolicy>,
}

#[derive(Debug, Deserialize)]
struct YamlLog {
    level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YamlUpstream {
    url: Option<String>,
    #[serde(rename = "timeoutMs")]
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct YamlProject {
    id: i64,
    name: String,
    public: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct YamlResolver {
    backend: Option<String>,
    http: Option<YamlResolverHttp>,
}

#[derive(Debug, Deserialize)]
struct YamlResolverHttp {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "projectsEndpoint")]
    projects_endpoint: Option<String>,
    #[serde(rename = "timeoutMs")]
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct YamlUser {
    username: String,
    token: String,
    sysadmin: Option<bool>,
    #[serde(rename = "projectRoles")]
    project_roles: Option<Vec<YamlRoleBinding>>,
}

#[derive(Debug, Deserialize)]
struct YamlRoleBinding {
    project: i64,
    role: Role,
}

#[derive(Debug, Deserialize)]
struct YamlRobot {
    name: String,
    token: String,
    permissions: Option<Vec<YamlGrant>>,
}

#[derive(Debug, Deserialize)]
struct YamlGrant {
    project: i64,
    actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
struct YamlPolicy {
    backend: Option<String>,
    http: Option<YamlPolicyHttp>,
}

#[derive(Debug, Deserialize)]
struct YamlPolicyHttp {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "decisionEndpoint")]
    decision_endpoint: Option<String>,
    #[serde(rename = "timeoutMs")]
    timeout_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::{Config, PolicyBackend, ResolverBackend, normalize_endpoint};
    use crate::{models::Action, security::Role};

    #[test]
    fn parses_projects_users_and_robots() {
        let cfg = Config::from_yaml_str(
            "inline",
            r#"
listen: 0.0.0.0:5050
projects:
  - id: 1
    name: library
    public: true
  - id: 2
    name: team
users:
  - username: alice
    token: alice-token
    projectRoles:
      - project: 2
        role: developer
  - username: admin
    token: admin-token
    sysadmin: true
robots:
  - name: robot$ci
    token: ci-token
    permissions:
      - project: 2
        actions: [pull, push]
"#,
        )
        .expect("parse");

        assert_eq!(cfg.bind.port(), 5050);
        assert_eq!(cfg.projects.len(), 2);
        assert!(cfg.projects[0].public);
        assert!(!cfg.projects[1].public);
        assert_eq!(cfg.users[0].project_roles.get(&2), Some(&Role::Developer));
        assert!(cfg.users[1].sys_admin);
        assert!(cfg.robots[0].permissions[&2].contains(&Action::Push));
        assert_eq!(cfg.resolver.backend, ResolverBackend::Static);
        assert_eq!(cfg.policy.backend, PolicyBackend::Local);
    }

    #[test]
    fn normalizes_collaborator_endpoints() {
        assert_eq!(normalize_endpoint("authorize"), "/authorize");
        assert_eq!(normalize_endpoint(" /api/projects/ "), "/api/projects");
        assert_eq!(normalize_endpoint("/v1/data/allow//"), "/v1/data/allow");
    }

    #[test]
    fn rejects_duplicate_project_names() {
        let err = Config::from_yaml_str(
            "inline",
            r#"
projects:
  - { id: 1, name: library }
  - { id: 2, name: library }
"#,
        )
        .expect_err("duplicate");
        assert_eq!(err, "duplicate project name 'library'");
    }

    #[test]
    fn rejects_shared_tokens() {
        let err = Config::from_yaml_str(
            "inline",
            r#"
users:
  - { username: alice, token: same }
robots:
  - { name: robot$ci, token: same }
"#,
        )
        .expect_err("shared token");
        assert_eq!(err, "token of 'robot$ci' is already assigned");
    }

    #[test]
    fn http_resolver_requires_section() {
        let err = Config::from_yaml_str(
            "inline",
            r#"
resolver:
  backend: http
"#,
        )
        .expect_err("missing http section");
        assert!(err.contains("resolver.http section is required"));
    }
}
