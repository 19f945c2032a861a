pub const HEADER_JSON: &str = "application/json";
pub const HEADER_IS_RESOURCE_NAME: &str = "x-is-resource-name";

pub const ANONYMOUS_USER: &str = "anonymous";

pub const REGISTRY_API_PREFIX: &str = "/v2";
pub const CATALOG_PATH: &str = "/v2/_catalog";

pub const DEFAULT_BIND: &str = "127.0.0.1:5001";
pub const DEFAULT_PROJECTS_ENDPOINT: &str = "/api/projects";
pub const DEFAULT_DECISION_ENDPOINT: &str = "/authorize";
