use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Pull,
    /// Publishing and deleting artifacts; the protocol has no separate delete scope.
    Push,
    List,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Pull => "pull",
            Action::Push => "push",
            Action::List => "list",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A project lookup key: either the human name or the durable id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProjectRef {
    ByName(String),
    ById(i64),
}

impl From<&str> for ProjectRef {
    fn from(name: &str) -> Self {
        ProjectRef::ByName(name.to_string())
    }
}

impl From<i64> for ProjectRef {
    fn from(id: i64) -> Self {
        ProjectRef::ById(id)
    }
}

impl fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectRef::ByName(name) => f.write_str(name),
            ProjectRef::ById(id) => write!(f, "#{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub public: bool,
}

/// The repositories of a resolved project. Carries only the project id, so
/// permission checks never depend on a name that may have been reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resource {
    pub project_id: i64,
}

impl Resource {
    pub fn repository(project_id: i64) -> Self {
        Self { project_id }
    }

    pub fn path(&self) -> String {
        format!("/project/{}/repository", self.project_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactInfo {
    pub repository: String,
    pub reference: String,
    pub project_name: String,
    pub blob_mount: Option<BlobMount>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMount {
    pub repository: String,
    pub project_name: String,
    pub digest: String,
}

/// First path component of a repository name, or an empty string for
/// single-component names which have no owning project.
pub fn project_name_of(repository: &str) -> &str {
    match repository.split_once('/') {
        Some((project, rest)) if !rest.is_empty() => project,
        _ => "",
    }
}
