use crate::{
    artifact::RouteKind,
    models::{Action, ArtifactInfo, ProjectRef},
};
use axum::http::Method;

/// A single requirement the caller must meet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Demand {
    SystemAdmin,
    Authenticated,
    Project { action: Action, project: ProjectRef },
}

/// Every demand must hold. An empty set never authorizes anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Demands(Vec<Demand>);

impl Demands {
    pub fn deny() -> Self {
        Self(Vec::new())
    }

    pub fn is_deny(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Demand> {
        self.0.iter()
    }

    fn one(demand: Demand) -> Self {
        Self(vec![demand])
    }

    fn on_project(action: Action, project_name: &str) -> Self {
        if project_name.is_empty() {
            return Self::deny();
        }
        Self::one(Demand::Project {
            action,
            project: project_name.into(),
        })
    }
}

/// Maps method and endpoint family onto what the caller must be allowed to
/// do. Combinations outside the table classify as deny.
pub fn classify(method: &Method, route: RouteKind, artifact: Option<&ArtifactInfo>) -> Demands {
    match route {
        RouteKind::Catalog if *method == Method::GET => return Demands::one(Demand::SystemAdmin),
        RouteKind::Base if *method == Method::GET || *method == Method::HEAD => {
            return Demands::one(Demand::Authenticated);
        }
        RouteKind::Catalog | RouteKind::Base | RouteKind::Unknown => return Demands::deny(),
        RouteKind::Manifest | RouteKind::TagList | RouteKind::Blob | RouteKind::BlobUpload => {}
    }

    let Some(artifact) = artifact else {
        return Demands::deny();
    };
    let project = artifact.project_name.as_str();

    let is_read = *method == Method::GET || *method == Method::HEAD;
    let is_write = *method == Method::PUT
        || *method == Method::PATCH
        || *method == Method::POST
        || *method == Method::DELETE;

    match route {
        _ if is_read => Demands::on_project(Action::Pull, project),
        RouteKind::BlobUpload if *method == Method::POST && artifact.blob_mount.is_some() => {
            classify_blob_mount(artifact)
        }
        RouteKind::Manifest | RouteKind::Blob | RouteKind::BlobUpload if is_write => {
            Demands::on_project(Action::Push, project)
        }
        _ => Demands::deny(),
    }
}

fn classify_blob_mount(artifact: &ArtifactInfo) -> Demands {
    let Some(mount) = artifact.blob_mount.as_ref() else {
        return Demands::deny();
    };
    if artifact.project_name.is_empty() || mount.project_name.is_empty() {
        return Demands::deny();
    }
    Demands(vec![
        Demand::Project {
            action: Action::Push,
            project: artifact.project_name.as_str().into(),
        },
        Demand::Project {
            action: Action::Pull,
            project: mount.project_name.as_str().into(),
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlobMount;

    fn artifact(project: &str) -> ArtifactInfo {
        ArtifactInfo {
            repository: format!("{project}/hello-world"),
            reference: "v1".to_string(),
            project_name: project.to_string(),
            blob_mount: None,
        }
    }

    fn mount_artifact(dest: &str, source: &str) -> ArtifactInfo {
        ArtifactInfo {
            blob_mount: Some(BlobMount {
                repository: format!("{source}/ubuntu"),
                project_name: source.to_string(),
                digest: "sha256:abc".to_string(),
            }),
            ..artifact(dest)
        }
    }

    fn project(action: Action, name: &str) -> Demand {
        Demand::Project {
            action,
            project: name.into(),
        }
    }

    #[test]
    fn reads_require_pull() {
        let info = artifact("library");
        for method in [Method::GET, Method::HEAD] {
            for route in [
                RouteKind::Manifest,
                RouteKind::TagList,
                RouteKind::Blob,
                RouteKind::BlobUpload,
            ] {
                let demands = classify(&method, route, Some(&info));
                assert_eq!(demands, Demands::one(project(Action::Pull, "library")));
            }
        }
    }

    #[test]
    fn writes_and_deletes_require_push() {
        let info = artifact("library");
        for method in [Method::PUT, Method::PATCH, Method::POST, Method::DELETE] {
            for route in [RouteKind::Manifest, RouteKind::Blob, RouteKind::BlobUpload] {
                let demands = classify(&method, route, Some(&info));
                assert_eq!(demands, Demands::one(project(Action::Push, "library")));
            }
        }
    }

    #[test]
    fn blob_mount_requires_push_on_target_and_pull_on_source() {
        let info = mount_artifact("project_1", "project_2");
        let demands = classify(&Method::POST, RouteKind::BlobUpload, Some(&info));
        assert_eq!(
            demands,
            Demands(vec![
                project(Action::Push, "project_1"),
                project(Action::Pull, "project_2"),
            ])
        );
    }

    #[test]
    fn blob_mount_with_empty_source_project_denies() {
        let info = mount_artifact("project_1", "");
        assert!(classify(&Method::POST, RouteKind::BlobUpload, Some(&info)).is_deny());
    }

    #[test]
    fn catalog_requires_system_admin() {
        assert_eq!(
            classify(&Method::GET, RouteKind::Catalog, None),
            Demands::one(Demand::SystemAdmin)
        );
        assert!(classify(&Method::DELETE, RouteKind::Catalog, None).is_deny());
    }

    #[test]
    fn base_requires_authentication() {
        assert_eq!(
            classify(&Method::GET, RouteKind::Base, None),
            Demands::one(Demand::Authenticated)
        );
        assert!(classify(&Method::POST, RouteKind::Base, None).is_deny());
    }

    #[test]
    fn missing_artifact_or_project_denies() {
        assert!(classify(&Method::GET, RouteKind::Manifest, None).is_deny());
        let info = artifact("");
        assert!(classify(&Method::GET, RouteKind::Manifest, Some(&info)).is_deny());
        assert!(classify(&Method::PUT, RouteKind::Blob, Some(&info)).is_deny());
    }

    #[test]
    fn unlisted_combinations_deny() {
        let info = artifact("library");
        assert!(classify(&Method::GET, RouteKind::Unknown, Some(&info)).is_deny());
        assert!(classify(&Method::DELETE, RouteKind::TagList, Some(&info)).is_deny());
        assert!(classify(&Method::OPTIONS, RouteKind::Manifest, Some(&info)).is_deny());
    }
}
