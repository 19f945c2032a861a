use crate::{
    constants::{CATALOG_PATH, REGISTRY_API_PREFIX},
    models::{ArtifactInfo, BlobMount, project_name_of},
};
use axum::{extract::Request, middleware::Next, response::Response};
use std::collections::HashMap;
use tracing::debug;

/// Registry endpoint families recognised on the V2 API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Base,
    Catalog,
    Manifest,
    TagList,
    Blob,
    BlobUpload,
    Unknown,
}

impl RouteKind {
    pub fn from_path(path: &str) -> Self {
        parse_route(path).kind
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RouteKind::Base => "base",
            RouteKind::Catalog => "catalog",
            RouteKind::Manifest => "manifest",
            RouteKind::TagList => "tag_list",
            RouteKind::Blob => "blob",
            RouteKind::BlobUpload => "blob_upload",
            RouteKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Route {
    kind: RouteKind,
    repository: String,
    reference: String,
}

impl Route {
    fn bare(kind: RouteKind) -> Self {
        Self {
            kind,
            repository: String::new(),
            reference: String::new(),
        }
    }

    fn named(kind: RouteKind, repository: &str, reference: &str) -> Self {
        if repository.is_empty() {
            return Self::bare(RouteKind::Unknown);
        }
        Self {
            kind,
            repository: decode_path(repository),
            reference: decode_path(reference),
        }
    }
}

fn parse_route(path: &str) -> Route {
    if path == REGISTRY_API_PREFIX || path == "/v2/" {
        return Route::bare(RouteKind::Base);
    }
    if path == CATALOG_PATH {
        return Route::bare(RouteKind::Catalog);
    }
    let Some(rest) = path.strip_prefix("/v2/") else {
        return Route::bare(RouteKind::Unknown);
    };
    if has_ambiguous_segment(rest) {
        return Route::bare(RouteKind::Unknown);
    }

    if let Some(idx) = rest.rfind("/blobs/uploads") {
        let suffix = &rest[idx + "/blobs/uploads".len()..];
        if suffix.is_empty() || suffix.starts_with('/') {
            return Route::named(RouteKind::BlobUpload, &rest[..idx], suffix.trim_matches('/'));
        }
    }
    if let Some(idx) = rest.rfind("/manifests/") {
        let reference = &rest[idx + "/manifests/".len()..];
        if !reference.is_empty() && !reference.contains('/') {
            return Route::named(RouteKind::Manifest, &rest[..idx], reference);
        }
    }
    if let Some(repository) = rest.strip_suffix("/tags/list") {
        return Route::named(RouteKind::TagList, repository, "");
    }
    if let Some(idx) = rest.rfind("/blobs/") {
        let digest = &rest[idx + "/blobs/".len()..];
        if !digest.is_empty() && !digest.contains('/') {
            return Route::named(RouteKind::Blob, &rest[..idx], digest);
        }
    }
    Route::bare(RouteKind::Unknown)
}

/// Builds the artifact descriptor for repository-scoped endpoints. The
/// descriptor carries a blob mount only for uploads that name both the digest
/// and the source repository. A mount query that repeats `mount` or `from`
/// yields no descriptor, since the registry may read a different value.
pub fn parse_artifact_info(path: &str, query: Option<&str>) -> Option<ArtifactInfo> {
    let route = parse_route(path);
    if !matches!(
        route.kind,
        RouteKind::Manifest | RouteKind::TagList | RouteKind::Blob | RouteKind::BlobUpload
    ) {
        return None;
    }

    let blob_mount = if route.kind == RouteKind::BlobUpload {
        match parse_blob_mount(query) {
            Ok(mount) => mount,
            Err(reason) => {
                debug!(reason, "rejecting blob mount query");
                return None;
            }
        }
    } else {
        None
    };

    Some(ArtifactInfo {
        project_name: project_name_of(&route.repository).to_string(),
        repository: route.repository,
        reference: route.reference,
        blob_mount,
    })
}

fn parse_blob_mount(query: Option<&str>) -> Result<Option<BlobMount>, &'static str> {
    let params = query_params(query);
    match (single_param(&params, "mount")?, single_param(&params, "from")?) {
        (Some(digest), Some(from)) if !digest.is_empty() && !from.is_empty() => {
            Ok(Some(BlobMount {
                repository: from.to_string(),
                project_name: project_name_of(from).to_string(),
                digest: digest.to_string(),
            }))
        }
        _ => Ok(None),
    }
}

pub async fn attach_artifact_info(mut req: Request, next: Next) -> Response {
    if let Some(info) = parse_artifact_info(req.uri().path(), req.uri().query()) {
        debug!(
            repository = info.repository,
            reference = info.reference,
            project = info.project_name,
            blob_mount = info.blob_mount.is_some(),
            "parsed artifact info"
        );
        req.extensions_mut().insert(info);
    }
    next.run(req).await
}

fn single_param<'a>(
    params: &'a HashMap<String, Vec<String>>,
    key: &str,
) -> Result<Option<&'a str>, &'static str> {
    match params.get(key).map(Vec::as_slice) {
        None | Some([]) => Ok(None),
        Some([value]) => Ok(Some(value.as_str())),
        Some(_) => Err("repeated mount parameter"),
    }
}

fn query_params(query: Option<&str>) -> HashMap<String, Vec<String>> {
    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    let Some(query) = query else {
        return out;
    };

    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key.is_empty() {
            continue;
        }
        out.entry(decode_path(key))
            .or_default()
            .push(decode_path(value));
    }
    out
}

/// Segments the registry could collapse or split differently once decoded:
/// empty, `.`, `..`, or containing an encoded `/` or `\`.
fn has_ambiguous_segment(rest: &str) -> bool {
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    rest.split('/').any(|segment| {
        let decoded = decode_path(segment);
        decoded.is_empty()
            || decoded == "."
            || decoded == ".."
            || decoded.contains('/')
            || decoded.contains('\\')
    })
}

fn decode_path(value: &str) -> String {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| value.to_string())
}
