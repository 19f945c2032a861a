use crate::models::Action;
use axum::{
    Json,
    body::Body,
    http::StatusCode,
    http::header,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Why a request was refused. Every variant renders as the same bare 401;
/// the reason only shows up in logs and tests.
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("request could not be classified: {reason}")]
    ClassificationFailure { reason: &'static str },
    #[error("project {project} could not be resolved: {cause}")]
    ResolutionFailure {
        project: String,
        cause: ResolutionCause,
    },
    #[error("{action} denied on {project}")]
    CapabilityDenied { action: String, project: String },
    #[error("authentication required")]
    Unauthenticated,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolutionCause {
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Error(#[from] ResolveError),
}

impl AuthzError {
    pub fn classification(reason: &'static str) -> Self {
        Self::ClassificationFailure { reason }
    }

    pub fn capability(action: Action, project: impl Into<String>) -> Self {
        Self::CapabilityDenied {
            action: action.as_str().to_string(),
            project: project.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ClassificationFailure { .. } => "classification_failure",
            Self::ResolutionFailure { .. } => "resolution_failure",
            Self::CapabilityDenied { .. } => "capability_denied",
            Self::Unauthenticated => "unauthenticated",
        }
    }
}

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

/// Failures talking to a project metadata source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("project metadata service unavailable")]
    Unavailable,
    #[error("project metadata service returned status {0}")]
    Status(u16),
    #[error("project metadata service returned an invalid payload")]
    InvalidPayload,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("upstream registry unavailable")]
    Upstream,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal server error")]
    Internal,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServiceError::Upstream => (StatusCode::BAD_GATEWAY, "upstream registry unavailable"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "unknown error"),
        };
        let body = serde_json::to_vec(&ErrorBody { error: message })
            .unwrap_or_else(|_| b"{\"error\":\"unknown error\"}".to_vec());
        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, crate::constants::HEADER_JSON)
            .body(Body::from(body))
            .unwrap_or_else(|_| {
                let fallback = Json(ErrorBody {
                    error: "unknown error",
                });
                (StatusCode::INTERNAL_SERVER_ERROR, fallback).into_response()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthzError, ResolutionCause, ResolveError};
    use axum::{http::StatusCode, response::IntoResponse};

    #[test]
    fn every_denial_renders_as_bare_unauthorized() {
        let denials = vec![
            AuthzError::classification("unrecognized route"),
            AuthzError::ResolutionFailure {
                project: "library".to_string(),
                cause: ResolutionCause::NotFound,
            },
            AuthzError::ResolutionFailure {
                project: "library".to_string(),
                cause: ResolveError::Unavailable.into(),
            },
            AuthzError::CapabilityDenied {
                action: "push".to_string(),
                project: "library".to_string(),
            },
            AuthzError::Unauthenticated,
        ];
        for denial in denials {
            let response = denial.into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert!(response.headers().get("content-type").is_none());
        }
    }
}
