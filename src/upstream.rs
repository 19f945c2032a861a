use crate::{app::AppState, config::UpstreamConfig, error::ServiceError};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use reqwest::{Client, redirect::Policy};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// The registry that actually serves manifests and blobs once a request has
/// been authorized.
#[derive(Debug, Clone)]
pub struct Upstream {
    base_url: String,
    client: Client,
}

impl Upstream {
    pub fn new(cfg: &UpstreamConfig) -> Result<Option<Self>, ServiceError> {
        let Some(base_url) = cfg.url.as_deref() else {
            return Ok(None);
        };
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_millis(cfg.timeout_ms.max(1_000)))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .redirect(Policy::none())
            .build()
            .map_err(|_| ServiceError::Internal)?;
        Ok(Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Streams the request to the registry and its answer back. The caller's
    /// credentials stay here; the registry trusts this layer.
    pub async fn forward(&self, req: Request) -> Result<Response, ServiceError> {
        let (parts, body) = req.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|value| value.as_str())
            .unwrap_or("/");
        let url = format!("{}{}", self.base_url, path_and_query);

        let with_body = carries_body(&parts.method, &parts.headers);
        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::AUTHORIZATION);
        headers.remove(header::HOST);

        let mut outbound = self.client.request(parts.method, url);
        if with_body {
            outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }
        let response = outbound
            .headers(headers)
            .send()
            .await
            .map_err(|err| {
                warn!(error = ?err, base_url = self.base_url, "upstream registry unavailable");
                ServiceError::Upstream
            })?;

        let status = response.status();
        debug!(status = status.as_u16(), "upstream responded");
        let mut builder = Response::builder().status(status);
        if let Some(out) = builder.headers_mut() {
            for (name, value) in response.headers() {
                if !is_hop_by_hop(name) {
                    out.append(name.clone(), value.clone());
                }
            }
        }
        builder
            .body(Body::from_stream(response.bytes_stream()))
            .map_err(|_| ServiceError::Internal)
    }
}

#[instrument(skip_all, fields(method = %req.method(), path = req.uri().path()))]
pub async fn forward(State(state): State<AppState>, req: Request) -> Response {
    let Some(upstream) = state.upstream.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match upstream.forward(req).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

fn carries_body(method: &Method, headers: &HeaderMap) -> bool {
    !matches!(*method, Method::GET | Method::HEAD)
        || headers.contains_key(header::CONTENT_LENGTH)
        || headers.contains_key(header::TRANSFER_ENCODING)
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
