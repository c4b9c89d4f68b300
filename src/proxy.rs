//! Local HTTP front that routes page requests through the active worker.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::get;
use bytes::Bytes;
use reqwest::Url;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::error::{Error, Result};
use crate::worker::{CacheStorage, Network, Registration, Request, Response};

/// Headers that describe a single connection and are not forwarded.
const HOP_BY_HOP: [&str; 5] = [
    "connection",
    "content-length",
    "keep-alive",
    "transfer-encoding",
    "upgrade",
];

struct ProxyState<S, N> {
    registration: Arc<Registration<S, N>>,
    origin: Url,
    passthrough: reqwest::Client,
}

impl<S, N> Clone for ProxyState<S, N> {
    fn clone(&self) -> Self {
        Self {
            registration: Arc::clone(&self.registration),
            origin: self.origin.clone(),
            passthrough: self.passthrough.clone(),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    generation: Option<String>,
}

async fn health<S, N>(State(state): State<ProxyState<S, N>>) -> impl IntoResponse
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    let generation = state
        .registration
        .controller()
        .await
        .map(|worker| worker.generation().name().to_string());
    axum::Json(HealthResponse {
        status: "ok",
        generation,
    })
}

async fn forward<S, N>(
    State(state): State<ProxyState<S, N>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    let mut url = state.origin.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());

    if method != Method::GET {
        return passthrough(&state.passthrough, method, url, &headers, body).await;
    }

    match state.registration.fetch(&Request::new(url)).await {
        Ok(response) => into_axum(response),
        Err(e) => {
            log::warn!("{} {}: {e}", method, uri.path());
            (StatusCode::GATEWAY_TIMEOUT, e.to_string()).into_response()
        }
    }
}

async fn passthrough(
    client: &reqwest::Client,
    method: Method,
    url: Url,
    headers: &HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let Ok(method) = reqwest::Method::from_bytes(method.as_str().as_bytes()) else {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    };

    let mut builder = client.request(method, url).body(body);
    if let Some(content_type) = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    {
        builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
    }

    let result = async {
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?;
        Ok::<_, reqwest::Error>(Response {
            status,
            headers,
            body,
        })
    }
    .await;

    match result {
        Ok(response) => into_axum(response),
        Err(e) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    }
}

fn into_axum(response: Response) -> axum::response::Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut out = (status, Body::from(response.body)).into_response();

    let headers = out.headers_mut();
    for (name, value) in &response.headers {
        if HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h)) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }
    out
}

/// Builds the router: a health route plus a fallback forwarding everything
/// else to `origin`.
pub fn router<S, N>(registration: Arc<Registration<S, N>>, origin: Url) -> Router
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    let state = ProxyState {
        registration,
        origin,
        passthrough: reqwest::Client::new(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/_wayfarer/health", get(health::<S, N>))
        .fallback(forward::<S, N>)
        .layer(cors)
        .with_state(state)
}

/// Binds `host:port` and serves the router in the background.
///
/// Returns the bound address, which differs from the requested one when
/// `port` is 0.
///
/// # Errors
///
/// Returns an error if the address is invalid or cannot be bound.
pub async fn run_server<S, N>(
    host: &str,
    port: u16,
    registration: Arc<Registration<S, N>>,
    origin: Url,
) -> Result<SocketAddr>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| Error::InvalidUrl(format!("{host}:{port}: {e}")))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound = listener.local_addr()?;

    let app = router(registration, origin);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::error!("HTTP front error: {e}");
        }
    });

    log::info!("Serving on http://{bound}");
    Ok(bound)
}
