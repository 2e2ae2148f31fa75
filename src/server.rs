//! HTTP Servers
//!
//! Accept loops and handlers shared by the peer listener, the front-end API
//! and the metrics endpoint.
//!
//! ```text
//!   TcpListener ──accept──▶ tokio::spawn ──▶ http1::serve_connection
//!                                                   │
//!                                          service_fn(handler)
//!                                                   │
//!                    ┌──────────────────────────────┼─────────────────────┐
//!                    ▼                              ▼                     ▼
//!             HttpPool::handle                Api::handle         metrics_handler
//!           (/_geecache/{g}/{k})        (/api, /api/stats, /healthz)  (/metrics)
//! ```
//!
//! Each accepted connection runs on its own task; a failing connection is
//! logged and dropped without affecting the listener.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::group::{CacheStats, Group, GroupRegistry};
use crate::metrics::MetricsExporter;
use crate::peers::HttpPool;

// =============================================================================
// Responses
// =============================================================================

fn with_content_type(
    status: StatusCode,
    content_type: &'static str,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Plain-text response, used for every error body
pub fn text_response(status: StatusCode, body: impl Into<String>) -> Response<Full<Bytes>> {
    with_content_type(status, "text/plain; charset=utf-8", Bytes::from(body.into()))
}

/// 200 with raw value bytes
pub fn octet_response(body: Bytes) -> Response<Full<Bytes>> {
    with_content_type(StatusCode::OK, "application/octet-stream", body)
}

/// 200 with a JSON body, or 500 if serialization fails
pub fn json_response<T: Serialize>(value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => with_content_type(StatusCode::OK, "application/json", Bytes::from(body)),
        Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

// =============================================================================
// Accept Loop
// =============================================================================

/// Bind a listener on `addr` (`host:port`)
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("Invalid listen address {}: {}", addr, e)))?;

    TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Server(format!("Failed to bind {}: {}", addr, e)))
}

/// Serve HTTP/1 connections from `listener` until accept fails.
///
/// `handler` is cloned into every connection's task.
pub async fn serve<H, Fut>(listener: TcpListener, name: &'static str, handler: H) -> Result<()>
where
    H: Fn(Request<Incoming>) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Response<Full<Bytes>>> + Send + 'static,
{
    let local_addr = listener
        .local_addr()
        .map_err(|e| Error::Server(format!("{} server has no local address: {}", name, e)))?;
    info!(server = name, addr = %local_addr, "Server listening");

    loop {
        let (stream, remote) = listener
            .accept()
            .await
            .map_err(|e| Error::Server(format!("{} server accept error: {}", name, e)))?;

        let io = TokioIo::new(stream);
        let handler = handler.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let response = handler(req);
                async move { Ok::<_, Infallible>(response.await) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!(server = name, remote = %remote, "Connection error: {}", e);
            }
        });
    }
}

/// Serve the peer protocol for `pool`
pub async fn serve_peers(listener: TcpListener, pool: Arc<HttpPool>) -> Result<()> {
    serve(listener, "peer", move |req| {
        let pool = Arc::clone(&pool);
        async move { pool.handle(req).await }
    })
    .await
}

/// Serve the front-end API for `api`
pub async fn serve_api(listener: TcpListener, api: Arc<Api>) -> Result<()> {
    serve(listener, "api", move |req| {
        let api = Arc::clone(&api);
        async move { api.handle(req).await }
    })
    .await
}

/// Serve `/metrics` for `exporter`
pub async fn serve_metrics(listener: TcpListener, exporter: MetricsExporter) -> Result<()> {
    serve(listener, "metrics", move |req| {
        let exporter = exporter.clone();
        async move { metrics_handler(&exporter, req) }
    })
    .await
}

// =============================================================================
// Front-end API
// =============================================================================

/// Client-facing API over one group
///
/// - `GET /api?key=K`: value bytes, or 500 with the error text
/// - `GET /api/stats`: JSON array of every group's stats
/// - `GET /healthz`: `ok`
#[derive(Debug)]
pub struct Api {
    group: Arc<Group>,
    groups: Arc<GroupRegistry>,
}

impl Api {
    pub fn new(group: Arc<Group>, groups: Arc<GroupRegistry>) -> Self {
        Self { group, groups }
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>> {
        if req.method() != Method::GET {
            return text_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
        }

        match req.uri().path() {
            "/api" => {
                let Some(key) = req.uri().query().and_then(|q| query_param(q, "key")) else {
                    return text_response(StatusCode::BAD_REQUEST, "key is required");
                };
                match self.group.get(&key).await {
                    Ok(view) => octet_response(view.bytes()),
                    Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
                }
            }
            "/api/stats" => {
                let stats: Vec<CacheStats> =
                    self.groups.groups().iter().map(|g| g.stats()).collect();
                json_response(&stats)
            }
            "/healthz" => text_response(StatusCode::OK, "ok"),
            path => text_response(StatusCode::NOT_FOUND, format!("not found: {}", path)),
        }
    }
}

/// First value of `name` in a query string, form-decoded
fn query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        if k != name {
            return None;
        }
        urlencoding::decode(&v.replace('+', " "))
            .ok()
            .map(|v| v.into_owned())
    })
}

fn metrics_handler<B>(exporter: &MetricsExporter, req: Request<B>) -> Response<Full<Bytes>> {
    match req.uri().path() {
        "/metrics" => match exporter.render() {
            Ok(text) => {
                with_content_type(StatusCode::OK, exporter.format_type(), Bytes::from(text))
            }
            Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        _ => text_response(StatusCode::NOT_FOUND, "not found"),
    }
}

// =============================================================================
// Tests
// =============================================================================
