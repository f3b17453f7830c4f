//! One access log record per completed request.

use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::info;

use crate::AppState;

/// Receives the outcome of every request.
pub trait AccessLog: Send + Sync {
    fn record(&self, method: &Method, status: StatusCode, path: &str);
}

/// Writes access records as `tracing` events on the `dirshare::access` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAccessLog;

impl AccessLog for TracingAccessLog {
    fn record(&self, method: &Method, status: StatusCode, path: &str) {
        info!(
            target: "dirshare::access",
            method = %method,
            status = status.as_u16(),
            path,
            "{:<4} {} {}",
            method,
            status.as_u16(),
            path
        );
    }
}

/// Middleware recording (method, status, path) once the response is built.
pub async fn access_log(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = urlencoding::decode(request.uri().path())
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| request.uri().path().to_string());

    let response = next.run(request).await;

    state.access_log.record(&method, response.status(), &path);
    response
}
