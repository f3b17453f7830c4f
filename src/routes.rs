use axum::{extract::DefaultBodyLimit, middleware, Router};
use tower_http::trace::TraceLayer;

use crate::access_log::access_log;
use crate::handlers;
use crate::AppState;

/// Create file server routes
///
/// Every path goes to the same handler; the filesystem decides what it is.
pub fn file_routes(state: &AppState) -> Router<AppState> {
    let body_limit = usize::try_from(state.config.max_upload_bytes).unwrap_or(usize::MAX);

    Router::new()
        .fallback(handlers::serve_path)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(state.clone(), access_log))
        .layer(TraceLayer::new_for_http())
}
