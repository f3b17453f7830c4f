//! HTTP server exposing one directory for browsing, upload, download,
//! directory creation and deletion through plain HTML forms.
//!
//! Can be used as a standalone binary or embedded in another application via
//! [`app`].

pub mod access_log;
pub mod config;
pub mod error;
pub mod fs;
pub mod handlers;
pub mod render;
pub mod resolve;
pub mod routes;
pub mod upload;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;

pub use access_log::{AccessLog, TracingAccessLog};
pub use config::Config;
pub use error::FileServerError;
pub use fs::{Filesystem, LocalFilesystem};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Root directory to serve files from
    pub root_dir: PathBuf,
    /// Configuration
    pub config: Arc<Config>,
    /// Filesystem every handler goes through
    pub fs: Arc<dyn Filesystem>,
    /// Sink for per-request access records
    pub access_log: Arc<dyn AccessLog>,
    /// Whether the listener terminates TLS
    pub tls: bool,
}

impl AppState {
    /// Create a new AppState with the given root directory and default config.
    pub fn new(root_dir: PathBuf) -> Self {
        Self::with_config(root_dir, Config::default())
    }

    /// Create a new AppState with the given root directory and config.
    pub fn with_config(root_dir: PathBuf, config: Config) -> Self {
        Self {
            root_dir,
            config: Arc::new(config),
            fs: Arc::new(LocalFilesystem::new()),
            access_log: Arc::new(TracingAccessLog),
            tls: false,
        }
    }

    pub fn with_filesystem(mut self, fs: Arc<dyn Filesystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_access_log(mut self, access_log: Arc<dyn AccessLog>) -> Self {
        self.access_log = access_log;
        self
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// URL scheme used for links in rendered pages.
    pub fn scheme(&self) -> &'static str {
        if self.tls {
            "https"
        } else {
            "http"
        }
    }
}

/// Build the complete application router.
pub fn app(state: AppState) -> Router {
    routes::file_routes(&state).with_state(state)
}
