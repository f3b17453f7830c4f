use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::fs::FsError;

#[derive(Error, Debug)]
pub enum FileServerError {
    #[error("404 Not Found")]
    NotFound,

    #[error("403 Forbidden")]
    PathTraversal,

    #[error("Invalid entry name: {0:?}")]
    InvalidName(String),

    #[error(transparent)]
    Fs(#[from] FsError),

    #[error("Failed to parse form: {0}")]
    Form(String),

    #[error("File too large: upload exceeds limit of {limit} bytes")]
    FileTooLarge { limit: u64 },

    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),
}

impl FileServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            FileServerError::NotFound => StatusCode::NOT_FOUND,
            FileServerError::PathTraversal => StatusCode::FORBIDDEN,
            FileServerError::InvalidName(_)
            | FileServerError::Fs(_)
            | FileServerError::Form(_)
            | FileServerError::FileTooLarge { .. }
            | FileServerError::InvalidFilename(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FileServerError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}
