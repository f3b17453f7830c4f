//! POST form parsing and upload persistence.
//!
//! The uploaded file is staged in an anonymous temp file while the form is
//! read, so every field is known before any mutation runs and an oversized
//! upload never reaches its destination.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use axum::{
    body::Body,
    extract::{
        multipart::{Field, MultipartError},
        FromRequest, Multipart,
    },
    http::{header, Request},
    Form,
};
use serde::Deserialize;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::error::FileServerError;
use crate::fs::{Filesystem, FsError};
use crate::resolve::upload_name;
use crate::AppState;

/// Form field carrying the uploaded file
pub const UPLOAD_FIELD: &str = "uploadfile";
/// Form field naming a directory to create
pub const NEWDIR_FIELD: &str = "newdir";
/// Form field naming an entry to remove
pub const REMOVE_FIELD: &str = "filelist";

/// An uploaded file read to the end and waiting to be written.
#[derive(Debug)]
pub struct StagedUpload {
    /// Filename as sent by the client
    pub filename: String,
    /// Number of staged bytes
    pub size: u64,
    content: tokio::fs::File,
}

/// Parsed POST form of a directory page.
#[derive(Debug, Default)]
pub struct PostForm {
    pub newdir: Option<String>,
    pub filelist: Option<String>,
    pub upload: Option<StagedUpload>,
}

#[derive(Debug, Deserialize)]
struct TextFields {
    #[serde(default)]
    newdir: String,
    #[serde(default)]
    filelist: String,
}

/// What happened to the upload part of a POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    NoFileProvided,
    Stored { path: PathBuf, bytes: u64 },
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn multipart_error(err: MultipartError) -> FileServerError {
    FileServerError::Form(err.body_text())
}

/// Read the POST body into a [`PostForm`].
///
/// `multipart/form-data` may carry all three fields; an urlencoded body only
/// carries the text fields. Any other body is treated as an empty form.
pub async fn parse_form(request: Request<Body>, state: &AppState) -> Result<PostForm, FileServerError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| FileServerError::Form(e.body_text()))?;
        parse_multipart(multipart, state.config.max_upload_bytes).await
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(fields) = Form::<TextFields>::from_request(request, state)
            .await
            .map_err(|e| FileServerError::Form(e.body_text()))?;
        Ok(PostForm {
            newdir: non_empty(fields.newdir),
            filelist: non_empty(fields.filelist),
            upload: None,
        })
    } else {
        debug!("POST without form body (content-type {:?})", content_type);
        Ok(PostForm::default())
    }
}

async fn parse_multipart(mut multipart: Multipart, limit: u64) -> Result<PostForm, FileServerError> {
    let mut form = PostForm::default();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            NEWDIR_FIELD if form.newdir.is_none() => {
                form.newdir = non_empty(field.text().await.map_err(multipart_error)?);
            }
            REMOVE_FIELD if form.filelist.is_none() => {
                form.filelist = non_empty(field.text().await.map_err(multipart_error)?);
            }
            UPLOAD_FIELD if form.upload.is_none() => {
                let filename = field.file_name().unwrap_or_default().to_string();
                // Browsers send an empty part when no file was chosen
                if filename.is_empty() {
                    continue;
                }
                form.upload = Some(stage(&mut field, filename, limit).await?);
            }
            _ => debug!("Skipping form field {:?}", name),
        }
    }

    Ok(form)
}

async fn stage(field: &mut Field<'_>, filename: String, limit: u64) -> Result<StagedUpload, FileServerError> {
    let mut content = tokio::fs::File::from_std(tempfile::tempfile().map_err(FsError::from)?);
    let mut size: u64 = 0;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        size += chunk.len() as u64;
        if size > limit {
            warn!("Upload {:?} exceeds limit of {} bytes", filename, limit);
            return Err(FileServerError::FileTooLarge { limit });
        }
        content.write_all(&chunk).await.map_err(FsError::from)?;
    }

    content.flush().await.map_err(FsError::from)?;
    content
        .seek(SeekFrom::Start(0))
        .await
        .map_err(FsError::from)?;

    debug!("Staged upload {:?} ({} bytes)", filename, size);

    Ok(StagedUpload {
        filename,
        size,
        content,
    })
}

/// Write a staged upload into `target_dir` under the client's filename.
pub async fn store_upload(
    fs: &dyn Filesystem,
    target_dir: &Path,
    upload: Option<StagedUpload>,
) -> Result<UploadOutcome, FileServerError> {
    let Some(upload) = upload else {
        return Ok(UploadOutcome::NoFileProvided);
    };

    let Some(file_name) = upload_name(&upload.filename) else {
        warn!("Rejected invalid filename: {:?}", upload.filename);
        return Err(FileServerError::InvalidFilename(upload.filename));
    };
    let path = target_dir.join(file_name);

    info!("Uploading file: {} ({} bytes)", path.display(), upload.size);

    let bytes = fs.write_file(&path, Box::new(upload.content)).await?;

    Ok(UploadOutcome::Stored { path, bytes })
}
