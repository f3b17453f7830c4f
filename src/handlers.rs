use std::path::Path;

use axum::{
    body::Body,
    extract::State,
    http::{header, Method, Request},
    response::{Html, IntoResponse, Response},
};
use tracing::{debug, error, info, warn};

use crate::error::FileServerError;
use crate::fs::FsError;
use crate::render::{render_listing, ListingPage};
use crate::resolve::{child_name, resolve_and_verify};
use crate::upload::{parse_form, store_upload, UploadOutcome};
use crate::AppState;

/// Result of one optional filesystem mutation of a directory POST.
#[derive(Debug)]
pub enum MutationOutcome {
    /// The form did not ask for it
    Skipped,
    Applied,
    Failed(FileServerError),
}

impl MutationOutcome {
    fn from_result(result: Result<(), FileServerError>) -> Self {
        match result {
            Ok(()) => MutationOutcome::Applied,
            Err(err) => MutationOutcome::Failed(err),
        }
    }

    /// Turn a failure into an error when mutation errors are surfaced,
    /// otherwise log and drop it.
    fn check(self, what: &str, surface: bool) -> Result<Self, FileServerError> {
        match self {
            MutationOutcome::Failed(err) if surface => {
                error!("{} failed: {}", what, err);
                Err(err)
            }
            MutationOutcome::Failed(err) => {
                warn!("{} failed (ignored): {}", what, err);
                Ok(MutationOutcome::Failed(err))
            }
            outcome => Ok(outcome),
        }
    }
}

/// Everything a directory POST did.
#[derive(Debug)]
pub struct PostOutcome {
    pub mkdir: MutationOutcome,
    pub remove: MutationOutcome,
    pub upload: UploadOutcome,
}

/// Any method, any path: list directories, serve files, 404 otherwise.
pub async fn serve_path(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Result<Response, FileServerError> {
    let request_path = urlencoding::decode(request.uri().path())
        .map_err(|_| FileServerError::NotFound)?
        .into_owned();
    let path = resolve_and_verify(&state.root_dir, &request_path)?;

    let stat = match state.fs.stat(&path).await {
        Ok(stat) => stat,
        Err(err) => {
            debug!("stat {} failed: {}", path.display(), err);
            return Err(FileServerError::NotFound);
        }
    };

    if !stat.is_dir {
        return Ok(state.fs.serve_file(&path, request).await);
    }

    let host = request_host(&request);

    if *request.method() == Method::POST {
        apply_post(&state, &path, request).await?;
    }

    list_directory(&state, &path, &request_path, &host).await
}

fn request_host(request: &Request<Body>) -> String {
    request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
        .unwrap_or_else(|| "localhost".to_string())
}

/// Run the mutations of a directory POST in their fixed order:
/// create directory, remove entry, store upload.
pub async fn apply_post(
    state: &AppState,
    dir: &Path,
    request: Request<Body>,
) -> Result<PostOutcome, FileServerError> {
    let form = parse_form(request, state).await.map_err(|err| {
        error!("Failed to read POST form: {}", err);
        err
    })?;
    let surface = state.config.surface_mutation_errors;

    let mkdir = match form.newdir.as_deref() {
        Some(name) => create_directory(state, dir, name).await,
        None => MutationOutcome::Skipped,
    }
    .check("mkdir", surface)?;

    let remove = match form.filelist.as_deref() {
        Some(name) => remove_entry(state, dir, name).await,
        None => MutationOutcome::Skipped,
    }
    .check("remove", surface)?;

    let upload = store_upload(state.fs.as_ref(), dir, form.upload)
        .await
        .map_err(|err| {
            error!("Upload failed: {}", err);
            err
        })?;

    Ok(PostOutcome {
        mkdir,
        remove,
        upload,
    })
}

async fn create_directory(state: &AppState, dir: &Path, name: &str) -> MutationOutcome {
    let Some(name) = child_name(name) else {
        return MutationOutcome::Failed(FileServerError::InvalidName(name.to_string()));
    };
    let path = dir.join(name);

    info!("Creating directory: {}", path.display());
    MutationOutcome::from_result(state.fs.create_dir(&path).await.map_err(Into::into))
}

async fn remove_entry(state: &AppState, dir: &Path, name: &str) -> MutationOutcome {
    let Some(name) = child_name(name) else {
        return MutationOutcome::Failed(FileServerError::InvalidName(name.to_string()));
    };
    let path = dir.join(name);

    info!("Deleting: {}", path.display());
    MutationOutcome::from_result(state.fs.remove_recursive(&path).await.map_err(Into::into))
}

async fn list_directory(
    state: &AppState,
    dir: &Path,
    request_path: &str,
    host: &str,
) -> Result<Response, FileServerError> {
    let entries = state.fs.list(dir).await.map_err(|err: FsError| {
        error!("Failed to list {}: {}", dir.display(), err);
        FileServerError::Fs(err)
    })?;

    let page = ListingPage {
        scheme: state.scheme(),
        host,
        request_path,
        show_hidden: state.config.show_hidden,
    };

    Ok(Html(render_listing(&page, &entries)).into_response())
}
