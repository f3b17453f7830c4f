//! Filesystem gateway.
//!
//! Every operation maps onto one filesystem primitive and reports its failure
//! to the caller unchanged. The request handler only talks to the filesystem
//! through the [`Filesystem`] trait.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, warn};

/// Errors surfaced by filesystem operations.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(PathBuf),

    #[error("already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl FsError {
    fn from_io(err: std::io::Error, path: &Path) -> Self {
        match err.kind() {
            ErrorKind::NotFound => FsError::NotFound(path.to_path_buf()),
            ErrorKind::AlreadyExists => FsError::AlreadyExists(path.to_path_buf()),
            _ => FsError::Io(err),
        }
    }
}

/// Kind of a listed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirectoryEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Dot-prefixed entries are left out of listings and the removal form.
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

/// Result of [`Filesystem::stat`] for an existing path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub is_dir: bool,
}

/// Reader handed to [`Filesystem::write_file`].
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Look up a path, following symlinks.
    async fn stat(&self, path: &Path) -> Result<Stat, FsError>;

    /// Enumerate a directory in the order the platform yields it.
    async fn list(&self, path: &Path) -> Result<Vec<DirectoryEntry>, FsError>;

    /// Create a single directory.
    async fn create_dir(&self, path: &Path) -> Result<(), FsError>;

    /// Remove a file, a symlink or a whole directory subtree.
    async fn remove_recursive(&self, path: &Path) -> Result<(), FsError>;

    /// Create or truncate `path` and copy `content` into it.
    async fn write_file(&self, path: &Path, content: ByteStream) -> Result<u64, FsError>;

    /// Stream a file back to the client.
    async fn serve_file(&self, path: &Path, request: Request<Body>) -> Response;
}

/// [`Filesystem`] backed by the local disk.
#[derive(Debug, Clone, Default)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Filesystem for LocalFilesystem {
    async fn stat(&self, path: &Path) -> Result<Stat, FsError> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| FsError::from_io(e, path))?;
        Ok(Stat {
            is_dir: metadata.is_dir(),
        })
    }

    async fn list(&self, path: &Path) -> Result<Vec<DirectoryEntry>, FsError> {
        let mut read_dir = fs::read_dir(path)
            .await
            .map_err(|e| FsError::from_io(e, path))?;
        let mut entries = Vec::new();

        while let Some(entry) = read_dir.next_entry().await? {
            // Non-UTF-8 names cannot be linked to or removed through the form
            let Ok(name) = entry.file_name().into_string() else {
                debug!("Skipping non UTF-8 entry {:?}", entry.file_name());
                continue;
            };
            // Symlinks are listed as what they point at
            let is_dir = match fs::metadata(entry.path()).await {
                Ok(metadata) => metadata.is_dir(),
                Err(_) => entry.file_type().await?.is_dir(),
            };
            entries.push(if is_dir {
                DirectoryEntry::directory(name)
            } else {
                DirectoryEntry::file(name)
            });
        }

        Ok(entries)
    }

    async fn create_dir(&self, path: &Path) -> Result<(), FsError> {
        fs::create_dir(path)
            .await
            .map_err(|e| FsError::from_io(e, path))
    }

    async fn remove_recursive(&self, path: &Path) -> Result<(), FsError> {
        let metadata = fs::symlink_metadata(path)
            .await
            .map_err(|e| FsError::from_io(e, path))?;

        let removed = if metadata.is_dir() {
            fs::remove_dir_all(path).await
        } else {
            fs::remove_file(path).await
        };
        removed.map_err(|e| FsError::from_io(e, path))
    }

    async fn write_file(&self, path: &Path, mut content: ByteStream) -> Result<u64, FsError> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await
            .map_err(|e| FsError::from_io(e, path))?;

        let copied = match tokio::io::copy(&mut content, &mut file).await {
            Ok(copied) => copied,
            Err(e) => {
                drop(file);
                if let Err(cleanup) = fs::remove_file(path).await {
                    warn!("Failed to remove partial file {}: {}", path.display(), cleanup);
                }
                return Err(FsError::Io(e));
            }
        };
        file.flush().await?;

        Ok(copied)
    }

    async fn serve_file(&self, path: &Path, request: Request<Body>) -> Response {
        debug!("Serving file: {}", path.display());

        // ServeFile only answers GET and HEAD
        let (mut parts, _body) = request.into_parts();
        if parts.method != Method::HEAD {
            parts.method = Method::GET;
        }
        let request = Request::from_parts(parts, Body::empty());

        ServeFile::new(path).oneshot(request).await.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_stat() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), "a").unwrap();
        let fs = LocalFilesystem::new();

        assert!(fs.stat(temp_dir.path()).await.unwrap().is_dir);
        assert!(!fs.stat(&temp_dir.path().join("a.txt")).await.unwrap().is_dir);
        assert!(matches!(
            fs.stat(&temp_dir.path().join("missing")).await,
            Err(FsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_reports_kinds_and_hidden_entries() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(temp_dir.path().join(".secret"), "s").unwrap();
        std::fs::create_dir(temp_dir.path().join("sub")).unwrap();

        let mut entries = LocalFilesystem::new().list(temp_dir.path()).await.unwrap();
        // read_dir order is unspecified
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(
            entries,
            vec![
                DirectoryEntry::file(".secret"),
                DirectoryEntry::file("a.txt"),
                DirectoryEntry::directory("sub"),
            ]
        );
        assert!(entries[0].is_hidden());
        assert!(!entries[1].is_hidden());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_list_skips_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(OsStr::from_bytes(b"bad\xff.txt")), "x").unwrap();
        std::fs::write(temp_dir.path().join("good.txt"), "x").unwrap();

        let entries = LocalFilesystem::new().list(temp_dir.path()).await.unwrap();

        assert_eq!(entries, vec![DirectoryEntry::file("good.txt")]);
    }

    #[tokio::test]
    async fn test_create_dir_twice_reports_already_exists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sub");
        let fs = LocalFilesystem::new();

        fs.create_dir(&path).await.unwrap();
        assert!(matches!(
            fs.create_dir(&path).await,
            Err(FsError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_recursive() {
        let temp_dir = TempDir::new().unwrap();
        let tree = temp_dir.path().join("tree");
        std::fs::create_dir_all(tree.join("nested/.hidden")).unwrap();
        std::fs::write(tree.join("nested/file.txt"), "x").unwrap();
        std::fs::write(temp_dir.path().join("single.txt"), "x").unwrap();
        let fs = LocalFilesystem::new();

        fs.remove_recursive(&tree).await.unwrap();
        fs.remove_recursive(&temp_dir.path().join("single.txt"))
            .await
            .unwrap();

        assert!(!tree.exists());
        assert!(!temp_dir.path().join("single.txt").exists());
        assert!(matches!(
            fs.remove_recursive(&tree).await,
            Err(FsError::NotFound(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_remove_recursive_does_not_follow_symlinks() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("keep.txt"), "keep").unwrap();

        let tree = temp_dir.path().join("tree");
        std::fs::create_dir(&tree).unwrap();
        symlink(outside.path(), tree.join("link")).unwrap();
        symlink(outside.path(), temp_dir.path().join("toplink")).unwrap();
        let fs = LocalFilesystem::new();

        fs.remove_recursive(&tree).await.unwrap();
        fs.remove_recursive(&temp_dir.path().join("toplink"))
            .await
            .unwrap();

        assert!(outside.path().join("keep.txt").exists());
        assert!(!temp_dir.path().join("toplink").exists());
    }

    #[tokio::test]
    async fn test_write_file_truncates_existing_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("f.txt");
        std::fs::write(&path, "a much longer previous body").unwrap();
        let fs = LocalFilesystem::new();

        let written = fs
            .write_file(&path, Box::new(std::io::Cursor::new(b"new".to_vec())))
            .await
            .unwrap();

        assert_eq!(written, 3);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_serve_file_any_method() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("f.txt");
        std::fs::write(&path, "hello").unwrap();

        let request = Request::builder()
            .method(Method::POST)
            .uri("/f.txt")
            .body(Body::empty())
            .unwrap();
        let response = LocalFilesystem::new().serve_file(&path, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn test_serve_file_range() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("f.txt");
        std::fs::write(&path, "0123456789").unwrap();

        let request = Request::builder()
            .uri("/f.txt")
            .header(header::RANGE, "bytes=2-4")
            .body(Body::empty())
            .unwrap();
        let response = LocalFilesystem::new().serve_file(&path, request).await;

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"234");
    }
}
