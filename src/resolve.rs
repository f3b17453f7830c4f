//! Mapping of request paths and form-supplied names onto the served root.

use std::path::{Component, Path, PathBuf};

use tracing::{error, warn};

use crate::error::FileServerError;

/// Resolve a request path against the root without touching the filesystem.
///
/// The path is built component by component; parent directory references,
/// absolute components and embedded NUL bytes are rejected.
pub fn resolve(root: &Path, request_path: &str) -> Result<PathBuf, FileServerError> {
    let relative = request_path.trim_start_matches('/');

    if relative.is_empty() || relative == "." {
        return Ok(root.to_path_buf());
    }

    let mut result = root.to_path_buf();

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(name) => {
                if name.to_string_lossy().contains('\0') {
                    warn!("Path component contains null byte: {:?}", name);
                    return Err(FileServerError::PathTraversal);
                }
                result.push(name);
            }
            Component::ParentDir => {
                warn!("Path traversal attempt: parent directory (..) in {:?}", request_path);
                return Err(FileServerError::PathTraversal);
            }
            Component::CurDir => continue,
            Component::RootDir | Component::Prefix(_) => {
                warn!("Absolute path component in {:?}", request_path);
                return Err(FileServerError::PathTraversal);
            }
        }
    }

    if !result.starts_with(root) {
        error!("Path resolution left the root: {:?}", result);
        return Err(FileServerError::PathTraversal);
    }

    Ok(result)
}

/// Resolve a request path and check that symlinks do not lead out of the root.
///
/// Existing targets are returned in canonical form. For a missing target the
/// parent directory, if present, is checked instead.
pub fn resolve_and_verify(root: &Path, request_path: &str) -> Result<PathBuf, FileServerError> {
    let built = resolve(root, request_path)?;
    let canonical_root = root.canonicalize().map_err(|_| FileServerError::NotFound)?;

    if let Ok(canonical) = built.canonicalize() {
        if !canonical.starts_with(&canonical_root) {
            warn!(
                "Symlink escape attempt: {:?} resolved to {:?} outside {:?}",
                built, canonical, canonical_root
            );
            return Err(FileServerError::PathTraversal);
        }
        return Ok(canonical);
    }

    if let Some(parent) = built.parent() {
        if let Ok(canonical_parent) = parent.canonicalize() {
            if !canonical_parent.starts_with(&canonical_root) {
                warn!("Parent directory escape: {:?} parent resolved outside root", built);
                return Err(FileServerError::PathTraversal);
            }
        }
    }

    Ok(built)
}

/// Validate a form-supplied entry name (new directory, removal target).
///
/// Only a single normal path component is accepted.
pub fn child_name(name: &str) -> Option<&str> {
    if name.contains('\0') || name.contains('/') || name.contains('\\') {
        return None;
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(name),
        _ => None,
    }
}

/// Name an uploaded file is stored under.
///
/// Some clients send the full client-side path, so only the part after the
/// last separator is kept; it must then be a valid single entry name.
pub fn upload_name(filename: &str) -> Option<&str> {
    let last = filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    child_name(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_joins_request_path() {
        let root = PathBuf::from("/srv/share");
        assert_eq!(
            resolve(&root, "/docs/report.txt").unwrap(),
            root.join("docs/report.txt")
        );
        assert_eq!(resolve(&root, "/docs/").unwrap(), root.join("docs"));
    }

    #[test]
    fn test_resolve_root() {
        let root = PathBuf::from("/srv/share");
        assert_eq!(resolve(&root, "/").unwrap(), root);
        assert_eq!(resolve(&root, "").unwrap(), root);
        assert_eq!(resolve(&root, "/.").unwrap(), root);
    }

    #[test]
    fn test_resolve_rejects_parent_dir() {
        let root = PathBuf::from("/srv/share");
        for path in ["/..", "/docs/../..", "/../etc/passwd", "/docs/.."] {
            assert!(
                matches!(resolve(&root, path), Err(FileServerError::PathTraversal)),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn test_resolve_rejects_null_bytes() {
        let root = PathBuf::from("/srv/share");
        assert!(matches!(
            resolve(&root, "/file\0.txt"),
            Err(FileServerError::PathTraversal)
        ));
    }

    #[test]
    fn test_resolve_and_verify_missing_path_still_resolves() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        std::fs::create_dir(root.join("sub")).unwrap();

        assert_eq!(
            resolve_and_verify(&root, "/sub/missing.txt").unwrap(),
            root.join("sub/missing.txt")
        );
        assert_eq!(resolve_and_verify(&root, "/sub").unwrap(), root.join("sub"));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_and_verify_detects_symlink_escape() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "secret").unwrap();
        symlink(outside.path(), temp_dir.path().join("escape")).unwrap();

        let result = resolve_and_verify(temp_dir.path(), "/escape/secret.txt");
        assert!(matches!(result, Err(FileServerError::PathTraversal)));
    }

    #[test]
    fn test_child_name() {
        assert_eq!(child_name("sub"), Some("sub"));
        assert_eq!(child_name(".hidden"), Some(".hidden"));
        assert_eq!(child_name(".."), None);
        assert_eq!(child_name("."), None);
        assert_eq!(child_name("a/b"), None);
        assert_eq!(child_name("../x"), None);
        assert_eq!(child_name("/etc"), None);
        assert_eq!(child_name(""), None);
    }

    #[test]
    fn test_upload_name_keeps_names_verbatim() {
        for name in ["f.txt", ".env", "notes:v2.txt", "aux.c", "what?.txt", "report v2.pdf"] {
            assert_eq!(upload_name(name), Some(name));
        }
    }

    #[test]
    fn test_upload_name_drops_client_directories() {
        assert_eq!(upload_name("../etc/passwd"), Some("passwd"));
        assert_eq!(upload_name("C:\\Users\\me\\photo.jpg"), Some("photo.jpg"));
        assert_eq!(upload_name("foo/bar/baz.txt"), Some("baz.txt"));
    }

    #[test]
    fn test_upload_name_rejects_unusable() {
        assert_eq!(upload_name(""), None);
        assert_eq!(upload_name(".."), None);
        assert_eq!(upload_name("."), None);
        assert_eq!(upload_name("dir/"), None);
        assert_eq!(upload_name("a\0b"), None);
    }
}
