// src/overlay/path.rs

//! Resource path normalization
//!
//! Resources are addressed by paths relative to the working tree. The same
//! relative path is joined onto the backup root to find the pristine copy, so
//! a resource path must never be able to climb out of either root.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Normalize a resource path into a clean relative path
///
/// Leading slashes and `.` components are dropped, `..` is rejected.
///
/// ```
/// use apk_repack::overlay::path::normalize_resource;
/// use std::path::PathBuf;
///
/// assert_eq!(
///     normalize_resource("assets/./game.manifest").unwrap(),
///     PathBuf::from("assets/game.manifest")
/// );
/// assert!(normalize_resource("../merged.apk").is_err());
/// ```
pub fn normalize_resource(resource: impl AsRef<Path>) -> Result<PathBuf> {
    let resource = resource.as_ref();
    let display = resource.to_string_lossy();
    let relative = display.trim_start_matches('/');

    let mut normalized = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::PathTraversal(display.to_string()));
            }
            Component::Prefix(_) | Component::RootDir => {}
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath(format!(
            "empty resource path: {:?}",
            display
        )));
    }

    Ok(normalized)
}

/// Join a resource path onto a root after normalizing it
pub fn resource_join(root: impl AsRef<Path>, resource: impl AsRef<Path>) -> Result<PathBuf> {
    Ok(root.as_ref().join(normalize_resource(resource)?))
}

/// Express a path found under `root` as a resource path
///
/// Used when resources are discovered by walking or globbing the working
/// tree rather than named up front.
pub fn relative_resource(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<PathBuf> {
    let root = root.as_ref();
    let path = path.as_ref();
    let relative = path.strip_prefix(root).map_err(|_| {
        Error::InvalidPath(format!(
            "{} is not inside {}",
            path.display(),
            root.display()
        ))
    })?;
    normalize_resource(relative)
}
