//! The project a run works in, and the gate every write passes through.

use crate::error::PatchError;
use log::trace;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Decides whether a file may be written.
///
/// Implemented for any `Fn(&Path) -> bool`, so a closure works as a gate.
pub trait WriteGate {
    fn is_write_allowed(&self, path: &Path) -> bool;
}

impl<F> WriteGate for F
where
    F: Fn(&Path) -> bool,
{
    fn is_write_allowed(&self, path: &Path) -> bool {
        self(path)
    }
}

/// A gate that approves every write.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl WriteGate for AllowAll {
    fn is_write_allowed(&self, _path: &Path) -> bool {
        true
    }
}

/// The project root relative paths are resolved against.
///
/// Passed explicitly to every file-level call, so concurrent runs against
/// different roots never share state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkContext {
    root: PathBuf,
}

impl WorkContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `path` inside the root. See [`ensure_path_is_safe`].
    pub fn resolve(&self, path: &Path) -> Result<PathBuf, PatchError> {
        ensure_path_is_safe(&self.root, path)
    }

    /// `path` relative to the root. Absolute paths must lie inside it.
    pub(crate) fn relative<'a>(&self, path: &'a Path) -> Result<&'a Path, PatchError> {
        if path.is_absolute() {
            path.strip_prefix(&self.root)
                .map_err(|_| PatchError::PathTraversal(path.to_path_buf()))
        } else {
            Ok(path)
        }
    }
}

/// Resolves `relative_path` against `base_dir` and checks the result stays
/// inside it.
///
/// The deepest existing ancestor is canonicalized, so symlinks pointing out
/// of the root are caught; the components below it may not contain `..`.
/// Nothing is created on disk.
///
/// # Errors
///
/// [`PatchError::PathTraversal`] when the path escapes `base_dir`.
///
/// # Example
///
/// ```
/// # use diffmend::ensure_path_is_safe;
/// # use std::path::Path;
/// let dir = tempfile::tempdir().unwrap();
/// assert!(ensure_path_is_safe(dir.path(), Path::new("src/new.rs")).is_ok());
/// assert!(ensure_path_is_safe(dir.path(), Path::new("../outside.rs")).is_err());
/// ```
pub fn ensure_path_is_safe(base_dir: &Path, relative_path: &Path) -> Result<PathBuf, PatchError> {
    trace!(
        "  Checking path safety for base '{}' and relative path '{}'",
        base_dir.display(),
        relative_path.display()
    );
    let base_path =
        fs::canonicalize(base_dir).map_err(|e| PatchError::from_io(base_dir.to_path_buf(), e))?;
    let target = base_path.join(relative_path);

    let mut existing = target.as_path();
    let mut missing: Vec<&std::ffi::OsStr> = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            // `..` at the end or the filesystem root: nothing left to strip.
            _ => return Err(PatchError::PathTraversal(relative_path.to_path_buf())),
        }
    }
    if target
        .strip_prefix(existing)
        .map(|rest| rest.components().any(|c| !matches!(c, Component::Normal(_))))
        .unwrap_or(true)
    {
        return Err(PatchError::PathTraversal(relative_path.to_path_buf()));
    }

    let mut final_path =
        fs::canonicalize(existing).map_err(|e| PatchError::from_io(existing.to_path_buf(), e))?;
    for name in missing.iter().rev() {
        final_path.push(name);
    }
    if !final_path.starts_with(&base_path) {
        return Err(PatchError::PathTraversal(relative_path.to_path_buf()));
    }
    Ok(final_path)
}
