//! Applying diffs to files on disk, and validating them without touching
//! the project.
//!
//! A dry run copies the target into a scratch directory and runs exactly
//! the same [`apply_patch_to_file`] there, so its verdict cannot drift from
//! what a real apply would do.

use crate::context::{AllowAll, WorkContext, WriteGate};
use crate::error::{FatalError, PatchError};
use crate::hunk::FilePatch;
use crate::parser::parse_patch;
use crate::pipeline::{Pipeline, PipelineOptions, PipelineResult, PipelineStatus};
use log::{debug, info, trace, warn};
use similar::udiff::unified_diff;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// The result of applying a diff to one file.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    /// Absolute path of the target.
    pub path: PathBuf,
    pub result: PipelineResult,
    /// Content after the run; `None` when the run stopped with a fatal error.
    pub new_content: Option<String>,
    /// `true` when the file was written.
    pub written: bool,
}

/// The result of a dry run.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub result: PipelineResult,
    /// Unified diff from the current content to the content a real apply
    /// would produce. `None` after a fatal error.
    pub preview: Option<String>,
}

impl ValidationReport {
    /// Corrective instructions for failed hunks, if any.
    pub fn model_feedback(&self) -> Option<&str> {
        self.result.model_feedback.as_deref()
    }

    /// `true` when a real apply would succeed for every hunk.
    pub fn would_succeed(&self) -> bool {
        self.result.status == PipelineStatus::Success
    }
}

/// The result of applying several patches.
#[derive(Debug)]
pub struct BatchResult {
    /// One entry per patch: the target path and what happened to it.
    pub results: Vec<(PathBuf, Result<ApplyOutcome, PatchError>)>,
}

impl BatchResult {
    /// Checks that no patch hit a hard error. Hunk failures do not count.
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|(_, res)| res.is_ok())
    }

    /// Returns every patch that ended in a hard error.
    pub fn hard_failures(&self) -> Vec<(&PathBuf, &PatchError)> {
        self.results
            .iter()
            .filter_map(|(path, res)| res.as_ref().err().map(|e| (path, e)))
            .collect()
    }
}

/// Parses `diff_text` and applies it to `path` inside the project.
///
/// Parse errors and a missing target are reported as an `error`-status
/// result; I/O problems, path traversal and a refused write are `Err`.
///
/// # Example
///
/// ```
/// use diffmend::{apply_diff_to_file, AllowAll, PipelineOptions, PipelineStatus, WorkContext};
/// use std::{fs, path::Path};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = tempfile::tempdir()?;
/// fs::write(dir.path().join("hello.txt"), "Hello, world!\n")?;
///
/// let diff = "--- a/hello.txt\n+++ b/hello.txt\n@@ -1 +1 @@\n-Hello, world!\n+Hello, diffmend!\n";
/// let ctx = WorkContext::new(dir.path());
/// let outcome = apply_diff_to_file(&ctx, Path::new("hello.txt"), diff, &PipelineOptions::default(), &AllowAll)?;
///
/// assert_eq!(outcome.result.status, PipelineStatus::Success);
/// assert_eq!(fs::read_to_string(dir.path().join("hello.txt"))?, "Hello, diffmend!\n");
/// # Ok(())
/// # }
/// ```
pub fn apply_diff_to_file(
    ctx: &WorkContext,
    path: &Path,
    diff_text: &str,
    options: &PipelineOptions,
    gate: &dyn WriteGate,
) -> Result<ApplyOutcome, PatchError> {
    match parse_patch(diff_text) {
        Ok(patch) => apply_patch_to_file(ctx, &patch, path, options, gate),
        Err(e) => Ok(ApplyOutcome {
            path: ctx.root().join(path),
            result: PipelineResult::fatal(e.into()),
            new_content: None,
            written: false,
        }),
    }
}

/// Applies a parsed patch to `path` inside the project.
///
/// The file is written only when the content changed and `gate` approves;
/// a refused write is [`PatchError::WriteDenied`] and leaves the file as it
/// was. Partial results are written, so the hunks that did apply stick.
pub fn apply_patch_to_file(
    ctx: &WorkContext,
    patch: &FilePatch,
    path: &Path,
    options: &PipelineOptions,
    gate: &dyn WriteGate,
) -> Result<ApplyOutcome, PatchError> {
    info!("Applying patch to: {}", path.display());
    let relative = ctx.relative(path)?;
    let target = ctx.resolve(relative)?;
    trace!("    Path is safe.");

    if target.is_dir() {
        return Err(PatchError::TargetIsDirectory { path: target });
    }

    let original = if target.is_file() {
        trace!("  Reading target file '{}'", relative.display());
        Some(fs::read_to_string(&target).map_err(|e| PatchError::from_io(target.clone(), e))?)
    } else if patch.is_creation() {
        info!("  Target file does not exist. Assuming file creation.");
        None
    } else {
        return Ok(ApplyOutcome {
            result: PipelineResult::fatal(FatalError::TargetMissing(relative.to_path_buf())),
            path: target,
            new_content: None,
            written: false,
        });
    };

    let outcome = Pipeline::new(*options).run_patch(patch, original.as_deref());
    let changed = original.as_deref() != Some(outcome.new_content.as_str());

    let mut written = false;
    if changed && outcome.result.status != PipelineStatus::Error {
        if !gate.is_write_allowed(&target) {
            warn!("  Write to '{}' was refused.", relative.display());
            return Err(PatchError::WriteDenied(target));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| PatchError::from_io(parent.to_path_buf(), e))?;
        }
        fs::write(&target, &outcome.new_content)
            .map_err(|e| PatchError::from_io(target.clone(), e))?;
        written = true;
        if outcome.result.is_success() {
            info!("  Successfully wrote changes to '{}'", relative.display());
        } else {
            warn!("  Wrote partial changes to '{}'", relative.display());
        }
    } else {
        debug!("  No changes to write for '{}'", relative.display());
    }

    Ok(ApplyOutcome {
        path: target,
        result: outcome.result,
        new_content: Some(outcome.new_content),
        written,
    })
}

/// Parses `diff_text` and reports what applying it to `path` would do,
/// without modifying the project.
pub fn validate_diff(
    ctx: &WorkContext,
    path: &Path,
    diff_text: &str,
    options: &PipelineOptions,
) -> Result<ValidationReport, PatchError> {
    match parse_patch(diff_text) {
        Ok(patch) => validate_patch(ctx, &patch, path, options),
        Err(e) => Ok(ValidationReport {
            result: PipelineResult::fatal(e.into()),
            preview: None,
        }),
    }
}

/// Runs a real apply against a scratch copy of `path` and reports it.
///
/// The scratch directory is removed when this returns, on every path out.
///
/// # Example
///
/// ```
/// use diffmend::{validate_patch, parse_patch, PipelineOptions, WorkContext};
/// use std::{fs, path::Path};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = tempfile::tempdir()?;
/// fs::write(dir.path().join("a.txt"), "one\ntwo\n")?;
/// let patch = parse_patch("@@ -2 +2 @@\n-two\n+TWO\n")?;
///
/// let report = validate_patch(&WorkContext::new(dir.path()), &patch, Path::new("a.txt"), &PipelineOptions::default())?;
/// assert!(report.would_succeed());
/// assert!(report.preview.unwrap().contains("+TWO"));
/// assert_eq!(fs::read_to_string(dir.path().join("a.txt"))?, "one\ntwo\n");
/// # Ok(())
/// # }
/// ```
pub fn validate_patch(
    ctx: &WorkContext,
    patch: &FilePatch,
    path: &Path,
    options: &PipelineOptions,
) -> Result<ValidationReport, PatchError> {
    let relative = ctx.relative(path)?;
    let source = ctx.resolve(relative)?;
    if source.is_dir() {
        return Err(PatchError::TargetIsDirectory { path: source });
    }

    let scratch = tempfile::tempdir().map_err(PatchError::Scratch)?;
    debug!("  DRY RUN: scratch copy in '{}'", scratch.path().display());
    let scratch_ctx = WorkContext::new(scratch.path());
    let copy = scratch.path().join(relative);

    let original = if source.is_file() {
        if let Some(parent) = copy.parent() {
            fs::create_dir_all(parent).map_err(PatchError::Scratch)?;
        }
        fs::copy(&source, &copy).map_err(|e| PatchError::from_io(source.clone(), e))?;
        Some(fs::read_to_string(&source).map_err(|e| PatchError::from_io(source.clone(), e))?)
    } else {
        None
    };

    let outcome = apply_patch_to_file(&scratch_ctx, patch, relative, options, &AllowAll)?;
    let preview = outcome.new_content.as_ref().map(|new_content| {
        let old = original.as_deref().unwrap_or_default();
        let old_header = format!("a/{}", relative.display());
        let new_header = format!("b/{}", relative.display());
        unified_diff(
            similar::Algorithm::default(),
            old,
            new_content,
            3,
            Some((old_header.as_str(), new_header.as_str())),
        )
    });

    info!(
        "  DRY RUN: '{}' would end with status {}",
        relative.display(),
        outcome.result.status
    );
    Ok(ValidationReport {
        result: outcome.result,
        preview,
    })
}

fn patch_target(patch: &FilePatch) -> PathBuf {
    patch.target_path().map(Path::to_path_buf).unwrap_or_default()
}

/// Applies each patch to the file it names. Hard errors are collected per
/// patch; one failing file does not stop the others.
///
/// With the `parallel` feature the files are processed concurrently.
pub fn apply_patches_to_dir(
    ctx: &WorkContext,
    patches: &[FilePatch],
    options: &PipelineOptions,
    gate: &(dyn WriteGate + Sync),
) -> BatchResult {
    let run = |patch: &FilePatch| {
        let path = patch_target(patch);
        let result = apply_patch_to_file(ctx, patch, &path, options, gate);
        (path, result)
    };

    #[cfg(feature = "parallel")]
    let results = patches.par_iter().map(run).collect();
    #[cfg(not(feature = "parallel"))]
    let results = patches.iter().map(run).collect();

    BatchResult { results }
}

/// Dry-runs each patch against the file it names.
pub fn validate_patches(
    ctx: &WorkContext,
    patches: &[FilePatch],
    options: &PipelineOptions,
) -> Vec<(PathBuf, Result<ValidationReport, PatchError>)> {
    let run = |patch: &FilePatch| {
        let path = patch_target(patch);
        let report = validate_patch(ctx, patch, &path, options);
        (path, report)
    };

    #[cfg(feature = "parallel")]
    let reports = patches.par_iter().map(run).collect();
    #[cfg(not(feature = "parallel"))]
    let reports = patches.iter().map(run).collect();

    reports
}
