//! Error types for parsing, file handling and per-hunk failures.
//!
//! There are three tiers:
//!
//! - [`PatchError`] is a "hard" error (I/O, path traversal, a denied write).
//!   It is returned as `Err` from the file-level functions and stops work on
//!   that file.
//! - [`FatalError`] ends a pipeline run before any hunk is attempted. It is
//!   reported inside an `error`-status [`PipelineResult`](crate::PipelineResult)
//!   rather than returned, so the caller always gets a structured result.
//! - [`HunkFailure`] describes one hunk that could not be applied. Sibling
//!   hunks still run.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning diff text into hunks.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// A `@@ -a,b +c,d @@` header could not be read and no other hunk in the
    /// diff was valid.
    #[error("Malformed hunk header on line {line}: '{header}'")]
    MalformedHeader {
        /// 1-based line number of the header in the diff text.
        line: usize,
        /// The offending header line.
        header: String,
    },
    /// The diff contained no hunks at all.
    #[error("Diff contains no hunks")]
    NoHunks,
    /// A multi-file diff had hunks before any `---`/`+++` file header.
    #[error(
        "Hunks starting on line {line} were found without a file path header (e.g., '--- a/path/to/file')"
    )]
    MissingFileHeader {
        /// 1-based line number of the first orphaned hunk header.
        line: usize,
    },
}

/// Errors that end a pipeline run for a file before any hunk is attempted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FatalError {
    /// The diff could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The diff modifies a file that does not exist and is not a creation.
    #[error("Target file not found for patching: {0}")]
    TargetMissing(PathBuf),
}

/// Hard errors from the file-level apply and validate functions.
#[derive(Error, Debug)]
pub enum PatchError {
    /// The target path resolves outside the project root.
    #[error("Path '{0}' resolves outside the project root. Aborting for security.")]
    PathTraversal(PathBuf),
    /// The write gate refused the target path.
    #[error("Write to '{0}' was not approved")]
    WriteDenied(PathBuf),
    /// The user does not have permission to read or write to the specified path.
    #[error("Permission denied for path: {path:?}")]
    PermissionDenied { path: PathBuf },
    /// The target path for a patch exists but is a directory, not a file.
    #[error("Target path is a directory, not a file: {path:?}")]
    TargetIsDirectory { path: PathBuf },
    /// The scratch directory for a dry run could not be prepared.
    #[error("Failed to prepare validation scratch space: {0}")]
    Scratch(#[source] std::io::Error),
    /// An I/O error occurred while reading or writing a file.
    #[error("I/O error while processing {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PatchError {
    /// Converts a `std::io::Error` into the most specific variant.
    pub(crate) fn from_io(path: PathBuf, e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => PatchError::PermissionDenied { path },
            std::io::ErrorKind::IsADirectory => PatchError::TargetIsDirectory { path },
            _ => PatchError::Io { path, source: e },
        }
    }
}

/// Why a single hunk failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HunkErrorKind {
    /// No resolver reached its acceptance threshold.
    HunkUnresolvable,
    /// Candidate positions existed but every one was vetoed because applying
    /// there would duplicate a guard clause already nearby.
    DuplicationRisk,
    /// The hunk was spliced in but the result does not show its change.
    VerificationMismatch,
    /// The hunk overlaps another hunk whose edits are incompatible with it.
    OverlapConflict,
    /// The hunk's `@@` header could not be read, so its body was never parsed.
    MalformedHeader,
}

impl HunkErrorKind {
    /// Stable snake_case name used in model feedback.
    pub fn as_str(&self) -> &'static str {
        match self {
            HunkErrorKind::HunkUnresolvable => "hunk_unresolvable",
            HunkErrorKind::DuplicationRisk => "duplication_risk",
            HunkErrorKind::VerificationMismatch => "verification_mismatch",
            HunkErrorKind::OverlapConflict => "overlap_conflict",
            HunkErrorKind::MalformedHeader => "malformed_header",
        }
    }
}

impl std::fmt::Display for HunkErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Details about a hunk that failed to apply.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Hunk {hunk_number} failed ({kind}): {details}")]
pub struct HunkFailure {
    /// The 1-based ordinal of the hunk in the diff.
    pub hunk_number: usize,
    /// The category of failure.
    pub kind: HunkErrorKind,
    /// Human-readable explanation.
    pub details: String,
}
