//! Applies unified diffs written by language models to real source files.
//!
//! Model-generated diffs are usually *almost* right: line numbers drift, a
//! context line is stale, two hunks overlap, indentation is off by a level.
//! `diffmend` places each hunk with a fixed chain of strategies, refuses
//! placements that would duplicate a guard clause, verifies that every
//! change actually landed, and tells the model exactly which hunks to
//! regenerate when something cannot be applied safely.
//!
//! ## Getting Started
//!
//! The most common use case is to take a diff as the model produced it
//! (markdown fences and all) and apply it to a file in a project.
//!
//! ````rust
//! use diffmend::{apply_diff_to_file, AllowAll, PipelineOptions, PipelineStatus, WorkContext};
//! use std::fs;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // 1. Set up a project with a file to be patched.
//! let dir = tempfile::tempdir()?;
//! fs::create_dir_all(dir.path().join("src"))?;
//! fs::write(
//!     dir.path().join("src/main.rs"),
//!     "fn main() {\n    println!(\"Hello, world!\");\n}\n",
//! )?;
//!
//! // 2. The diff, as a model might return it. The line numbers are wrong.
//! let diff = r#"
//! ```diff
//! --- a/src/main.rs
//! +++ b/src/main.rs
//! @@ -7,3 +7,3 @@
//!  fn main() {
//! -    println!("Hello, world!");
//! +    println!("Hello, diffmend!");
//!  }
//! ```
//! "#;
//!
//! // 3. Apply it. Every write goes through a gate; `AllowAll` approves all.
//! let ctx = WorkContext::new(dir.path());
//! let outcome = apply_diff_to_file(
//!     &ctx,
//!     Path::new("src/main.rs"),
//!     diff,
//!     &PipelineOptions::default(),
//!     &AllowAll,
//! )?;
//!
//! assert_eq!(outcome.result.status, PipelineStatus::Success);
//! assert_eq!(
//!     fs::read_to_string(dir.path().join("src/main.rs"))?,
//!     "fn main() {\n    println!(\"Hello, diffmend!\");\n}\n"
//! );
//! # Ok(())
//! # }
//! ````
//!
//! ## Key Concepts
//!
//! ### The Pipeline
//!
//! A [`Pipeline`] run on one file goes through these steps:
//!
//! 1.  **Parsing:** [`parse_patch`] / [`parse_patches`] turn diff text into
//!     [`FilePatch`]es made of [`Hunk`]s.
//! 2.  **Overlap merging:** hunks whose original ranges overlap are folded
//!     into one hunk rebuilt from the real file ([`merge_overlapping_hunks`]).
//! 3.  **Indentation:** hunk lines are rewritten to the file's indentation
//!     style ([`detect_indentation_style`]).
//! 4.  **Placement:** each hunk is checked for being already applied, then
//!     the resolvers run in order: exact, context-anchored, conservative
//!     fuzzy, strict distinctive-line. The first answer at or above the
//!     confidence threshold is used.
//! 5.  **Application and verification:** the hunk is spliced in
//!     ([`apply_replacement`]), blank-line artifacts are removed, and the
//!     result is checked to really contain the change. [`verify_hunk`] and
//!     [`verify_hunk_changes`] check whole files after the fact.
//!
//! Every hunk ends as succeeded, already applied, or failed with a
//! [`HunkErrorKind`]. Failed hunks never block their siblings.
//!
//! ### Dry Runs
//!
//! [`validate_diff`] copies the target into a scratch directory and runs the
//! same file-level apply there. The project is never touched, and the
//! verdict is the one a real apply would give.
//!
//! ## Advanced Usage
//!
//! ### In-Memory Operations and Partial Failures
//!
//! ````rust
//! use diffmend::{Pipeline, PipelineOptions, PipelineStatus, HunkErrorKind};
//!
//! let original = "line 1\nline 2\nline 3\n\nline 5\nline 6\nline 7\n";
//! let diff = "\
//! @@ -1,3 +1,3 @@
//!  line 1
//! -line 2
//! +line two
//!  line 3
//! @@ -5,3 +5,3 @@
//!  nothing like
//! -the real file
//! +line six
//!  at all
//! ";
//!
//! let outcome = Pipeline::new(PipelineOptions::default()).run(diff, Some(original));
//!
//! assert_eq!(outcome.result.status, PipelineStatus::Partial);
//! assert_eq!(outcome.result.succeeded(), vec![1]);
//! let failures = outcome.result.failures();
//! assert_eq!(failures[0].hunk_number, 2);
//! assert_eq!(failures[0].kind, HunkErrorKind::HunkUnresolvable);
//! assert!(outcome.result.model_feedback.unwrap().contains("Regenerate hunks 2"));
//!
//! // The first hunk still applied.
//! assert_eq!(outcome.new_content, "line 1\nline two\nline 3\n\nline 5\nline 6\nline 7\n");
//! ````
//!
//! ## Feature Flags
//!
//! ### `parallel`
//!
//! - **Enabled by default.**
//! - Processes the files of a multi-file diff concurrently in
//!   [`apply_patches_to_dir`] and [`validate_patches`] using the
//!   [`rayon`](https://crates.io/crates/rayon) crate. Hunks within one file
//!   are always applied in order.
//!
//! - **To disable this feature**, specify `default-features = false` in your `Cargo.toml`:
//!   ```toml
//!   [dependencies]
//!   diffmend = { version = "0.3", default-features = false }
//!   ```

mod applier;
mod context;
mod duplication;
mod error;
mod hunk;
mod indent;
mod overlap;
mod parser;
mod pipeline;
pub mod resolve;
mod text;
mod validate;
mod verify;

pub use applier::{apply_hunk_at, apply_replacement, Splice};
pub use context::{ensure_path_is_safe, AllowAll, WorkContext, WriteGate};
pub use duplication::{is_guard_clause, DuplicationPreventer, DuplicationRisk};
pub use error::{FatalError, HunkErrorKind, HunkFailure, ParseError, PatchError};
pub use hunk::{FilePatch, Hunk, HunkLine, SkippedHunk};
pub use indent::{
    adjust_indentation, detect_indentation_style, normalize_hunk_indentation,
    preserve_relative_indentation, rebase_to_match, IndentStyle,
};
pub use overlap::{find_overlap_groups, merge_overlapping_hunks, OverlapResolution};
pub use parser::{parse_hunk_header, parse_patch, parse_patches, HunkHeader};
pub use pipeline::{
    model_feedback, run_pipeline, HunkStatus, Pipeline, PipelineOptions, PipelineOptionsBuilder,
    PipelineOutcome, PipelineResult, PipelineStatus,
};
pub use resolve::{is_distinctive_line, PositionKind, PositionResolver, ResolvedPosition};
pub use text::{normalize_line, LineEnding, SourceText};
pub use validate::{
    apply_diff_to_file, apply_patch_to_file, apply_patches_to_dir, validate_diff, validate_patch,
    validate_patches, ApplyOutcome, BatchResult, ValidationReport,
};
pub use verify::{is_already_applied, verify_changes_applied, verify_hunk, verify_hunk_changes};
