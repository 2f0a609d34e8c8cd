//! The per-file pipeline: parse, merge overlaps, place, apply and verify
//! each hunk, and report the outcome.

use crate::applier::apply_replacement;
use crate::duplication::DuplicationPreventer;
use crate::error::{FatalError, HunkErrorKind, HunkFailure};
use crate::hunk::{FilePatch, Hunk};
use crate::indent::{detect_indentation_style, normalize_hunk_indentation, rebase_to_match};
use crate::overlap::merge_overlapping_hunks;
use crate::parser::parse_patch;
use crate::resolve::{PositionResolver, ResolvedPosition, ResolverChain};
use crate::text::SourceText;
use crate::verify::{is_already_applied, verify_splice};
use log::{debug, info, trace, warn};
use std::collections::BTreeMap;
use std::fmt;

/// Tuning knobs for a pipeline run.
///
/// Build with [`PipelineOptions::builder`] or use [`Default`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOptions {
    /// Minimum confidence for a resolver's answer to be applied.
    pub confidence_threshold: f64,
    /// Anchor length used by the context-anchored resolver.
    pub context_size: usize,
    /// Lines searched either side of the claimed position by the fuzzy resolver.
    pub search_radius: usize,
    /// Search radius used once the claimed position has been vetoed.
    pub wide_search_radius: usize,
    /// Lines either side of a placement checked for duplicate guard clauses.
    pub duplication_window: usize,
    /// Let a full match near the claimed position beat a partial match at it
    /// in the fuzzy resolver.
    pub prefer_full_match: bool,
    /// Merge overlapping hunks before placement.
    pub merge_overlaps: bool,
    /// Rewrite hunk indentation to the file's style.
    pub normalize_indentation: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            context_size: 3,
            search_radius: 3,
            wide_search_radius: 10,
            duplication_window: 5,
            prefer_full_match: true,
            merge_overlaps: true,
            normalize_indentation: true,
        }
    }
}

impl PipelineOptions {
    /// Creates a new builder for `PipelineOptions`.
    ///
    /// # Example
    ///
    /// ```
    /// # use diffmend::PipelineOptions;
    /// let options = PipelineOptions::builder()
    ///     .confidence_threshold(0.7)
    ///     .merge_overlaps(false)
    ///     .duplication_window(8)
    ///     .build();
    ///
    /// assert_eq!(options.confidence_threshold, 0.7);
    /// assert!(!options.merge_overlaps);
    /// assert_eq!(options.duplication_window, 8);
    /// assert_eq!(options.search_radius, 3);
    /// assert!(options.prefer_full_match);
    /// ```
    pub fn builder() -> PipelineOptionsBuilder {
        PipelineOptionsBuilder::default()
    }
}

/// A builder for creating `PipelineOptions`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptionsBuilder {
    confidence_threshold: Option<f64>,
    context_size: Option<usize>,
    search_radius: Option<usize>,
    wide_search_radius: Option<usize>,
    duplication_window: Option<usize>,
    prefer_full_match: Option<bool>,
    merge_overlaps: Option<bool>,
    normalize_indentation: Option<bool>,
}

impl PipelineOptionsBuilder {
    /// Sets the minimum confidence for applying a position (0.0 to 1.0).
    pub fn confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = Some(threshold);
        self
    }

    /// Sets how many lines at each end of a hunk the context-anchored
    /// resolver matches on.
    pub fn context_size(mut self, lines: usize) -> Self {
        self.context_size = Some(lines);
        self
    }

    /// Sets how far either side of the claimed position the fuzzy resolver
    /// looks.
    pub fn search_radius(mut self, lines: usize) -> Self {
        self.search_radius = Some(lines);
        self
    }

    /// Sets the fuzzy search radius used after the claimed position was
    /// vetoed. Never smaller than `search_radius`.
    pub fn wide_search_radius(mut self, lines: usize) -> Self {
        self.wide_search_radius = Some(lines);
        self
    }

    /// Sets how many lines either side of a placement are checked for an
    /// identical guard clause.
    pub fn duplication_window(mut self, lines: usize) -> Self {
        self.duplication_window = Some(lines);
        self
    }

    /// If `false`, a partial match at the claimed position is kept even when
    /// the whole block matches a few lines away.
    pub fn prefer_full_match(mut self, prefer: bool) -> Self {
        self.prefer_full_match = Some(prefer);
        self
    }

    /// If `false`, overlapping hunks are placed one by one as written.
    pub fn merge_overlaps(mut self, merge: bool) -> Self {
        self.merge_overlaps = Some(merge);
        self
    }

    /// If `false`, hunk lines are applied with their own indentation.
    pub fn normalize_indentation(mut self, normalize: bool) -> Self {
        self.normalize_indentation = Some(normalize);
        self
    }

    /// Builds the `PipelineOptions`.
    pub fn build(self) -> PipelineOptions {
        let default = PipelineOptions::default();
        PipelineOptions {
            confidence_threshold: self
                .confidence_threshold
                .unwrap_or(default.confidence_threshold),
            context_size: self.context_size.unwrap_or(default.context_size),
            search_radius: self.search_radius.unwrap_or(default.search_radius),
            wide_search_radius: self
                .wide_search_radius
                .unwrap_or(default.wide_search_radius),
            duplication_window: self
                .duplication_window
                .unwrap_or(default.duplication_window),
            prefer_full_match: self
                .prefer_full_match
                .unwrap_or(default.prefer_full_match),
            merge_overlaps: self.merge_overlaps.unwrap_or(default.merge_overlaps),
            normalize_indentation: self
                .normalize_indentation
                .unwrap_or(default.normalize_indentation),
        }
    }
}

/// Where a hunk ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum HunkStatus {
    /// Not processed; only seen when a fatal error stopped the run.
    Pending,
    /// Placed, spliced in and verified.
    Succeeded {
        /// Resolver that chose the position, or `"insertion"` for pure
        /// insertions placed by line number.
        strategy: &'static str,
        /// 0-based line offset in the file as it was when the hunk was applied.
        offset: usize,
        confidence: f64,
    },
    /// The change was already in the file; nothing was written for it.
    AlreadyApplied,
    Failed(HunkFailure),
}

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    /// Every hunk succeeded or was already applied.
    Success,
    /// At least one hunk failed.
    Partial,
    /// The run stopped before any hunk was attempted.
    Error,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineStatus::Success => "success",
            PipelineStatus::Partial => "partial",
            PipelineStatus::Error => "error",
        })
    }
}

/// The structured report of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    /// Status of every hunk, keyed by its ordinal in the diff.
    pub hunks: BTreeMap<usize, HunkStatus>,
    pub status: PipelineStatus,
    /// Set when `status` is [`PipelineStatus::Error`].
    pub error: Option<FatalError>,
    /// Instructions for regenerating the failed hunks. Present only when
    /// some hunk failed.
    pub model_feedback: Option<String>,
}

impl PipelineResult {
    pub(crate) fn fatal(error: FatalError) -> Self {
        warn!("Pipeline stopped: {}", error);
        PipelineResult {
            hunks: BTreeMap::new(),
            status: PipelineStatus::Error,
            error: Some(error),
            model_feedback: None,
        }
    }

    /// Ordinals of the hunks that were applied in this run.
    pub fn succeeded(&self) -> Vec<usize> {
        self.with_status(|s| matches!(s, HunkStatus::Succeeded { .. }))
    }

    /// Ordinals of the hunks that were already in the file.
    pub fn already_applied(&self) -> Vec<usize> {
        self.with_status(|s| matches!(s, HunkStatus::AlreadyApplied))
    }

    /// Ordinals of the hunks that failed.
    pub fn failed(&self) -> Vec<usize> {
        self.with_status(|s| matches!(s, HunkStatus::Failed(_)))
    }

    /// Every failure, in ordinal order.
    pub fn failures(&self) -> Vec<&HunkFailure> {
        self.hunks
            .values()
            .filter_map(|s| match s {
                HunkStatus::Failed(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    /// `true` when the run succeeded for every hunk.
    pub fn is_success(&self) -> bool {
        self.status == PipelineStatus::Success
    }

    fn with_status(&self, pred: impl Fn(&HunkStatus) -> bool) -> Vec<usize> {
        self.hunks
            .iter()
            .filter(|(_, s)| pred(s))
            .map(|(n, _)| *n)
            .collect()
    }
}

/// New file content plus the report that explains it.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    /// The content after every successful hunk. Equal to the original when
    /// nothing was applied.
    pub new_content: String,
    pub result: PipelineResult,
}

/// Builds the corrective message for a model whose hunks failed.
///
/// # Example
///
/// ```
/// # use diffmend::{model_feedback, HunkFailure, HunkErrorKind};
/// let failure = HunkFailure {
///     hunk_number: 2,
///     kind: HunkErrorKind::HunkUnresolvable,
///     details: "no resolver reached 0.50".into(),
/// };
/// let text = model_feedback(&[&failure]).unwrap();
/// assert!(text.contains("Hunk 2 (hunk_unresolvable)"));
/// assert!(text.contains("Regenerate hunks 2 with ≥5 context lines using current file content."));
/// assert!(model_feedback(&[]).is_none());
/// ```
pub fn model_feedback(failures: &[&HunkFailure]) -> Option<String> {
    if failures.is_empty() {
        return None;
    }
    let ids = failures
        .iter()
        .map(|f| f.hunk_number.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let mut text = format!("{} hunk(s) could not be applied:\n", failures.len());
    for failure in failures {
        text.push_str(&format!(
            "- Hunk {} ({}): {}\n",
            failure.hunk_number, failure.kind, failure.details
        ));
    }
    text.push_str(&format!(
        "Regenerate hunks {ids} with ≥5 context lines using current file content."
    ));
    Some(text)
}

/// Runs diffs against file content in memory.
///
/// # Example
///
/// ```
/// use diffmend::{Pipeline, PipelineOptions, PipelineStatus};
///
/// let original = "fn main() {\n    println!(\"Hello\");\n}\n";
/// let diff = "@@ -1,3 +1,3 @@\n fn main() {\n-    println!(\"Hello\");\n+    println!(\"Hello, world!\");\n }\n";
///
/// let pipeline = Pipeline::new(PipelineOptions::default());
/// let outcome = pipeline.run(diff, Some(original));
///
/// assert_eq!(outcome.result.status, PipelineStatus::Success);
/// assert_eq!(outcome.new_content, "fn main() {\n    println!(\"Hello, world!\");\n}\n");
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline {
    options: PipelineOptions,
    resolvers: ResolverChain,
    preventer: DuplicationPreventer,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            resolvers: ResolverChain::new(&options),
            preventer: DuplicationPreventer::new(options.duplication_window),
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Parses `diff` and runs it. A parse failure yields an `error`-status
    /// result with the original content unchanged.
    pub fn run(&self, diff: &str, original: Option<&str>) -> PipelineOutcome {
        match parse_patch(diff) {
            Ok(patch) => self.run_patch(&patch, original),
            Err(e) => PipelineOutcome {
                new_content: original.unwrap_or_default().to_string(),
                result: PipelineResult::fatal(e.into()),
            },
        }
    }

    /// Runs an already-parsed patch. `None` means the file does not exist yet.
    pub fn run_patch(&self, patch: &FilePatch, original: Option<&str>) -> PipelineOutcome {
        let total = patch.hunks.len() + patch.skipped.len();
        let mut text = SourceText::parse(original.unwrap_or_default());
        let original_trailing = text.trailing_newline;
        let mut statuses: BTreeMap<usize, HunkStatus> = patch
            .hunks
            .iter()
            .map(|h| (h.number, HunkStatus::Pending))
            .collect();
        for skipped in &patch.skipped {
            warn!("  Hunk {} was not parsed: '{}'", skipped.number, skipped.header);
            statuses.insert(
                skipped.number,
                HunkStatus::Failed(HunkFailure {
                    hunk_number: skipped.number,
                    kind: HunkErrorKind::MalformedHeader,
                    details: format!(
                        "header '{}' on diff line {} is not of the form '@@ -a,b +c,d @@'",
                        skipped.header.trim(),
                        skipped.line
                    ),
                }),
            );
        }

        let mut hunks = if self.options.merge_overlaps {
            let resolution = merge_overlapping_hunks(&patch.hunks, &text.lines);
            for conflict in resolution.conflicts {
                statuses.insert(conflict.hunk_number, HunkStatus::Failed(conflict));
            }
            resolution.hunks
        } else {
            let mut hunks = patch.hunks.clone();
            hunks.sort_by_key(|h| (h.old_start, h.number));
            hunks
        };

        if self.options.normalize_indentation && original.is_some_and(has_indentation) {
            let style = detect_indentation_style(original.unwrap_or_default());
            debug!("  File indentation: {:?}", style);
            hunks = hunks
                .iter()
                .map(|h| normalize_hunk_indentation(h, style))
                .collect();
        }

        // Hunk headers refer to the original file; earlier splices shift
        // everything below them.
        let mut drift: isize = 0;
        for hunk in &hunks {
            info!(
                "  Applying Hunk {}/{}{}...",
                hunk.number,
                total,
                match &hunk.merged_from {
                    Some(set) => format!(" (merged {:?})", set),
                    None => String::new(),
                }
            );
            let placed = shifted(hunk, drift);
            let status = self.process_hunk(&mut text.lines, &placed, &mut drift);
            if let HunkStatus::Failed(failure) = &status {
                warn!("  Failed to apply Hunk {}. {}", hunk.number, failure.details);
            }
            for ordinal in hunk.ordinals() {
                let status = match &status {
                    HunkStatus::Failed(f) => HunkStatus::Failed(HunkFailure {
                        hunk_number: ordinal,
                        ..f.clone()
                    }),
                    other => other.clone(),
                };
                statuses.insert(ordinal, status);
            }
        }

        text.trailing_newline = if !patch.ends_with_newline {
            false
        } else if original.is_some() && !text.lines.is_empty() {
            original_trailing
        } else {
            true
        };

        let failures: Vec<&HunkFailure> = statuses
            .values()
            .filter_map(|s| match s {
                HunkStatus::Failed(f) => Some(f),
                _ => None,
            })
            .collect();
        let status = if failures.is_empty() {
            PipelineStatus::Success
        } else {
            PipelineStatus::Partial
        };
        let model_feedback = model_feedback(&failures);
        debug!(
            "Pipeline finished with status {} ({} hunk(s), {} failed)",
            status,
            statuses.len(),
            failures.len()
        );

        PipelineOutcome {
            new_content: text.render(),
            result: PipelineResult {
                hunks: statuses,
                status,
                error: None,
                model_feedback,
            },
        }
    }

    fn process_hunk(&self, lines: &mut Vec<String>, hunk: &Hunk, drift: &mut isize) -> HunkStatus {
        if !hunk.has_changes() {
            debug!("  Skipping hunk (no changes).");
            return HunkStatus::AlreadyApplied;
        }
        if is_already_applied(lines, hunk, self.options.duplication_window) {
            info!("  Hunk {} is already applied.", hunk.number);
            return HunkStatus::AlreadyApplied;
        }

        let (strategy, offset, confidence) = if hunk.is_pure_insertion() {
            let offset = hunk.expected_offset().min(lines.len());
            debug!("    Pure insertion at line {}", offset + 1);
            ("insertion", offset, 1.0)
        } else {
            match self.resolve(lines, hunk) {
                Ok(found) => found,
                Err(failure) => return HunkStatus::Failed(failure),
            }
        };

        let replacement = if self.options.normalize_indentation {
            lines
                .get(offset)
                .and_then(|line| rebase_to_match(hunk, line))
                .unwrap_or_else(|| hunk.new_lines.clone())
        } else {
            hunk.new_lines.clone()
        };

        let before = lines.clone();
        let splice = apply_replacement(lines, offset, hunk.old_count, &replacement);
        *drift += splice.delta;

        let (verified, reason) = verify_splice(&before, &lines[..], hunk);
        trace!("    Verification: {}", reason);
        if !verified {
            return HunkStatus::Failed(HunkFailure {
                hunk_number: hunk.number,
                kind: HunkErrorKind::VerificationMismatch,
                details: format!(
                    "applied at line {} via {} but {}",
                    offset + 1,
                    strategy,
                    reason
                ),
            });
        }
        HunkStatus::Succeeded {
            strategy,
            offset,
            confidence,
        }
    }

    /// Tries each resolver in order and returns the first accepted position.
    ///
    /// Only an exact match may add a guard clause next to an identical one;
    /// any other placement that would is passed over.
    fn resolve(&self, lines: &[String], hunk: &Hunk) -> Result<(&'static str, usize, f64), HunkFailure> {
        let threshold = self.options.confidence_threshold;
        let mut vetoed: Vec<usize> = Vec::new();
        let mut tried: Vec<String> = Vec::new();

        for resolver in self.resolvers.iter() {
            let position: ResolvedPosition = resolver.resolve(lines, hunk);
            trace!(
                "    {}: {:?} at {:?} ({:.3})",
                resolver.name(),
                position.kind,
                position.offset,
                position.confidence
            );
            vetoed.extend(&position.vetoed);
            if position.is_accepted(threshold) {
                if let Some(offset) = position.offset {
                    if resolver.name() != "exact" {
                        if let Some(risk) = self.preventer.check(lines, offset, hunk) {
                            debug!(
                                "    {} placement at line {} vetoed: '{}' already at line {}",
                                resolver.name(),
                                offset + 1,
                                risk.line.trim(),
                                risk.existing_at + 1
                            );
                            vetoed.push(offset);
                            tried.push(format!("{} vetoed", resolver.name()));
                            continue;
                        }
                    }
                    debug!(
                        "    Placed by {} at line {} (confidence {:.3})",
                        resolver.name(),
                        offset + 1,
                        position.confidence
                    );
                    return Ok((resolver.name(), offset, position.confidence));
                }
            }
            tried.push(format!("{} {:.2}", resolver.name(), position.confidence));
        }

        vetoed.sort_unstable();
        vetoed.dedup();
        let failure = if vetoed.is_empty() {
            HunkFailure {
                hunk_number: hunk.number,
                kind: HunkErrorKind::HunkUnresolvable,
                details: format!(
                    "no position reached confidence {:.2} near line {} (tried {})",
                    threshold,
                    hunk.old_start,
                    tried.join(", ")
                ),
            }
        } else {
            HunkFailure {
                hunk_number: hunk.number,
                kind: HunkErrorKind::DuplicationRisk,
                details: format!(
                    "placing it at line(s) {} would duplicate a guard clause already nearby",
                    vetoed
                        .iter()
                        .map(|o| (o + 1).to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            }
        };
        Err(failure)
    }
}

/// A copy of `hunk` with its claimed start moved by `drift` lines.
fn shifted(hunk: &Hunk, drift: isize) -> Hunk {
    let mut moved = hunk.clone();
    moved.old_start = hunk.old_start.saturating_add_signed(drift);
    if hunk.old_start > 0 && moved.old_start == 0 && !hunk.is_pure_insertion() {
        moved.old_start = 1;
    }
    moved
}

fn has_indentation(content: &str) -> bool {
    content
        .lines()
        .any(|l| l.starts_with([' ', '\t']) && !l.trim().is_empty())
}

/// Runs `diff` against `original`; shorthand for [`Pipeline::run`].
pub fn run_pipeline(diff: &str, original: Option<&str>, options: &PipelineOptions) -> PipelineOutcome {
    Pipeline::new(*options).run(diff, original)
}
