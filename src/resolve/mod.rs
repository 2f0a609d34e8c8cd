//! Position resolution: deciding where in the current file a hunk applies.
//!
//! Four strategies implement [`PositionResolver`]. They are held in a
//! [`ResolverChain`] and always tried in the same order; the first one whose
//! answer is accepted wins, regardless of what later strategies might score.

mod anchored;
mod exact;
mod fuzzy;
mod strict;

pub use anchored::ContextAnchoredResolver;
pub use exact::ExactMatchResolver;
pub use fuzzy::ConservativeFuzzyResolver;
pub use strict::{is_distinctive_line, StrictDistinctiveResolver};

use crate::duplication::DuplicationPreventer;
use crate::hunk::Hunk;
use crate::pipeline::PipelineOptions;
use crate::text::lines_equal;

/// What kind of answer a resolver gave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionKind {
    /// The resolver found content supporting this position.
    Matched,
    /// Nothing qualified; the offset is the hunk's own claim, reported for
    /// diagnostics only.
    Fallback,
    /// The resolver declined to choose between look-alike regions.
    Deferred,
    /// The strategy does not apply to this hunk.
    NotApplicable,
}

/// A resolver's proposal.
///
/// `confidence` orders proposals and is compared against thresholds; it is
/// not a probability.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPosition {
    /// 0-based line offset, or `None` when no position could be proposed.
    pub offset: Option<usize>,
    pub confidence: f64,
    pub kind: PositionKind,
    /// Candidate offsets the duplication check rejected along the way.
    pub vetoed: Vec<usize>,
}

impl ResolvedPosition {
    pub fn matched(offset: usize, confidence: f64) -> Self {
        Self {
            offset: Some(offset),
            confidence,
            kind: PositionKind::Matched,
            vetoed: Vec::new(),
        }
    }

    pub fn fallback(offset: usize, confidence: f64) -> Self {
        Self {
            offset: Some(offset),
            confidence,
            kind: PositionKind::Fallback,
            vetoed: Vec::new(),
        }
    }

    pub fn deferred(offset: usize, confidence: f64) -> Self {
        Self {
            offset: Some(offset),
            confidence,
            kind: PositionKind::Deferred,
            vetoed: Vec::new(),
        }
    }

    pub fn not_applicable() -> Self {
        Self {
            offset: None,
            confidence: 0.0,
            kind: PositionKind::NotApplicable,
            vetoed: Vec::new(),
        }
    }

    pub fn with_vetoes(mut self, vetoed: Vec<usize>) -> Self {
        self.vetoed = vetoed;
        self
    }

    /// Only a matched position at or above `threshold` is applied.
    pub fn is_accepted(&self, threshold: f64) -> bool {
        self.kind == PositionKind::Matched && self.offset.is_some() && self.confidence >= threshold
    }
}

/// A strategy for locating a hunk in the current file content.
pub trait PositionResolver {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Proposes an offset for `hunk` in `file_lines`.
    fn resolve(&self, file_lines: &[String], hunk: &Hunk) -> ResolvedPosition;
}

/// The four resolvers in priority order.
#[derive(Debug, Clone)]
pub struct ResolverChain {
    exact: ExactMatchResolver,
    anchored: ContextAnchoredResolver,
    fuzzy: ConservativeFuzzyResolver,
    strict: StrictDistinctiveResolver,
}

impl ResolverChain {
    pub fn new(options: &PipelineOptions) -> Self {
        let preventer = DuplicationPreventer::new(options.duplication_window);
        Self {
            exact: ExactMatchResolver,
            anchored: ContextAnchoredResolver::new(options.context_size),
            fuzzy: ConservativeFuzzyResolver::new(
                options.search_radius,
                options.wide_search_radius,
                preventer,
            )
            .prefer_full_match(options.prefer_full_match),
            strict: StrictDistinctiveResolver::new(preventer),
        }
    }

    /// Exact, context-anchored, conservative fuzzy, strict distinctive-line.
    pub fn iter(&self) -> impl Iterator<Item = &dyn PositionResolver> {
        [
            &self.exact as &dyn PositionResolver,
            &self.anchored,
            &self.fuzzy,
            &self.strict,
        ]
        .into_iter()
    }
}

/// Fraction of `block` lines equal (ignoring surrounding whitespace) to the
/// file lines at `offset`. Lines past the end of the file count as misses.
pub fn match_ratio(file_lines: &[String], offset: usize, block: &[String]) -> f64 {
    if block.is_empty() {
        return 0.0;
    }
    let hits = block
        .iter()
        .enumerate()
        .filter(|(i, expected)| {
            file_lines
                .get(offset + i)
                .is_some_and(|actual| lines_equal(actual, expected))
        })
        .count();
    hits as f64 / block.len() as f64
}

/// The hunk's claimed offset pulled back inside the file, so a hunk whose
/// header points past the end is searched for near the end.
pub(crate) fn clamped_expected(file_lines: &[String], hunk: &Hunk) -> usize {
    hunk.expected_offset()
        .min(file_lines.len().saturating_sub(hunk.old_count))
}
