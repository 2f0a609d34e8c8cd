use super::{PositionResolver, ResolvedPosition};
use crate::hunk::Hunk;
use crate::text::block_matches_at;
use log::trace;

const ANCHOR_CONFIDENCE: f64 = 0.9;

/// Locates a hunk by its leading and trailing context, tolerating drift in
/// the lines between them.
///
/// Only hunks with at least `2 * context_size` original lines are eligible,
/// so the two anchors never overlap.
#[derive(Debug, Clone, Copy)]
pub struct ContextAnchoredResolver {
    context_size: usize,
}

impl ContextAnchoredResolver {
    pub fn new(context_size: usize) -> Self {
        Self {
            context_size: context_size.max(1),
        }
    }
}

impl PositionResolver for ContextAnchoredResolver {
    fn name(&self) -> &'static str {
        "context-anchored"
    }

    fn resolve(&self, file_lines: &[String], hunk: &Hunk) -> ResolvedPosition {
        let n = self.context_size;
        let len = hunk.old_count;
        if len < 2 * n || len > file_lines.len() {
            return ResolvedPosition::not_applicable();
        }
        let head = &hunk.old_block[..n];
        let tail = &hunk.old_block[len - n..];
        let expected = hunk.expected_offset();

        // Nearest window to the claimed start; the lower offset wins a tie.
        let best = (0..=file_lines.len() - len)
            .filter(|&i| {
                block_matches_at(file_lines, i, head)
                    && block_matches_at(file_lines, i + len - n, tail)
            })
            .min_by_key(|&i| (i.abs_diff(expected), i));

        match best {
            Some(offset) => {
                trace!(
                    "    Anchors for hunk {} found at line {}",
                    hunk.number,
                    offset + 1
                );
                ResolvedPosition::matched(offset, ANCHOR_CONFIDENCE)
            }
            None => ResolvedPosition::not_applicable(),
        }
    }
}
