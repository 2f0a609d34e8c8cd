use super::{clamped_expected, match_ratio, PositionResolver, ResolvedPosition};
use crate::duplication::DuplicationPreventer;
use crate::hunk::Hunk;
use crate::text::lines_equal;
use log::trace;

const MIN_DISTINCTIVE_LEN: usize = 10;
const MIN_BLOCK_RATIO: f64 = 0.5;
const MAX_DISTANCE_PENALTY: f64 = 0.5;
const FALLBACK_CONFIDENCE: f64 = 0.4;
const DEFER_CONFIDENCE: f64 = 0.7;

/// Lines that recur too often to identify a location.
const GENERIC_LINES: &[&str] = &[
    "pass",
    "return",
    "return None",
    "return null",
    "return null;",
    "return nil",
    "return undefined;",
    "return true",
    "return true;",
    "return false",
    "return false;",
    "return self",
    "return this;",
    "raise NotImplementedError",
    "raise NotImplementedError()",
    "continue;",
    "break;",
    "default:",
    "} else {",
    "else:",
    "{}",
    "[]",
    "()",
    "\"\"",
    "''",
];

/// `true` when `line` is long and specific enough to anchor a hunk.
///
/// # Example
///
/// ```
/// # use diffmend::is_distinctive_line;
/// assert!(is_distinctive_line("    total = compute_total(items)"));
/// assert!(!is_distinctive_line("        return None"));
/// assert!(!is_distinctive_line("x = 1"));
/// ```
pub fn is_distinctive_line(line: &str) -> bool {
    let t = line.trim();
    if t.len() <= MIN_DISTINCTIVE_LEN || GENERIC_LINES.contains(&t) {
        return false;
    }
    // Empty-literal assignments such as `items = []`.
    !["= {}", "= []", "= ()", "= \"\"", "= ''", "= None", "= null;"]
        .iter()
        .any(|tail| t.ends_with(tail))
}

/// Finds the hunk's first distinctive line in the file and scores every
/// placement it implies against the whole block.
///
/// When a hunk is made only of generic lines the resolver defers rather
/// than guess between look-alike regions. Placements the duplication check
/// vetoes are passed over for the next best.
#[derive(Debug, Clone, Copy)]
pub struct StrictDistinctiveResolver {
    preventer: DuplicationPreventer,
}

impl StrictDistinctiveResolver {
    pub fn new(preventer: DuplicationPreventer) -> Self {
        Self { preventer }
    }
}

impl PositionResolver for StrictDistinctiveResolver {
    fn name(&self) -> &'static str {
        "strict"
    }

    fn resolve(&self, file_lines: &[String], hunk: &Hunk) -> ResolvedPosition {
        let expected = clamped_expected(file_lines, hunk);
        let Some((index, anchor)) = hunk
            .old_block
            .iter()
            .enumerate()
            .find(|(_, l)| is_distinctive_line(l))
        else {
            trace!("    Hunk {} has no distinctive line", hunk.number);
            return ResolvedPosition::deferred(expected, DEFER_CONFIDENCE);
        };

        let mut candidates: Vec<(f64, f64, usize)> = file_lines
            .iter()
            .enumerate()
            .filter(|(_, l)| lines_equal(l, anchor))
            .filter_map(|(at, _)| at.checked_sub(index))
            .filter(|start| start + hunk.old_count <= file_lines.len())
            .map(|start| {
                let ratio = match_ratio(file_lines, start, &hunk.old_block);
                let penalty =
                    (start.abs_diff(expected) as f64 / 10.0).min(MAX_DISTANCE_PENALTY);
                (ratio - penalty, ratio, start)
            })
            .collect();
        // Best score first; nearer the claim, then lower offset, on ties.
        candidates.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then(a.2.abs_diff(expected).cmp(&b.2.abs_diff(expected)))
                .then(a.2.cmp(&b.2))
        });

        let mut vetoed = Vec::new();
        for (score, ratio, start) in candidates {
            if self.preventer.check(file_lines, start, hunk).is_some() {
                vetoed.push(start);
                continue;
            }
            if ratio < MIN_BLOCK_RATIO {
                continue;
            }
            trace!(
                "    Distinctive line '{}' places hunk {} at line {} (score {:.3})",
                anchor.trim(),
                hunk.number,
                start + 1,
                score
            );
            return ResolvedPosition::matched(start, ratio).with_vetoes(vetoed);
        }
        ResolvedPosition::fallback(expected, FALLBACK_CONFIDENCE).with_vetoes(vetoed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hunk::HunkLine;
    use crate::resolve::PositionKind;

    fn file(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defers_on_generic_blocks() {
        let lines = file(&["pass", "pass"]);
        let hunk = Hunk::new(1, 1, 1, vec![HunkLine::Remove("pass".into())]);
        let pos = StrictDistinctiveResolver::new(DuplicationPreventer::new(5)).resolve(&lines, &hunk);
        assert_eq!(pos.kind, PositionKind::Deferred);
        assert_eq!(pos.confidence, DEFER_CONFIDENCE);
        assert!(!pos.is_accepted(0.5));
    }

    #[test]
    fn weak_near_candidate_does_not_hide_a_strong_far_one() {
        let anchor = "total = compute_total(items)";
        let mut lines = file(&[anchor, "x1", "x2", "x3", "a4"]);
        lines.extend((5..10).map(|i| format!("filler {i}")));
        lines.extend(file(&[anchor, "a1", "a2", "a3", "y4"]));
        let hunk = Hunk::new(
            1,
            1,
            1,
            vec![
                HunkLine::Context(anchor.into()),
                HunkLine::Context("a1".into()),
                HunkLine::Context("a2".into()),
                HunkLine::Context("a3".into()),
                HunkLine::Remove("a4".into()),
                HunkLine::Add("A4".into()),
            ],
        );
        // The claimed copy scores 0.4; the far copy 0.8 less the capped penalty.
        let pos = StrictDistinctiveResolver::new(DuplicationPreventer::new(5)).resolve(&lines, &hunk);
        assert_eq!(pos.kind, PositionKind::Matched);
        assert_eq!(pos.offset, Some(10));
        assert!((pos.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn anchors_on_distinctive_line_far_from_claim() {
        let mut lines: Vec<String> = (0..30).map(|i| format!("filler {i}")).collect();
        lines[20] = "result = expensive_call(arg)".into();
        lines[21] = "log(result)".into();
        let hunk = Hunk::new(
            1,
            2,
            2,
            vec![
                HunkLine::Context("result = expensive_call(arg)".into()),
                HunkLine::Remove("log(result)".into()),
                HunkLine::Add("print(result)".into()),
            ],
        );
        let pos = StrictDistinctiveResolver::new(DuplicationPreventer::new(5)).resolve(&lines, &hunk);
        assert_eq!(pos.kind, PositionKind::Matched);
        assert_eq!(pos.offset, Some(20));
        assert_eq!(pos.confidence, 1.0);
    }
}
