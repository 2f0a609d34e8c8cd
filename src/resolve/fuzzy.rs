use super::{clamped_expected, match_ratio, PositionResolver, ResolvedPosition};
use crate::duplication::DuplicationPreventer;
use crate::hunk::Hunk;
use log::trace;

/// Ratio at the claimed position that is good enough to stay put.
const STAY_RATIO: f64 = 0.4;
/// Cap on the confidence of a stay-put answer.
const STAY_CONFIDENCE_CAP: f64 = 0.8;
/// Lowest drift-penalised score a search hit may have.
const MIN_SEARCH_SCORE: f64 = 0.3;
/// Penalty for a candidate at the edge of the search radius.
const DRIFT_PENALTY: f64 = 0.2;
const FALLBACK_CONFIDENCE: f64 = 0.4;

/// Searches a small window around the claimed position, scoring each
/// candidate by line-match ratio minus a penalty for drift.
///
/// The window is widened when the claimed position itself is vetoed for
/// guard-clause duplication. Vetoed candidates are never returned.
///
/// By default a partial match at the claimed position only keeps the hunk
/// there when no full match lies within the radius; see
/// [`prefer_full_match`](Self::prefer_full_match).
#[derive(Debug, Clone, Copy)]
pub struct ConservativeFuzzyResolver {
    radius: usize,
    wide_radius: usize,
    preventer: DuplicationPreventer,
    prefer_full_match: bool,
}

impl ConservativeFuzzyResolver {
    pub fn new(radius: usize, wide_radius: usize, preventer: DuplicationPreventer) -> Self {
        Self {
            radius: radius.max(1),
            wide_radius: wide_radius.max(radius.max(1)),
            preventer,
            prefer_full_match: true,
        }
    }

    /// If `false`, any match of at least 0.4 at the claimed position is kept,
    /// even with an exact copy of the block a line away.
    pub fn prefer_full_match(mut self, prefer: bool) -> Self {
        self.prefer_full_match = prefer;
        self
    }
}

impl PositionResolver for ConservativeFuzzyResolver {
    fn name(&self) -> &'static str {
        "fuzzy"
    }

    fn resolve(&self, file_lines: &[String], hunk: &Hunk) -> ResolvedPosition {
        if hunk.old_block.is_empty() {
            return ResolvedPosition::not_applicable();
        }
        let expected = clamped_expected(file_lines, hunk);
        let last = file_lines.len().saturating_sub(hunk.old_count);
        let mut vetoed = Vec::new();

        // A partial match at the claim does not beat a full match nearby.
        let full_match_nearby = || {
            (expected.saturating_sub(self.radius)..=(expected + self.radius).min(last))
                .any(|c| match_ratio(file_lines, c, &hunk.old_block) == 1.0)
        };
        let ratio = match_ratio(file_lines, expected, &hunk.old_block);
        let stay = ratio == 1.0 || !self.prefer_full_match || !full_match_nearby();
        if ratio >= STAY_RATIO && stay {
            if self.preventer.check(file_lines, expected, hunk).is_none() {
                return ResolvedPosition::matched(
                    expected,
                    (ratio + 0.3).min(STAY_CONFIDENCE_CAP),
                );
            }
            vetoed.push(expected);
        }

        let radius = if vetoed.is_empty() {
            self.radius
        } else {
            self.wide_radius
        };
        let lo = expected.saturating_sub(radius);
        let hi = (expected + radius).min(last);

        let mut candidates: Vec<(f64, usize)> = (lo..=hi)
            .filter(|c| !vetoed.contains(c))
            .filter_map(|c| {
                let r = match_ratio(file_lines, c, &hunk.old_block);
                if r == 0.0 {
                    return None;
                }
                let distance = c.abs_diff(expected) as f64;
                Some((r - distance / radius as f64 * DRIFT_PENALTY, c))
            })
            .collect();
        // Best score first; nearer the claim, then lower offset, on ties.
        candidates.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then(a.1.abs_diff(expected).cmp(&b.1.abs_diff(expected)))
                .then(a.1.cmp(&b.1))
        });

        for (score, offset) in candidates {
            if score < MIN_SEARCH_SCORE {
                break;
            }
            if self.preventer.check(file_lines, offset, hunk).is_some() {
                vetoed.push(offset);
                continue;
            }
            trace!(
                "    Fuzzy candidate for hunk {} at line {} scored {:.3}",
                hunk.number,
                offset + 1,
                score
            );
            return ResolvedPosition::matched(offset, score).with_vetoes(vetoed);
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

    fn resolver() -> ConservativeFuzzyResolver {
        ConservativeFuzzyResolver::new(3, 10, DuplicationPreventer::new(5))
    }

    #[test]
    fn stays_put_on_a_partial_match() {
        let lines = file(&["a", "b", "c", "d"]);
        let hunk = Hunk::new(
            1,
            2,
            2,
            vec![
                HunkLine::Context("b".into()),
                HunkLine::Remove("stale".into()),
                HunkLine::Add("new".into()),
            ],
        );
        let pos = resolver().resolve(&lines, &hunk);
        assert_eq!(pos.offset, Some(1));
        assert!((pos.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn partial_claim_yields_to_a_full_match_unless_disabled() {
        let lines = file(&["x", "a", "b", "c", "a", "b", "z"]);
        // Claims offset 4, where only `a b` of `a b c` matches.
        let hunk = Hunk::new(
            1,
            5,
            5,
            vec![
                HunkLine::Context("a".into()),
                HunkLine::Context("b".into()),
                HunkLine::Remove("c".into()),
            ],
        );
        assert_eq!(resolver().resolve(&lines, &hunk).offset, Some(1));

        let pos = resolver().prefer_full_match(false).resolve(&lines, &hunk);
        assert_eq!(pos.offset, Some(4));
        assert!((pos.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn searches_nearby_when_the_claim_is_wrong() {
        let lines = file(&["q", "w", "e", "r", "alpha", "beta"]);
        let hunk = Hunk::new(
            1,
            2,
            2,
            vec![
                HunkLine::Context("alpha".into()),
                HunkLine::Remove("beta".into()),
            ],
        );
        let pos = resolver().resolve(&lines, &hunk);
        assert_eq!(pos.kind, PositionKind::Matched);
        assert_eq!(pos.offset, Some(4));
        // Three lines of drift across a radius of three.
        assert!((pos.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn falls_back_below_minimum_score() {
        let lines = file(&["a", "b", "c"]);
        let hunk = Hunk::new(1, 1, 1, vec![HunkLine::Remove("zzz".into())]);
        let pos = resolver().resolve(&lines, &hunk);
        assert_eq!(pos.kind, PositionKind::Fallback);
        assert!(!pos.is_accepted(0.3));
    }
}
