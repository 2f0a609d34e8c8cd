//! Merging hunks whose original line ranges overlap.
//!
//! Overlapping hunks cannot be placed one after another: once the first is
//! applied, the second's context no longer exists. They are folded into a
//! single hunk instead. The merged hunk's `old_block` is read from the real
//! file, never from the hunks' own context, and each hunk's edits are
//! replayed onto it by position.

use crate::error::{HunkErrorKind, HunkFailure};
use crate::hunk::{Hunk, HunkLine};
use crate::text::lines_equal;
use log::{debug, warn};
use std::collections::BTreeSet;

/// Hunks ready for placement, plus any that had to be rejected.
#[derive(Debug, Clone, Default)]
pub struct OverlapResolution {
    /// Merged and untouched hunks, sorted by `old_start`.
    pub hunks: Vec<Hunk>,
    /// Hunks whose edits contradict another hunk in their group.
    pub conflicts: Vec<HunkFailure>,
}

/// Groups hunk indices into sets that overlap transitively.
///
/// Singletons are included, so every index appears in exactly one group.
/// Groups are ordered by their smallest `old_start`.
pub fn find_overlap_groups(hunks: &[Hunk]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = (0..hunks.len()).map(|i| vec![i]).collect();
    loop {
        let mut merged_any = false;
        'scan: for a in 0..groups.len() {
            for b in a + 1..groups.len() {
                let touches = groups[a]
                    .iter()
                    .any(|&i| groups[b].iter().any(|&j| hunks[i].overlaps(&hunks[j])));
                if touches {
                    let absorbed = groups.remove(b);
                    groups[a].extend(absorbed);
                    merged_any = true;
                    break 'scan;
                }
            }
        }
        if !merged_any {
            break;
        }
    }
    for group in &mut groups {
        group.sort_by_key(|&i| (hunks[i].old_start, hunks[i].number));
    }
    groups.sort_by_key(|g| hunks[g[0]].old_start);
    groups
}

/// One contiguous change: replace file lines `start..end` with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    start: usize,
    end: usize,
    replacement: Vec<String>,
}

impl Edit {
    fn is_insertion(&self) -> bool {
        self.start == self.end
    }

    /// Removal ranges that share a line, or an insertion strictly inside a
    /// removal, cannot both be honoured.
    fn conflicts_with(&self, other: &Edit) -> bool {
        if self == other {
            return false;
        }
        match (self.is_insertion(), other.is_insertion()) {
            (true, true) => false,
            (true, false) => other.start < self.start && self.start < other.end,
            (false, true) => self.start < other.start && other.start < self.end,
            (false, false) => self.start < other.end && other.start < self.end,
        }
    }
}

/// Turns a hunk into edits against absolute file offsets.
///
/// Removed runs are checked against the file; a run that is not where the
/// header says is looked for inside `window` (nearest first). Returns `None`
/// when a removed run cannot be found at all.
fn replay(hunk: &Hunk, file_lines: &[String], window: (usize, usize)) -> Option<Vec<Edit>> {
    let mut edits = Vec::new();
    let mut cursor = hunk.expected_offset();
    let mut removed: Vec<String> = Vec::new();
    let mut added: Vec<String> = Vec::new();

    let flush = |cursor: &mut usize,
                 removed: &mut Vec<String>,
                 added: &mut Vec<String>,
                 edits: &mut Vec<Edit>|
     -> Option<()> {
        if removed.is_empty() && added.is_empty() {
            return Some(());
        }
        let start = *cursor - removed.len();
        let start = if run_matches(file_lines, start, removed) {
            start
        } else {
            let found = relocate(file_lines, removed, start, window)?;
            *cursor = found + removed.len();
            found
        };
        edits.push(Edit {
            start,
            end: start + removed.len(),
            replacement: std::mem::take(added),
        });
        removed.clear();
        Some(())
    };

    for line in &hunk.lines {
        match line {
            HunkLine::Context(_) => {
                flush(&mut cursor, &mut removed, &mut added, &mut edits)?;
                cursor += 1;
            }
            HunkLine::Remove(s) => {
                removed.push(s.clone());
                cursor += 1;
            }
            HunkLine::Add(s) => added.push(s.clone()),
        }
    }
    flush(&mut cursor, &mut removed, &mut added, &mut edits)?;
    Some(edits)
}

fn run_matches(file_lines: &[String], start: usize, run: &[String]) -> bool {
    start + run.len() <= file_lines.len()
        && file_lines[start..start + run.len()]
            .iter()
            .zip(run)
            .all(|(a, b)| lines_equal(a, b))
}

fn relocate(
    file_lines: &[String],
    run: &[String],
    near: usize,
    (lo, hi): (usize, usize),
) -> Option<usize> {
    if run.is_empty() {
        // An insertion has nothing to verify; keep it at its claimed point.
        return Some(near.clamp(lo, hi));
    }
    (lo..=hi.saturating_sub(run.len()))
        .filter(|&i| run_matches(file_lines, i, run))
        .min_by_key(|&i| (i.abs_diff(near), i))
}

/// Folds transitively-overlapping hunks into single hunks rebuilt from
/// `file_lines`.
///
/// Edits that several hunks make identically are applied once. Insertions at
/// the same point are kept in diff order. A hunk whose edits contradict an
/// earlier hunk in its group is left out of the merge and reported as an
/// [`HunkErrorKind::OverlapConflict`]. A hunk whose removed lines cannot be
/// found in the merged range is passed through unmerged.
pub fn merge_overlapping_hunks(hunks: &[Hunk], file_lines: &[String]) -> OverlapResolution {
    let mut resolution = OverlapResolution::default();

    for group in find_overlap_groups(hunks) {
        if group.len() == 1 {
            resolution.hunks.push(hunks[group[0]].clone());
            continue;
        }
        let members: Vec<&Hunk> = group.iter().map(|&i| &hunks[i]).collect();
        debug!(
            "Merging overlapping hunks {:?}",
            members.iter().flat_map(|h| h.ordinals()).collect::<Vec<_>>()
        );

        let start = members
            .iter()
            .map(|h| h.expected_offset())
            .min()
            .unwrap_or(0)
            .min(file_lines.len());
        let end = members
            .iter()
            .map(|h| h.expected_offset() + h.old_count)
            .max()
            .unwrap_or(start)
            .clamp(start, file_lines.len());

        let mut accepted: Vec<&Hunk> = Vec::new();
        let mut edits: Vec<(usize, Edit)> = Vec::new();
        for (order, hunk) in members.iter().enumerate() {
            let Some(own) = replay(hunk, file_lines, (start, end)) else {
                warn!(
                    "  Hunk {}: removed lines not found in lines {}-{}; applying it on its own.",
                    hunk.number,
                    start + 1,
                    end
                );
                resolution.hunks.push((*hunk).clone());
                continue;
            };
            let clash = own.iter().find_map(|e| {
                edits
                    .iter()
                    .find(|(_, prior)| e.conflicts_with(prior))
                    .map(|(owner, _)| *owner)
            });
            if let Some(owner) = clash {
                warn!(
                    "  Hunk {} conflicts with hunk {} over the same lines.",
                    hunk.number, members[owner].number
                );
                resolution.conflicts.push(HunkFailure {
                    hunk_number: hunk.number,
                    kind: HunkErrorKind::OverlapConflict,
                    details: format!(
                        "edits the same lines as hunk {} differently",
                        members[owner].number
                    ),
                });
                continue;
            }
            for e in own {
                if !edits.iter().any(|(_, prior)| *prior == e) {
                    edits.push((order, e));
                }
            }
            accepted.push(hunk);
        }

        match accepted.len() {
            0 => {}
            1 => resolution.hunks.push(accepted[0].clone()),
            _ => resolution
                .hunks
                .push(build_merged(&accepted, edits, file_lines, start, end)),
        }
    }

    resolution
        .hunks
        .sort_by_key(|h| (h.old_start, h.number));
    resolution
}

fn build_merged(
    accepted: &[&Hunk],
    mut edits: Vec<(usize, Edit)>,
    file_lines: &[String],
    start: usize,
    end: usize,
) -> Hunk {
    // Position order; diff order among insertions at one point, and an
    // insertion before a removal starting at the same line.
    edits.sort_by_key(|(order, e)| (e.start, !e.is_insertion(), *order));

    let old_block: Vec<String> = file_lines[start..end].to_vec();
    let mut new_lines = Vec::with_capacity(old_block.len());
    let mut pos = start;
    for (_, edit) in &edits {
        if edit.start > pos {
            new_lines.extend_from_slice(&file_lines[pos..edit.start]);
            pos = edit.start;
        }
        new_lines.extend(edit.replacement.iter().cloned());
        pos = pos.max(edit.end);
    }
    if pos < end {
        new_lines.extend_from_slice(&file_lines[pos..end]);
    }

    let number = accepted.iter().map(|h| h.number).min().unwrap_or(1);
    let ordinals: BTreeSet<usize> = accepted.iter().flat_map(|h| h.ordinals()).collect();
    let old_start = if old_block.is_empty() { start } else { start + 1 };
    let new_start = accepted.iter().map(|h| h.new_start).min().unwrap_or(old_start);

    let mut merged = Hunk::from_blocks(number, old_start, new_start, &old_block, &new_lines);
    merged.added_lines = union(accepted.iter().flat_map(|h| h.added_lines.iter()));
    merged.removed_lines = union(accepted.iter().flat_map(|h| h.removed_lines.iter()));
    debug!(
        "  Merged hunk {} covers lines {}-{} for hunks {:?}",
        number,
        start + 1,
        end,
        ordinals
    );
    merged.merged_from = Some(ordinals);
    merged
}

fn union<'a>(lines: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for line in lines {
        if !out.contains(line) {
            out.push(line.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hunk(number: usize, old_start: usize, lines: Vec<HunkLine>) -> Hunk {
        Hunk::new(number, old_start, old_start, lines)
    }

    #[test]
    fn groups_are_transitive() {
        let a = hunk(1, 1, vec![HunkLine::Context("x".into()); 3]);
        let b = hunk(2, 3, vec![HunkLine::Context("x".into()); 3]);
        let c = hunk(3, 5, vec![HunkLine::Context("x".into()); 3]);
        let d = hunk(4, 20, vec![HunkLine::Context("x".into())]);
        let groups = find_overlap_groups(&[c.clone(), a.clone(), d, b]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 3);
    }

    #[test]
    fn crossing_removals_conflict() {
        let r1 = Edit {
            start: 2,
            end: 5,
            replacement: vec![],
        };
        let r2 = Edit {
            start: 4,
            end: 6,
            replacement: vec!["x".into()],
        };
        let ins = Edit {
            start: 5,
            end: 5,
            replacement: vec!["y".into()],
        };
        assert!(r1.conflicts_with(&r2));
        assert!(!r1.conflicts_with(&ins));
        assert!(r2.conflicts_with(&ins));
    }
}
