//! Checking that a hunk's changes are visible in the result, and spotting
//! hunks that are already in the file.
//!
//! The public checks ask whether a changed line is new to the file, or gone
//! from it. Right after a splice the pipeline uses [`verify_splice`], which
//! compares occurrence counts instead, so an added line that already exists
//! elsewhere in the file still verifies there.

use crate::hunk::Hunk;
use crate::text::{find_block, lines_equal};
use log::{debug, trace};
use std::collections::{BTreeMap, HashMap, HashSet};

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn non_blank(lines: &[String]) -> Vec<&str> {
    lines
        .iter()
        .map(String::as_str)
        .filter(|l| !is_blank(l))
        .collect()
}

/// Non-blank added and removed lines of `hunk`.
fn changed_lines(hunk: &Hunk) -> (Vec<&str>, Vec<&str>) {
    (non_blank(&hunk.added_lines), non_blank(&hunk.removed_lines))
}

const WHITESPACE_ONLY: &str = "whitespace-only change assumed applied";

/// Verifies one hunk against whole-file contents.
///
/// Succeeds when a non-blank added line is present in `modified` but absent
/// from `original`, or a non-blank removed line is present in `original` but
/// absent from `modified`. Trailing whitespace is ignored. A hunk with no
/// non-blank changed lines is assumed applied.
///
/// Returns the verdict and a short reason.
///
/// # Example
///
/// ```
/// # use diffmend::{verify_hunk, parse_patch};
/// let hunk = &parse_patch("@@ -1,1 +1,2 @@\n x = 1\n+x = 1\n").unwrap().hunks[0];
/// // The added line was already in the file, so nothing proves it landed.
/// let (ok, _) = verify_hunk(&["x = 1"], &["x = 1", "x = 1"], hunk);
/// assert!(!ok);
/// ```
pub fn verify_hunk<T: AsRef<str>, U: AsRef<str>>(
    original: &[T],
    modified: &[U],
    hunk: &Hunk,
) -> (bool, String) {
    let (added, removed) = changed_lines(hunk);
    if added.is_empty() && removed.is_empty() {
        return (true, WHITESPACE_ONLY.to_string());
    }

    let before: HashSet<&str> = original.iter().map(|l| l.as_ref().trim_end()).collect();
    let after: HashSet<&str> = modified.iter().map(|l| l.as_ref().trim_end()).collect();

    if let Some(line) = added
        .iter()
        .find(|l| after.contains(l.trim_end()) && !before.contains(l.trim_end()))
    {
        return (true, format!("added line present: '{}'", line.trim()));
    }
    if let Some(line) = removed
        .iter()
        .find(|l| before.contains(l.trim_end()) && !after.contains(l.trim_end()))
    {
        return (true, format!("removed line gone: '{}'", line.trim()));
    }
    (
        false,
        "no added line is new to the file and no removed line left it".to_string(),
    )
}

fn counts<'a, T: AsRef<str>>(lines: &'a [T], key: fn(&str) -> &str) -> HashMap<&'a str, usize> {
    let mut map = HashMap::new();
    for line in lines {
        *map.entry(key(line.as_ref())).or_insert(0) += 1;
    }
    map
}

/// Verifies one splice from the file just before and just after it.
///
/// Succeeds when any non-blank added line occurs more often afterwards, or
/// any non-blank removed line occurs less often. Lines are compared with
/// trailing whitespace ignored; when that finds nothing, leading whitespace
/// is ignored too, so a re-indented hunk still verifies.
pub(crate) fn verify_splice<T: AsRef<str>, U: AsRef<str>>(
    original: &[T],
    modified: &[U],
    hunk: &Hunk,
) -> (bool, String) {
    let (added, removed) = changed_lines(hunk);
    if added.is_empty() && removed.is_empty() {
        return (true, WHITESPACE_ONLY.to_string());
    }

    let keys: [fn(&str) -> &str; 2] = [str::trim_end, str::trim];
    for key in keys {
        let before = counts(original, key);
        let after = counts(modified, key);
        let count = |map: &HashMap<&str, usize>, line: &str| map.get(key(line)).copied().unwrap_or(0);

        if let Some(line) = added.iter().find(|l| count(&after, **l) > count(&before, **l)) {
            return (true, format!("added line present: '{}'", line.trim()));
        }
        if let Some(line) = removed.iter().find(|l| count(&after, **l) < count(&before, **l)) {
            return (true, format!("removed line gone: '{}'", line.trim()));
        }
    }
    (
        false,
        "no added line appeared and no removed line disappeared".to_string(),
    )
}

/// Verifies every hunk against whole-file contents with [`verify_hunk`].
///
/// Results are keyed by hunk ordinal; a merged hunk reports under each
/// ordinal it was built from.
pub fn verify_hunk_changes(original: &str, modified: &str, hunks: &[Hunk]) -> BTreeMap<usize, (bool, String)> {
    let before: Vec<&str> = original.lines().collect();
    let after: Vec<&str> = modified.lines().collect();
    let mut results = BTreeMap::new();
    for hunk in hunks {
        let verdict = verify_hunk(&before, &after, hunk);
        trace!("  Hunk {} verification: {:?}", hunk.number, verdict);
        for ordinal in hunk.ordinals() {
            results.insert(ordinal, verdict.clone());
        }
    }
    results
}

/// `false` when `original` and `modified` are byte-identical, or when `diff`
/// has no `+` or `-` line besides its `+++`/`---` file headers.
///
/// # Example
///
/// ```
/// # use diffmend::verify_changes_applied;
/// let diff = "@@ -1,2 +1,2 @@\n a\n-b\n+c\n";
/// assert!(verify_changes_applied("a\nb\n", "a\nc\n", diff));
/// assert!(!verify_changes_applied("a\nb\n", "a\nb\n", diff));
/// assert!(!verify_changes_applied("a\nb\n", "a\nc\n", "--- a/f\n+++ b/f\n@@ -1 +1 @@\n a\n"));
/// ```
pub fn verify_changes_applied(original: &str, modified: &str, diff: &str) -> bool {
    if original == modified {
        debug!("Content is unchanged.");
        return false;
    }
    let changes = diff.lines().any(|l| {
        (l.starts_with('+') && !l.starts_with("+++")) || (l.starts_with('-') && !l.starts_with("---"))
    });
    if !changes {
        debug!("Diff has no added or removed lines.");
    }
    changes
}

/// `true` when `hunk` has evidently been applied to `lines` already.
///
/// The hunk's `new_lines` must appear as a contiguous block and, when the
/// hunk removes anything, its `old_block` must not. Every non-blank added line must be present, and no
/// removed line may linger within `window` lines of the block unless the
/// block itself still contains it. When old and new blocks differ only in
/// indentation, blocks are compared with indentation significant.
pub fn is_already_applied(lines: &[String], hunk: &Hunk, window: usize) -> bool {
    if !hunk.has_changes() || hunk.new_lines.is_empty() {
        return false;
    }

    let indentation_only = hunk.old_block.len() == hunk.new_lines.len()
        && hunk
            .old_block
            .iter()
            .zip(&hunk.new_lines)
            .all(|(a, b)| lines_equal(a, b));
    let find = |block: &[String]| -> Vec<usize> {
        if indentation_only {
            exact_positions(lines, block)
        } else {
            find_block(lines, block)
        }
    };

    let expected = hunk.expected_offset();
    let Some(at) = find(&hunk.new_lines)
        .into_iter()
        .min_by_key(|&i| (i.abs_diff(expected), i))
    else {
        return false;
    };
    let removes = hunk.removed_lines.iter().any(|l| !is_blank(l));
    if removes && !find(&hunk.old_block).is_empty() {
        return false;
    }

    let all_added_present = hunk
        .added_lines
        .iter()
        .filter(|l| !is_blank(l))
        .all(|a| lines.iter().any(|l| lines_equal(l, a)));
    if !all_added_present {
        return false;
    }

    let end = at + hunk.new_lines.len();
    let lo = at.saturating_sub(window);
    let hi = (end + window).min(lines.len());
    let lingering = hunk.removed_lines.iter().filter(|r| !is_blank(r)).any(|r| {
        let nearby = lines[lo..hi].iter().filter(|l| lines_equal(l, r)).count();
        let kept = hunk.new_lines.iter().filter(|l| lines_equal(l, r)).count();
        nearby > kept
    });
    !lingering
}

fn exact_positions(lines: &[String], block: &[String]) -> Vec<usize> {
    if block.is_empty() || block.len() > lines.len() {
        return Vec::new();
    }
    (0..=lines.len() - block.len())
        .filter(|&i| {
            lines[i..i + block.len()]
                .iter()
                .zip(block)
                .all(|(a, b)| a.trim_end() == b.trim_end())
        })
        .collect()
}
