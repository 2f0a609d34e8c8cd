//! Splicing a placed hunk into the file and tidying blank lines at the seams.

use crate::hunk::Hunk;
use crate::text::normalize_line;
use log::trace;

/// What one splice changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    /// 0-based offset of the first replaced line.
    pub offset: usize,
    /// The file lines that were replaced.
    pub replaced: Vec<String>,
    /// Net change in line count, after blank-line cleanup.
    pub delta: isize,
}

/// Applies `hunk` at `offset`, replacing `old_count` lines with its
/// `new_lines`.
///
/// # Example
///
/// ```
/// # use diffmend::{apply_hunk_at, Hunk, HunkLine};
/// let mut lines: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
/// let hunk = Hunk::new(1, 2, 2, vec![HunkLine::Remove("b".into()), HunkLine::Add("B".into())]);
/// apply_hunk_at(&mut lines, 1, &hunk);
/// assert_eq!(lines, vec!["a", "B", "c"]);
/// ```
pub fn apply_hunk_at(lines: &mut Vec<String>, offset: usize, hunk: &Hunk) -> Splice {
    apply_replacement(lines, offset, hunk.old_count, &hunk.new_lines)
}

/// Replaces `old_count` lines at `offset` with `replacement`, then removes
/// blank-line artifacts the join created.
///
/// Both `offset` and `old_count` are clamped to the file. Stray `\r` left on
/// replacement lines is stripped. Blank lines that appear in `replacement`
/// itself are never removed.
pub fn apply_replacement(
    lines: &mut Vec<String>,
    offset: usize,
    old_count: usize,
    replacement: &[String],
) -> Splice {
    let offset = offset.min(lines.len());
    let old_count = old_count.min(lines.len() - offset);
    let before_len = lines.len();
    let original_tail_blanks = trailing_blanks(lines);

    let new_lines: Vec<String> = replacement.iter().map(|l| normalize_line(l)).collect();
    let replaced: Vec<String> = lines
        .splice(offset..offset + old_count, new_lines.iter().cloned())
        .collect();

    cleanup_join_blanks(lines, offset, &new_lines, &replaced);

    let touches_eof = offset + new_lines.len() >= lines.len();
    let allowed_tail = original_tail_blanks
        .max(if touches_eof { trailing_blanks(&new_lines) } else { 0 })
        .max(1);
    let tail = trailing_blanks(lines);
    if tail > allowed_tail {
        trace!("    Trimming {} trailing blank line(s)", tail - allowed_tail);
        lines.truncate(lines.len() - (tail - allowed_tail));
    }

    Splice {
        offset,
        replaced,
        delta: lines.len() as isize - before_len as isize,
    }
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn leading_blanks(lines: &[String]) -> usize {
    lines.iter().take_while(|l| is_blank(l)).count()
}

fn trailing_blanks(lines: &[String]) -> usize {
    lines.iter().rev().take_while(|l| is_blank(l)).count()
}

fn longest_blank_run(lines: &[String]) -> usize {
    lines
        .split(|l| !is_blank(l))
        .map(<[String]>::len)
        .max()
        .unwrap_or(0)
}

/// Shrinks blank runs at the two seams of a splice back to what either the
/// original file or the replacement already had there.
///
/// Only blank lines on the original side of a seam are removed.
fn cleanup_join_blanks(lines: &mut Vec<String>, offset: usize, new_lines: &[String], replaced: &[String]) {
    let end = offset + new_lines.len();
    let above = trailing_blanks(&lines[..offset]);
    let below = leading_blanks(&lines[end..]);
    let in_new = longest_blank_run(new_lines);

    if new_lines.iter().all(|l| is_blank(l)) {
        // Both seams meet: one run from above through the replacement to below.
        let run = above + new_lines.len() + below;
        let original = if replaced.iter().all(|l| is_blank(l)) {
            above + replaced.len() + below
        } else {
            (above + leading_blanks(replaced)).max(trailing_blanks(replaced) + below)
        };
        let allowed = original.max(in_new).max(1);
        if run > allowed {
            let mut excess = run - allowed;
            let from_below = excess.min(below);
            lines.drain(end..end + from_below);
            excess -= from_below;
            let from_above = excess.min(above);
            lines.drain(offset - from_above..offset);
        }
        return;
    }

    // Lower seam first so `offset` stays valid for the upper one.
    let run = trailing_blanks(new_lines) + below;
    let allowed = (trailing_blanks(replaced) + below).max(in_new).max(1);
    if below > 0 && run > allowed {
        let n = (run - allowed).min(below);
        lines.drain(end..end + n);
    }

    let run = above + leading_blanks(new_lines);
    let allowed = (above + leading_blanks(replaced)).max(in_new).max(1);
    if above > 0 && run > allowed {
        let n = (run - allowed).min(above);
        lines.drain(offset - n..offset);
    }
}
