//! Indentation style detection and rewriting.

use crate::hunk::Hunk;
use log::{debug, trace};

/// How a file indents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndentStyle {
    pub uses_spaces: bool,
    /// Width of one level in spaces. Also used to count the width of a tab
    /// when measuring space-indented lines that contain one.
    pub indent_size: usize,
}

impl Default for IndentStyle {
    fn default() -> Self {
        Self {
            uses_spaces: true,
            indent_size: 4,
        }
    }
}

impl IndentStyle {
    /// The leading whitespace for `level` levels.
    pub fn unit(&self, level: usize) -> String {
        if self.uses_spaces {
            " ".repeat(level * self.indent_size)
        } else {
            "\t".repeat(level)
        }
    }
}

/// Detects the indentation style of `text`.
///
/// Lines starting with spaces are counted against lines starting with tabs;
/// spaces win ties. The indent size is whichever of 2, 4 or 8 leading spaces
/// occurs most often (the smaller size wins a tie), defaulting to 4.
///
/// # Example
///
/// ```
/// # use diffmend::detect_indentation_style;
/// let style = detect_indentation_style("def f():\n  if x:\n    return 1\n  return 2\n");
/// assert!(style.uses_spaces);
/// assert_eq!(style.indent_size, 2);
///
/// let tabs = detect_indentation_style("fn f() {\n\tlet x = 1;\n}\n");
/// assert!(!tabs.uses_spaces);
/// ```
pub fn detect_indentation_style(text: &str) -> IndentStyle {
    let mut space_lines = 0usize;
    let mut tab_lines = 0usize;
    // Occurrences of exactly 2, 4 and 8 leading spaces.
    let mut widths = [(2usize, 0usize), (4, 0), (8, 0)];

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with('\t') {
            tab_lines += 1;
        } else if line.starts_with(' ') {
            space_lines += 1;
            let n = line.len() - line.trim_start_matches(' ').len();
            if let Some(slot) = widths.iter_mut().find(|(w, _)| *w == n) {
                slot.1 += 1;
            }
        }
    }

    let uses_spaces = space_lines >= tab_lines;
    // Stable "max by count" that keeps the first (smallest) width on ties.
    let indent_size = widths
        .iter()
        .fold(None::<(usize, usize)>, |best, &(w, c)| match best {
            Some((_, bc)) if bc >= c => best,
            _ if c > 0 => Some((w, c)),
            _ => best,
        })
        .map(|(w, _)| w)
        .unwrap_or(4);

    trace!(
        "  Indentation: {} space-led / {} tab-led lines, size {}",
        space_lines,
        tab_lines,
        indent_size
    );
    IndentStyle {
        uses_spaces,
        indent_size,
    }
}

/// Splits a line into (levels, leftover spaces, content) under `style`.
fn measure(line: &str, style: IndentStyle) -> (usize, usize, &str) {
    let content = line.trim_start_matches([' ', '\t']);
    let ws = &line[..line.len() - content.len()];
    let size = style.indent_size.max(1);
    let width: usize = ws.chars().map(|c| if c == '\t' { size } else { 1 }).sum();
    (width / size, width % size, content)
}

/// Rewrites one line's leading whitespace from `source` to `target` style.
///
/// The level is `leading width / source indent size`; any remainder is kept
/// as alignment spaces.
///
/// # Example
///
/// ```
/// # use diffmend::{adjust_indentation, IndentStyle};
/// let two = IndentStyle { uses_spaces: true, indent_size: 2 };
/// let tabs = IndentStyle { uses_spaces: false, indent_size: 4 };
/// assert_eq!(adjust_indentation("    x = 1", two, tabs), "\t\tx = 1");
/// ```
pub fn adjust_indentation(line: &str, source: IndentStyle, target: IndentStyle) -> String {
    let (level, rest, content) = measure(line, source);
    if content.is_empty() {
        return String::new();
    }
    format!("{}{}{}", target.unit(level), " ".repeat(rest), content)
}

/// The leading whitespace of `line`.
pub fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start_matches([' ', '\t']).len()]
}

/// Re-bases `lines` so the least-indented non-blank line starts with `base`,
/// keeping every other line's indentation relative to it.
///
/// # Example
///
/// ```
/// # use diffmend::preserve_relative_indentation;
/// let block = vec!["if x:".to_string(), "    y()".to_string(), "".to_string()];
/// let moved = preserve_relative_indentation(&block, "        ");
/// assert_eq!(moved, vec!["        if x:", "            y()", ""]);
/// ```
pub fn preserve_relative_indentation(lines: &[String], base: &str) -> Vec<String> {
    let min_ws = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| leading_whitespace(l).len())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| {
            if l.trim().is_empty() {
                String::new()
            } else {
                format!("{}{}", base, &l[min_ws..])
            }
        })
        .collect()
}

/// Infers the indentation step of a small block from the gaps between its
/// distinct indent widths. A block nested at one depth has no usable gap.
fn block_step(lines: &[&str]) -> Option<usize> {
    let mut widths: Vec<usize> = lines
        .iter()
        .filter(|l| !l.trim().is_empty() && !l.starts_with('\t'))
        .map(|l| leading_whitespace(l).len())
        .collect();
    widths.sort_unstable();
    widths.dedup();
    widths
        .windows(2)
        .map(|w| w[1] - w[0])
        .min()
        .filter(|step| matches!(step, 2 | 4 | 8))
}

/// Rewrites a hunk's lines from its own indentation style into the file's.
///
/// Tabs versus spaces comes from [`detect_indentation_style`]. The hunk's
/// indent size is only trusted when the hunk itself shows two different
/// depths; otherwise the file's size is assumed.
pub fn normalize_hunk_indentation(hunk: &Hunk, file_style: IndentStyle) -> Hunk {
    let contents: Vec<&str> = hunk.lines.iter().map(|l| l.content()).collect();
    if !contents
        .iter()
        .any(|l| l.starts_with([' ', '\t']) && !l.trim().is_empty())
    {
        return hunk.clone();
    }
    let detected = detect_indentation_style(&contents.join("\n"));
    let hunk_style = IndentStyle {
        uses_spaces: detected.uses_spaces,
        indent_size: if detected.uses_spaces {
            block_step(&contents).unwrap_or(file_style.indent_size)
        } else {
            file_style.indent_size
        },
    };
    if hunk_style == file_style {
        return hunk.clone();
    }
    debug!(
        "  Hunk {}: re-indenting from {:?} to {:?}",
        hunk.number, hunk_style, file_style
    );
    hunk.map_lines(|l| adjust_indentation(l, hunk_style, file_style))
}

/// Shifts a hunk's replacement block so its indentation lines up with the
/// file line it was matched against.
///
/// Returns `None` when the first old line and the file line are not the same
/// text, or when they are already indented alike.
pub fn rebase_to_match(hunk: &Hunk, file_line: &str) -> Option<Vec<String>> {
    let first = hunk.old_block.first()?;
    if first.trim().is_empty() || first.trim() != file_line.trim() {
        return None;
    }
    let hunk_ws = leading_whitespace(first);
    let file_ws = leading_whitespace(file_line);
    if hunk_ws == file_ws {
        return None;
    }
    // Lines in the block may dedent past the first old line, so the new
    // base is the file indent minus that line's depth inside the block.
    let min_ws = hunk
        .new_lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| leading_whitespace(l).len())
        .min()
        .unwrap_or(0);
    let depth = hunk_ws.len().checked_sub(min_ws)?;
    let base_len = file_ws.len().checked_sub(depth)?;
    let rebased = preserve_relative_indentation(&hunk.new_lines, &file_ws[..base_len]);
    Some(rebased)
}
