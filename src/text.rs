//! Splitting file content into lines and putting it back together.
//!
//! Lines are held without terminators. Each line's own terminator is
//! recorded, so rendering gives every untouched line back the ending it was
//! read with, even in files that mix LF and CRLF.

use similar::{DiffTag, TextDiff};
use std::iter;

/// A line terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    /// The terminator most lines of `content` use. LF when there is no line
    /// break or on a tie.
    pub fn detect(content: &str) -> Self {
        let crlf = content.matches("\r\n").count();
        let lf = content.matches('\n').count() - crlf;
        if crlf > lf {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// File content as terminator-free lines.
///
/// `lines` is edited in place by the pipeline. The lines as read are kept
/// alongside their terminators; on [`render`](SourceText::render) lines that
/// survived unchanged get their own terminator back, and new lines take the
/// one of the line they follow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceText {
    pub lines: Vec<String>,
    pub trailing_newline: bool,
    read: Vec<String>,
    endings: Vec<LineEnding>,
    dominant: LineEnding,
}

impl SourceText {
    /// Splits `content` into lines.
    ///
    /// # Example
    ///
    /// ```
    /// # use diffmend::{SourceText, LineEnding};
    /// let mut text = SourceText::parse("a\nb\r\nc\n");
    /// assert_eq!(text.lines, vec!["a", "b", "c"]);
    /// assert_eq!(text.ending(), LineEnding::Lf);
    ///
    /// text.lines[2] = "C".to_string();
    /// assert_eq!(text.render(), "a\nb\r\nC\n");
    /// ```
    pub fn parse(content: &str) -> Self {
        let dominant = LineEnding::detect(content);
        let mut lines = Vec::new();
        let mut endings = Vec::new();
        for piece in content.split_inclusive('\n') {
            let (line, ending) = if let Some(line) = piece.strip_suffix("\r\n") {
                (line, LineEnding::CrLf)
            } else if let Some(line) = piece.strip_suffix('\n') {
                (line, LineEnding::Lf)
            } else {
                // Last line without a terminator; used only if one is added.
                (piece, dominant)
            };
            lines.push(line.to_string());
            endings.push(ending);
        }
        SourceText {
            read: lines.clone(),
            lines,
            trailing_newline: content.is_empty() || content.ends_with('\n'),
            endings,
            dominant,
        }
    }

    /// The terminator most lines use.
    pub fn ending(&self) -> LineEnding {
        self.dominant
    }

    /// Joins the lines back, each with its terminator.
    pub fn render(&self) -> String {
        let endings = self.line_endings();
        let last = self.lines.len().saturating_sub(1);
        let mut out = String::new();
        for (i, (line, ending)) in self.lines.iter().zip(endings).enumerate() {
            out.push_str(line);
            if i < last || self.trailing_newline {
                out.push_str(ending.as_str());
            }
        }
        out
    }

    /// One terminator per current line, carried over from the lines as read.
    fn line_endings(&self) -> Vec<LineEnding> {
        if self.endings.iter().all(|e| *e == self.dominant) {
            return vec![self.dominant; self.lines.len()];
        }
        if self.lines == self.read {
            return self.endings.clone();
        }

        let old: Vec<&str> = self.read.iter().map(String::as_str).collect();
        let new: Vec<&str> = self.lines.iter().map(String::as_str).collect();
        let diff = TextDiff::from_slices(&old, &new);
        let mut endings = Vec::with_capacity(self.lines.len());
        for op in diff.ops() {
            let (tag, old_range, new_range) = op.as_tag_tuple();
            match tag {
                DiffTag::Equal => endings.extend_from_slice(&self.endings[old_range]),
                DiffTag::Delete => {}
                DiffTag::Insert => {
                    let ending = self.ending_before(old_range.start);
                    endings.extend(iter::repeat(ending).take(new_range.len()));
                }
                DiffTag::Replace => {
                    let last_old = old_range.end - 1;
                    for i in 0..new_range.len() {
                        endings.push(self.endings[(old_range.start + i).min(last_old)]);
                    }
                }
            }
        }
        endings
    }

    /// Ending for lines inserted before read line `at`.
    fn ending_before(&self, at: usize) -> LineEnding {
        at.checked_sub(1)
            .and_then(|i| self.endings.get(i))
            .or_else(|| self.endings.get(at))
            .copied()
            .unwrap_or(self.dominant)
    }
}

/// Strips a stray `\r` that a CRLF diff leaves on hunk lines.
pub fn normalize_line(line: &str) -> String {
    line.strip_suffix('\r').unwrap_or(line).to_string()
}

/// Whitespace-insensitive line comparison used by every matcher.
pub(crate) fn lines_equal(a: &str, b: &str) -> bool {
    a.trim() == b.trim()
}

/// `true` when `block` matches `lines` starting at `offset`, line by line,
/// ignoring surrounding whitespace.
pub(crate) fn block_matches_at<T: AsRef<str>>(lines: &[T], offset: usize, block: &[String]) -> bool {
    offset
        .checked_add(block.len())
        .is_some_and(|end| end <= lines.len())
        && lines[offset..offset + block.len()]
            .iter()
            .zip(block)
            .all(|(l, b)| lines_equal(l.as_ref(), b))
}

/// Every offset where `block` matches `lines`.
pub(crate) fn find_block<T: AsRef<str>>(lines: &[T], block: &[String]) -> Vec<usize> {
    if block.is_empty() || block.len() > lines.len() {
        return Vec::new();
    }
    (0..=lines.len() - block.len())
        .filter(|&i| block_matches_at(lines, i, block))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominant_ending_wins_the_count() {
        assert_eq!(LineEnding::detect("a\r\nb\r\nc\n"), LineEnding::CrLf);
        assert_eq!(LineEnding::detect("a\r\nb\nc\n"), LineEnding::Lf);
        assert_eq!(LineEnding::detect("no break"), LineEnding::Lf);
    }

    #[test]
    fn untouched_mixed_content_renders_byte_identical() {
        for content in ["a\nb\r\nc\n", "a\r\nb\nc", "\r\n\n\r\n", ""] {
            assert_eq!(SourceText::parse(content).render(), content);
        }
    }

    #[test]
    fn inserted_lines_follow_the_line_above() {
        let mut text = SourceText::parse("a\r\nb\nc\r\n");
        text.lines.insert(1, "a2".to_string());
        text.lines.insert(3, "b2".to_string());
        assert_eq!(text.render(), "a\r\na2\r\nb\nb2\nc\r\n");

        let mut text = SourceText::parse("a\nb\r\n");
        text.lines.insert(0, "top".to_string());
        assert_eq!(text.render(), "top\na\nb\r\n");
    }

    #[test]
    fn appending_after_an_unterminated_last_line() {
        let mut text = SourceText::parse("a\r\nb\r\nc");
        text.lines.push("d".to_string());
        text.trailing_newline = true;
        assert_eq!(text.render(), "a\r\nb\r\nc\r\nd\r\n");
    }
}
