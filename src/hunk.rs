//! Core data structures: [`Hunk`] and [`FilePatch`].

use crate::error::ParseError;
use crate::parser::parse_patch;
use similar::TextDiff;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// One body line of a hunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    /// An unchanged line (prefixed with a space in diff text).
    Context(String),
    /// A line the hunk adds (`+`).
    Add(String),
    /// A line the hunk removes (`-`).
    Remove(String),
}

impl HunkLine {
    /// The line text without its diff prefix.
    pub fn content(&self) -> &str {
        match self {
            HunkLine::Context(s) | HunkLine::Add(s) | HunkLine::Remove(s) => s,
        }
    }

    /// `true` for lines that must exist in the original file.
    pub fn is_old(&self) -> bool {
        !matches!(self, HunkLine::Add(_))
    }

    /// `true` for lines that exist in the resulting file.
    pub fn is_new(&self) -> bool {
        !matches!(self, HunkLine::Remove(_))
    }
}

/// Represents a single hunk of changes within a patch.
///
/// A hunk corresponds to a block of lines starting with `@@ ... @@` in a
/// unified diff. The derived blocks (`old_block`, `new_lines`, `added_lines`,
/// `removed_lines`) are computed once at construction and never change while
/// the hunk is being placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// 1-based ordinal of this hunk in the diff.
    pub number: usize,
    /// 1-based starting line in the original file, from the header.
    pub old_start: usize,
    /// Number of original lines this hunk replaces. Always `old_block.len()`.
    pub old_count: usize,
    /// 1-based starting line in the resulting file. Advisory only.
    pub new_start: usize,
    /// Number of lines this hunk produces. Always `new_lines.len()`.
    pub new_count: usize,
    /// The body as an ordered edit script.
    pub lines: Vec<HunkLine>,
    /// Context and removed lines, in order. This is what must be found in the file.
    pub old_block: Vec<String>,
    /// Context and added lines, in order. This is what replaces `old_block`.
    pub new_lines: Vec<String>,
    /// Lines prefixed with `+`.
    pub added_lines: Vec<String>,
    /// Lines prefixed with `-`.
    pub removed_lines: Vec<String>,
    /// Ordinals of the hunks this one was merged from, if it is a merge product.
    pub merged_from: Option<BTreeSet<usize>>,
}

impl Hunk {
    /// Builds a hunk from its body, deriving every block from the edit script.
    ///
    /// # Example
    ///
    /// ```
    /// # use diffmend::{Hunk, HunkLine};
    /// let hunk = Hunk::new(1, 2, 2, vec![
    ///     HunkLine::Context("a".into()),
    ///     HunkLine::Remove("b".into()),
    ///     HunkLine::Add("B".into()),
    /// ]);
    /// assert_eq!(hunk.old_block, vec!["a", "b"]);
    /// assert_eq!(hunk.new_lines, vec!["a", "B"]);
    /// assert_eq!(hunk.old_count, 2);
    /// ```
    pub fn new(number: usize, old_start: usize, new_start: usize, lines: Vec<HunkLine>) -> Self {
        let old_block: Vec<String> = lines
            .iter()
            .filter(|l| l.is_old())
            .map(|l| l.content().to_string())
            .collect();
        let new_lines: Vec<String> = lines
            .iter()
            .filter(|l| l.is_new())
            .map(|l| l.content().to_string())
            .collect();
        let added_lines = lines
            .iter()
            .filter_map(|l| match l {
                HunkLine::Add(s) => Some(s.clone()),
                _ => None,
            })
            .collect();
        let removed_lines = lines
            .iter()
            .filter_map(|l| match l {
                HunkLine::Remove(s) => Some(s.clone()),
                _ => None,
            })
            .collect();
        Hunk {
            number,
            old_start,
            old_count: old_block.len(),
            new_start,
            new_count: new_lines.len(),
            lines,
            old_block,
            new_lines,
            added_lines,
            removed_lines,
            merged_from: None,
        }
    }

    /// Builds a hunk that turns `old_block` into `new_lines`, deriving the edit
    /// script with a line diff.
    pub fn from_blocks(
        number: usize,
        old_start: usize,
        new_start: usize,
        old_block: &[String],
        new_lines: &[String],
    ) -> Self {
        let old_refs: Vec<&str> = old_block.iter().map(String::as_str).collect();
        let new_refs: Vec<&str> = new_lines.iter().map(String::as_str).collect();
        let diff = TextDiff::from_slices(&old_refs, &new_refs);
        let lines = diff
            .iter_all_changes()
            .map(|change| {
                let text = change.value().to_string();
                match change.tag() {
                    similar::ChangeTag::Equal => HunkLine::Context(text),
                    similar::ChangeTag::Delete => HunkLine::Remove(text),
                    similar::ChangeTag::Insert => HunkLine::Add(text),
                }
            })
            .collect();
        Hunk::new(number, old_start, new_start, lines)
    }

    /// Returns a copy with every body line rewritten by `f`.
    pub fn map_lines(&self, mut f: impl FnMut(&str) -> String) -> Hunk {
        let lines = self
            .lines
            .iter()
            .map(|l| match l {
                HunkLine::Context(s) => HunkLine::Context(f(s)),
                HunkLine::Add(s) => HunkLine::Add(f(s)),
                HunkLine::Remove(s) => HunkLine::Remove(f(s)),
            })
            .collect();
        let mut mapped = Hunk::new(self.number, self.old_start, self.new_start, lines);
        mapped.merged_from = self.merged_from.clone();
        mapped
    }

    /// Checks if the hunk contains any effective changes (additions or deletions).
    pub fn has_changes(&self) -> bool {
        self.lines.iter().any(|l| !matches!(l, HunkLine::Context(_)))
    }

    /// A hunk with nothing to match is placed by line number alone.
    pub fn is_pure_insertion(&self) -> bool {
        self.old_count == 0
    }

    /// The 0-based offset the header claims.
    ///
    /// A pure insertion's `old_start` names the line it goes after
    /// (`@@ -5,0 +6,2 @@` inserts after line 5), so its offset is `old_start`
    /// itself.
    pub fn expected_offset(&self) -> usize {
        if self.old_count == 0 {
            self.old_start
        } else {
            self.old_start.saturating_sub(1)
        }
    }

    /// Last original line covered, 1-based and inclusive.
    ///
    /// For a pure insertion this is `old_start`, so an insertion point counts
    /// as a one-line range for overlap purposes.
    pub fn old_end(&self) -> usize {
        if self.old_count == 0 {
            self.old_start
        } else {
            self.old_start + self.old_count - 1
        }
    }

    /// Two hunks overlap when their original line ranges intersect.
    pub fn overlaps(&self, other: &Hunk) -> bool {
        self.old_start <= other.old_end() && other.old_start <= self.old_end()
    }

    /// The diff ordinals this hunk reports for.
    pub fn ordinals(&self) -> Vec<usize> {
        match &self.merged_from {
            Some(set) => set.iter().copied().collect(),
            None => vec![self.number],
        }
    }
}

/// A hunk whose `@@` header could not be read. Its body was not parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedHunk {
    /// The ordinal this hunk has in the diff.
    pub number: usize,
    /// 1-based line of the header in the diff text.
    pub line: usize,
    pub header: String,
}

/// All the hunks a diff applies to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    /// Path from the `---` header, without the `a/` prefix. `None` for `/dev/null`
    /// or when the diff had no headers.
    pub old_path: Option<PathBuf>,
    /// Path from the `+++` header, without the `b/` prefix.
    pub new_path: Option<PathBuf>,
    /// Set when the diff marks the file as new (`new file mode`, `/dev/null`
    /// or an empty `---` path).
    pub is_new_file: bool,
    /// Cleared by `\ No newline at end of file` on the new side.
    pub ends_with_newline: bool,
    /// Hunks in diff order, numbered from 1.
    pub hunks: Vec<Hunk>,
    /// Hunks dropped for an unreadable header. They keep their ordinals, so
    /// `hunks` may have gaps in its numbering.
    pub skipped: Vec<SkippedHunk>,
}

impl FilePatch {
    /// The path the patch writes to: the new path, falling back to the old one.
    pub fn target_path(&self) -> Option<&Path> {
        self.new_path.as_deref().or(self.old_path.as_deref())
    }

    /// Checks if the patch creates a file.
    ///
    /// Besides an explicit new-file marker, a diff whose every hunk is a pure
    /// insertion anchored at line 0 (`@@ -0,0 +1,n @@`) is a creation.
    ///
    /// # Example
    ///
    /// ```
    /// # use diffmend::parse_patch;
    /// let patch = parse_patch("--- /dev/null\n+++ b/new.txt\n@@ -0,0 +1,2 @@\n+Hello\n+World\n").unwrap();
    /// assert!(patch.is_creation());
    /// ```
    pub fn is_creation(&self) -> bool {
        self.is_new_file
            || (!self.hunks.is_empty()
                && self.hunks[0].old_start == 0
                && self.hunks.iter().all(Hunk::is_pure_insertion))
    }

    /// Creates a new `FilePatch` by comparing two texts.
    ///
    /// # Example
    ///
    /// ```
    /// # use diffmend::FilePatch;
    /// let old_code = "fn main() {\n    println!(\"old\");\n}\n";
    /// let new_code = "fn main() {\n    println!(\"new\");\n}\n";
    ///
    /// let patch = FilePatch::from_texts("src/main.rs", old_code, new_code, 3).unwrap();
    ///
    /// assert_eq!(patch.hunks.len(), 1);
    /// assert_eq!(patch.hunks[0].removed_lines, vec!["    println!(\"old\");"]);
    /// assert_eq!(patch.hunks[0].added_lines, vec!["    println!(\"new\");"]);
    /// ```
    pub fn from_texts(
        file_path: impl Into<PathBuf>,
        old_text: &str,
        new_text: &str,
        context_len: usize,
    ) -> Result<Self, ParseError> {
        let path = file_path.into();
        let path_str = path.to_string_lossy();
        let old_header = format!("a/{}", path_str);
        let new_header = format!("b/{}", path_str);
        let diff = TextDiff::from_lines(old_text, new_text);
        let diff_text = diff
            .unified_diff()
            .context_radius(context_len)
            .header(&old_header, &new_header)
            .to_string();

        if diff_text.trim().is_empty() {
            return Ok(FilePatch {
                old_path: Some(path.clone()),
                new_path: Some(path),
                is_new_file: false,
                ends_with_newline: new_text.ends_with('\n') || new_text.is_empty(),
                hunks: vec![],
                skipped: vec![],
            });
        }
        parse_patch(&diff_text)
    }
}
