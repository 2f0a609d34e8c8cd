//! Unified-diff parsing.
//!
//! The parser is deliberately forgiving about the things models get wrong
//! (markdown fences around the diff, blank context lines that lost their
//! leading space, header counts that disagree with the body) and strict about
//! the one thing it cannot guess: a hunk header it cannot read is skipped,
//! together with its body. The skipped hunk keeps its ordinal, so the hunks
//! after it are still numbered as they appear in the diff.

use crate::error::ParseError;
use crate::hunk::{FilePatch, Hunk, HunkLine, SkippedHunk};
use log::{debug, trace, warn};
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

static HUNK_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("hunk header pattern")
});

/// The numbers from a `@@ -a,b +c,d @@` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
}

/// Parses a hunk header line. A missing `,count` defaults to 1.
///
/// # Example
///
/// ```
/// # use diffmend::parse_hunk_header;
/// let header = parse_hunk_header("@@ -21,8 +22 @@ fn main() {").unwrap();
/// assert_eq!((header.old_start, header.old_count), (21, 8));
/// assert_eq!((header.new_start, header.new_count), (22, 1));
/// assert!(parse_hunk_header("@@ ... @@").is_none());
/// ```
pub fn parse_hunk_header(line: &str) -> Option<HunkHeader> {
    let caps = HUNK_HEADER_RE.captures(line.trim_end())?;
    let num = |i: usize, default: usize| -> Option<usize> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(default),
        }
    };
    Some(HunkHeader {
        old_start: num(1, 0)?,
        old_count: num(2, 1)?,
        new_start: num(3, 0)?,
        new_count: num(4, 1)?,
    })
}

/// Accumulates one hunk's body while the parser walks the diff.
struct PendingHunk {
    number: usize,
    header: HunkHeader,
    lines: Vec<HunkLine>,
    /// Bare empty lines not yet known to be part of the body.
    blank_run: usize,
}

impl PendingHunk {
    fn new(number: usize, header: HunkHeader) -> Self {
        Self {
            number,
            header,
            lines: Vec::new(),
            blank_run: 0,
        }
    }

    fn push(&mut self, line: HunkLine) {
        for _ in 0..std::mem::take(&mut self.blank_run) {
            self.lines.push(HunkLine::Context(String::new()));
        }
        self.lines.push(line);
    }

    fn old_len(&self) -> usize {
        self.lines.iter().filter(|l| l.is_old()).count()
    }

    /// Trailing bare blank lines are kept only as far as the header says the
    /// hunk still has lines to cover.
    fn finish(mut self) -> Hunk {
        let number = self.number;
        let missing = self.header.old_count.saturating_sub(self.old_len());
        for _ in 0..self.blank_run.min(missing) {
            self.lines.push(HunkLine::Context(String::new()));
        }
        let hunk = Hunk::new(number, self.header.old_start, self.header.new_start, self.lines);
        if hunk.old_count != self.header.old_count || hunk.new_count != self.header.new_count {
            debug!(
                "    Hunk {} header claims -{},{} +{},{} but body has {} old / {} new lines.",
                number,
                self.header.old_start,
                self.header.old_count,
                self.header.new_start,
                self.header.new_count,
                hunk.old_count,
                hunk.new_count
            );
        }
        hunk
    }
}

/// Accumulates one file section.
#[derive(Default)]
struct Section {
    old_path: Option<PathBuf>,
    new_path: Option<PathBuf>,
    is_new_file: bool,
    has_header: bool,
    ends_with_newline: bool,
    hunks: Vec<Hunk>,
    current: Option<PendingHunk>,
    /// Every `@@` line seen so far, readable or not.
    headers_seen: usize,
    skipped: Vec<SkippedHunk>,
    first_hunk_line: Option<usize>,
}

impl Section {
    fn new() -> Self {
        Self {
            ends_with_newline: true,
            ..Default::default()
        }
    }

    fn close_hunk(&mut self) {
        if let Some(pending) = self.current.take() {
            self.hunks.push(pending.finish());
        }
    }

    fn is_empty(&self) -> bool {
        !self.has_header
            && self.hunks.is_empty()
            && self.current.is_none()
            && self.skipped.is_empty()
    }

    fn finish(mut self) -> Result<FilePatch, ParseError> {
        self.close_hunk();
        if self.hunks.is_empty() {
            return Err(match self.skipped.into_iter().next() {
                Some(SkippedHunk { line, header, .. }) => ParseError::MalformedHeader { line, header },
                None => ParseError::NoHunks,
            });
        }
        Ok(FilePatch {
            old_path: self.old_path,
            new_path: self.new_path,
            is_new_file: self.is_new_file,
            ends_with_newline: self.ends_with_newline,
            hunks: self.hunks,
            skipped: self.skipped,
        })
    }
}

fn strip_path(raw: &str, prefix: &str) -> Option<PathBuf> {
    // Drop a trailing timestamp (`--- a/file\t2024-01-01 ...`).
    let path = raw.split('\t').next().unwrap_or("").trim();
    if path.is_empty() || path == "/dev/null" || path == "a/dev/null" || path == "b/dev/null" {
        return None;
    }
    Some(PathBuf::from(path.strip_prefix(prefix).unwrap_or(path)))
}

/// Parses unified-diff text into one [`FilePatch`] per file.
///
/// `diff --git`, `index`, mode lines and markdown fences are skipped. A `---`
/// line only starts a new file when the next line is its `+++` partner, so a
/// removed line that happens to start with `--` is not mistaken for a header.
///
/// # Errors
///
/// - [`ParseError::MalformedHeader`] when a file section has no readable hunk
///   and at least one unreadable `@@` header.
/// - [`ParseError::NoHunks`] when there is nothing to apply.
/// - [`ParseError::MissingFileHeader`] when hunks precede the first file
///   header of a multi-file diff.
///
/// # Example
///
/// ```
/// use diffmend::parse_patches;
///
/// let diff = "--- a/one.txt\n+++ b/one.txt\n@@ -1 +1 @@\n-foo\n+bar\n\
///             --- a/two.txt\n+++ b/two.txt\n@@ -1 +1 @@\n-baz\n+qux\n";
/// let patches = parse_patches(diff).unwrap();
/// assert_eq!(patches.len(), 2);
/// assert_eq!(patches[1].target_path().unwrap().to_str(), Some("two.txt"));
/// ```
pub fn parse_patches(content: &str) -> Result<Vec<FilePatch>, ParseError> {
    let mut patches = Vec::new();
    let mut section = Section::new();
    let mut lines = content.lines().enumerate().peekable();

    while let Some((index, line)) = lines.next() {
        let line_number = index + 1;

        if line.starts_with("```") {
            trace!("  Skipping fence on line {}", line_number);
            section.close_hunk();
            continue;
        }

        if line.starts_with("diff --git ") {
            section.close_hunk();
            if !section.is_empty() {
                patches.push(std::mem::replace(&mut section, Section::new()));
            }
            section.has_header = true;
            continue;
        }

        if line.starts_with("new file mode") {
            section.is_new_file = true;
            continue;
        }

        let next_is_new_header = lines
            .peek()
            .is_some_and(|(_, next)| next.starts_with("+++"));
        if line.starts_with("---") && next_is_new_header {
            section.close_hunk();
            // A `diff --git` header may already have opened this section.
            if !section.hunks.is_empty() || (section.has_header && section.old_path.is_some()) {
                patches.push(std::mem::replace(&mut section, Section::new()));
            }
            section.has_header = true;
            let old = strip_path(line.trim_start_matches('-'), "a/");
            if old.is_none() {
                section.is_new_file = true;
            }
            section.old_path = old;
            if let Some((_, plus)) = lines.next() {
                section.new_path = strip_path(plus.trim_start_matches('+'), "b/");
            }
            continue;
        }

        if line.starts_with("@@") {
            section.close_hunk();
            section.headers_seen += 1;
            let number = section.headers_seen;
            match parse_hunk_header(line) {
                Some(header) => {
                    trace!("  Hunk header on line {}: {:?}", line_number, header);
                    section.first_hunk_line.get_or_insert(line_number);
                    section.current = Some(PendingHunk::new(number, header));
                }
                None => {
                    warn!(
                        "Skipping hunk {} with malformed header on line {}: '{}'",
                        number, line_number, line
                    );
                    section.skipped.push(SkippedHunk {
                        number,
                        line: line_number,
                        header: line.to_string(),
                    });
                }
            }
            continue;
        }

        let Some(pending) = section.current.as_mut() else {
            // Prose, `index` lines and bodies of skipped hunks.
            continue;
        };

        if line.is_empty() {
            pending.blank_run += 1;
        } else if let Some(rest) = line.strip_prefix('+') {
            pending.push(HunkLine::Add(rest.to_string()));
        } else if let Some(rest) = line.strip_prefix('-') {
            pending.push(HunkLine::Remove(rest.to_string()));
        } else if let Some(rest) = line.strip_prefix(' ') {
            pending.push(HunkLine::Context(rest.to_string()));
        } else if line.starts_with('\\') {
            // Refers to the line just before it; only the new side matters
            // for the rendered result.
            if pending.lines.last().is_some_and(HunkLine::is_new) {
                section.ends_with_newline = false;
            }
        } else {
            trace!("  Line {} ends the hunk body: '{}'", line_number, line);
            section.close_hunk();
        }
    }

    section.close_hunk();
    if !section.is_empty() {
        patches.push(section);
    }

    let any_header = patches.iter().any(|s| s.has_header);
    if any_header && patches.len() > 1 && !patches[0].has_header {
        return Err(ParseError::MissingFileHeader {
            line: patches[0].first_hunk_line.unwrap_or(1),
        });
    }

    let mut result = Vec::with_capacity(patches.len());
    let mut first_error = None;
    for section in patches {
        match section.finish() {
            Ok(patch) => result.push(patch),
            Err(e) => {
                warn!("Dropping file section without usable hunks: {}", e);
                first_error.get_or_insert(e);
            }
        }
    }
    if result.is_empty() {
        return Err(first_error.unwrap_or(ParseError::NoHunks));
    }
    debug!("Parsed {} file patch(es).", result.len());
    Ok(result)
}

/// Parses a diff that targets a single file.
///
/// If the text contains several file sections, the first one is returned;
/// use [`parse_patches`] to get all of them.
///
/// # Example
///
/// ```
/// use diffmend::parse_patch;
///
/// let diff = "@@ -2,1 +2,1 @@\n-b\n+B\n";
/// let patch = parse_patch(diff).unwrap();
/// let hunk = &patch.hunks[0];
/// assert_eq!((hunk.old_start, hunk.old_count), (2, 1));
/// assert_eq!(hunk.removed_lines, vec!["b"]);
/// assert_eq!(hunk.added_lines, vec!["B"]);
/// ```
pub fn parse_patch(content: &str) -> Result<FilePatch, ParseError> {
    let mut patches = parse_patches(content)?;
    if patches.len() > 1 {
        warn!(
            "Diff contains {} file sections; using the first one.",
            patches.len()
        );
    }
    Ok(patches.swap_remove(0))
}
