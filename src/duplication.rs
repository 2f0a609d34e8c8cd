//! Guard-clause duplication checks.
//!
//! A hunk that adds `if x is None:` next to an existing `if x is None:` is
//! the classic sign of a hunk placed one function off. The patterns here are
//! narrow on purpose: a guard clause is a single null/falsy test, nothing
//! more.

use crate::hunk::Hunk;
use crate::text::lines_equal;
use log::debug;
use regex::Regex;
use std::sync::LazyLock;

static GUARD_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // if x is None: / if x is not None:
        r"^if\s+[\w.\[\]'\x22]+\s+is\s+(not\s+)?None\s*:$",
        // if not x:
        r"^if\s+not\s+[\w.\[\]'\x22]+\s*:$",
        // if (!x) {
        r"^if\s*\(\s*!\s*[\w.]+\s*\)\s*\{?$",
        // if x == None: / if (x === null) { / if err != nil {
        r"^if\s*\(?\s*[\w.]+\s*(==|===|!=|!==)\s*(None|null|nil|undefined)\s*\)?\s*[:{]?$",
        // if x.is_none() {
        r"^if\s+[\w.]+\.is_(none|empty)\(\)\s*\{$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("guard clause pattern"))
    .collect()
});

/// `true` for lines that look like a null or falsy guard.
///
/// # Example
///
/// ```
/// # use diffmend::is_guard_clause;
/// assert!(is_guard_clause("    if user is None:"));
/// assert!(is_guard_clause("if (!config) {"));
/// assert!(!is_guard_clause("if count > limit:"));
/// assert!(!is_guard_clause("return None"));
/// ```
pub fn is_guard_clause(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with("if") && GUARD_PATTERNS.iter().any(|re| re.is_match(trimmed))
}

/// A guard clause that already exists next to where a hunk would add it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicationRisk {
    /// The guard line the hunk adds.
    pub line: String,
    /// 0-based file line where the same guard already sits.
    pub existing_at: usize,
}

/// Vetoes placements that would put a guard clause beside its twin.
#[derive(Debug, Clone, Copy)]
pub struct DuplicationPreventer {
    window: usize,
}

impl DuplicationPreventer {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    /// Checks placing `hunk` at `offset`.
    ///
    /// Looks `window` lines either side of the span the hunk would replace;
    /// the span itself is excluded since it is about to be rewritten.
    pub fn check(&self, file_lines: &[String], offset: usize, hunk: &Hunk) -> Option<DuplicationRisk> {
        let guards: Vec<&String> = hunk
            .added_lines
            .iter()
            .filter(|l| is_guard_clause(l))
            .collect();
        if guards.is_empty() {
            return None;
        }

        let span_end = (offset + hunk.old_count).min(file_lines.len());
        let lo = offset.saturating_sub(self.window);
        let hi = (span_end + self.window).min(file_lines.len());
        let neighbourhood = (lo..offset.min(file_lines.len())).chain(span_end..hi);

        for i in neighbourhood {
            if let Some(guard) = guards.iter().find(|g| lines_equal(&file_lines[i], g)) {
                debug!(
                    "    Hunk {}: guard '{}' already present at line {}",
                    hunk.number,
                    guard.trim(),
                    i + 1
                );
                return Some(DuplicationRisk {
                    line: guard.to_string(),
                    existing_at: i,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hunk::HunkLine;

    #[test]
    fn recognises_common_guards() {
        for line in [
            "if x is None:",
            "if self.cache is not None:",
            "if not items:",
            "if (user === null) {",
            "if err != nil {",
            "if value.is_none() {",
        ] {
            assert!(is_guard_clause(line), "{line}");
        }
        for line in ["if a and b:", "x = None", "if len(items) > 3:"] {
            assert!(!is_guard_clause(line), "{line}");
        }
    }

    #[test]
    fn flags_existing_guard_outside_the_replaced_span() {
        let file: Vec<String> = ["def f(x):", "    if x is None:", "        return", "    y = x"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let hunk = Hunk::new(
            1,
            4,
            4,
            vec![
                HunkLine::Add("    if x is None:".into()),
                HunkLine::Add("        return".into()),
                HunkLine::Context("    y = x".into()),
            ],
        );
        let preventer = DuplicationPreventer::new(5);
        let risk = preventer.check(&file, 3, &hunk).unwrap();
        assert_eq!(risk.existing_at, 1);

        // Replacing the guard itself is not a duplication.
        let rewrite = Hunk::new(
            1,
            2,
            2,
            vec![
                HunkLine::Remove("    if x is None:".into()),
                HunkLine::Add("    if x is None:".into()),
            ],
        );
        assert!(preventer.check(&file, 1, &rewrite).is_none());
    }
}
