use super::{PositionResolver, ResolvedPosition};
use crate::hunk::Hunk;
use crate::text::block_matches_at;

/// Accepts the hunk only where its header says it goes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatchResolver;

impl PositionResolver for ExactMatchResolver {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn resolve(&self, file_lines: &[String], hunk: &Hunk) -> ResolvedPosition {
        let offset = hunk.expected_offset();
        if block_matches_at(file_lines, offset, &hunk.old_block) {
            ResolvedPosition::matched(offset, 1.0)
        } else {
            ResolvedPosition::not_applicable()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hunk::HunkLine;

    fn lines(s: &[&str]) -> Vec<String> {
        s.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn matches_only_at_claimed_offset() {
        let file = lines(&["a", "b", "c", "b", "c"]);
        let hunk = Hunk::new(
            1,
            4,
            4,
            vec![HunkLine::Context("b".into()), HunkLine::Remove("c".into())],
        );
        let pos = ExactMatchResolver.resolve(&file, &hunk);
        assert_eq!(pos.offset, Some(3));
        assert_eq!(pos.confidence, 1.0);

        let shifted = Hunk::new(1, 3, 3, hunk.lines.clone());
        assert_eq!(ExactMatchResolver.resolve(&file, &shifted).offset, None);
    }

    #[test]
    fn ignores_surrounding_whitespace() {
        let file = lines(&["    x = 1", "y"]);
        let hunk = Hunk::new(1, 1, 1, vec![HunkLine::Remove("x = 1  ".into())]);
        assert!(ExactMatchResolver.resolve(&file, &hunk).is_accepted(0.5));
    }
}
