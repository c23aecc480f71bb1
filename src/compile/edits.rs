//! Byte-range text edits that keep the line structure of the source.

use std::ops::Range;

/// A batch of non-overlapping edits against one source text.
///
/// Removed text is replaced by as many line breaks as it contained, so every
/// surviving token stays on its original line and a line-level source map of
/// the result is the identity. When two edits overlap, the one that starts
/// first (and, at equal starts, the longer one) wins.
#[derive(Debug, Default)]
pub struct Edits {
    edits: Vec<(Range<usize>, String)>,
}

impl Edits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Replace a range with `text`, padding with the line breaks it removes.
    pub fn replace(&mut self, range: Range<usize>, text: impl Into<String>) {
        self.edits.push((range, text.into()));
    }

    /// Remove a range.
    pub fn remove(&mut self, range: Range<usize>) {
        self.replace(range, String::new());
    }

    pub fn insert(&mut self, at: usize, text: impl Into<String>) {
        self.replace(at..at, text);
    }

    pub fn apply(mut self, src: &str) -> String {
        self.edits.sort_by(|a, b| a.0.start.cmp(&b.0.start).then(b.0.end.cmp(&a.0.end)));
        let mut out = String::with_capacity(src.len());
        let mut pos = 0;
        for (range, text) in self.edits {
            if range.start < pos {
                continue;
            }
            out.push_str(&src[pos..range.start]);
            let removed_lines = src[range.clone()].matches('\n').count();
            let added_lines = text.matches('\n').count();
            out.push_str(&text);
            for _ in added_lines..removed_lines {
                out.push('\n');
            }
            pos = range.end;
        }
        out.push_str(&src[pos..]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_keeps_line_breaks() {
        let src = "a\ninterface X {\n  y: 1\n}\nb";
        let mut edits = Edits::new();
        edits.remove(2..src.len() - 2);
        assert_eq!(edits.apply(src), "a\n\n\n\nb");
    }

    #[test]
    fn test_outer_edit_wins() {
        let src = "import x from 'x';";
        let mut edits = Edits::new();
        edits.replace(14..17, "'y'");
        edits.replace(0..18, "const x = require('y');");
        assert_eq!(edits.apply(src), "const x = require('y');");
    }

    #[test]
    fn test_insertions_and_replacements() {
        let src = "import('a')";
        let mut edits = Edits::new();
        edits.replace(0..6, "Promise.resolve().then(() => require");
        edits.insert(11, ")");
        assert_eq!(edits.apply(src), "Promise.resolve().then(() => require('a'))");
    }
}
