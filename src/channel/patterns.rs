//! Pattern matching seam for expect operations.
//!
//! Literal substrings and compiled regex patterns are two instances of one
//! operation: find the earliest end-of-match offset in the decoded text.

use regex::Regex;

/// Trait for expect matchers.
pub trait Matcher {
    /// Returns the byte offset just past the earliest match, or None.
    fn find_end(&self, text: &str) -> Option<usize>;

    /// Check whether the text contains a match.
    fn is_match(&self, text: &str) -> bool {
        self.find_end(text).is_some()
    }
}

/// Literal substring matching.
impl Matcher for str {
    fn find_end(&self, text: &str) -> Option<usize> {
        text.find(self).map(|start| start + self.len())
    }
}

/// Regex matching (the compiled-pattern flavor).
impl Matcher for Regex {
    fn find_end(&self, text: &str) -> Option<usize> {
        self.find(text).map(|m| m.end())
    }
}
