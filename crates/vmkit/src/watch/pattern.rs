//! Pattern types for stream expectations.
//!
//! Patterns are matched against raw bytes. A literal matches an exact byte
//! sequence; a regex is compiled with [`regex::bytes::Regex`] so it can run
//! over output that is not valid UTF-8.

use std::fmt;
use std::ops::Range;

use regex::bytes::Regex;

/// A pattern that can be matched against console output.
#[derive(Clone)]
pub enum Pattern {
    /// Match an exact byte sequence.
    Literal(Vec<u8>),

    /// Match a regular expression.
    Regex(CompiledRegex),
}

impl Pattern {
    /// Create a literal pattern.
    #[must_use]
    pub fn literal(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Literal(bytes.into())
    }

    /// Create a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(pattern)?;
        Ok(Self::Regex(CompiledRegex::new(pattern.to_string(), regex)))
    }

    /// Get the pattern as a string for display purposes.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Literal(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Self::Regex(r) => r.pattern().to_string(),
        }
    }

    /// Find the leftmost match in `haystack`.
    #[must_use]
    pub fn find(&self, haystack: &[u8]) -> Option<PatternMatch> {
        match self {
            Self::Literal(needle) => find_literal(haystack, needle).map(|start| PatternMatch {
                start,
                end: start + needle.len(),
                captures: Vec::new(),
                named: Vec::new(),
            }),
            Self::Regex(r) => r.find(haystack),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(bytes) => write!(f, "Literal({:?})", String::from_utf8_lossy(bytes)),
            Self::Regex(r) => write!(f, "Regex({:?})", r.pattern()),
        }
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Self::Literal(s.as_bytes().to_vec())
    }
}

impl From<String> for Pattern {
    fn from(s: String) -> Self {
        Self::Literal(s.into_bytes())
    }
}

impl From<&[u8]> for Pattern {
    fn from(bytes: &[u8]) -> Self {
        Self::Literal(bytes.to_vec())
    }
}

impl From<Regex> for Pattern {
    fn from(regex: Regex) -> Self {
        Self::Regex(CompiledRegex::new(regex.as_str().to_string(), regex))
    }
}

fn find_literal(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// A compiled regular expression with its source pattern.
#[derive(Clone)]
pub struct CompiledRegex {
    pattern: String,
    regex: Regex,
}

impl CompiledRegex {
    /// Create a new compiled regex.
    #[must_use]
    pub const fn new(pattern: String, regex: Regex) -> Self {
        Self { pattern, regex }
    }

    /// Get the source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Find the leftmost match and its capture groups.
    #[must_use]
    pub fn find(&self, haystack: &[u8]) -> Option<PatternMatch> {
        let caps = self.regex.captures(haystack)?;
        let whole = caps.get(0)?;
        let captures = (1..caps.len())
            .map(|i| caps.get(i).map(|m| m.range()))
            .collect();
        let named = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.range())))
            .collect();
        Some(PatternMatch {
            start: whole.start(),
            end: whole.end(),
            captures,
            named,
        })
    }
}

/// Positions of a successful match inside the searched buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// Start position of the match.
    pub start: usize,
    /// End position of the match.
    pub end: usize,
    /// Ranges of capture groups 1.., `None` for groups that did not take part.
    pub captures: Vec<Option<Range<usize>>>,
    /// Ranges of named capture groups that took part in the match.
    pub named: Vec<(String, Range<usize>)>,
}

impl PatternMatch {
    /// Get the length of the match.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the match is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}
