//! Path compiler: lexical splitting of access expressions.
//!
//! `obj[0].name` becomes the segments `obj`, `[0]`, `.name`; each segment is
//! the minimal next access step, with its leading boundary token attached.
//! The prefixes of the segment list (`obj`, `obj[0]`, `obj[0].name`) are what
//! the matcher caches.
//!
//! Splitting is purely lexical. Brackets and parentheses are not balanced, so
//! a `.` or `[` inside a quoted subscript starts a new segment, and the
//! resulting step fails to parse at evaluation time.

use crate::EvalError;
use std::fmt;
use std::sync::Arc;

/// Characters that start a new segment.
pub const BOUNDARY_TOKENS: [char; 3] = ['.', '[', '('];

/// A compiled path: the ordered segments of a path expression.
///
/// Hashable and comparable by value. Concatenating the segments yields the
/// original path string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey {
    segments: Arc<[Box<str>]>,
}

impl PathKey {
    /// The segments, shortest prefix first.
    #[must_use]
    pub fn segments(&self) -> &[Box<str>] {
        &self.segments
    }

    /// The first segment: the root name.
    #[must_use]
    pub fn root(&self) -> &str {
        self.segments.first().map_or("", |s| &**s)
    }

    /// Number of segments (always at least one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns `true` if the path has no segments. Never true for
    /// [`split_path`] output.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The first `len` segments.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds [`len()`](Self::len).
    #[must_use]
    pub fn prefix(&self, len: usize) -> &[Box<str>] {
        &self.segments[..len]
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in self.segments.iter() {
            f.write_str(segment)?;
        }
        Ok(())
    }
}

/// Split a path expression at `.`, `[`, and `(`.
///
/// ```
/// use omatch::split_path;
///
/// let key = split_path("obj[0].keys()");
/// let segments: Vec<&str> = key.segments().iter().map(|s| &**s).collect();
/// assert_eq!(segments, ["obj", "[0]", ".keys", "()"]);
/// ```
#[must_use]
pub fn split_path(path: &str) -> PathKey {
    let mut segments: Vec<Box<str>> = Vec::new();
    let mut current = String::new();
    for c in path.chars() {
        if BOUNDARY_TOKENS.contains(&c) {
            segments.push(std::mem::take(&mut current).into_boxed_str());
        }
        current.push(c);
    }
    segments.push(current.into_boxed_str());
    PathKey {
        segments: segments.into(),
    }
}

/// One safe-access step, parsed from a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The first segment: a name resolved in the evaluation frame.
    Root(String),
    /// `.name`
    Attr(String),
    /// `[key]`
    Index(IndexKey),
    /// `()`
    Call,
}

/// The key of an `[...]` step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexKey {
    /// `[3]`, `[-1]`
    Int(i64),
    /// `['name']`, `["name"]`
    Str(String),
    /// `[name]`: looked up in the evaluation frame.
    Name(String),
}

impl Step {
    /// Parse the segment at `position` (0 = root) into a step.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::InvalidStep`] if the segment is not part of the
    /// safe-access grammar.
    pub fn parse(segment: &str, position: usize) -> Result<Self, EvalError> {
        let invalid = || EvalError::InvalidStep {
            segment: segment.to_owned(),
        };

        if position == 0 {
            return if is_identifier(segment) {
                Ok(Self::Root(segment.to_owned()))
            } else {
                Err(invalid())
            };
        }

        if let Some(name) = segment.strip_prefix('.') {
            return if is_identifier(name) {
                Ok(Self::Attr(name.to_owned()))
            } else {
                Err(invalid())
            };
        }

        if let Some(inner) = segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            return parse_index(inner).map(Self::Index).ok_or_else(invalid);
        }

        if segment.strip_prefix('(').and_then(|s| s.strip_suffix(')')) == Some("") {
            return Ok(Self::Call);
        }

        Err(invalid())
    }
}

fn parse_index(inner: &str) -> Option<IndexKey> {
    let inner = inner.trim();
    if let Ok(i) = inner.parse::<i64>() {
        return Some(IndexKey::Int(i));
    }
    for quote in ['\'', '"'] {
        if let Some(s) = inner
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return (!s.contains(quote)).then(|| IndexKey::Str(s.to_owned()));
        }
    }
    is_identifier(inner).then(|| IndexKey::Name(inner.to_owned()))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}
