//! Evaluation trace types for debugging pattern behavior.
//!
//! Trace types mirror the runtime types ([`Pattern`](crate::Pattern),
//! [`Rule`](crate::Rule)) but capture evaluation results instead of inputs.
//! Use [`Pattern::match_with_trace`](crate::Pattern::match_with_trace) to see
//! why a subject did or did not match.
//!
//! # Two Levels of Trace
//!
//! - [`PathTrace`]: Per-rule: which steps ran, what value, which checks passed?
//! - [`MatchTrace`]: Per-match: every rule visited plus the reason for failure
//!
//! # Example
//!
//! ```
//! use omatch::{Pattern, Predicate, Rule, Value};
//!
//! let pattern = Pattern::new()
//!     .rule("obj.a", Rule::new().check(Predicate::truthy()))
//!     .rule("obj.a.len()", Rule::new().bind_value("n"));
//! let trace = pattern.match_with_trace(&Value::map([("a", "xyz")]));
//!
//! assert!(trace.result.is_some());
//! assert_eq!(trace.paths[0].evaluated, 2);
//! // `obj` and `obj.a` were served from the cache for the second rule.
//! assert_eq!(trace.paths[1].cached, 2);
//! assert_eq!(trace.paths[1].evaluated, 2);
//! ```

use crate::{EvalError, MatchResult, Value};
use std::fmt;

/// Trace of a full [`Pattern`](crate::Pattern) match.
///
/// # INV: `result` == `matches()` result
///
/// `result` always equals what [`Pattern::matches_in`](crate::Pattern::matches_in)
/// would return for the same subject and context, given pure rules.
pub struct MatchTrace {
    /// The final result (identical to what `matches()` returns).
    pub result: Option<MatchResult>,
    /// One entry per rule visited, in evaluation order. Stops at the failing rule.
    pub paths: Vec<PathTrace>,
    /// Why the match failed, if it did.
    pub failure: Option<MatchFailure>,
}

impl MatchTrace {
    /// Returns `true` if the subject matched.
    #[must_use]
    pub fn matched(&self) -> bool {
        self.result.is_some()
    }
}

impl fmt::Debug for MatchTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchTrace")
            .field("result", &self.result.as_ref().map(MatchResult::bound))
            .field("paths", &self.paths)
            .field("failure", &self.failure)
            .finish()
    }
}

/// One rule's evaluation in a trace.
#[derive(Debug, Clone, PartialEq)]
pub struct PathTrace {
    /// The rule's path.
    pub path: String,
    /// Steps applied during this rule (cache misses).
    pub evaluated: usize,
    /// Steps served from the per-match cache.
    pub cached: usize,
    /// The resolved value, if the path resolved.
    pub value: Option<Value>,
    /// Each predicate run, in order. Stops at the first that did not pass.
    pub checks: Vec<CheckTrace>,
    /// Names bound by this rule, in order.
    pub bound: Vec<String>,
}

impl PathTrace {
    pub(crate) fn new(path: String) -> Self {
        Self {
            path,
            evaluated: 0,
            cached: 0,
            value: None,
            checks: Vec::new(),
            bound: Vec::new(),
        }
    }
}

/// One predicate's outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckTrace {
    /// The predicate's name.
    pub predicate: String,
    /// `true` if it returned `Ok(true)`.
    pub passed: bool,
}

/// Why a match failed.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchFailure {
    /// The path could not be evaluated.
    Unresolved {
        /// The rule's path.
        path: String,
        /// The step error.
        error: EvalError,
    },
    /// A predicate returned `false`.
    Rejected {
        /// The rule's path.
        path: String,
        /// The predicate's name.
        predicate: String,
    },
    /// A predicate returned an error.
    PredicateError {
        /// The rule's path.
        path: String,
        /// The predicate's name.
        predicate: String,
        /// The predicate's error.
        error: EvalError,
    },
    /// An extractor returned an error.
    ExtractorError {
        /// The rule's path.
        path: String,
        /// The name being bound.
        name: String,
        /// The extractor's error.
        error: EvalError,
    },
}

impl MatchFailure {
    /// The path of the rule that failed.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Unresolved { path, .. }
            | Self::Rejected { path, .. }
            | Self::PredicateError { path, .. }
            | Self::ExtractorError { path, .. } => path,
        }
    }
}

impl fmt::Display for MatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolved { path, error } => write!(f, "{path}: unresolved ({error})"),
            Self::Rejected { path, predicate } => write!(f, "{path}: rejected by {predicate}"),
            Self::PredicateError {
                path,
                predicate,
                error,
            } => write!(f, "{path}: {predicate} failed ({error})"),
            Self::ExtractorError { path, name, error } => {
                write!(f, "{path}: extractor for {name} failed ({error})")
            }
        }
    }
}

/// Collects [`PathTrace`]s when tracing is on; a no-op otherwise.
pub(crate) struct Recorder {
    paths: Option<Vec<PathTrace>>,
}

impl Recorder {
    pub(crate) fn enabled() -> Self {
        Self {
            paths: Some(Vec::new()),
        }
    }

    pub(crate) fn disabled() -> Self {
        Self { paths: None }
    }

    pub(crate) fn begin(&mut self, path: &dyn fmt::Display) {
        if let Some(paths) = &mut self.paths {
            paths.push(PathTrace::new(path.to_string()));
        }
    }

    /// Apply `f` to the current rule's trace, if recording.
    pub(crate) fn with(&mut self, f: impl FnOnce(&mut PathTrace)) {
        if let Some(current) = self.paths.as_mut().and_then(|p| p.last_mut()) {
            f(current);
        }
    }

    pub(crate) fn finish(self) -> Vec<PathTrace> {
        self.paths.unwrap_or_default()
    }
}
