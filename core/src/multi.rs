//! Resolving one subject against several patterns.

use crate::diagnostics::{Diagnostics, Notice, TracingDiagnostics};
use crate::eval::EvalContext;
use crate::pattern::{MatchResult, Pattern};
use crate::{ResolveError, Value};
use std::collections::BTreeMap;

/// Several patterns tried against one subject.
///
/// Every pattern is evaluated; none short-circuits the others. When more
/// than one matches and ambiguity is allowed, the lowest index wins.
///
/// ```
/// use omatch::{MultiPattern, Pattern, Predicate, ResolveError, Rule, Value};
///
/// let ints = Pattern::new().rule("obj", Rule::new().check(Predicate::is_type("int")).bind_value("n"));
/// let strs = Pattern::new().rule("obj", Rule::new().check(Predicate::is_type("str")).bind_value("s"));
/// let multi = MultiPattern::new(vec![ints, strs]);
///
/// assert_eq!(multi.resolve(&Value::from(3)).unwrap().get("n"), Some(&Value::from(3)));
/// assert!(matches!(
///     multi.resolve(&Value::None),
///     Err(ResolveError::NoMatchingPattern { .. })
/// ));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MultiPattern {
    patterns: Vec<Pattern>,
    allow_ambiguous: bool,
}

/// Per-pattern outcomes for one subject.
#[derive(Debug, Clone)]
pub struct MultiMatchOutcome {
    /// The subject that was matched.
    pub subject: Value,
    /// Successful matches by pattern index.
    pub successes: BTreeMap<usize, MatchResult>,
    /// Indices of patterns that did not match, ascending.
    pub failures: Vec<usize>,
}

impl MultiMatchOutcome {
    /// Number of patterns that matched.
    #[must_use]
    pub fn matched(&self) -> usize {
        self.successes.len()
    }

    /// The lowest-index success, if any.
    #[must_use]
    pub fn first(&self) -> Option<(usize, &MatchResult)> {
        self.successes.iter().next().map(|(i, m)| (*i, m))
    }
}

impl MultiPattern {
    /// Try `patterns` in index order. Ambiguity is an error by default.
    #[must_use]
    pub fn new(patterns: Vec<Pattern>) -> Self {
        Self {
            patterns,
            allow_ambiguous: false,
        }
    }

    /// Whether several matches resolve to the lowest index instead of failing.
    #[must_use]
    pub fn allow_ambiguous(mut self, allow: bool) -> Self {
        self.allow_ambiguous = allow;
        self
    }

    /// The patterns, in index order.
    #[must_use]
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Match `subject` against every pattern.
    #[must_use]
    pub fn outcomes(
        &self,
        subject: &Value,
        context: &EvalContext,
        diagnostics: &dyn Diagnostics,
    ) -> MultiMatchOutcome {
        let mut successes = BTreeMap::new();
        let mut failures = Vec::new();
        for (index, pattern) in self.patterns.iter().enumerate() {
            match pattern.matches_in(subject, context, diagnostics) {
                Some(m) => {
                    successes.insert(index, m);
                }
                None => failures.push(index),
            }
        }
        MultiMatchOutcome {
            subject: subject.clone(),
            successes,
            failures,
        }
    }

    /// Resolve `subject` to a single match, reporting through `tracing`.
    ///
    /// # Errors
    ///
    /// See [`resolve_in`](Self::resolve_in).
    pub fn resolve(&self, subject: &Value) -> Result<MatchResult, ResolveError> {
        self.resolve_in(subject, &EvalContext::new(), &TracingDiagnostics)
    }

    /// Resolve `subject` to a single match.
    ///
    /// # Errors
    ///
    /// [`ResolveError::NoMatchingPattern`] if nothing matched;
    /// [`ResolveError::Ambiguity`] if several matched and ambiguity is not
    /// allowed. With ambiguity allowed, an `Ambiguity` notice is reported
    /// and the lowest index wins.
    pub fn resolve_in(
        &self,
        subject: &Value,
        context: &EvalContext,
        diagnostics: &dyn Diagnostics,
    ) -> Result<MatchResult, ResolveError> {
        let outcome = self.outcomes(subject, context, diagnostics);
        let matched = outcome.matched();
        if matched > 1 {
            if !self.allow_ambiguous {
                return Err(ResolveError::Ambiguity {
                    subject: format!("{subject:?}"),
                    matched,
                });
            }
            diagnostics.report(Notice::Ambiguity {
                matched: outcome.successes.keys().copied().collect(),
                chosen: outcome.successes.keys().next().copied().unwrap_or_default(),
            });
        }
        outcome
            .successes
            .into_values()
            .next()
            .ok_or_else(|| ResolveError::NoMatchingPattern {
                subject: format!("{subject:?}"),
            })
    }
}

impl FromIterator<Pattern> for MultiPattern {
    fn from_iter<I: IntoIterator<Item = Pattern>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
