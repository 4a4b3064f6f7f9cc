//! Pattern: ordered path rules and the matcher.

use crate::binder::{BindingPolicy, ScopeBinder, Session};
use crate::diagnostics::{Diagnostics, Notice, Silent, TracingDiagnostics};
use crate::env::{EnvError, Environment};
use crate::eval::{EvalContext, Frame};
use crate::path::{split_path, PathKey, Step};
use crate::rule::Rule;
use crate::trace::{CheckTrace, MatchFailure, MatchTrace, Recorder};
use crate::{EvalError, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Names bound by a successful match.
pub type Bindings = BTreeMap<String, Value>;

/// Per-match scratch map from path prefix to evaluated value.
type ObjectCache<'p> = HashMap<&'p [Box<str>], Value>;

/// An ordered set of path rules.
///
/// Insertion order is evaluation order. Re-inserting a path replaces its rule
/// in place. Cloning is cheap (shared), and the compiled form is built once,
/// on first match.
///
/// # Thread Safety
///
/// `Pattern` is `Send + Sync`; one pattern can be matched from many threads.
///
/// # Example
///
/// ```
/// use omatch::{Pattern, Predicate, Rule, Value};
///
/// let pattern = Pattern::new()
///     .rule("obj.kind", Rule::new().check(Predicate::exact("user")))
///     .rule("obj.id", Rule::new().bind_value("id"));
///
/// let m = pattern.matches(&Value::map([("kind", Value::from("user")), ("id", Value::from(7))]));
/// assert_eq!(m.unwrap().get("id"), Some(&Value::from(7)));
///
/// assert!(pattern.matches(&Value::map([("kind", "group")])).is_none());
/// assert!(pattern.matches(&Value::from(1)).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Pattern {
    inner: Arc<PatternInner>,
}

#[derive(Debug, Clone, Default)]
struct PatternInner {
    rules: Vec<(String, Rule)>,
    verbose: bool,
    policy: BindingPolicy,
    compiled: OnceLock<CompiledPattern>,
}

/// The compiled form of a [`Pattern`]: one [`PathKey`] per rule, same order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompiledPattern {
    keys: Vec<PathKey>,
}

impl CompiledPattern {
    /// The path keys, in rule order.
    #[must_use]
    pub fn keys(&self) -> &[PathKey] {
        &self.keys
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the pattern has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Pattern {
    /// A pattern with no rules. It matches every subject with no bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule for `path`, replacing any existing rule for the same path.
    #[must_use]
    pub fn rule(mut self, path: impl Into<String>, rule: Rule) -> Self {
        let path = path.into();
        let inner = Arc::make_mut(&mut self.inner);
        match inner.rules.iter_mut().find(|(p, _)| *p == path) {
            Some(slot) => slot.1 = rule,
            None => inner.rules.push((path, rule)),
        }
        inner.compiled = OnceLock::new();
        self
    }

    /// Report verbose-only notices (unresolved paths, rejections, overwrites).
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        Arc::make_mut(&mut self.inner).verbose = verbose;
        self
    }

    /// The policy used when this pattern's matches are bound into an environment.
    #[must_use]
    pub fn with_policy(mut self, policy: BindingPolicy) -> Self {
        Arc::make_mut(&mut self.inner).policy = policy;
        self
    }

    /// Whether verbose-only notices are reported.
    #[must_use]
    pub fn verbose(&self) -> bool {
        self.inner.verbose
    }

    /// The binding policy.
    #[must_use]
    pub fn policy(&self) -> &BindingPolicy {
        &self.inner.policy
    }

    /// The rules, in evaluation order.
    pub fn rules(&self) -> impl Iterator<Item = (&str, &Rule)> {
        self.inner.rules.iter().map(|(p, r)| (p.as_str(), r))
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.rules.len()
    }

    /// Returns `true` if the pattern has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.rules.is_empty()
    }

    /// Returns `true` if both handles share the same pattern.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The cached compiled form, built on first use.
    #[must_use]
    pub fn compiled(&self) -> &CompiledPattern {
        self.inner.compiled.get_or_init(|| self.compile())
    }

    /// Compile the rule paths without touching the cache.
    #[must_use]
    pub fn compile(&self) -> CompiledPattern {
        CompiledPattern {
            keys: self.inner.rules.iter().map(|(p, _)| split_path(p)).collect(),
        }
    }

    /// Match `subject`, reporting notices through `tracing`.
    #[must_use]
    pub fn matches(&self, subject: &Value) -> Option<MatchResult> {
        self.matches_in(subject, &EvalContext::new(), &TracingDiagnostics)
    }

    /// Match `subject` with extra names in scope, reporting to `diagnostics`.
    ///
    /// Returns `None` on any unresolvable path, rejected predicate, or
    /// predicate/extractor error.
    #[must_use]
    pub fn matches_in(
        &self,
        subject: &Value,
        context: &EvalContext,
        diagnostics: &dyn Diagnostics,
    ) -> Option<MatchResult> {
        self.run(subject, context, diagnostics, &mut Recorder::disabled())
            .ok()
            .map(|bound| MatchResult::new(subject.clone(), self.clone(), bound))
    }

    /// Match `subject` and record every step.
    ///
    /// Notices are not reported; the trace carries the same information.
    #[must_use]
    pub fn match_with_trace(&self, subject: &Value) -> MatchTrace {
        self.match_with_trace_in(subject, &EvalContext::new())
    }

    /// [`match_with_trace`](Self::match_with_trace) with extra names in scope.
    #[must_use]
    pub fn match_with_trace_in(&self, subject: &Value, context: &EvalContext) -> MatchTrace {
        let mut recorder = Recorder::enabled();
        let outcome = self.run(subject, context, &Silent, &mut recorder);
        let paths = recorder.finish();
        match outcome {
            Ok(bound) => MatchTrace {
                result: Some(MatchResult::new(subject.clone(), self.clone(), bound)),
                paths,
                failure: None,
            },
            Err(failure) => MatchTrace {
                result: None,
                paths,
                failure: Some(failure),
            },
        }
    }

    fn run(
        &self,
        subject: &Value,
        context: &EvalContext,
        diagnostics: &dyn Diagnostics,
        recorder: &mut Recorder,
    ) -> Result<Bindings, MatchFailure> {
        let verbose = self.inner.verbose;
        let compiled = self.compiled();
        let frame = Frame::new(context, subject);
        let mut cache = ObjectCache::new();
        let mut bound = Bindings::new();

        for ((path, rule), key) in self.inner.rules.iter().zip(compiled.keys()) {
            recorder.begin(path);

            let value = match resolve(key, frame, &mut cache, recorder) {
                Ok(value) => value,
                Err(error) => {
                    if verbose {
                        diagnostics.report(Notice::PathUnresolved {
                            path: path.clone(),
                            error: error.clone(),
                        });
                    }
                    return Err(MatchFailure::Unresolved {
                        path: path.clone(),
                        error,
                    });
                }
            };
            recorder.with(|t| t.value = Some(value.clone()));

            for predicate in rule.predicates() {
                let outcome = predicate.evaluate(&value);
                recorder.with(|t| {
                    t.checks.push(CheckTrace {
                        predicate: predicate.name().to_owned(),
                        passed: outcome == Ok(true),
                    });
                });
                match outcome {
                    Ok(true) => {}
                    Ok(false) => {
                        if verbose {
                            diagnostics.report(Notice::PredicateRejected {
                                path: path.clone(),
                                predicate: predicate.name().to_owned(),
                            });
                        }
                        return Err(MatchFailure::Rejected {
                            path: path.clone(),
                            predicate: predicate.name().to_owned(),
                        });
                    }
                    Err(error) => {
                        diagnostics.report(Notice::PredicateFailed {
                            path: path.clone(),
                            predicate: predicate.name().to_owned(),
                            error: error.clone(),
                        });
                        return Err(MatchFailure::PredicateError {
                            path: path.clone(),
                            predicate: predicate.name().to_owned(),
                            error,
                        });
                    }
                }
            }

            for (name, extractor) in rule.binders() {
                let extracted = match extractor.extract(&value, frame) {
                    Ok(v) => v,
                    Err(error) => {
                        diagnostics.report(Notice::ExtractorFailed {
                            path: path.clone(),
                            name: name.to_owned(),
                            error: error.clone(),
                        });
                        return Err(MatchFailure::ExtractorError {
                            path: path.clone(),
                            name: name.to_owned(),
                            error,
                        });
                    }
                };
                if bound.insert(name.to_owned(), extracted).is_some() && verbose {
                    diagnostics.report(Notice::BindingOverwritten {
                        name: name.to_owned(),
                        path: path.clone(),
                    });
                }
                recorder.with(|t| t.bound.push(name.to_owned()));
            }
        }
        Ok(bound)
    }
}

/// Evaluate `key`'s prefixes shortest to longest, reusing cached prefixes.
fn resolve<'p>(
    key: &'p PathKey,
    frame: Frame<'_>,
    cache: &mut ObjectCache<'p>,
    recorder: &mut Recorder,
) -> Result<Value, EvalError> {
    let mut value: Option<Value> = None;
    for (position, segment) in key.segments().iter().enumerate() {
        let prefix = key.prefix(position + 1);
        if let Some(hit) = cache.get(prefix) {
            value = Some(hit.clone());
            recorder.with(|t| t.cached += 1);
            continue;
        }
        let step = Step::parse(segment, position)?;
        let next = frame.apply(&step, value.as_ref())?;
        cache.insert(prefix, next.clone());
        recorder.with(|t| t.evaluated += 1);
        value = Some(next);
    }
    value.ok_or_else(|| EvalError::InvalidStep {
        segment: key.to_string(),
    })
}

/// A successful match: the subject, the pattern, and the bound names.
#[derive(Clone)]
pub struct MatchResult {
    subject: Value,
    pattern: Pattern,
    bound: Bindings,
}

impl MatchResult {
    pub(crate) fn new(subject: Value, pattern: Pattern, bound: Bindings) -> Self {
        Self {
            subject,
            pattern,
            bound,
        }
    }

    /// The matched subject.
    #[must_use]
    pub fn subject(&self) -> &Value {
        &self.subject
    }

    /// The pattern that matched.
    #[must_use]
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// The bound names.
    #[must_use]
    pub fn bound(&self) -> &Bindings {
        &self.bound
    }

    /// One bound value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bound.get(name)
    }

    /// Consume the result, keeping only the bindings.
    #[must_use]
    pub fn into_bindings(self) -> Bindings {
        self.bound
    }

    /// Inject the bindings into `env` with the pattern's policy.
    ///
    /// # Errors
    ///
    /// See [`ScopeBinder::open_with`].
    pub fn bind<'a, E>(&self, env: &'a mut E) -> Result<Session<'a, E>, EnvError>
    where
        E: Environment + ?Sized,
    {
        ScopeBinder::new(*self.pattern.policy()).open(env, &self.bound)
    }

    /// Run `block` with the bindings injected into `env`, then restore it.
    ///
    /// # Errors
    ///
    /// See [`ScopeBinder::open_with`]. `block` does not run if opening fails.
    pub fn scoped<E, R>(&self, env: &mut E, block: impl FnOnce(&mut E) -> R) -> Result<R, EnvError>
    where
        E: Environment + ?Sized,
    {
        let mut session = self.bind(env)?;
        let out = block(&mut *session);
        session.close();
        Ok(out)
    }
}

impl PartialEq for MatchResult {
    fn eq(&self, other: &Self) -> bool {
        self.pattern.ptr_eq(&other.pattern)
            && self.subject == other.subject
            && self.bound == other.bound
    }
}

impl fmt::Debug for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchResult")
            .field("subject", &self.subject)
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<match bindings={:?}>", self.bound)
    }
}
