//! Rule: predicates and binders attached to one path
//!
//! A [`Rule`] holds the checks a resolved value must pass ([`Predicate`]) and
//! the names to bind from it ([`Extractor`]). Both run in declaration order.

use crate::eval::{Expr, Frame};
use crate::{EvalError, Value};
use std::fmt;
use std::sync::Arc;

type PredicateFn = dyn Fn(&Value) -> Result<bool, EvalError> + Send + Sync;
type ExtractFn = dyn Fn(&Value) -> Result<Value, EvalError> + Send + Sync;

/// A named boolean test over one value.
///
/// An `Err` from the test is the "raised" case: the match fails and a
/// [`Notice::PredicateFailed`](crate::Notice::PredicateFailed) is always reported.
/// Panics are not caught: a panicking test unwinds through
/// [`Pattern::matches`](crate::Pattern::matches). Return `Err` instead.
///
/// # Example
///
/// ```
/// use omatch::{EvalError, Predicate, Value};
///
/// let positive = Predicate::new("positive", |v| v.as_int().is_some_and(|i| i > 0));
/// assert_eq!(positive.evaluate(&Value::from(3)), Ok(true));
///
/// let strict = Predicate::try_new("int_only", |v| {
///     v.as_int().map(|i| i > 0).ok_or_else(|| EvalError::failed("not an int"))
/// });
/// assert!(strict.evaluate(&Value::from("x")).is_err());
/// ```
#[derive(Clone)]
pub struct Predicate {
    name: Arc<str>,
    func: Arc<PredicateFn>,
}

impl Predicate {
    /// Create an infallible predicate.
    pub fn new<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::try_new(name, move |v| Ok(func(v)))
    }

    /// Create a predicate that may fail.
    pub fn try_new<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(&Value) -> Result<bool, EvalError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// The predicate's name, used in notices and traces.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the predicate.
    ///
    /// # Errors
    ///
    /// Propagates the predicate's own error.
    pub fn evaluate(&self, value: &Value) -> Result<bool, EvalError> {
        (self.func)(value)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.name).finish()
    }
}

/// How a bound name is derived from the resolved path value.
///
/// As with [`Predicate`], a panicking `Call` function is not caught.
#[derive(Clone)]
pub enum Extractor {
    /// Bind the result of a function of the value.
    Call(Arc<ExtractFn>),
    /// Bind the resolved value itself.
    Value,
    /// Evaluate a safe-access expression with `o` bound to the value.
    Expr(Expr),
}

impl Extractor {
    /// Extractor from an infallible function.
    pub fn call<F>(func: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self::Call(Arc::new(move |v: &Value| -> Result<Value, EvalError> {
            Ok(func(v))
        }))
    }

    /// Extractor from a fallible function.
    pub fn try_call<F>(func: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Self::Call(Arc::new(func))
    }

    /// Extractor from an expression such as `o.keys()`.
    #[must_use]
    pub fn expr(source: &str) -> Self {
        Self::Expr(Expr::parse(source))
    }

    pub(crate) fn extract(&self, value: &Value, frame: Frame<'_>) -> Result<Value, EvalError> {
        match self {
            Self::Call(func) => func(value),
            Self::Value => Ok(value.clone()),
            Self::Expr(expr) => expr.evaluate_in(&frame.with_current(value)),
        }
    }
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call(_) => f.write_str("Call"),
            Self::Value => f.write_str("Value"),
            Self::Expr(expr) => f.debug_tuple("Expr").field(&expr.to_string()).finish(),
        }
    }
}

/// Checks and binders for one path.
///
/// Binders form an ordered mapping: binding a name twice in one rule replaces
/// the earlier extractor in place.
///
/// ```
/// use omatch::{Predicate, Rule, Value};
///
/// let rule = Rule::new()
///     .check(Predicate::is_type("list"))
///     .bind_value("items")
///     .bind_expr("count", "o.len()")
///     .bind_with("first", |v| v.item(&Value::from(0)).unwrap_or(Value::None));
/// assert_eq!(rule.predicates().len(), 1);
/// assert_eq!(rule.binders().count(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Rule {
    predicates: Vec<Predicate>,
    binders: Vec<(String, Extractor)>,
}

impl Rule {
    /// A rule with no checks and no binders.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a predicate.
    #[must_use]
    pub fn check(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Bind `name` with the given extractor.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, extractor: Extractor) -> Self {
        let name = name.into();
        match self.binders.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = extractor,
            None => self.binders.push((name, extractor)),
        }
        self
    }

    /// Bind `name` to the resolved value.
    #[must_use]
    pub fn bind_value(self, name: impl Into<String>) -> Self {
        self.bind(name, Extractor::Value)
    }

    /// Bind `name` to a function of the resolved value.
    #[must_use]
    pub fn bind_with<F>(self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.bind(name, Extractor::call(func))
    }

    /// Bind `name` to an expression evaluated with `o` as the resolved value.
    #[must_use]
    pub fn bind_expr(self, name: impl Into<String>, source: &str) -> Self {
        self.bind(name, Extractor::expr(source))
    }

    /// The predicates, in order.
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// The binders, in order.
    pub fn binders(&self) -> impl Iterator<Item = (&str, &Extractor)> {
        self.binders.iter().map(|(n, e)| (n.as_str(), e))
    }

    /// Returns `true` if the rule neither checks nor binds anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty() && self.binders.is_empty()
    }
}
