//! Evaluation of safe-access steps against a frame of named values.
//!
//! Path rules and string-form extractors are both evaluated here. Root names
//! resolve in this order:
//!
//! 1. [`VALUE_NAME`] (`o`): the value at the rule's path, inside extractors only
//! 2. extra locals from the [`EvalContext`]
//! 3. [`SUBJECT_NAME`] (`obj`): the match subject
//! 4. extra globals from the [`EvalContext`]
//!
//! Extra locals can therefore shadow `obj`.

use crate::path::{split_path, IndexKey, PathKey, Step};
use crate::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Root name bound to the match subject.
pub const SUBJECT_NAME: &str = "obj";

/// Root name bound to the resolved path value inside expression extractors.
pub const VALUE_NAME: &str = "o";

/// Errors raised while evaluating a step, predicate, or extractor.
///
/// These never escape a match: they collapse to "no match" and are only
/// visible through notices and traces.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// A root name is not bound in the frame.
    UnknownName {
        /// The unresolved name.
        name: String,
    },
    /// `.attr` on a value without that attribute.
    MissingAttribute {
        /// Type of the value accessed.
        type_name: String,
        /// The missing attribute.
        attr: String,
    },
    /// `[key]` on a mapping without that key.
    MissingKey {
        /// The missing key.
        key: String,
    },
    /// `[index]` outside the sequence bounds.
    IndexOutOfRange {
        /// The requested index.
        index: i64,
        /// Length of the sequence.
        len: usize,
    },
    /// `[key]` with a key of the wrong type.
    InvalidKey {
        /// Type of the value accessed.
        type_name: String,
        /// Type of the key used.
        key_type: String,
    },
    /// `[key]` on a value that has no items.
    NotSubscriptable {
        /// Type of the value accessed.
        type_name: String,
    },
    /// `()` on a value that is not callable.
    NotCallable {
        /// Type of the value called.
        type_name: String,
    },
    /// A segment outside the safe-access grammar.
    InvalidStep {
        /// The offending segment.
        segment: String,
    },
    /// A user predicate, extractor, or callable reported failure.
    Failed {
        /// Description of the failure.
        message: String,
    },
}

impl EvalError {
    /// A user-level failure with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownName { name } => write!(f, "name \"{name}\" is not defined"),
            Self::MissingAttribute { type_name, attr } => {
                write!(f, "{type_name} value has no attribute \"{attr}\"")
            }
            Self::MissingKey { key } => write!(f, "key {key:?} not found"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for length {len}")
            }
            Self::InvalidKey {
                type_name,
                key_type,
            } => write!(f, "{type_name} value cannot be indexed by {key_type}"),
            Self::NotSubscriptable { type_name } => {
                write!(f, "{type_name} value is not subscriptable")
            }
            Self::NotCallable { type_name } => write!(f, "{type_name} value is not callable"),
            Self::InvalidStep { segment } => {
                write!(f, "\"{segment}\" is not an attribute, index, or call step")
            }
            Self::Failed { message } => f.write_str(message),
        }
    }
}

impl std::error::Error for EvalError {}

/// Extra names visible to path and expression evaluation.
///
/// ```
/// use omatch::{EvalContext, Expr, Value};
///
/// let ctx = EvalContext::new().with_global("field", "name");
/// let subject = Value::map([("name", "alice")]);
/// let expr = Expr::parse("obj[field].upper()");
/// assert_eq!(expr.evaluate(&subject, &ctx).unwrap(), Value::from("ALICE"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    globals: BTreeMap<String, Value>,
    locals: BTreeMap<String, Value>,
}

impl EvalContext {
    /// An empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a global name (builder pattern). Globals are looked up after `obj`.
    #[must_use]
    pub fn with_global(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.globals.insert(name.into(), value.into());
        self
    }

    /// Add a local name (builder pattern). Locals are looked up before `obj`.
    #[must_use]
    pub fn with_local(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.locals.insert(name.into(), value.into());
        self
    }

    /// Look up a global name.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Look up a local name.
    #[must_use]
    pub fn local(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }

    /// Returns `true` if no extra names are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.globals.is_empty() && self.locals.is_empty()
    }
}

/// The names visible while evaluating one match.
#[derive(Clone, Copy)]
pub(crate) struct Frame<'a> {
    context: &'a EvalContext,
    subject: &'a Value,
    current: Option<&'a Value>,
}

impl<'a> Frame<'a> {
    pub(crate) fn new(context: &'a EvalContext, subject: &'a Value) -> Self {
        Self {
            context,
            subject,
            current: None,
        }
    }

    /// The same frame with `o` bound to `value`.
    pub(crate) fn with_current(self, value: &'a Value) -> Self {
        Self {
            current: Some(value),
            ..self
        }
    }

    pub(crate) fn lookup(&self, name: &str) -> Result<Value, EvalError> {
        if name == VALUE_NAME {
            if let Some(current) = self.current {
                return Ok(current.clone());
            }
        }
        if let Some(local) = self.context.local(name) {
            return Ok(local.clone());
        }
        if name == SUBJECT_NAME {
            return Ok(self.subject.clone());
        }
        self.context
            .global(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownName {
                name: name.to_owned(),
            })
    }

    /// Apply one step. `base` is the previous prefix's value (`None` for the root).
    pub(crate) fn apply(&self, step: &Step, base: Option<&Value>) -> Result<Value, EvalError> {
        let Some(base) = base else {
            return match step {
                Step::Root(name) => self.lookup(name),
                _ => Err(EvalError::InvalidStep {
                    segment: String::new(),
                }),
            };
        };
        match step {
            Step::Root(name) => Err(EvalError::InvalidStep {
                segment: name.clone(),
            }),
            Step::Attr(name) => base.attr(name),
            Step::Index(IndexKey::Int(i)) => base.item(&Value::Int(*i)),
            Step::Index(IndexKey::Str(s)) => base.item(&Value::Str(s.clone())),
            Step::Index(IndexKey::Name(name)) => base.item(&self.lookup(name)?),
            Step::Call => base.call(),
        }
    }
}

/// A safe-access expression, such as `o.upper()` or `obj.items[0]`.
///
/// Uses the same grammar as rule paths. Parsing is lexical and never fails;
/// malformed segments are reported when the expression is evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expr {
    path: PathKey,
}

impl Expr {
    /// Parse an expression.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        Self {
            path: split_path(source),
        }
    }

    /// The compiled segments.
    #[must_use]
    pub fn path(&self) -> &PathKey {
        &self.path
    }

    /// Evaluate against a subject (bound as `obj`) and extra context.
    ///
    /// # Errors
    ///
    /// Returns the first step that fails to parse or resolve.
    pub fn evaluate(&self, subject: &Value, context: &EvalContext) -> Result<Value, EvalError> {
        self.evaluate_in(&Frame::new(context, subject))
    }

    pub(crate) fn evaluate_in(&self, frame: &Frame<'_>) -> Result<Value, EvalError> {
        let mut value: Option<Value> = None;
        for (position, segment) in self.path.segments().iter().enumerate() {
            let step = Step::parse(segment, position)?;
            value = Some(frame.apply(&step, value.as_ref())?);
        }
        value.ok_or_else(|| EvalError::InvalidStep {
            segment: self.path.to_string(),
        })
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.path, f)
    }
}
