//! omatch - structural pattern matching for dynamically typed values
//!
//! A pattern is an ordered set of path rules. Each rule names a path into the
//! subject (`obj.user.name`, `obj.items()[0]`), a list of predicates the value
//! at that path must satisfy, and a set of binders that extract named values.
//! A successful match yields those bindings; a failed match yields `None`.
//!
//! # Architecture
//!
//! - [`Value`]: Erased data type (primitives + extensible `Object` variant)
//! - [`split_path`]: Lexical path compiler producing a [`PathKey`]
//! - [`Rule`]: Predicates ([`Predicate`]) and binders ([`Extractor`]) for one path
//! - [`Pattern`]: Ordered rules, matched with a per-call object cache
//! - [`MultiPattern`]: Resolves one subject against several patterns
//! - [`ScopeBinder`]: Exposes bindings to an [`Environment`] for the life of a
//!   [`Session`] and restores the environment on close per [`BindingPolicy`]
//!
//! # Key Design Insights
//!
//! 1. **No match is a value, not an error**: any unresolvable path, failing
//!    predicate, or predicate error collapses to `None`. The detail is only
//!    reported through [`Diagnostics`] or a [`MatchTrace`].
//!
//! 2. **Shared prefixes are evaluated once**: `obj.a.b` and `obj.a.c` share the
//!    `obj.a` evaluation within one match. The cache never outlives the call.
//!
//! 3. **Restoration is a six-way table**: existed-before × (deleted, changed,
//!    unchanged) selects one switch of the [`BindingPolicy`].
//!
//! # Example
//!
//! ```
//! use omatch::prelude::*;
//! use std::collections::BTreeMap;
//!
//! let pattern = Pattern::new()
//!     .rule("obj", Rule::new().check(Predicate::is_type("map")))
//!     .rule("obj.name", Rule::new().check(Predicate::prefix("al")).bind_value("name"))
//!     .rule("obj.tags.len()", Rule::new().bind_value("tag_count"));
//!
//! let subject = Value::map([
//!     ("name", Value::from("alice")),
//!     ("tags", Value::list(["admin", "ops"])),
//! ]);
//!
//! let m = pattern.matches(&subject).unwrap();
//! assert_eq!(m.get("name"), Some(&Value::from("alice")));
//! assert_eq!(m.get("tag_count"), Some(&Value::from(2)));
//!
//! // Expose the bindings to an environment for the duration of a block.
//! let mut env: BTreeMap<String, Value> = BTreeMap::new();
//! m.scoped(&mut env, |env| {
//!     assert_eq!(env.get("name"), Some(&Value::from("alice")));
//! })
//! .unwrap();
//! assert!(env.is_empty());
//! ```

// ═══════════════════════════════════════════════════════════════════════════════
// Modules
// ═══════════════════════════════════════════════════════════════════════════════

mod binder;
mod check;
mod diagnostics;
mod env;
mod eval;
mod multi;
mod path;
mod pattern;
mod rule;
mod trace;
mod value;

#[cfg(feature = "config")]
mod config;

// ═══════════════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════════════

// Core types
pub use binder::{
    BindingPolicy, BlockEffect, CloseReport, ClosedBinding, DeletedAction, ExistingAction,
    InjectedAction, Restoration, ScopeBinder, Session,
};
pub use check::CheckSpec;
pub use diagnostics::{Diagnostics, Notice, NoticeLog, Silent, TracingDiagnostics};
pub use env::{EnvError, Environment, Scope, ScopeKind};
pub use eval::{EvalContext, EvalError, Expr, SUBJECT_NAME, VALUE_NAME};
pub use multi::{MultiMatchOutcome, MultiPattern};
pub use path::{split_path, IndexKey, PathKey, Step};
pub use pattern::{Bindings, CompiledPattern, MatchResult, Pattern};
pub use rule::{Extractor, Predicate, Rule};
pub use value::{Callable, Object, Value};

// Trace types
pub use trace::{CheckTrace, MatchFailure, MatchTrace, PathTrace};

// Config (feature-gated)
#[cfg(feature = "config")]
pub use config::{BindConfig, PatternConfig, RuleConfig};

// ═══════════════════════════════════════════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════════════════════════════════════════

/// Prelude module for convenient imports.
///
/// ```
/// use omatch::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Scope binding
        BindingPolicy,
        // Data
        Bindings,
        CheckSpec,
        // Diagnostics
        Diagnostics,
        Environment,
        EvalContext,
        EvalError,
        Extractor,
        MatchResult,
        MatchTrace,
        MultiPattern,
        Notice,
        NoticeLog,
        Object,
        Pattern,
        PatternError,
        Predicate,
        ResolveError,
        Rule,
        Scope,
        ScopeBinder,
        Session,
        Silent,
        Value,
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum nesting depth of composed checks (`not`, `all`, `any`).
///
/// Validated when building a pattern from configuration.
pub const MAX_DEPTH: usize = 32;

/// Maximum number of path rules in a configured pattern.
pub const MAX_RULES: usize = 256;

/// Maximum length for non-regex string checks (exact, prefix, suffix, contains).
pub const MAX_PATTERN_LENGTH: usize = 8192;

/// Maximum length for regex checks.
///
/// Shorter limit than [`MAX_PATTERN_LENGTH`] because regex compilation cost
/// scales faster than literal matching.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4096;

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors from pattern construction and validation.
///
/// These are caught when a pattern is built, not when it is matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// Check nesting exceeds [`MAX_DEPTH`].
    DepthExceeded {
        /// Actual depth of the check tree.
        depth: usize,
        /// Maximum allowed depth.
        max: usize,
    },
    /// A regex failed to compile.
    InvalidPattern {
        /// The pattern that failed to compile.
        pattern: String,
        /// The underlying error message.
        source: String,
    },
    /// Configuration is structurally valid but semantically wrong.
    InvalidConfig {
        /// The underlying error message.
        source: String,
    },
    /// Too many rules in a single pattern.
    TooManyRules {
        /// Actual count of rules.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },
    /// A string check exceeds the maximum allowed length.
    PatternTooLong {
        /// Actual length of the pattern.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },
}

impl std::fmt::Display for PatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DepthExceeded { depth, max } => {
                write!(
                    f,
                    "check nesting depth is {depth}, but maximum allowed is {max} \
                     (flatten nested not/all/any checks)"
                )
            }
            Self::InvalidPattern { pattern, source } => {
                write!(f, "invalid pattern \"{pattern}\": {source}")
            }
            Self::InvalidConfig { source } => {
                write!(f, "invalid config: {source}")
            }
            Self::TooManyRules { count, max } => {
                write!(f, "pattern has {count} rules, but maximum allowed is {max}")
            }
            Self::PatternTooLong { len, max } => {
                write!(f, "pattern length is {len}, but maximum allowed is {max}")
            }
        }
    }
}

impl std::error::Error for PatternError {}

/// Errors from resolving one subject against several patterns.
///
/// See [`MultiPattern::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No pattern matched the subject.
    NoMatchingPattern {
        /// Debug rendering of the subject.
        subject: String,
    },
    /// More than one pattern matched and ambiguity was not allowed.
    Ambiguity {
        /// Debug rendering of the subject.
        subject: String,
        /// How many patterns matched.
        matched: usize,
    },
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoMatchingPattern { subject } => {
                write!(f, "{subject} did not match any pattern")
            }
            Self::Ambiguity { subject, matched } => {
                write!(f, "{subject} matched {matched} patterns")
            }
        }
    }
}

impl std::error::Error for ResolveError {}
