//! Non-fatal diagnostics.
//!
//! A failed match is `None`; a failed restoration is skipped. Neither is an
//! error the caller must handle, but both are worth knowing about. Every such
//! event is a [`Notice`], delivered to a [`Diagnostics`] sink. Sinks never
//! alter control flow.

use crate::{EnvError, EvalError};
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// A non-fatal diagnostic event.
///
/// `PathUnresolved`, `PredicateRejected` and `BindingOverwritten` are only
/// reported by verbose patterns. Everything else is always reported.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// A rule's path could not be evaluated against the subject.
    PathUnresolved {
        /// The rule's path.
        path: String,
        /// Why evaluation stopped.
        error: EvalError,
    },
    /// A predicate returned `false`.
    PredicateRejected {
        /// The rule's path.
        path: String,
        /// The predicate's name.
        predicate: String,
    },
    /// A predicate returned an error.
    PredicateFailed {
        /// The rule's path.
        path: String,
        /// The predicate's name.
        predicate: String,
        /// The predicate's error.
        error: EvalError,
    },
    /// An extractor returned an error.
    ExtractorFailed {
        /// The rule's path.
        path: String,
        /// The name being bound.
        name: String,
        /// The extractor's error.
        error: EvalError,
    },
    /// A name bound by an earlier rule was bound again.
    BindingOverwritten {
        /// The rebound name.
        name: String,
        /// The path of the rule that rebound it.
        path: String,
    },
    /// Several patterns matched and the lowest index was chosen.
    Ambiguity {
        /// Indices of every matching pattern, ascending.
        matched: Vec<usize>,
        /// The index whose result was returned.
        chosen: usize,
    },
    /// A binding's name is not reachable in the target environment.
    UnusedBinding {
        /// The unreachable name.
        name: String,
    },
    /// A name could not be deleted while closing a session.
    DeletionFailed {
        /// The name.
        name: String,
        /// The environment's error.
        error: EnvError,
    },
    /// A name could not be written while closing a session.
    RestoreFailed {
        /// The name.
        name: String,
        /// The environment's error.
        error: EnvError,
    },
}

impl Notice {
    /// Short stable identifier, used as a structured log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PathUnresolved { .. } => "path_unresolved",
            Self::PredicateRejected { .. } => "predicate_rejected",
            Self::PredicateFailed { .. } => "predicate_failed",
            Self::ExtractorFailed { .. } => "extractor_failed",
            Self::BindingOverwritten { .. } => "binding_overwritten",
            Self::Ambiguity { .. } => "ambiguity",
            Self::UnusedBinding { .. } => "unused_binding",
            Self::DeletionFailed { .. } => "deletion_failed",
            Self::RestoreFailed { .. } => "restore_failed",
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathUnresolved { path, error } => {
                write!(f, "path \"{path}\" did not resolve: {error}")
            }
            Self::PredicateRejected { path, predicate } => {
                write!(f, "predicate {predicate} rejected the value at \"{path}\"")
            }
            Self::PredicateFailed {
                path,
                predicate,
                error,
            } => write!(f, "predicate {predicate} failed at \"{path}\": {error}"),
            Self::ExtractorFailed { path, name, error } => {
                write!(f, "extractor for \"{name}\" failed at \"{path}\": {error}")
            }
            Self::BindingOverwritten { name, path } => {
                write!(f, "binding \"{name}\" overwritten by rule \"{path}\"")
            }
            Self::Ambiguity { matched, chosen } => write!(
                f,
                "{} patterns matched (indices {matched:?}), using pattern {chosen}",
                matched.len()
            ),
            Self::UnusedBinding { name } => {
                write!(f, "binding \"{name}\" is not reachable in the environment")
            }
            Self::DeletionFailed { name, error } => {
                write!(f, "could not delete \"{name}\": {error}")
            }
            Self::RestoreFailed { name, error } => {
                write!(f, "could not restore \"{name}\": {error}")
            }
        }
    }
}

/// A sink for [`Notice`]s.
pub trait Diagnostics {
    /// Receive one notice.
    fn report(&self, notice: Notice);
}

/// Emits every notice as a `tracing` warning under target `omatch`.
///
/// The default sink for [`Pattern::matches`](crate::Pattern::matches) and
/// [`ScopeBinder::open`](crate::ScopeBinder::open).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report(&self, notice: Notice) {
        tracing::warn!(target: "omatch", kind = notice.kind(), "{notice}");
    }
}

/// Discards every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Diagnostics for Silent {
    fn report(&self, _notice: Notice) {}
}

/// Collects notices for later inspection.
///
/// ```
/// use omatch::{Diagnostics, Notice, NoticeLog};
///
/// let log = NoticeLog::new();
/// log.report(Notice::UnusedBinding { name: "x".into() });
/// assert_eq!(log.len(), 1);
/// assert_eq!(log.take()[0].kind(), "unused_binding");
/// assert!(log.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct NoticeLog {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeLog {
    /// An empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the collected notices, in arrival order.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.lock().clone()
    }

    /// Remove and return the collected notices.
    pub fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of collected notices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of collected notices of the given [`kind`](Notice::kind).
    #[must_use]
    pub fn count(&self, kind: &str) -> usize {
        self.lock().iter().filter(|n| n.kind() == kind).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notice>> {
        // A panicking reporter cannot leave the Vec half-written.
        self.notices.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Diagnostics for NoticeLog {
    fn report(&self, notice: Notice) {
        self.lock().push(notice);
    }
}

impl<D: Diagnostics + ?Sized> Diagnostics for &D {
    fn report(&self, notice: Notice) {
        (**self).report(notice);
    }
}
