//! Environments that bindings can be injected into.
//!
//! An [`Environment`] is a set of named slots split into two sub-scopes. The
//! scope binder only ever asks which sub-scope a name lives in
//! ([`classify`](Environment::classify)) and then reads, writes, and deletes
//! it there.

use crate::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Which sub-scope of an environment holds a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Fixed slots, e.g. a block's own variables.
    Local,
    /// Free names shared beyond the block.
    Global,
}

/// Errors from environment writes and deletions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvError {
    /// The name cannot be written in this scope.
    Unreachable {
        /// The name.
        name: String,
    },
    /// The name's slot cannot be deleted.
    Undeletable {
        /// The name.
        name: String,
    },
    /// The name is protected against writes and deletions.
    ReadOnly {
        /// The name.
        name: String,
    },
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable { name } => write!(f, "\"{name}\" is not reachable"),
            Self::Undeletable { name } => write!(f, "\"{name}\" cannot be deleted"),
            Self::ReadOnly { name } => write!(f, "\"{name}\" is read-only"),
        }
    }
}

impl std::error::Error for EnvError {}

/// A caller-supplied namespace.
///
/// `get` returning `None` means the name is absent (unset), which is distinct
/// from holding [`Value::None`].
pub trait Environment {
    /// Where `name` would be read and written, or `None` if unreachable.
    fn classify(&self, name: &str) -> Option<ScopeKind>;

    /// The current value of `name` in `scope`.
    fn get(&self, scope: ScopeKind, name: &str) -> Option<Value>;

    /// Write `name` in `scope`.
    ///
    /// # Errors
    ///
    /// Implementation-defined; see [`EnvError`].
    fn set(&mut self, scope: ScopeKind, name: &str, value: Value) -> Result<(), EnvError>;

    /// Remove `name` from `scope`. Deleting an absent name succeeds.
    ///
    /// # Errors
    ///
    /// Implementation-defined; see [`EnvError`].
    fn delete(&mut self, scope: ScopeKind, name: &str) -> Result<(), EnvError>;

    /// Returns `true` if `name` currently holds a value in `scope`.
    fn has(&self, scope: ScopeKind, name: &str) -> bool {
        self.get(scope, name).is_some()
    }
}

/// Locals over globals.
///
/// Locals are fixed slots declared up front: they may be unset, but never
/// deleted. Globals are free names. A non-strict scope accepts any new name
/// as a global; a strict scope only reaches names it already knows.
///
/// ```
/// use omatch::{Environment, Scope, ScopeKind, Value};
///
/// let mut scope = Scope::new().with_local("x", 1).with_global("y", 2);
/// assert_eq!(scope.classify("x"), Some(ScopeKind::Local));
/// assert_eq!(scope.classify("z"), Some(ScopeKind::Global));
/// assert!(Scope::strict().classify("z").is_none());
///
/// scope.assign("x", Value::from(10)).unwrap();
/// assert_eq!(scope.lookup("x"), Some(&Value::from(10)));
/// assert!(scope.remove("x").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Scope {
    locals: BTreeMap<String, Option<Value>>,
    globals: BTreeMap<String, Value>,
    read_only: BTreeSet<String>,
    strict: bool,
}

impl Scope {
    /// An empty, non-strict scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty scope that only reaches declared locals and existing globals.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Declare a local slot holding `value` (builder pattern).
    #[must_use]
    pub fn with_local(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.locals.insert(name.into(), Some(value.into()));
        self
    }

    /// Declare an unset local slot (builder pattern).
    #[must_use]
    pub fn declare_local(mut self, name: impl Into<String>) -> Self {
        self.locals.insert(name.into(), None);
        self
    }

    /// Define a global (builder pattern).
    #[must_use]
    pub fn with_global(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.globals.insert(name.into(), value.into());
        self
    }

    /// Protect `name` against writes and deletions (builder pattern).
    #[must_use]
    pub fn protect(mut self, name: impl Into<String>) -> Self {
        self.read_only.insert(name.into());
        self
    }

    /// Returns `true` if unknown names are unreachable.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Resolve `name` the way a block body reads it: locals, then globals.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        match self.locals.get(name) {
            Some(slot) => slot.as_ref(),
            None => self.globals.get(name),
        }
    }

    /// Write `name` the way a block body assigns it.
    ///
    /// # Errors
    ///
    /// [`EnvError::Unreachable`] for unknown names in a strict scope,
    /// [`EnvError::ReadOnly`] for protected names.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), EnvError> {
        let scope = self.reach(name)?;
        self.set(scope, name, value)
    }

    /// Delete `name` the way a block body deletes it.
    ///
    /// # Errors
    ///
    /// [`EnvError::Undeletable`] for locals, [`EnvError::ReadOnly`] for
    /// protected names, [`EnvError::Unreachable`] for unknown names in a
    /// strict scope.
    pub fn remove(&mut self, name: &str) -> Result<(), EnvError> {
        let scope = self.reach(name)?;
        self.delete(scope, name)
    }

    /// Local slots, including unset ones.
    pub fn locals(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.locals.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Globals currently defined.
    #[must_use]
    pub fn globals(&self) -> &BTreeMap<String, Value> {
        &self.globals
    }

    fn reach(&self, name: &str) -> Result<ScopeKind, EnvError> {
        self.classify(name).ok_or_else(|| EnvError::Unreachable {
            name: name.to_owned(),
        })
    }

    fn writable(&self, name: &str) -> Result<(), EnvError> {
        if self.read_only.contains(name) {
            Err(EnvError::ReadOnly {
                name: name.to_owned(),
            })
        } else {
            Ok(())
        }
    }
}

impl Environment for Scope {
    fn classify(&self, name: &str) -> Option<ScopeKind> {
        if self.locals.contains_key(name) {
            Some(ScopeKind::Local)
        } else if !self.strict || self.globals.contains_key(name) {
            Some(ScopeKind::Global)
        } else {
            None
        }
    }

    fn get(&self, scope: ScopeKind, name: &str) -> Option<Value> {
        match scope {
            ScopeKind::Local => self.locals.get(name).cloned().flatten(),
            ScopeKind::Global => self.globals.get(name).cloned(),
        }
    }

    fn set(&mut self, scope: ScopeKind, name: &str, value: Value) -> Result<(), EnvError> {
        self.writable(name)?;
        match scope {
            ScopeKind::Local => match self.locals.get_mut(name) {
                Some(slot) => {
                    *slot = Some(value);
                    Ok(())
                }
                None => Err(EnvError::Unreachable {
                    name: name.to_owned(),
                }),
            },
            ScopeKind::Global => {
                if self.strict && !self.globals.contains_key(name) {
                    return Err(EnvError::Unreachable {
                        name: name.to_owned(),
                    });
                }
                self.globals.insert(name.to_owned(), value);
                Ok(())
            }
        }
    }

    fn delete(&mut self, scope: ScopeKind, name: &str) -> Result<(), EnvError> {
        self.writable(name)?;
        match scope {
            ScopeKind::Local => Err(EnvError::Undeletable {
                name: name.to_owned(),
            }),
            ScopeKind::Global => {
                self.globals.remove(name);
                Ok(())
            }
        }
    }
}

impl Environment for BTreeMap<String, Value> {
    fn classify(&self, _name: &str) -> Option<ScopeKind> {
        Some(ScopeKind::Global)
    }

    fn get(&self, _scope: ScopeKind, name: &str) -> Option<Value> {
        BTreeMap::get(self, name).cloned()
    }

    fn set(&mut self, _scope: ScopeKind, name: &str, value: Value) -> Result<(), EnvError> {
        self.insert(name.to_owned(), value);
        Ok(())
    }

    fn delete(&mut self, _scope: ScopeKind, name: &str) -> Result<(), EnvError> {
        self.remove(name);
        Ok(())
    }
}

impl Environment for HashMap<String, Value> {
    fn classify(&self, _name: &str) -> Option<ScopeKind> {
        Some(ScopeKind::Global)
    }

    fn get(&self, _scope: ScopeKind, name: &str) -> Option<Value> {
        HashMap::get(self, name).cloned()
    }

    fn set(&mut self, _scope: ScopeKind, name: &str, value: Value) -> Result<(), EnvError> {
        self.insert(name.to_owned(), value);
        Ok(())
    }

    fn delete(&mut self, _scope: ScopeKind, name: &str) -> Result<(), EnvError> {
        self.remove(name);
        Ok(())
    }
}
