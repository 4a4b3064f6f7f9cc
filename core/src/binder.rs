//! Scope binding: expose match bindings to an environment for one block.
//!
//! [`ScopeBinder::open`] injects every reachable binding and returns a
//! [`Session`]. Closing the session (explicitly or by dropping it) looks at
//! what the block did to each injected name and restores the environment
//! according to a [`BindingPolicy`].
//!
//! # Restoration table
//!
//! | existed | block effect | switch                   | default        |
//! |---------|--------------|--------------------------|----------------|
//! | yes     | deleted      | `deleted_existing`       | restore prior  |
//! | no      | deleted      | `deleted_non_existing`   | ignore         |
//! | yes     | changed      | `changed_existing`       | restore prior  |
//! | no      | changed      | `changed_non_existing`   | delete         |
//! | yes     | unchanged    | `unchanged_existing`     | restore prior  |
//! | no      | unchanged    | `unchanged_non_existing` | delete         |
//!
//! Sessions must not be nested over overlapping names in the same
//! environment: the inner session's snapshot would capture the outer
//! session's injected values as "prior".

use crate::diagnostics::{Diagnostics, Notice, TracingDiagnostics};
use crate::env::{EnvError, Environment, ScopeKind};
use crate::pattern::Bindings;
use crate::Value;
use std::ops::{Deref, DerefMut};

/// What to do with a name that existed before the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum ExistingAction {
    /// Put the prior value back.
    #[default]
    Restore,
    /// Leave whatever the block left.
    Keep,
}

/// What to do with a name the session injected (it did not exist before).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum InjectedAction {
    /// Remove the name.
    #[default]
    Delete,
    /// Leave whatever the block left.
    Keep,
}

/// What to do with a name the block deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum DeletedAction {
    /// Write a value back (the prior value, or the bound value if there was none).
    Restore,
    /// Leave the name deleted.
    Ignore,
}

/// Six independent restoration switches, one per (existed, block effect) case.
///
/// With the `serde` feature, deserializes from kebab-case keys; missing keys
/// take their defaults:
///
/// ```yaml
/// changed-existing: keep
/// deleted-non-existing: restore
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case", default, deny_unknown_fields)
)]
pub struct BindingPolicy {
    /// Existed before, block assigned a different value.
    pub changed_existing: ExistingAction,
    /// Injected, block assigned a different value.
    pub changed_non_existing: InjectedAction,
    /// Existed before, block deleted it.
    pub deleted_existing: DeletedAction,
    /// Injected, block deleted it.
    pub deleted_non_existing: DeletedAction,
    /// Existed before, block left the bound value.
    pub unchanged_existing: ExistingAction,
    /// Injected, block left the bound value.
    pub unchanged_non_existing: InjectedAction,
}

impl Default for BindingPolicy {
    fn default() -> Self {
        Self {
            changed_existing: ExistingAction::Restore,
            changed_non_existing: InjectedAction::Delete,
            deleted_existing: DeletedAction::Restore,
            deleted_non_existing: DeletedAction::Ignore,
            unchanged_existing: ExistingAction::Restore,
            unchanged_non_existing: InjectedAction::Delete,
        }
    }
}

impl BindingPolicy {
    /// The default policy: leave the environment as it was before the session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every switch flipped.
    ///
    /// ```
    /// use omatch::{BindingPolicy, ExistingAction};
    ///
    /// let p = BindingPolicy::default().inverted();
    /// assert_eq!(p.changed_existing, ExistingAction::Keep);
    /// assert_eq!(p.inverted(), BindingPolicy::default());
    /// ```
    #[must_use]
    pub fn inverted(self) -> Self {
        fn existing(a: ExistingAction) -> ExistingAction {
            match a {
                ExistingAction::Restore => ExistingAction::Keep,
                ExistingAction::Keep => ExistingAction::Restore,
            }
        }
        fn injected(a: InjectedAction) -> InjectedAction {
            match a {
                InjectedAction::Delete => InjectedAction::Keep,
                InjectedAction::Keep => InjectedAction::Delete,
            }
        }
        fn deleted(a: DeletedAction) -> DeletedAction {
            match a {
                DeletedAction::Restore => DeletedAction::Ignore,
                DeletedAction::Ignore => DeletedAction::Restore,
            }
        }
        Self {
            changed_existing: existing(self.changed_existing),
            changed_non_existing: injected(self.changed_non_existing),
            deleted_existing: deleted(self.deleted_existing),
            deleted_non_existing: deleted(self.deleted_non_existing),
            unchanged_existing: existing(self.unchanged_existing),
            unchanged_non_existing: injected(self.unchanged_non_existing),
        }
    }

    /// The restoration selected for one name.
    #[must_use]
    pub fn restoration(&self, existed: bool, effect: BlockEffect) -> Restoration {
        let existing = |a: ExistingAction| match a {
            ExistingAction::Restore => Restoration::RestorePrior,
            ExistingAction::Keep => Restoration::Leave,
        };
        let injected = |a: InjectedAction| match a {
            InjectedAction::Delete => Restoration::Remove,
            InjectedAction::Keep => Restoration::Leave,
        };
        match (existed, effect) {
            (true, BlockEffect::Deleted) => match self.deleted_existing {
                DeletedAction::Restore => Restoration::RestorePrior,
                DeletedAction::Ignore => Restoration::Leave,
            },
            (false, BlockEffect::Deleted) => match self.deleted_non_existing {
                DeletedAction::Restore => Restoration::RestoreBound,
                DeletedAction::Ignore => Restoration::Leave,
            },
            (true, BlockEffect::Changed) => existing(self.changed_existing),
            (false, BlockEffect::Changed) => injected(self.changed_non_existing),
            (true, BlockEffect::Unchanged) => existing(self.unchanged_existing),
            (false, BlockEffect::Unchanged) => injected(self.unchanged_non_existing),
        }
    }
}

/// What the block did to an injected name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEffect {
    /// The name is absent at close.
    Deleted,
    /// The name holds a value different from the injected one.
    Changed,
    /// The name still holds the injected value.
    Unchanged,
}

/// What closing a session does to one name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restoration {
    /// Write the value the name held before the session.
    RestorePrior,
    /// Write the injected value back.
    RestoreBound,
    /// Delete the name.
    Remove,
    /// Touch nothing.
    Leave,
}

/// Opens [`Session`]s with a fixed policy.
///
/// ```
/// use omatch::{Bindings, ScopeBinder, BindingPolicy, Value};
/// use std::collections::BTreeMap;
///
/// let mut env = BTreeMap::from([("a".to_string(), Value::from(5))]);
/// let bindings = Bindings::from([
///     ("a".to_string(), Value::from(1)),
///     ("d".to_string(), Value::from(4)),
/// ]);
///
/// let session = ScopeBinder::new(BindingPolicy::default()).open(&mut env, &bindings).unwrap();
/// assert_eq!(session.get("a"), Some(&Value::from(1)));
/// session.close();
///
/// assert_eq!(env.get("a"), Some(&Value::from(5)));
/// assert!(!env.contains_key("d"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ScopeBinder {
    policy: BindingPolicy,
    warn_unused: bool,
}

impl Default for ScopeBinder {
    fn default() -> Self {
        Self::new(BindingPolicy::default())
    }
}

impl ScopeBinder {
    /// A binder with `policy` that reports unreachable names.
    #[must_use]
    pub fn new(policy: BindingPolicy) -> Self {
        Self {
            policy,
            warn_unused: true,
        }
    }

    /// Whether to report an `UnusedBinding` notice for unreachable names.
    #[must_use]
    pub fn warn_unused(mut self, warn: bool) -> Self {
        self.warn_unused = warn;
        self
    }

    /// The policy applied on close.
    #[must_use]
    pub fn policy(&self) -> &BindingPolicy {
        &self.policy
    }

    /// Inject `bindings` into `env`, reporting through `tracing`.
    ///
    /// # Errors
    ///
    /// See [`open_with`](Self::open_with).
    pub fn open<'a, E>(&self, env: &'a mut E, bindings: &Bindings) -> Result<Session<'a, E>, EnvError>
    where
        E: Environment + ?Sized,
    {
        self.open_with(env, bindings, &TracingDiagnostics)
    }

    /// Inject `bindings` into `env`, reporting to `diagnostics`.
    ///
    /// # Errors
    ///
    /// Returns the first failing write. Names injected before the failure are
    /// restored before returning.
    pub fn open_with<'a, E>(
        &self,
        env: &'a mut E,
        bindings: &Bindings,
        diagnostics: &'a dyn Diagnostics,
    ) -> Result<Session<'a, E>, EnvError>
    where
        E: Environment + ?Sized,
    {
        let mut session = Session {
            env,
            snapshots: Vec::with_capacity(bindings.len()),
            policy: self.policy,
            diagnostics,
            open: true,
        };
        for (name, value) in bindings {
            let Some(scope) = session.env.classify(name) else {
                if self.warn_unused {
                    diagnostics.report(Notice::UnusedBinding { name: name.clone() });
                }
                continue;
            };
            let prior = session.env.get(scope, name);
            if let Err(error) = session.env.set(scope, name, value.clone()) {
                session.roll_back();
                return Err(error);
            }
            session.snapshots.push(Snapshot {
                name: name.clone(),
                scope,
                prior,
                injected: value.clone(),
            });
        }
        Ok(session)
    }
}

struct Snapshot {
    name: String,
    scope: ScopeKind,
    prior: Option<Value>,
    injected: Value,
}

/// Bindings exposed to an environment until closed or dropped.
///
/// Dereferences to the environment, so the block works through the session.
#[must_use = "dropping a session immediately restores the environment"]
pub struct Session<'a, E: Environment + ?Sized> {
    env: &'a mut E,
    snapshots: Vec<Snapshot>,
    policy: BindingPolicy,
    diagnostics: &'a dyn Diagnostics,
    open: bool,
}

impl<E: Environment + ?Sized> Session<'_, E> {
    /// Names injected by this session, in injection order.
    pub fn injected(&self) -> impl Iterator<Item = &str> {
        self.snapshots.iter().map(|s| s.name.as_str())
    }

    /// Restore the environment and report what happened to each name.
    pub fn close(mut self) -> CloseReport {
        self.release()
    }

    /// Undo the injection regardless of policy, newest name first.
    fn roll_back(&mut self) {
        self.open = false;
        for snap in std::mem::take(&mut self.snapshots).into_iter().rev() {
            let restoration = if snap.prior.is_some() {
                Restoration::RestorePrior
            } else {
                Restoration::Remove
            };
            self.apply(&snap, restoration);
        }
    }

    fn release(&mut self) -> CloseReport {
        self.open = false;
        let mut entries = Vec::with_capacity(self.snapshots.len());
        for snap in std::mem::take(&mut self.snapshots) {
            let effect = match self.env.get(snap.scope, &snap.name) {
                None => BlockEffect::Deleted,
                Some(current) if same_value(&current, &snap.injected) => BlockEffect::Unchanged,
                Some(_) => BlockEffect::Changed,
            };
            let existed = snap.prior.is_some();
            let restoration = self.policy.restoration(existed, effect);
            let applied = self.apply(&snap, restoration);
            entries.push(ClosedBinding {
                name: snap.name,
                existed,
                effect,
                restoration,
                applied,
            });
        }
        CloseReport { entries }
    }

    fn apply(&mut self, snap: &Snapshot, restoration: Restoration) -> bool {
        let outcome = match restoration {
            Restoration::Leave => return true,
            Restoration::Remove => self.env.delete(snap.scope, &snap.name).map_err(|error| {
                Notice::DeletionFailed {
                    name: snap.name.clone(),
                    error,
                }
            }),
            Restoration::RestorePrior | Restoration::RestoreBound => {
                let value = match (&snap.prior, restoration) {
                    (Some(prior), Restoration::RestorePrior) => prior.clone(),
                    _ => snap.injected.clone(),
                };
                self.env
                    .set(snap.scope, &snap.name, value)
                    .map_err(|error| Notice::RestoreFailed {
                        name: snap.name.clone(),
                        error,
                    })
            }
        };
        match outcome {
            Ok(()) => true,
            Err(notice) => {
                self.diagnostics.report(notice);
                false
            }
        }
    }
}

/// Value equality, except floats compare by bit pattern so an untouched NaN
/// still reads as unchanged.
fn same_value(current: &Value, injected: &Value) -> bool {
    match (current, injected) {
        (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
        _ => current == injected,
    }
}

impl<E: Environment + ?Sized> Drop for Session<'_, E> {
    fn drop(&mut self) {
        if self.open {
            self.release();
        }
    }
}

impl<E: Environment + ?Sized> Deref for Session<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        self.env
    }
}

impl<E: Environment + ?Sized> DerefMut for Session<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        self.env
    }
}

/// What closing a session did, per injected name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CloseReport {
    /// One entry per injected name, in injection order.
    pub entries: Vec<ClosedBinding>,
}

impl CloseReport {
    /// The entry for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ClosedBinding> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Returns `true` if every restoration was applied.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.entries.iter().all(|e| e.applied)
    }
}

/// One name's fate at close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedBinding {
    /// The injected name.
    pub name: String,
    /// Whether it held a value before the session.
    pub existed: bool,
    /// What the block did to it.
    pub effect: BlockEffect,
    /// What the policy selected.
    pub restoration: Restoration,
    /// `false` if the environment refused the restoration.
    pub applied: bool,
}
