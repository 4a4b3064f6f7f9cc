//! Scope-binding conformance fixture runner.
//!
//! Each fixture sets up a [`Scope`], injects bindings with a policy, runs a
//! block of assignments and deletions, closes the session, and compares the
//! resulting scope with the expectation.
//!
//! ```yaml
//! name: default policy
//! env:
//!   globals: { a: 5, b: 6, c: 7 }
//! bindings: { a: 1, b: 2, c: 3, d: 4 }
//! block:
//!   - set: { name: a, value: 6 }
//!   - delete: b
//! expect:
//!   globals: { a: 5, b: 6, c: 7 }
//! ```

use omatch::prelude::*;
use omatch::EnvError;
use serde::Deserialize;
use std::collections::BTreeMap;

/// A scope-binding test fixture.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeFixture {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub policy: BindingPolicy,
    /// Apply [`BindingPolicy::inverted`] to `policy`.
    #[serde(default)]
    pub inverted: bool,
    /// Report unreachable bindings.
    #[serde(default = "default_true")]
    pub warn_unused: bool,
    pub env: EnvConfig,
    pub bindings: BTreeMap<String, Value>,
    #[serde(default)]
    pub block: Vec<BlockOp>,
    pub expect: Expectation,
}

fn default_true() -> bool {
    true
}

/// Initial environment.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvConfig {
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub locals: BTreeMap<String, Value>,
    /// Locals declared without a value.
    #[serde(default)]
    pub unset_locals: Vec<String>,
    #[serde(default)]
    pub globals: BTreeMap<String, Value>,
    #[serde(default)]
    pub protected: Vec<String>,
}

/// One statement of the block body, written `set: { name, value }` or
/// `delete: name`.
#[derive(Debug, Deserialize)]
#[serde(try_from = "BlockOpConfig")]
pub enum BlockOp {
    /// Assign a name.
    Set { name: String, value: Value },
    /// Delete a name.
    Delete(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BlockOpConfig {
    #[serde(default)]
    set: Option<SetConfig>,
    #[serde(default)]
    delete: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SetConfig {
    name: String,
    value: Value,
}

impl TryFrom<BlockOpConfig> for BlockOp {
    type Error = String;

    fn try_from(config: BlockOpConfig) -> Result<Self, Self::Error> {
        match (config.set, config.delete) {
            (Some(SetConfig { name, value }), None) => Ok(Self::Set { name, value }),
            (None, Some(name)) => Ok(Self::Delete(name)),
            _ => Err("block statement needs exactly one of `set` or `delete`".into()),
        }
    }
}

/// Expected state after close.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Expectation {
    /// Expected set locals. Unset locals are omitted.
    #[serde(default)]
    pub locals: BTreeMap<String, Value>,
    #[serde(default)]
    pub globals: BTreeMap<String, Value>,
    /// Expected notice kinds, in order. Unchecked when absent.
    #[serde(default)]
    pub notices: Option<Vec<String>>,
    /// `open` must fail with this error kind (`unreachable`, `undeletable`, `read_only`).
    #[serde(default)]
    pub open_error: Option<String>,
}

/// Observed state after close.
#[derive(Debug, Clone, PartialEq)]
pub struct Observed {
    pub locals: BTreeMap<String, Value>,
    pub globals: BTreeMap<String, Value>,
    pub notices: Vec<String>,
    pub open_error: Option<String>,
}

impl EnvConfig {
    /// Build the initial scope.
    pub fn build(&self) -> Scope {
        let mut scope = if self.strict {
            Scope::strict()
        } else {
            Scope::new()
        };
        for (k, v) in &self.locals {
            scope = scope.with_local(k.as_str(), v.clone());
        }
        for k in &self.unset_locals {
            scope = scope.declare_local(k.as_str());
        }
        for (k, v) in &self.globals {
            scope = scope.with_global(k.as_str(), v.clone());
        }
        for k in &self.protected {
            scope = scope.protect(k.as_str());
        }
        scope
    }
}

impl BlockOp {
    fn apply(&self, scope: &mut Scope) -> Result<(), EnvError> {
        match self {
            Self::Set { name, value } => scope.assign(name, value.clone()),
            Self::Delete(name) => scope.remove(name),
        }
    }
}

fn error_kind(error: &EnvError) -> &'static str {
    match error {
        EnvError::Unreachable { .. } => "unreachable",
        EnvError::Undeletable { .. } => "undeletable",
        EnvError::ReadOnly { .. } => "read_only",
    }
}

fn observe(scope: &Scope, log: &NoticeLog, open_error: Option<String>) -> Observed {
    Observed {
        locals: scope
            .locals()
            .filter_map(|(k, v)| v.map(|v| (k.to_owned(), v.clone())))
            .collect(),
        globals: scope.globals().clone(),
        notices: log.take().iter().map(|n| n.kind().to_owned()).collect(),
        open_error,
    }
}

impl ScopeFixture {
    /// Parse a single fixture from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Parse multiple fixtures from a YAML file with `---` separators.
    pub fn from_yaml_multi(yaml: &str) -> Result<Vec<Self>, serde_yaml::Error> {
        let mut fixtures = Vec::new();
        for doc in serde_yaml::Deserializer::from_str(yaml) {
            fixtures.push(Self::deserialize(doc)?);
        }
        Ok(fixtures)
    }

    fn policy(&self) -> BindingPolicy {
        if self.inverted {
            self.policy.inverted()
        } else {
            self.policy
        }
    }

    /// Run the fixture and return the observed state.
    ///
    /// Block statements that the scope refuses are skipped, as a block body
    /// that caught the error would.
    pub fn run(&self) -> Observed {
        let mut scope = self.env.build();
        let log = NoticeLog::new();
        let binder = ScopeBinder::new(self.policy()).warn_unused(self.warn_unused);

        let open_error = match binder.open_with(&mut scope, &self.bindings, &log) {
            Ok(mut session) => {
                for op in &self.block {
                    let _ = op.apply(&mut session);
                }
                session.close();
                None
            }
            Err(e) => Some(error_kind(&e).to_owned()),
        };
        observe(&scope, &log, open_error)
    }

    /// Run the fixture and panic on mismatch.
    pub fn run_and_assert(&self) {
        let observed = self.run();
        let expect = &self.expect;
        assert_eq!(
            observed.open_error, expect.open_error,
            "Fixture '{}': open error",
            self.name
        );
        assert_eq!(observed.locals, expect.locals, "Fixture '{}': locals", self.name);
        assert_eq!(observed.globals, expect.globals, "Fixture '{}': globals", self.name);
        if let Some(notices) = &expect.notices {
            assert_eq!(&observed.notices, notices, "Fixture '{}': notices", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omatch::ScopeKind;

    #[test]
    fn inline_fixture() {
        let fixture = ScopeFixture::from_yaml(
            r"
name: inline
env:
  locals: { x: 1 }
  globals: { g: 2 }
bindings: { x: 10, g: 20, n: 30 }
block:
  - set: { name: x, value: 11 }
  - delete: g
expect:
  locals: { x: 1 }
  globals: { g: 2 }
  notices: []
",
        )
        .unwrap();
        fixture.run_and_assert();
    }

    #[test]
    fn block_statements_parse() {
        let ops: Vec<BlockOp> =
            serde_yaml::from_str("[ { set: { name: a, value: 1 } }, { delete: b } ]").unwrap();
        assert!(matches!(&ops[0], BlockOp::Set { name, value } if name == "a" && *value == Value::from(1)));
        assert!(matches!(&ops[1], BlockOp::Delete(name) if name == "b"));

        let both: Result<Vec<BlockOp>, _> =
            serde_yaml::from_str("[ { set: { name: a, value: 1 }, delete: a } ]");
        assert!(both.is_err());
        let neither: Result<Vec<BlockOp>, _> = serde_yaml::from_str("[ {} ]");
        assert!(neither.is_err());
    }

    #[test]
    fn local_scope_kind_is_used_for_locals() {
        let scope = EnvConfig {
            unset_locals: vec!["u".into()],
            ..EnvConfig::default()
        }
        .build();
        assert_eq!(scope.classify("u"), Some(ScopeKind::Local));
        assert!(!scope.has(ScopeKind::Local, "u"));
    }
}
