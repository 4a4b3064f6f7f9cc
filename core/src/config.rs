//! Config types for declarative pattern construction.
//!
//! These types mirror the runtime pattern types but are serde-deserializable,
//! enabling config-driven patterns via [`PatternConfig::build()`].
//!
//! # Relationship to runtime types
//!
//! | Config type | Runtime type |
//! |-------------|-------------|
//! | [`PatternConfig`] | [`Pattern`](crate::Pattern) |
//! | [`RuleConfig`] | [`Rule`](crate::Rule) |
//! | [`CheckSpec`] | [`Predicate`](crate::Predicate) |
//! | [`BindConfig`] | [`Extractor`](crate::Extractor) |
//!
//! # Example
//!
//! ```
//! use omatch::{PatternConfig, Value};
//!
//! let config: PatternConfig = serde_json::from_str(r#"{
//!     "rules": [
//!         { "path": "obj", "checks": [ { "is": "map" } ] },
//!         { "path": "obj.name", "checks": [ { "prefix": "al" } ],
//!           "bind": [ { "name": "name" }, { "name": "shout", "expr": "o.upper()" } ] }
//!     ]
//! }"#).unwrap();
//!
//! let pattern = config.build().unwrap();
//! let m = pattern.matches(&Value::map([("name", "alice")])).unwrap();
//! assert_eq!(m.get("shout"), Some(&Value::from("ALICE")));
//! ```

use crate::{
    BindingPolicy, CheckSpec, Extractor, Pattern, PatternError, Rule, MAX_RULES,
};
use serde::{Deserialize, Serialize};

/// Configuration for a [`Pattern`](crate::Pattern).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternConfig {
    /// Report verbose-only notices.
    #[serde(default)]
    pub verbose: bool,

    /// Restoration policy for scope binding. Missing switches take defaults.
    #[serde(default)]
    pub policy: BindingPolicy,

    /// Path rules, in evaluation order.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Configuration for one path [`Rule`](crate::Rule).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Path expression, e.g. `obj.user.name`.
    pub path: String,

    /// Checks the resolved value must pass, in order.
    #[serde(default)]
    pub checks: Vec<CheckSpec>,

    /// Names to bind from the resolved value, in order.
    #[serde(default)]
    pub bind: Vec<BindConfig>,
}

/// Configuration for one binder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindConfig {
    /// The bound name.
    pub name: String,

    /// Expression evaluated with `o` as the resolved value. Absent binds the
    /// resolved value itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
}

impl BindConfig {
    fn to_extractor(&self) -> Extractor {
        match &self.expr {
            Some(expr) => Extractor::expr(expr),
            None => Extractor::Value,
        }
    }
}

impl RuleConfig {
    /// Build the runtime rule.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if a check exceeds limits or a regex is invalid.
    pub fn build(&self) -> Result<Rule, PatternError> {
        let mut rule = Rule::new();
        for check in &self.checks {
            check.validate()?;
            rule = rule.check(check.to_predicate()?);
        }
        for bind in &self.bind {
            if bind.name.is_empty() {
                return Err(PatternError::InvalidConfig {
                    source: format!("empty binding name on path \"{}\"", self.path),
                });
            }
            rule = rule.bind(bind.name.as_str(), bind.to_extractor());
        }
        Ok(rule)
    }
}

impl PatternConfig {
    /// Validate and build the runtime pattern.
    ///
    /// # Errors
    ///
    /// - [`PatternError::TooManyRules`] if there are more than [`MAX_RULES`] rules
    /// - [`PatternError::InvalidConfig`] for an empty path or binding name
    /// - [`PatternError::DepthExceeded`] / [`PatternError::PatternTooLong`] /
    ///   [`PatternError::InvalidPattern`] from the checks
    pub fn build(&self) -> Result<Pattern, PatternError> {
        if self.rules.len() > MAX_RULES {
            return Err(PatternError::TooManyRules {
                count: self.rules.len(),
                max: MAX_RULES,
            });
        }
        let mut pattern = Pattern::new()
            .with_verbose(self.verbose)
            .with_policy(self.policy);
        for rule in &self.rules {
            if rule.path.trim().is_empty() {
                return Err(PatternError::InvalidConfig {
                    source: "rule path must not be empty".into(),
                });
            }
            pattern = pattern.rule(rule.path.as_str(), rule.build()?);
        }
        Ok(pattern)
    }
}
