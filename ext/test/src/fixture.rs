//! Match conformance fixture runner
//!
//! Loads YAML fixtures that describe one or more patterns in the config
//! format ([`PatternConfig`]) and the expected outcome for each subject.
//!
//! ```yaml
//! name: prefix and bind
//! description: binds the name when it starts with "al"
//! patterns:
//!   - rules:
//!       - path: obj.name
//!         checks: [ { prefix: al } ]
//!         bind: [ { name: name } ]
//! cases:
//!   - name: hit
//!     subject: { name: alice }
//!     expect: { name: alice }
//!   - name: miss
//!     subject: { name: bob }
//!     expect: null
//! ```
//!
//! With several patterns the subject is resolved against all of them.
//! `allow_ambiguous` selects tolerant resolution; a case may expect
//! `ambiguous: <count>` instead of bindings.

use crate::Record;
use omatch::prelude::*;
use omatch::PatternConfig;
use serde::Deserialize;
use std::collections::BTreeMap;

/// A complete test fixture
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub patterns: Vec<PatternConfig>,
    #[serde(default)]
    pub allow_ambiguous: bool,
    /// Extra names visible to paths and expressions.
    #[serde(default)]
    pub context: ContextConfig,
    /// The patterns must fail to build.
    #[serde(default)]
    pub expect_error: bool,
    #[serde(default)]
    pub cases: Vec<TestCase>,
}

/// Extra evaluation names.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    #[serde(default)]
    pub globals: BTreeMap<String, Value>,
    #[serde(default)]
    pub locals: BTreeMap<String, Value>,
}

/// Test case
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestCase {
    pub name: String,
    pub subject: Value,
    /// Wrap a map subject as a [`Record`] of this type.
    #[serde(default)]
    pub record: Option<String>,
    /// Expected bindings; `null` means no match.
    #[serde(default)]
    pub expect: Option<BTreeMap<String, Value>>,
    /// Expected strict-resolution ambiguity (number of matching patterns).
    #[serde(default)]
    pub ambiguous: Option<usize>,
    /// Expected notice kinds, in order. Unchecked when absent.
    #[serde(default)]
    pub notices: Option<Vec<String>>,
}

/// What a case produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A match with these bindings.
    Bound(Bindings),
    /// No pattern matched.
    NoMatch,
    /// Several patterns matched under strict resolution.
    Ambiguous(usize),
}

impl ContextConfig {
    fn build(&self) -> EvalContext {
        let ctx = self
            .globals
            .iter()
            .fold(EvalContext::new(), |ctx, (k, v)| ctx.with_global(k.as_str(), v.clone()));
        self.locals
            .iter()
            .fold(ctx, |ctx, (k, v)| ctx.with_local(k.as_str(), v.clone()))
    }
}

impl TestCase {
    /// Build the subject, wrapping it as a record when requested.
    pub fn build_subject(&self) -> Value {
        match (&self.record, &self.subject) {
            (Some(type_name), Value::Map(fields)) => fields
                .iter()
                .fold(Record::new(type_name.as_str()), |r, (k, v)| r.with(k.as_str(), v.clone()))
                .into_value(),
            _ => self.subject.clone(),
        }
    }

    /// The outcome this case expects.
    pub fn expected(&self) -> Outcome {
        match (&self.ambiguous, &self.expect) {
            (Some(n), _) => Outcome::Ambiguous(*n),
            (None, Some(bound)) => Outcome::Bound(bound.clone()),
            (None, None) => Outcome::NoMatch,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Runner
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of running a single test case
#[derive(Debug)]
pub struct CaseResult {
    pub case_name: String,
    pub passed: bool,
    pub expected: Outcome,
    pub actual: Outcome,
    pub expected_notices: Option<Vec<String>>,
    pub actual_notices: Vec<String>,
}

impl Fixture {
    /// Parse a fixture from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Parse multiple fixtures from a YAML file with `---` separators
    pub fn from_yaml_multi(yaml: &str) -> Result<Vec<Self>, serde_yaml::Error> {
        let mut fixtures = Vec::new();
        for doc in serde_yaml::Deserializer::from_str(yaml) {
            fixtures.push(Self::deserialize(doc)?);
        }
        Ok(fixtures)
    }

    /// Build every pattern.
    ///
    /// # Errors
    ///
    /// Returns the first build error.
    pub fn build(&self) -> Result<Vec<Pattern>, PatternError> {
        self.patterns.iter().map(PatternConfig::build).collect()
    }

    /// Run all test cases and return results
    ///
    /// # Errors
    ///
    /// Returns the build error if the patterns do not build.
    pub fn run(&self) -> Result<Vec<CaseResult>, PatternError> {
        let patterns = self.build()?;
        let context = self.context.build();
        let multi = MultiPattern::new(patterns).allow_ambiguous(self.allow_ambiguous);

        Ok(self
            .cases
            .iter()
            .map(|case| {
                let log = NoticeLog::new();
                let subject = case.build_subject();
                let actual = evaluate(&multi, &subject, &context, &log);
                let actual_notices: Vec<String> =
                    log.take().iter().map(|n| n.kind().to_owned()).collect();
                let expected = case.expected();
                let notices_ok = case
                    .notices
                    .as_ref()
                    .map_or(true, |want| *want == actual_notices);
                CaseResult {
                    case_name: case.name.clone(),
                    passed: actual == expected && notices_ok,
                    expected,
                    actual,
                    expected_notices: case.notices.clone(),
                    actual_notices,
                }
            })
            .collect())
    }

    /// Run all test cases and panic on first failure
    pub fn run_and_assert(&self) {
        match self.run() {
            Ok(results) => {
                assert!(
                    !self.expect_error,
                    "Fixture '{}' expected a build error, but the patterns built",
                    self.name
                );
                for result in results {
                    assert!(
                        result.passed,
                        "Fixture '{}' case '{}' failed: expected {:?} (notices {:?}), got {:?} (notices {:?})",
                        self.name,
                        result.case_name,
                        result.expected,
                        result.expected_notices,
                        result.actual,
                        result.actual_notices
                    );
                }
            }
            Err(e) => assert!(
                self.expect_error,
                "Fixture '{}' failed to build: {e}",
                self.name
            ),
        }
    }
}

/// A single pattern is matched directly; several are resolved.
fn evaluate(multi: &MultiPattern, subject: &Value, context: &EvalContext, log: &NoticeLog) -> Outcome {
    if let [pattern] = multi.patterns() {
        return pattern
            .matches_in(subject, context, log)
            .map_or(Outcome::NoMatch, |m| Outcome::Bound(m.into_bindings()));
    }
    match multi.resolve_in(subject, context, log) {
        Ok(m) => Outcome::Bound(m.into_bindings()),
        Err(ResolveError::NoMatchingPattern { .. }) => Outcome::NoMatch,
        Err(ResolveError::Ambiguity { matched, .. }) => Outcome::Ambiguous(matched),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
name: inline
patterns:
  - rules:
      - path: obj.kind
        checks: [ { exact: user } ]
      - path: obj.id
        bind: [ { name: id } ]
cases:
  - name: hit
    subject: { kind: user, id: 7 }
    expect: { id: 7 }
  - name: miss
    subject: { kind: group, id: 7 }
    expect: null
  - name: record
    record: User
    subject: { kind: user, id: 1 }
    expect: { id: 1 }
"#;

    #[test]
    fn inline_fixture_passes() {
        let fixture = Fixture::from_yaml(FIXTURE).unwrap();
        let results = fixture.run().unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.passed), "{results:?}");
    }

    #[test]
    fn record_subject_is_an_object() {
        let fixture = Fixture::from_yaml(FIXTURE).unwrap();
        let subject = fixture.cases[2].build_subject();
        assert_eq!(subject.type_name(), "User");
    }

    #[test]
    fn wrong_expectation_fails() {
        let yaml = FIXTURE.replace("expect: { id: 7 }", "expect: { id: 8 }");
        let fixture = Fixture::from_yaml(&yaml).unwrap();
        let results = fixture.run().unwrap();
        assert!(!results[0].passed);
        assert_eq!(
            results[0].actual,
            Outcome::Bound(BTreeMap::from([("id".to_owned(), Value::from(7))]))
        );
    }
}
