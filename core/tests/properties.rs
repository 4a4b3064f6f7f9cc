//! End-to-end properties of matching, resolution, and scope binding.

use omatch::prelude::*;
use omatch::{ClosedBinding, BlockEffect, Restoration};
use std::collections::BTreeMap;

fn env(pairs: &[(&str, i64)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), Value::from(*v)))
        .collect()
}

fn person(name: &str, age: i64) -> Value {
    Value::map([("name", Value::from(name)), ("age", Value::from(age))])
}

// ═══════════════════════════════════════════════════════════════════════════════
// Matching
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn subject_without_first_attribute_is_no_match() {
    let pattern = Pattern::new()
        .rule("obj.profile.email", Rule::new().bind_value("email"))
        .with_verbose(true);
    let log = NoticeLog::new();
    for subject in [
        Value::None,
        Value::from(0),
        Value::from("profile"),
        Value::list([1, 2]),
        person("bob", 3),
    ] {
        assert!(pattern
            .matches_in(&subject, &EvalContext::new(), &log)
            .is_none());
    }
    assert_eq!(log.count("path_unresolved"), 5);
}

#[test]
fn empty_pattern_binds_nothing() {
    let m = Pattern::new().matches(&person("a", 1)).unwrap();
    assert!(m.bound().is_empty());
    assert_eq!(m.subject(), &person("a", 1));
}

#[test]
fn repeated_matches_agree() {
    let pattern = Pattern::new()
        .rule("obj", Rule::new().check(Predicate::is_type("map")))
        .rule("obj.age", Rule::new().check(Predicate::new("adult", |v| {
            v.as_int().is_some_and(|a| a >= 18)
        })))
        .rule("obj.name", Rule::new().bind_value("name").bind_expr("initial", "o[0]"));
    let subject = person("carol", 40);
    let first = pattern.matches(&subject).unwrap();
    let second = pattern.matches(&subject).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.get("initial"), Some(&Value::from("c")));
    assert!(pattern.matches(&person("dan", 12)).is_none());
}

#[test]
fn binding_a_builtin_method_is_idempotent() {
    let pattern = Pattern::new().rule("obj.keys", Rule::new().bind_value("keys"));
    let subject = Value::map([("a", 1)]);
    let first = pattern.matches(&subject).unwrap();
    let second = pattern.matches(&subject).unwrap();
    assert_eq!(first.bound(), second.bound());
    assert_eq!(first, second);
    assert_eq!(
        first.get("keys").unwrap().call().unwrap(),
        Value::list(["a"])
    );
}

#[test]
fn same_name_from_two_paths_last_wins() {
    let log = NoticeLog::new();
    let pattern = Pattern::new()
        .rule("obj.name", Rule::new().bind_value("x"))
        .rule("obj.age", Rule::new().bind_value("x"))
        .with_verbose(true);
    let m = pattern
        .matches_in(&person("eve", 7), &EvalContext::new(), &log)
        .unwrap();
    assert_eq!(m.get("x"), Some(&Value::from(7)));
    assert_eq!(
        log.notices(),
        [Notice::BindingOverwritten {
            name: "x".into(),
            path: "obj.age".into()
        }]
    );
}

#[test]
fn methods_and_subscripts_compose() {
    let subject = Value::map([
        ("users", Value::list([person("ann", 30), person("ben", 20)])),
        ("meta", Value::map([("count", 2)])),
    ]);
    let pattern = Pattern::new()
        .rule("obj.users[-1].name.upper()", Rule::new().bind_value("last"))
        .rule("obj['meta'].keys()", Rule::new().bind_value("meta_keys"))
        .rule("obj.users.len()", Rule::new().check(Predicate::exact(2)))
        .rule("obj.type", Rule::new().check(Predicate::exact("map")));
    let m = pattern.matches(&subject).unwrap();
    assert_eq!(m.get("last"), Some(&Value::from("BEN")));
    assert_eq!(m.get("meta_keys"), Some(&Value::list(["count"])));
}

#[test]
fn map_keys_take_priority_over_methods() {
    let pattern = Pattern::new().rule("obj.keys", Rule::new().bind_value("k"));
    let m = pattern.matches(&Value::map([("keys", 1)])).unwrap();
    assert_eq!(m.get("k"), Some(&Value::from(1)));
}

#[test]
fn trace_agrees_with_matches() {
    let pattern = Pattern::new()
        .rule("obj.name", Rule::new().check(Predicate::prefix("a")).bind_value("n"));
    for subject in [person("ann", 1), person("bob", 2), Value::None] {
        let trace = pattern.match_with_trace(&subject);
        assert_eq!(trace.result, pattern.matches(&subject));
        assert_eq!(trace.failure.is_none(), trace.matched());
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resolution
// ═══════════════════════════════════════════════════════════════════════════════

fn three_patterns() -> Vec<Pattern> {
    vec![
        Pattern::new().rule("obj.name", Rule::new().bind_value("p0")),
        Pattern::new().rule("obj.age", Rule::new().bind_value("p1")),
        Pattern::new().rule("obj.missing", Rule::new().bind_value("p2")),
    ]
}

#[test]
fn tolerant_resolve_returns_first_and_one_notice() {
    let log = NoticeLog::new();
    let multi = MultiPattern::new(three_patterns()).allow_ambiguous(true);
    let m = multi
        .resolve_in(&person("x", 1), &EvalContext::new(), &log)
        .unwrap();
    assert_eq!(m.bound().keys().collect::<Vec<_>>(), ["p0"]);
    assert_eq!(log.count("ambiguity"), 1);
    assert_eq!(log.len(), 1);
}

#[test]
fn strict_resolve_reports_ambiguity() {
    let multi = MultiPattern::new(three_patterns());
    let err = multi.resolve(&person("x", 1)).unwrap_err();
    assert!(matches!(err, ResolveError::Ambiguity { matched: 2, .. }));
}

#[test]
fn resolving_none_matches_nothing() {
    let multi = MultiPattern::new(three_patterns());
    assert!(matches!(
        multi.resolve(&Value::None),
        Err(ResolveError::NoMatchingPattern { .. })
    ));
}

// ═══════════════════════════════════════════════════════════════════════════════
// Scope binding
// ═══════════════════════════════════════════════════════════════════════════════

fn inject_and_mutate(policy: BindingPolicy) -> (BTreeMap<String, Value>, Vec<ClosedBinding>) {
    let mut e = env(&[("a", 5), ("b", 6), ("c", 7)]);
    let bindings = env(&[("a", 1), ("b", 2), ("c", 3), ("d", 4)]);
    let mut session = ScopeBinder::new(policy).open(&mut e, &bindings).unwrap();
    assert_eq!(session.get("d"), Some(&Value::from(4)));
    session.insert("a".to_string(), Value::from(6));
    session.remove("b");
    let report = session.close();
    (e, report.entries)
}

#[test]
fn default_policy_restores_prior_state() {
    let (e, entries) = inject_and_mutate(BindingPolicy::default());
    assert_eq!(e, env(&[("a", 5), ("b", 6), ("c", 7)]));
    let effects: Vec<(&str, BlockEffect, Restoration)> = entries
        .iter()
        .map(|c| (c.name.as_str(), c.effect, c.restoration))
        .collect();
    assert_eq!(
        effects,
        [
            ("a", BlockEffect::Changed, Restoration::RestorePrior),
            ("b", BlockEffect::Deleted, Restoration::RestorePrior),
            ("c", BlockEffect::Unchanged, Restoration::RestorePrior),
            ("d", BlockEffect::Unchanged, Restoration::Remove),
        ]
    );
}

#[test]
fn inverted_policy_keeps_block_state() {
    let (e, _) = inject_and_mutate(BindingPolicy::default().inverted());
    assert_eq!(e, env(&[("a", 6), ("c", 3), ("d", 4)]));
}

#[test]
fn match_result_scoped_block() {
    let pattern = Pattern::new().rule("obj.name", Rule::new().bind_value("name"));
    let m = pattern.matches(&person("zoe", 9)).unwrap();

    let mut scope = Scope::new().with_global("name", "outer");
    let greeting = m
        .scoped(&mut scope, |s| {
            format!("hi {}", s.lookup("name").and_then(Value::as_str).unwrap_or("?"))
        })
        .unwrap();
    assert_eq!(greeting, "hi zoe");
    assert_eq!(scope.lookup("name"), Some(&Value::from("outer")));
}
