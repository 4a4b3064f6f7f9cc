//! Built-in predicates and `CheckSpec`, their config-level specification.
//!
//! - [`CheckSpec`] = config-level specification (what the user wrote)
//! - [`Predicate`] = runtime check (what evaluates at match time)
//!
//! String checks (`prefix`, `suffix`, `regex`) are `false` for non-string
//! values rather than errors: a value of the wrong type simply does not have
//! the expected shape.

use crate::{PatternError, Predicate, Value, MAX_DEPTH, MAX_PATTERN_LENGTH, MAX_REGEX_PATTERN_LENGTH};
use std::fmt;

impl Predicate {
    /// Value's type name equals `type_name` (`"map"`, `"list"`, an object's type name, ...).
    pub fn is_type(type_name: impl Into<String>) -> Self {
        let expected = type_name.into();
        Self::new(format!("is({expected})"), move |v| v.type_name() == expected)
    }

    /// Value equals `expected`.
    pub fn exact(expected: impl Into<Value>) -> Self {
        let expected = expected.into();
        Self::new(format!("exact({expected:?})"), move |v| *v == expected)
    }

    /// String value starts with `prefix`.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self::new(format!("prefix({prefix:?})"), move |v| {
            v.as_str().is_some_and(|s| s.starts_with(prefix.as_str()))
        })
    }

    /// String value ends with `suffix`.
    pub fn suffix(suffix: impl Into<String>) -> Self {
        let suffix = suffix.into();
        Self::new(format!("suffix({suffix:?})"), move |v| {
            v.as_str().is_some_and(|s| s.ends_with(suffix.as_str()))
        })
    }

    /// String contains the substring, list contains the string element, or
    /// map contains the key.
    pub fn contains(needle: impl Into<String>) -> Self {
        let needle = needle.into();
        Self::new(format!("contains({needle:?})"), move |v| match v {
            Value::Str(s) => s.contains(needle.as_str()),
            Value::List(items) => items.iter().any(|item| item.as_str() == Some(needle.as_str())),
            Value::Map(m) => m.contains_key(&needle),
            _ => false,
        })
    }

    /// String value matches the regular expression (Rust `regex` syntax).
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::InvalidPattern`] if the regex does not compile.
    pub fn regex(pattern: &str) -> Result<Self, PatternError> {
        let re = regex::Regex::new(pattern).map_err(|e| PatternError::InvalidPattern {
            pattern: pattern.to_owned(),
            source: e.to_string(),
        })?;
        Ok(Self::new(format!("regex({pattern:?})"), move |v| {
            v.as_str().is_some_and(|s| re.is_match(s))
        }))
    }

    /// Value is not `None`.
    #[must_use]
    pub fn not_none() -> Self {
        Self::new("not_none", |v| !v.is_none())
    }

    /// Value is truthy.
    #[must_use]
    pub fn truthy() -> Self {
        Self::new("truthy", Value::is_truthy)
    }

    /// String, list, or map has exactly `len` elements.
    #[must_use]
    pub fn len(len: usize) -> Self {
        Self::new(format!("len({len})"), move |v| v.len() == Some(len))
    }

    /// Inverts `inner`. Errors propagate unchanged.
    #[must_use]
    pub fn not(inner: Predicate) -> Self {
        let name = format!("not({})", inner.name());
        Self::try_new(name, move |v| inner.evaluate(v).map(|b| !b))
    }

    /// All predicates pass (short-circuits on the first `false` or error).
    #[must_use]
    pub fn all(predicates: Vec<Predicate>) -> Self {
        let name = format!("all({})", join_names(&predicates));
        Self::try_new(name, move |v| {
            for p in &predicates {
                if !p.evaluate(v)? {
                    return Ok(false);
                }
            }
            Ok(true)
        })
    }

    /// Any predicate passes (short-circuits on the first `true` or error).
    #[must_use]
    pub fn any(predicates: Vec<Predicate>) -> Self {
        let name = format!("any({})", join_names(&predicates));
        Self::try_new(name, move |v| {
            for p in &predicates {
                if p.evaluate(v)? {
                    return Ok(true);
                }
            }
            Ok(false)
        })
    }
}

fn join_names(predicates: &[Predicate]) -> String {
    predicates
        .iter()
        .map(Predicate::name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A declarative check, as written in pattern configs.
///
/// Compiles to a runtime [`Predicate`] via [`to_predicate()`](Self::to_predicate).
///
/// With the `serde` feature, reads and writes single-key maps, or bare
/// strings for the checks without an operand, in any serde format:
///
/// ```yaml
/// - is: map
/// - prefix: "/api"
/// - not: { contains: "debug" }
/// - any: [ { exact: 1 }, { exact: 2 } ]
/// - not_none
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum CheckSpec {
    /// Type name equality.
    Is(String),
    /// Value equality.
    Exact(Value),
    /// String starts with prefix.
    Prefix(String),
    /// String ends with suffix.
    Suffix(String),
    /// Substring, list element, or map key.
    Contains(String),
    /// Regular expression match.
    Regex(String),
    /// Value is not none.
    NotNone,
    /// Value is truthy.
    Truthy,
    /// Exact length.
    Len(usize),
    /// Negation.
    Not(Box<CheckSpec>),
    /// Conjunction.
    All(Vec<CheckSpec>),
    /// Disjunction.
    Any(Vec<CheckSpec>),
}

impl CheckSpec {
    /// Compile this check into a runtime [`Predicate`].
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::InvalidPattern`] if a regex is invalid.
    pub fn to_predicate(&self) -> Result<Predicate, PatternError> {
        Ok(match self {
            Self::Is(t) => Predicate::is_type(t.as_str()),
            Self::Exact(v) => Predicate::exact(v.clone()),
            Self::Prefix(s) => Predicate::prefix(s.as_str()),
            Self::Suffix(s) => Predicate::suffix(s.as_str()),
            Self::Contains(s) => Predicate::contains(s.as_str()),
            Self::Regex(s) => Predicate::regex(s)?,
            Self::NotNone => Predicate::not_none(),
            Self::Truthy => Predicate::truthy(),
            Self::Len(n) => Predicate::len(*n),
            Self::Not(inner) => Predicate::not(inner.to_predicate()?),
            Self::All(specs) => Predicate::all(compile_all(specs)?),
            Self::Any(specs) => Predicate::any(compile_all(specs)?),
        })
    }

    /// Depth of the check tree (leaf = 1).
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Not(inner) => 1 + inner.depth(),
            Self::All(specs) | Self::Any(specs) => {
                1 + specs.iter().map(CheckSpec::depth).max().unwrap_or(0)
            }
            _ => 1,
        }
    }

    /// Validate against safety limits.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::DepthExceeded`] or [`PatternError::PatternTooLong`].
    pub fn validate(&self) -> Result<(), PatternError> {
        let depth = self.depth();
        if depth > MAX_DEPTH {
            return Err(PatternError::DepthExceeded {
                depth,
                max: MAX_DEPTH,
            });
        }
        self.validate_lengths()
    }

    fn validate_lengths(&self) -> Result<(), PatternError> {
        let check = |len: usize, max: usize| {
            if len > max {
                Err(PatternError::PatternTooLong { len, max })
            } else {
                Ok(())
            }
        };
        match self {
            Self::Prefix(s) | Self::Suffix(s) | Self::Contains(s) => {
                check(s.len(), MAX_PATTERN_LENGTH)
            }
            Self::Regex(s) => check(s.len(), MAX_REGEX_PATTERN_LENGTH),
            Self::Not(inner) => inner.validate_lengths(),
            Self::All(specs) | Self::Any(specs) => {
                specs.iter().try_for_each(CheckSpec::validate_lengths)
            }
            _ => Ok(()),
        }
    }
}

fn compile_all(specs: &[CheckSpec]) -> Result<Vec<Predicate>, PatternError> {
    specs.iter().map(CheckSpec::to_predicate).collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Serde
// ═══════════════════════════════════════════════════════════════════════════════

/// Wire form of [`CheckSpec`]. Read through `serde_json::Value`, whose enum
/// access takes single-key maps; serde_yaml only takes `!tag` enums.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
#[serde(rename_all = "snake_case")]
enum CheckForm {
    Is(String),
    Exact(Value),
    Prefix(String),
    Suffix(String),
    Contains(String),
    Regex(String),
    NotNone,
    Truthy,
    Len(usize),
    Not(Box<CheckSpec>),
    All(Vec<CheckSpec>),
    Any(Vec<CheckSpec>),
}

#[cfg(feature = "serde")]
impl From<CheckForm> for CheckSpec {
    fn from(form: CheckForm) -> Self {
        match form {
            CheckForm::Is(t) => Self::Is(t),
            CheckForm::Exact(v) => Self::Exact(v),
            CheckForm::Prefix(s) => Self::Prefix(s),
            CheckForm::Suffix(s) => Self::Suffix(s),
            CheckForm::Contains(s) => Self::Contains(s),
            CheckForm::Regex(s) => Self::Regex(s),
            CheckForm::NotNone => Self::NotNone,
            CheckForm::Truthy => Self::Truthy,
            CheckForm::Len(n) => Self::Len(n),
            CheckForm::Not(inner) => Self::Not(inner),
            CheckForm::All(specs) => Self::All(specs),
            CheckForm::Any(specs) => Self::Any(specs),
        }
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for CheckSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::Deserialize;
        let raw = serde_json::Value::deserialize(deserializer)?;
        CheckForm::deserialize(raw)
            .map(Self::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for CheckSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        fn entry<S, T>(serializer: S, key: &str, value: &T) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
            T: serde::Serialize + ?Sized,
        {
            use serde::ser::SerializeMap;
            let mut map = serializer.serialize_map(Some(1))?;
            map.serialize_entry(key, value)?;
            map.end()
        }

        match self {
            Self::Is(t) => entry(serializer, "is", t),
            Self::Exact(v) => entry(serializer, "exact", v),
            Self::Prefix(s) => entry(serializer, "prefix", s),
            Self::Suffix(s) => entry(serializer, "suffix", s),
            Self::Contains(s) => entry(serializer, "contains", s),
            Self::Regex(s) => entry(serializer, "regex", s),
            Self::NotNone => serializer.serialize_str("not_none"),
            Self::Truthy => serializer.serialize_str("truthy"),
            Self::Len(n) => entry(serializer, "len", n),
            Self::Not(inner) => entry(serializer, "not", inner),
            Self::All(specs) => entry(serializer, "all", specs),
            Self::Any(specs) => entry(serializer, "any", specs),
        }
    }
}

impl fmt::Display for CheckSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Is(v) => write!(f, "Is(\"{v}\")"),
            Self::Exact(v) => write!(f, "Exact({v:?})"),
            Self::Prefix(v) => write!(f, "Prefix(\"{v}\")"),
            Self::Suffix(v) => write!(f, "Suffix(\"{v}\")"),
            Self::Contains(v) => write!(f, "Contains(\"{v}\")"),
            Self::Regex(v) => write!(f, "Regex(\"{v}\")"),
            Self::NotNone => f.write_str("NotNone"),
            Self::Truthy => f.write_str("Truthy"),
            Self::Len(n) => write!(f, "Len({n})"),
            Self::Not(inner) => write!(f, "Not({inner})"),
            Self::All(specs) => write!(f, "All({} checks)", specs.len()),
            Self::Any(specs) => write!(f, "Any({} checks)", specs.len()),
        }
    }
}
