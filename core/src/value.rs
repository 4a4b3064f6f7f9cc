//! `Value`: Type-erased data that patterns are matched against
//!
//! Subjects, intermediate path results, and bound values are all `Value`s.
//! Primitives and containers are plain variants; anything else plugs in
//! through the [`Object`] trait, wrapped as `Value::Object(Arc::new(your_type))`.
//!
//! # Access
//!
//! Path steps map onto three operations:
//!
//! - [`Value::attr`] resolves `.name`: map keys first, then object attributes, then
//!   the built-in `type` attribute and built-in methods
//! - [`Value::item`] resolves `[key]`: list/string indexing (negative counts from the
//!   end), map lookup by string key, or [`Object::item`]
//! - [`Value::call`] resolves `()`: invokes a [`Callable`]
//!
//! Built-in methods are returned as callables bound to their receiver, so
//! `obj.keys` is a callable and `obj.keys()` is the list of keys.

use crate::EvalError;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

/// Extension trait for user-defined types that can appear inside a [`Value`].
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so patterns and subjects can be
/// shared across threads.
///
/// # Example
///
/// ```
/// use std::any::Any;
/// use omatch::{Object, Value};
///
/// #[derive(Debug)]
/// struct Point { x: i64, y: i64 }
///
/// impl Object for Point {
///     fn type_name(&self) -> &str { "Point" }
///
///     fn attr(&self, name: &str) -> Option<Value> {
///         match name {
///             "x" => Some(Value::from(self.x)),
///             "y" => Some(Value::from(self.y)),
///             _ => None,
///         }
///     }
///
///     fn as_any(&self) -> &dyn Any { self }
/// }
///
/// let p = Value::object(Point { x: 1, y: 2 });
/// assert_eq!(p.attr("y").unwrap(), Value::from(2));
/// assert_eq!(p.type_name(), "Point");
/// ```
pub trait Object: Send + Sync + Debug {
    /// Human-readable type name, exposed through the built-in `type` attribute.
    fn type_name(&self) -> &str;

    /// Attribute lookup for `.name` steps. `None` means "no such attribute".
    fn attr(&self, name: &str) -> Option<Value>;

    /// Subscript lookup for `[key]` steps. Objects are not subscriptable by default.
    fn item(&self, key: &Value) -> Option<Value> {
        let _ = key;
        None
    }

    /// Returns `self` as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

type CallFn = dyn Fn() -> Result<Value, EvalError> + Send + Sync;

/// A zero-argument callable value, invoked by a `()` path step.
///
/// User callables compare by identity: two are equal only if they share the
/// same allocation. Built-in methods compare by method name and receiver, so
/// `obj.keys` read twice from the same map yields equal values.
#[derive(Clone)]
pub struct Callable {
    name: Arc<str>,
    kind: CallKind,
}

#[derive(Clone)]
enum CallKind {
    Func(Arc<CallFn>),
    Method {
        receiver: Arc<Value>,
        func: fn(&Value) -> Value,
    },
}

impl Callable {
    /// Create a callable from a name (used in diagnostics) and a function.
    pub fn new<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn() -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: CallKind::Func(Arc::new(func)),
        }
    }

    fn method(name: &str, receiver: Value, func: fn(&Value) -> Value) -> Self {
        Self {
            name: name.into(),
            kind: CallKind::Method {
                receiver: Arc::new(receiver),
                func,
            },
        }
    }

    /// The callable's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value a built-in method is bound to. `None` for user callables.
    #[must_use]
    pub fn receiver(&self) -> Option<&Value> {
        match &self.kind {
            CallKind::Method { receiver, .. } => Some(receiver),
            CallKind::Func(_) => None,
        }
    }

    /// Invoke the callable.
    ///
    /// # Errors
    ///
    /// Propagates whatever error the underlying function returns.
    pub fn call(&self) -> Result<Value, EvalError> {
        match &self.kind {
            CallKind::Func(func) => func(),
            CallKind::Method { receiver, func } => Ok(func(receiver)),
        }
    }
}

impl Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({})", self.name)
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (&self.kind, &other.kind) {
            (CallKind::Func(a), CallKind::Func(b)) => Arc::ptr_eq(a, b),
            (CallKind::Method { receiver: a, .. }, CallKind::Method { receiver: b, .. }) => {
                self.name == other.name && a == b
            }
            _ => false,
        }
    }
}

/// The erased value type.
///
/// # Variants
///
/// - `None`: absence of a value (still a value: a path may resolve to it)
/// - `Bool`, `Int`, `Float`, `Str`: primitives
/// - `List`: ordered sequence
/// - `Map`: string-keyed mapping, ordered by key
/// - `Callable`: zero-argument function, usually a bound built-in method
/// - `Object`: user type implementing [`Object`]
#[derive(Debug, Clone)]
pub enum Value {
    /// The none value.
    None,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// String.
    Str(String),
    /// Ordered sequence of values.
    List(Vec<Value>),
    /// String-keyed mapping.
    Map(BTreeMap<String, Value>),
    /// Zero-argument callable.
    Callable(Callable),
    /// User-defined object.
    Object(Arc<dyn Object>),
}

// Manual PartialEq because trait objects don't derive it.
// Objects compare by Arc pointer (same allocation = equal); ints and floats
// compare numerically across variants.
impl PartialEq for Value {
    #[allow(clippy::cast_precision_loss)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => (*a as f64) == *b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Callable(a), Self::Callable(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Value {
    /// Build a list from anything convertible to values.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Build a map from key/value pairs.
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Wrap a user-defined [`Object`].
    pub fn object(object: impl Object + 'static) -> Self {
        Self::Object(Arc::new(object))
    }

    /// Build a callable value.
    pub fn callable<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn() -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Self::Callable(Callable::new(name, func))
    }

    /// The type name exposed by the built-in `type` attribute.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Callable(_) => "callable",
            Self::Object(o) => o.type_name(),
        }
    }

    /// Returns `true` if this is the `None` variant.
    #[inline]
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Truthiness: none, `false`, zero, and empty containers are falsy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(l) => !l.is_empty(),
            Self::Map(m) => !m.is_empty(),
            Self::Callable(_) | Self::Object(_) => true,
        }
    }

    /// Returns the string if this is a `Str`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is an `Int`.
    #[inline]
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the boolean if this is a `Bool`.
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the elements if this is a `List`.
    #[inline]
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Returns the entries if this is a `Map`.
    #[inline]
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Downcast an `Object` value to its concrete type.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Self::Object(o) => o.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Length of strings (in chars), lists, and maps.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Str(s) => Some(s.chars().count()),
            Self::List(l) => Some(l.len()),
            Self::Map(m) => Some(m.len()),
            _ => None,
        }
    }

    /// Attribute access (`.name`).
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::MissingAttribute`] if neither a map key, an object
    /// attribute, nor a built-in attribute matches.
    pub fn attr(&self, name: &str) -> Result<Value, EvalError> {
        let found = match self {
            Self::Map(m) => m.get(name).cloned(),
            Self::Object(o) => o.attr(name),
            _ => None,
        };
        if let Some(value) = found {
            return Ok(value);
        }
        if name == "type" {
            return Ok(Self::Str(self.type_name().to_owned()));
        }
        self.method(name).ok_or_else(|| EvalError::MissingAttribute {
            type_name: self.type_name().to_owned(),
            attr: name.to_owned(),
        })
    }

    /// Subscript access (`[key]`).
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::IndexOutOfRange`], [`EvalError::MissingKey`],
    /// [`EvalError::InvalidKey`], or [`EvalError::NotSubscriptable`].
    pub fn item(&self, key: &Value) -> Result<Value, EvalError> {
        match (self, key) {
            (Self::List(items), Self::Int(index)) => {
                let i = normalize_index(*index, items.len())?;
                items
                    .get(i)
                    .cloned()
                    .ok_or(EvalError::IndexOutOfRange {
                        index: *index,
                        len: items.len(),
                    })
            }
            (Self::Str(s), Self::Int(index)) => {
                let len = s.chars().count();
                let i = normalize_index(*index, len)?;
                s.chars()
                    .nth(i)
                    .map(|c| Self::Str(c.to_string()))
                    .ok_or(EvalError::IndexOutOfRange { index: *index, len })
            }
            (Self::Map(m), Self::Str(k)) => m
                .get(k)
                .cloned()
                .ok_or_else(|| EvalError::MissingKey { key: k.clone() }),
            (Self::Object(o), _) => o.item(key).ok_or_else(|| EvalError::MissingKey {
                key: format!("{key:?}"),
            }),
            (Self::List(_) | Self::Str(_) | Self::Map(_), _) => Err(EvalError::InvalidKey {
                type_name: self.type_name().to_owned(),
                key_type: key.type_name().to_owned(),
            }),
            _ => Err(EvalError::NotSubscriptable {
                type_name: self.type_name().to_owned(),
            }),
        }
    }

    /// Call access (`()`).
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::NotCallable`] for non-callables, or the callable's
    /// own error.
    pub fn call(&self) -> Result<Value, EvalError> {
        match self {
            Self::Callable(c) => c.call(),
            _ => Err(EvalError::NotCallable {
                type_name: self.type_name().to_owned(),
            }),
        }
    }

    /// Built-in methods, bound to a clone of the receiver.
    fn method(&self, name: &str) -> Option<Value> {
        let func: fn(&Value) -> Value = match (self, name) {
            (Self::Str(_) | Self::List(_) | Self::Map(_), "len") => {
                |v: &Value| v.len().map_or(Value::None, Value::from)
            }
            (Self::Str(_), "upper") => |v: &Value| Value::from(v.as_str().map(str::to_uppercase)),
            (Self::Str(_), "lower") => |v: &Value| Value::from(v.as_str().map(str::to_lowercase)),
            (Self::Str(_), "strip") => |v: &Value| Value::from(v.as_str().map(str::trim)),
            (Self::Map(_), "keys") => |v: &Value| match v {
                Value::Map(m) => Value::list(m.keys().cloned()),
                _ => Value::None,
            },
            (Self::Map(_), "values") => |v: &Value| match v {
                Value::Map(m) => Value::List(m.values().cloned().collect()),
                _ => Value::None,
            },
            (Self::Map(_), "items") => |v: &Value| match v {
                Value::Map(m) => Value::List(
                    m.iter()
                        .map(|(k, v)| Value::List(vec![Value::from(k.as_str()), v.clone()]))
                        .collect(),
                ),
                _ => Value::None,
            },
            _ => return None,
        };
        Some(Self::Callable(Callable::method(name, self.clone(), func)))
    }
}

fn normalize_index(index: i64, len: usize) -> Result<usize, EvalError> {
    let out_of_range = || EvalError::IndexOutOfRange { index, len };
    let signed_len = i64::try_from(len).map_err(|_| out_of_range())?;
    let resolved = if index < 0 { index + signed_len } else { index };
    if (0..signed_len).contains(&resolved) {
        usize::try_from(resolved).map_err(|_| out_of_range())
    } else {
        Err(out_of_range())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Conversions
// ═══════════════════════════════════════════════════════════════════════════════

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::list(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::None, Into::into)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(m: BTreeMap<String, Value>) -> Self {
        Self::Map(m)
    }
}

impl From<Callable> for Value {
    fn from(c: Callable) -> Self {
        Self::Callable(c)
    }
}

impl From<Arc<dyn Object>> for Value {
    fn from(o: Arc<dyn Object>) -> Self {
        Self::Object(o)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSON interop (feature = "serde")
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "serde")]
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::None,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::None),
            serde_json::Value::String(s) => Self::Str(s),
            serde_json::Value::Array(items) => Self::list(items),
            serde_json::Value::Object(entries) => Self::map(entries),
        }
    }
}

#[cfg(feature = "serde")]
impl Value {
    /// Render as JSON. Callables and objects render as descriptive strings;
    /// non-finite floats render as `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::None => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Str(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(m) => serde_json::Value::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Self::Callable(c) => serde_json::Value::String(format!("<callable {}>", c.name())),
            Self::Object(o) => serde_json::Value::String(format!("<{}>", o.type_name())),
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&self.to_json(), serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        <serde_json::Value as serde::Deserialize>::deserialize(deserializer).map(Self::from)
    }
}
