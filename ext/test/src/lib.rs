//! omatch-test: Test domain for conformance testing
//!
//! Provides a simple user-defined object type for exercising patterns against
//! something other than plain maps, plus YAML fixture runners (feature
//! `fixtures`).
//!
//! # Example
//!
//! ```
//! use omatch_test::prelude::*;
//!
//! // Record is a typed bag of attributes
//! let user = Record::new("User")
//!     .with("name", "alice")
//!     .with("role", "admin")
//!     .into_value();
//!
//! let pattern = Pattern::new()
//!     .rule("obj", Rule::new().check(Predicate::is_type("User")))
//!     .rule("obj.role", Rule::new().bind_value("role"));
//! let m = pattern.matches(&user).unwrap();
//! assert_eq!(m.get("role"), Some(&Value::from("admin")));
//! ```

use omatch::{Object, Value};
use std::any::Any;
use std::collections::BTreeMap;

#[cfg(feature = "fixtures")]
pub mod fixture;
#[cfg(feature = "fixtures")]
pub mod scope_fixture;

/// A typed record: a type name plus named attributes.
///
/// Attributes are reachable with `.name` steps and, like map keys, with
/// `['name']` subscripts.
#[derive(Debug, Clone, Default)]
pub struct Record {
    type_name: String,
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Create an empty record of the given type.
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add an attribute (builder pattern).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Get an attribute.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Wrap as a [`Value::Object`].
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::object(self)
    }
}

impl Object for Record {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn attr(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    fn item(&self, key: &Value) -> Option<Value> {
        key.as_str().and_then(|k| self.fields.get(k).cloned())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::Record;
    pub use omatch::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::*;
    use omatch::prelude::*;

    #[test]
    fn record_builder() {
        let r = Record::new("Point").with("x", 1).with("y", 2);
        assert_eq!(r.get("x"), Some(&Value::from(1)));
        assert_eq!(r.get("z"), None);
    }

    #[test]
    fn record_attributes_and_items() {
        let v = Record::new("Point").with("x", 1).into_value();
        assert_eq!(v.type_name(), "Point");
        assert_eq!(v.attr("x").unwrap(), Value::from(1));
        assert_eq!(v.item(&Value::from("x")).unwrap(), Value::from(1));
        assert_eq!(v.attr("type").unwrap(), Value::from("Point"));
        assert!(v.attr("z").is_err());
        assert!(v.item(&Value::from(0)).is_err());
    }

    #[test]
    fn records_compare_by_identity() {
        let a = Record::new("T").into_value();
        let b = Record::new("T").into_value();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn full_pattern_over_records() {
        let subject = Record::new("Order")
            .with("id", 42)
            .with("items", Value::list([Record::new("Item").with("sku", "A-1").into_value()]))
            .into_value();

        let pattern = Pattern::new()
            .rule("obj", Rule::new().check(Predicate::is_type("Order")))
            .rule("obj.items[0].sku", Rule::new().check(Predicate::prefix("A-")).bind_value("sku"))
            .rule("obj['id']", Rule::new().bind_value("id"));

        let m = pattern.matches(&subject).unwrap();
        assert_eq!(m.get("sku"), Some(&Value::from("A-1")));
        assert_eq!(m.get("id"), Some(&Value::from(42)));
        assert!(pattern.matches(&Record::new("Cart").into_value()).is_none());
    }
}
