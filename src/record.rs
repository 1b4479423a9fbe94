//! A single record whose fields correspond one-to-one with a schema's
//! columns.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::iter::FromIterator;

/// An ordered mapping from column names to values.
///
/// Fields keep their insertion order, so a row built in schema order stays
/// aligned with the schema. Two rows are equal when they hold the same
/// columns with equal values, regardless of field order.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row {
    fields: Map<String, Value>,
}

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self { fields: Map::new() }
    }

    /// Wraps a JSON value in a `Row`, or returns `None` if the value is not
    /// an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Sets `column` to `value`, keeping the column's position if it is
    /// already present.
    pub fn set<K, V>(&mut self, column: K, value: V)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.fields.insert(column.into(), value.into());
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.fields.remove(column)
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    #[must_use]
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.fields.get(column)?.as_str()
    }

    #[must_use]
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.fields.get(column)?.as_i64()
    }

    #[must_use]
    pub fn get_f64(&self, column: &str) -> Option<f64> {
        self.fields.get(column)?.as_f64()
    }

    #[must_use]
    pub fn get_bool(&self, column: &str) -> Option<bool> {
        self.fields.get(column)?.as_bool()
    }

    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    /// Returns the row's column names in field order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Returns the number of fields in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (column, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "\"{}\": {}", column, value)?;
        }
        write!(f, "}}")
    }
}

impl From<Map<String, Value>> for Row {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn columns_follow_insertion_order() {
        let mut row = Row::new();
        row.set("b", 2);
        row.set("a", 1);
        assert_eq!(row.columns().collect::<Vec<_>>(), ["b", "a"]);

        row.set("b", 20);
        assert_eq!(row.columns().collect::<Vec<_>>(), ["b", "a"]);
        assert_eq!(row.get_i64("b"), Some(20));

        assert_eq!(row.remove("b"), Some(json!(20)));
        assert_eq!(row.columns().collect::<Vec<_>>(), ["a"]);
        assert!(!row.has_column("b"));
    }

    #[test]
    fn from_value_requires_an_object() {
        assert!(Row::from_value(json!({"a": 1})).is_some());
        assert!(Row::from_value(json!([1, 2])).is_none());
        assert!(Row::from_value(json!("a")).is_none());
    }

    #[test]
    fn typed_getters() {
        let row = Row::from_value(json!({
            "name": "u1",
            "count": 3,
            "ratio": 0.5,
            "seen": true,
        }))
        .expect("object");
        assert_eq!(row.get_str("name"), Some("u1"));
        assert_eq!(row.get_i64("count"), Some(3));
        assert_eq!(row.get_f64("ratio"), Some(0.5));
        assert_eq!(row.get_bool("seen"), Some(true));
        assert_eq!(row.get_str("count"), None);
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn equality_ignores_field_order() {
        let a = Row::from_value(json!({"a": 1, "b": 2})).expect("object");
        let b = Row::from_value(json!({"b": 2, "a": 1})).expect("object");
        assert_eq!(a, b);

        let c = Row::from_value(json!({"a": 1, "b": 3})).expect("object");
        assert_ne!(a, c);
    }

    #[test]
    fn display_renders_fields_in_order() {
        let row: Row = vec![("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(row.to_string(), r#"{"a": 1, "b": 2}"#);
    }
}
