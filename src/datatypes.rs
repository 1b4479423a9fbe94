use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::TryFrom;
use std::fmt;
use thiserror::Error;

use crate::record::Row;

/// A structural problem with a schema, or a row that does not line up with
/// one.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SchemaError {
    #[error("schema must contain at least one column")]
    Empty,
    #[error("duplicate column `{0}` in schema")]
    DuplicateColumn(String),
    #[error(
        "row {row} does not match schema: missing columns {missing:?}, \
         unexpected columns {unexpected:?}"
    )]
    RowMismatch {
        row: usize,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
}

/// The ordered, duplicate-free list of column names that every row in a
/// batch must match exactly.
///
/// A `Schema` is validated once, at construction, and never mutated; batches
/// share one schema by reference with every slice and merge result derived
/// from them.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(into = "Vec<String>", try_from = "Vec<String>")]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    /// Creates a new `Schema` from an ordered sequence of column names.
    ///
    /// # Errors
    ///
    /// Returns an error if `columns` is empty or contains a duplicate name.
    pub fn new<I, S>(columns: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(SchemaError::Empty);
        }
        if let Some(dup) = columns.iter().duplicates().next() {
            return Err(SchemaError::DuplicateColumn(dup.clone()));
        }
        Ok(Self { columns })
    }

    /// Returns the column names in schema order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of columns in the schema.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns `true` if `name` is one of the schema's columns.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Returns the position of `name` in the schema.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Checks that `row`'s column set equals this schema's exactly, with no
    /// missing and no extra columns.
    ///
    /// # Errors
    ///
    /// Returns an error naming `row_index` and the symmetric difference of
    /// the two column sets.
    pub fn validate_row(&self, row_index: usize, row: &Row) -> Result<(), SchemaError> {
        let missing: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !row.has_column(c))
            .cloned()
            .collect();
        let unexpected: Vec<String> = row
            .columns()
            .filter(|c| !self.contains(c))
            .map(str::to_owned)
            .collect();
        if missing.is_empty() && unexpected.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::RowMismatch {
                row: row_index,
                missing,
                unexpected,
            })
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.columns.iter().join(", "))
    }
}

impl TryFrom<Vec<String>> for Schema {
    type Error = SchemaError;

    fn try_from(columns: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(columns)
    }
}

impl From<Schema> for Vec<String> {
    fn from(schema: Schema) -> Self {
        schema.columns
    }
}

/// An opaque identifier of the shard a batch of rows belongs to.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ShardId {
    Int(i64),
    Text(String),
}

impl ShardId {
    /// Returns `true` if `value` denotes this shard id.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Int(id), Value::Number(n)) => n.as_i64() == Some(*id),
            (Self::Text(id), Value::String(s)) => id == s,
            _ => false,
        }
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(x) => write!(f, "{}", x),
            Self::Text(x) => write!(f, "{}", x),
        }
    }
}

impl From<i64> for ShardId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<&str> for ShardId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl From<String> for ShardId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_preserves_column_order() {
        let schema = Schema::new(vec!["ts", "user_id", "value"]).expect("unique columns");
        assert_eq!(schema.columns(), ["ts", "user_id", "value"]);
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.index_of("user_id"), Some(1));
        assert!(schema.contains("value"));
        assert!(!schema.contains("missing"));
    }

    #[test]
    fn schema_rejects_duplicate_column() {
        assert_eq!(
            Schema::new(vec!["a", "b", "a"]),
            Err(SchemaError::DuplicateColumn("a".to_string()))
        );
    }

    #[test]
    fn schema_rejects_empty_column_list() {
        assert_eq!(Schema::new(Vec::<String>::new()), Err(SchemaError::Empty));
    }

    #[test]
    fn validate_row_reports_symmetric_difference() {
        let schema = Schema::new(vec!["a", "b"]).expect("unique columns");
        let row = Row::from_value(json!({"a": 1, "c": 3})).expect("object");
        assert_eq!(
            schema.validate_row(7, &row),
            Err(SchemaError::RowMismatch {
                row: 7,
                missing: vec!["b".to_string()],
                unexpected: vec!["c".to_string()],
            })
        );

        let row = Row::from_value(json!({"a": 1, "b": 2})).expect("object");
        assert_eq!(schema.validate_row(7, &row), Ok(()));
    }

    #[test]
    fn schema_serde_round_trip() {
        let schema = Schema::new(vec!["a", "b"]).expect("unique columns");
        let encoded = serde_json::to_string(&schema).expect("serializable");
        assert_eq!(encoded, r#"["a","b"]"#);
        let decoded: Schema = serde_json::from_str(&encoded).expect("valid schema");
        assert_eq!(decoded, schema);

        assert!(serde_json::from_str::<Schema>(r#"["a","a"]"#).is_err());
    }

    #[test]
    fn shard_id_matches_row_values() {
        let text = ShardId::from("s1");
        assert!(text.matches(&json!("s1")));
        assert!(!text.matches(&json!("s2")));
        assert!(!text.matches(&json!(1)));

        let int = ShardId::from(3_i64);
        assert!(int.matches(&json!(3)));
        assert!(!int.matches(&json!(4)));
        assert!(!int.matches(&json!("3")));
    }

    #[test]
    fn shard_id_display() {
        assert_eq!(ShardId::from("s1").to_string(), "s1");
        assert_eq!(ShardId::from(42_i64).to_string(), "42");
    }
}
