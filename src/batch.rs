use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::datatypes::{Schema, SchemaError, ShardId};
use crate::record::Row;
use crate::slice;

/// The column a row may carry to restate which shard it belongs to.
pub const SHARD_ID_COLUMN: &str = "shard_id";

const PREVIEW_ROWS: usize = 2;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum BatchError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("cannot combine shard `{actual}` with shard `{expected}`")]
    ShardMismatch { expected: ShardId, actual: ShardId },
    #[error("row {row} has shard id {actual}, expected `{expected}`")]
    RowShardMismatch {
        row: usize,
        expected: ShardId,
        actual: Value,
    },
    #[error("cannot combine schema {actual:?} with schema {expected:?}")]
    IncompatibleSchema {
        expected: Vec<String>,
        actual: Vec<String>,
    },
    #[error("index {index} out of range for a batch of {len} rows")]
    OutOfRange { index: isize, len: usize },
    #[error("slice step must not be zero")]
    ZeroStep,
}

/// An immutable batch of rows that all belong to the same shard and match
/// the same schema.
///
/// The shard id and schema are properties of the container, not of
/// individual rows; an empty batch still carries both. No method mutates a
/// batch after construction, so one instance can be read from any number of
/// threads at once, and every combining operation returns a new batch.
#[derive(Clone, Debug, PartialEq)]
pub struct ShardBatch {
    shard_id: ShardId,
    schema: Arc<Schema>,
    rows: Vec<Row>,
}

impl ShardBatch {
    /// Creates a new `ShardBatch` after validating every row against
    /// `schema`, failing on the first violation.
    ///
    /// The batch takes ownership of `rows`, so no caller-side handle can
    /// alter them after construction.
    ///
    /// # Errors
    ///
    /// Returns an error if a row's column set differs from the schema's, or
    /// if the schema defines a `shard_id` column and a row's value there is
    /// not `shard_id`.
    pub fn new<S>(shard_id: S, schema: Arc<Schema>, rows: Vec<Row>) -> Result<Self, BatchError>
    where
        S: Into<ShardId>,
    {
        let shard_id = shard_id.into();
        for (index, row) in rows.iter().enumerate() {
            schema.validate_row(index, row)?;
            check_row_shard(&shard_id, &schema, index, row)?;
        }
        Ok(Self {
            shard_id,
            schema,
            rows,
        })
    }

    /// Creates a batch with no rows that still carries a concrete shard id
    /// and schema.
    #[must_use]
    pub fn empty<S>(shard_id: S, schema: Arc<Schema>) -> Self
    where
        S: Into<ShardId>,
    {
        Self {
            shard_id: shard_id.into(),
            schema,
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn shard_id(&self) -> &ShardId {
        &self.shard_id
    }

    /// Returns the schema shared by every row in the batch.
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Returns the number of rows in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns `true` if a row equal to `row` is in the batch.
    #[must_use]
    pub fn contains(&self, row: &Row) -> bool {
        self.rows.iter().any(|r| r == row)
    }

    /// Returns the row at `index`; negative indices count from the end.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is outside `[-len, len)`.
    pub fn get(&self, index: isize) -> Result<&Row, BatchError> {
        let len = self.rows.len();
        let resolved = if index < 0 {
            index + len as isize
        } else {
            index
        };
        if resolved < 0 || resolved as usize >= len {
            return Err(BatchError::OutOfRange { index, len });
        }
        Ok(&self.rows[resolved as usize])
    }

    /// Returns a new batch holding the selected sub-sequence of rows.
    ///
    /// Bounds follow half-open slice conventions: a `None` bound selects
    /// from the corresponding end of the batch, negative bounds count from
    /// the end, and out-of-range bounds are clamped. The result keeps this
    /// batch's shard id and schema even when the selection is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if `step` is zero.
    pub fn slice(
        &self,
        start: Option<isize>,
        stop: Option<isize>,
        step: isize,
    ) -> Result<Self, BatchError> {
        if step == 0 {
            return Err(BatchError::ZeroStep);
        }
        let rows = slice::select(self.rows.len(), start, stop, step)
            .into_iter()
            .map(|i| self.rows[i].clone())
            .collect();
        Ok(Self {
            shard_id: self.shard_id.clone(),
            schema: Arc::clone(&self.schema),
            rows,
        })
    }

    /// Returns an iterator over the rows in stored order. Every call starts
    /// fresh; iterating neither consumes nor alters the batch.
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Returns every value of `column` in row order, or `None` if the
    /// schema does not define the column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        if !self.schema.contains(name) {
            return None;
        }
        Some(self.rows.iter().filter_map(|r| r.get(name)).collect())
    }

    /// Concatenates two batches of the same shard and schema into a new
    /// one, `self` rows first. Neither operand is altered.
    ///
    /// # Errors
    ///
    /// Returns an error if the shard ids differ, or if the schemas differ
    /// as ordered column sequences.
    pub fn merge(&self, other: &Self) -> Result<Self, BatchError> {
        if self.shard_id != other.shard_id {
            return Err(BatchError::ShardMismatch {
                expected: self.shard_id.clone(),
                actual: other.shard_id.clone(),
            });
        }
        if self.schema != other.schema {
            return Err(BatchError::IncompatibleSchema {
                expected: self.schema.columns().to_vec(),
                actual: other.schema.columns().to_vec(),
            });
        }
        let mut rows = Vec::with_capacity(self.rows.len() + other.rows.len());
        rows.extend_from_slice(&self.rows);
        rows.extend_from_slice(&other.rows);
        Ok(Self {
            shard_id: self.shard_id.clone(),
            schema: Arc::clone(&self.schema),
            rows,
        })
    }

    /// Appends raw rows to the batch, validating each one with exactly the
    /// construction rules. If any row fails, no new batch is produced.
    ///
    /// # Errors
    ///
    /// Returns an error naming the index within `raw_rows` of the first row
    /// whose columns or shard id do not match the batch.
    pub fn merge_rows(&self, raw_rows: Vec<Row>) -> Result<Self, BatchError> {
        for (index, row) in raw_rows.iter().enumerate() {
            self.schema.validate_row(index, row)?;
            check_row_shard(&self.shard_id, &self.schema, index, row)?;
        }
        let mut rows = Vec::with_capacity(self.rows.len() + raw_rows.len());
        rows.extend_from_slice(&self.rows);
        rows.extend(raw_rows);
        Ok(Self {
            shard_id: self.shard_id.clone(),
            schema: Arc::clone(&self.schema),
            rows,
        })
    }
}

fn check_row_shard(
    shard_id: &ShardId,
    schema: &Schema,
    index: usize,
    row: &Row,
) -> Result<(), BatchError> {
    if !schema.contains(SHARD_ID_COLUMN) {
        return Ok(());
    }
    match row.get(SHARD_ID_COLUMN) {
        Some(value) if !shard_id.matches(value) => Err(BatchError::RowShardMismatch {
            row: index,
            expected: shard_id.clone(),
            actual: value.clone(),
        }),
        _ => Ok(()),
    }
}

impl fmt::Display for ShardBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "ShardBatch(shard_id={}, rows={}, cols={})",
            self.shard_id,
            self.rows.len(),
            self.schema
        )?;
        for row in self.rows.iter().take(PREVIEW_ROWS) {
            writeln!(f, "  {}", row)?;
        }
        if self.rows.len() > PREVIEW_ROWS {
            writeln!(f, "  ... ({} more rows)", self.rows.len() - PREVIEW_ROWS)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ShardBatch {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
