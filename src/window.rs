//! Batches of timestamped rows restricted to a half-open event-time window.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::datatypes::{Schema, SchemaError};
use crate::record::Row;
use crate::slice;

/// The event-time column every windowed row must carry.
pub const TIMESTAMP_COLUMN: &str = "timestamp";

const PREVIEW_ROWS: usize = 2;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum WindowError {
    #[error("schema must include a `timestamp` column")]
    MissingTimestampColumn,
    #[error("window start {start} must be less than window end {end}")]
    InvalidBounds { start: i64, end: i64 },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("row {row} is missing the `timestamp` column")]
    MissingTimestamp { row: usize },
    #[error("row {row} has a timestamp that is not a number or an RFC 3339 string")]
    InvalidTimestamp { row: usize },
    #[error("row {row} timestamp {timestamp} is outside [{start}, {end})")]
    OutOfWindow {
        row: usize,
        timestamp: i64,
        start: i64,
        end: i64,
    },
    #[error("cannot combine window [{actual_start}, {actual_end}) with window [{start}, {end})")]
    WindowMismatch {
        start: i64,
        end: i64,
        actual_start: i64,
        actual_end: i64,
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

/// An immutable batch of timestamped rows restricted to the half-open
/// window `window_start <= t < window_end`, in UNIX seconds.
///
/// The event-time analogue of [`ShardBatch`](crate::ShardBatch): the window
/// bounds are a property of the container, shared with every derived slice
/// and merge result, and an empty batch still carries them. A `WindowBatch`
/// is windowed, not sharded; it has no shard id.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowBatch {
    window_start: i64,
    window_end: i64,
    schema: Arc<Schema>,
    rows: Vec<Row>,
}

impl WindowBatch {
    /// Creates a new `WindowBatch`, normalising every row's timestamp to
    /// UNIX seconds in the stored copy: integers pass through, floats
    /// truncate toward zero, and RFC 3339 strings are parsed.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema has no `timestamp` column, if the
    /// window bounds are not strictly increasing, or if a row is missing a
    /// readable timestamp, falls outside the window, or does not match the
    /// schema.
    pub fn new(
        window_start: i64,
        window_end: i64,
        schema: Arc<Schema>,
        rows: Vec<Row>,
    ) -> Result<Self, WindowError> {
        if !schema.contains(TIMESTAMP_COLUMN) {
            return Err(WindowError::MissingTimestampColumn);
        }
        if window_start >= window_end {
            return Err(WindowError::InvalidBounds {
                start: window_start,
                end: window_end,
            });
        }
        let mut normalized = Vec::with_capacity(rows.len());
        for (index, mut row) in rows.into_iter().enumerate() {
            let timestamp = match row.get(TIMESTAMP_COLUMN) {
                Some(value) => {
                    unix_seconds(value).ok_or(WindowError::InvalidTimestamp { row: index })?
                }
                None => return Err(WindowError::MissingTimestamp { row: index }),
            };
            if timestamp < window_start || timestamp >= window_end {
                return Err(WindowError::OutOfWindow {
                    row: index,
                    timestamp,
                    start: window_start,
                    end: window_end,
                });
            }
            row.set(TIMESTAMP_COLUMN, timestamp);
            schema.validate_row(index, &row)?;
            normalized.push(row);
        }
        Ok(Self {
            window_start,
            window_end,
            schema,
            rows: normalized,
        })
    }

    /// Creates a batch with no rows that still carries its window bounds
    /// and schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema has no `timestamp` column or the
    /// bounds are not strictly increasing.
    pub fn empty(
        window_start: i64,
        window_end: i64,
        schema: Arc<Schema>,
    ) -> Result<Self, WindowError> {
        Self::new(window_start, window_end, schema, Vec::new())
    }

    /// Returns the `(start, end)` event-time window, end exclusive.
    #[must_use]
    pub fn window_range(&self) -> (i64, i64) {
        (self.window_start, self.window_end)
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
    pub fn get(&self, index: isize) -> Result<&Row, WindowError> {
        let len = self.rows.len();
        let resolved = if index < 0 {
            index + len as isize
        } else {
            index
        };
        if resolved < 0 || resolved as usize >= len {
            return Err(WindowError::OutOfRange { index, len });
        }
        Ok(&self.rows[resolved as usize])
    }

    /// Returns a new batch holding the selected sub-sequence of rows, with
    /// the window bounds and schema propagated from this batch even when
    /// the selection is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if `step` is zero.
    pub fn slice(
        &self,
        start: Option<isize>,
        stop: Option<isize>,
        step: isize,
    ) -> Result<Self, WindowError> {
        if step == 0 {
            return Err(WindowError::ZeroStep);
        }
        let rows = slice::select(self.rows.len(), start, stop, step)
            .into_iter()
            .map(|i| self.rows[i].clone())
            .collect();
        Ok(Self {
            window_start: self.window_start,
            window_end: self.window_end,
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

    /// Concatenates two batches over the same window and schema into a new
    /// one, `self` rows first. Neither operand is altered.
    ///
    /// # Errors
    ///
    /// Returns an error if the window ranges differ, or if the schemas
    /// differ as ordered column sequences.
    pub fn merge(&self, other: &Self) -> Result<Self, WindowError> {
        if self.window_range() != other.window_range() {
            return Err(WindowError::WindowMismatch {
                start: self.window_start,
                end: self.window_end,
                actual_start: other.window_start,
                actual_end: other.window_end,
            });
        }
        if self.schema != other.schema {
            return Err(WindowError::IncompatibleSchema {
                expected: self.schema.columns().to_vec(),
                actual: other.schema.columns().to_vec(),
            });
        }
        let mut rows = Vec::with_capacity(self.rows.len() + other.rows.len());
        rows.extend_from_slice(&self.rows);
        rows.extend_from_slice(&other.rows);
        Ok(Self {
            window_start: self.window_start,
            window_end: self.window_end,
            schema: Arc::clone(&self.schema),
            rows,
        })
    }
}

/// Normalises a timestamp value to UNIX seconds.
fn unix_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|secs| secs as i64)),
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.timestamp()),
        _ => None,
    }
}

impl fmt::Display for WindowBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "WindowBatch(start={}, end={}, rows={}, cols={})",
            self.window_start,
            self.window_end,
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

impl<'a> IntoIterator for &'a WindowBatch {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
