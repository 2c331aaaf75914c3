//! Schema-driven conversion of untyped rows into typed, columnar output.
//!
//! Three layers, each only calling the one below it:
//!
//! 1. [`to_processing_schema`] derives the *processing schema* from a registered
//!    schema: every field becomes a nullable union, and the synthetic `Op`,
//!    `_timestamp` and `checkpoint_col` columns are injected.
//! 2. [`RowConverter`] turns one raw [`Row`](crate::Row) into exactly one
//!    [`ConversionOutcome`].
//! 3. [`encode_rows`] drives the converter over a whole file and streams the
//!    accepted [`Record`]s into a Parquet buffer, or stops at the first bad row
//!    with a [`BatchOutcome::Failed`].
//!
//! Per-row data problems are values, not errors. Only broken preconditions and
//! encoder failures surface as [`Error`](crate::Error).

mod encoder;
mod row;
mod transform;

pub use encoder::{
    BatchEncoder, DEFAULT_BATCH_SIZE, PARQUET_AVRO_SCHEMA_KEY, arrow_schema, encode_rows,
    read_parquet_records,
};
pub use row::{Clock, FixedClock, RowConverter, SystemClock, TIMESTAMP_FORMAT, format_timestamp};
pub use transform::{
    CHECKPOINT_COLUMN_NAME, INSERT_OP_CODE, OP_COLUMN_NAME, TIMESTAMP_COLUMN_NAME,
    to_processing_schema,
};

use apache_avro::types::Value;
use std::fmt;

/// A typed row: one `(field name, value)` pair per processing-schema field, in
/// schema order. Absent values are [`Value::Null`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    #[must_use]
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        Self { fields }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Value of the field called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, v)| v)
    }

    #[must_use]
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    #[must_use]
    pub fn into_fields(self) -> Vec<(String, Value)> {
        self.fields
    }
}

/// The result of converting a single row. Exactly one per row.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionOutcome {
    Accepted(Record),
    /// The row was deliberately dropped (every cell empty).
    Discarded,
    /// A cell could not be parsed as its field's declared type.
    TypeMismatch { field: String, message: String },
    /// A non-empty cell belongs to a field whose type we cannot convert into.
    UnsupportedType { field: String, message: String },
}

impl ConversionOutcome {
    /// True for outcomes that must send the file to quarantine.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. } | Self::UnsupportedType { .. })
    }
}

impl fmt::Display for ConversionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted(record) => write!(f, "accepted ({} fields)", record.len()),
            Self::Discarded => f.write_str("discarded"),
            Self::TypeMismatch { message, .. } | Self::UnsupportedType { message, .. } => {
                f.write_str(message)
            }
        }
    }
}

/// The result of encoding one file's rows.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// Parquet bytes holding every accepted record, in row order.
    Encoded { bytes: Vec<u8>, records: usize },
    /// The batch stopped at `row` (zero-based, after header skipping).
    Failed {
        row: usize,
        outcome: ConversionOutcome,
    },
}
