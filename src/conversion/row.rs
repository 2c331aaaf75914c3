//! Single row conversion against a processing schema.

use super::transform::{
    CHECKPOINT_COLUMN_NAME, INSERT_OP_CODE, OP_COLUMN_NAME, TIMESTAMP_COLUMN_NAME,
};
use super::{ConversionOutcome, Record};
use crate::error::{Error, Result};
use crate::schema::{BasicType, FieldType, Schema};
use apache_avro::types::Value;
use chrono::{DateTime, Utc};
use std::fmt::Display;
use tracing::debug;

/// `chrono` format of the ingestion timestamp, e.g. `2024-03-01 09:15:02.123456`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Source of the ingestion instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Render `instant` in UTC with microsecond precision.
#[must_use]
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format(TIMESTAMP_FORMAT).to_string()
}

enum Slot<'s> {
    OpCode,
    Timestamp,
    Checkpoint,
    Data(&'s FieldType),
}

struct Column<'s> {
    name: &'s str,
    slot: Slot<'s>,
}

/// Converts raw rows into [`Record`]s for one processing schema.
///
/// Construction checks the schema once: it must contain the `Op`, `_timestamp`
/// and `checkpoint_col` fields, and every field must be a union of `null` and
/// exactly one other non-union type. Data fields take cells from the row in
/// order; cells past the last data field are ignored and missing cells read as
/// empty.
pub struct RowConverter<'s> {
    columns: Vec<Column<'s>>,
    data_fields: usize,
    clock: &'s dyn Clock,
}

impl<'s> RowConverter<'s> {
    /// # Errors
    ///
    /// Returns [`Error::InvalidProcessingSchema`] if `schema` was not produced
    /// by [`to_processing_schema`](super::to_processing_schema) or has the same shape.
    pub fn new(schema: &'s Schema, clock: &'s dyn Clock) -> Result<Self> {
        for required in [OP_COLUMN_NAME, TIMESTAMP_COLUMN_NAME, CHECKPOINT_COLUMN_NAME] {
            if schema.field(required).is_none() {
                return Err(Error::InvalidProcessingSchema(format!(
                    "schema is missing required field {required}"
                )));
            }
        }

        let mut columns = Vec::with_capacity(schema.fields.len());
        for field in &schema.fields {
            let Some(branch) = field.field_type.non_null_branch() else {
                return Err(Error::InvalidProcessingSchema(format!(
                    "field {} must be a union of null and one other type, found {}",
                    field.name, field.field_type
                )));
            };
            if matches!(branch, FieldType::Union(_)) {
                return Err(Error::InvalidProcessingSchema(format!(
                    "field {} has a union nested inside a union: {}",
                    field.name, field.field_type
                )));
            }
            let slot = match field.name.as_str() {
                OP_COLUMN_NAME => Slot::OpCode,
                TIMESTAMP_COLUMN_NAME => Slot::Timestamp,
                CHECKPOINT_COLUMN_NAME => Slot::Checkpoint,
                _ => Slot::Data(branch),
            };
            columns.push(Column {
                name: &field.name,
                slot,
            });
        }
        let data_fields = columns
            .iter()
            .filter(|c| matches!(c.slot, Slot::Data(_)))
            .count();

        Ok(Self {
            columns,
            data_fields,
            clock,
        })
    }

    /// Number of schema fields that take their value from a row cell.
    #[must_use]
    pub const fn data_fields(&self) -> usize {
        self.data_fields
    }

    /// Convert one row.
    ///
    /// Returns [`ConversionOutcome::Discarded`] if every cell is empty, the
    /// first parse failure as [`ConversionOutcome::TypeMismatch`] or
    /// [`ConversionOutcome::UnsupportedType`], and otherwise the accepted record.
    #[must_use]
    pub fn convert(&self, row: &[String]) -> ConversionOutcome {
        if row.iter().all(String::is_empty) {
            debug!(cells = row.len(), "discarding empty row");
            return ConversionOutcome::Discarded;
        }

        let timestamp = format_timestamp(self.clock.now());
        let mut cells = row.iter().map(String::as_str);
        let mut fields = Vec::with_capacity(self.columns.len());

        for column in &self.columns {
            let value = match column.slot {
                Slot::OpCode => Value::String(INSERT_OP_CODE.to_string()),
                Slot::Timestamp => Value::String(timestamp.clone()),
                Slot::Checkpoint => Value::Null,
                Slot::Data(field_type) => {
                    let cell = cells.next().unwrap_or("");
                    match parse_cell(column.name, field_type, cell) {
                        Ok(value) => value,
                        Err(outcome) => return outcome,
                    }
                }
            };
            fields.push((column.name.to_string(), value));
        }

        ConversionOutcome::Accepted(Record::new(fields))
    }
}

fn mismatch(field: &str, field_type: BasicType, err: impl Display) -> ConversionOutcome {
    ConversionOutcome::TypeMismatch {
        field: field.to_string(),
        message: format!("{field} could not be converted to {field_type}: {err}"),
    }
}

fn parse_cell(
    field: &str,
    field_type: &FieldType,
    cell: &str,
) -> std::result::Result<Value, ConversionOutcome> {
    if cell.is_empty() {
        return Ok(Value::Null);
    }
    let FieldType::Basic(basic) = field_type else {
        return Err(ConversionOutcome::UnsupportedType {
            field: field.to_string(),
            message: format!("type {field_type} is not supported for field {field}"),
        });
    };
    let basic = *basic;
    let value = match basic {
        BasicType::String => Value::String(cell.to_string()),
        BasicType::Int => Value::Int(cell.parse().map_err(|e| mismatch(field, basic, e))?),
        BasicType::Long => Value::Long(cell.parse().map_err(|e| mismatch(field, basic, e))?),
        BasicType::Float => Value::Float(cell.parse().map_err(|e| mismatch(field, basic, e))?),
        BasicType::Double => Value::Double(cell.parse().map_err(|e| mismatch(field, basic, e))?),
        BasicType::Boolean => match cell {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            other => {
                return Err(mismatch(
                    field,
                    basic,
                    format!("expected 'true' or 'false', found '{other}'"),
                ));
            }
        },
        BasicType::Uuid => Value::String(cell.to_string()),
        // Logical types take the raw count of their primitive.
        BasicType::Date => Value::Date(cell.parse().map_err(|e| mismatch(field, basic, e))?),
        BasicType::TimeMillis => {
            Value::TimeMillis(cell.parse().map_err(|e| mismatch(field, basic, e))?)
        }
        BasicType::TimeMicros => {
            Value::TimeMicros(cell.parse().map_err(|e| mismatch(field, basic, e))?)
        }
        BasicType::TimestampMillis => {
            Value::TimestampMillis(cell.parse().map_err(|e| mismatch(field, basic, e))?)
        }
        BasicType::TimestampMicros => {
            Value::TimestampMicros(cell.parse().map_err(|e| mismatch(field, basic, e))?)
        }
        BasicType::TimestampNanos => {
            Value::TimestampNanos(cell.parse().map_err(|e| mismatch(field, basic, e))?)
        }
        BasicType::LocalTimestampMillis => {
            Value::LocalTimestampMillis(cell.parse().map_err(|e| mismatch(field, basic, e))?)
        }
        BasicType::LocalTimestampMicros => {
            Value::LocalTimestampMicros(cell.parse().map_err(|e| mismatch(field, basic, e))?)
        }
        BasicType::LocalTimestampNanos => {
            Value::LocalTimestampNanos(cell.parse().map_err(|e| mismatch(field, basic, e))?)
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::to_processing_schema;
    use crate::schema::Field;
    use chrono::TimeZone;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 3, 1, 9, 15, 2).unwrap())
    }

    fn schema(fields: &[(&str, BasicType)]) -> Schema {
        let fields = fields
            .iter()
            .map(|(n, t)| Field::new(*n, FieldType::Basic(*t)))
            .collect();
        to_processing_schema(&Schema::new("test", fields))
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| (*c).to_string()).collect()
    }

    #[test]
    fn test_accepts_all_basic_types() {
        let schema = schema(&[
            ("s", BasicType::String),
            ("i", BasicType::Int),
            ("l", BasicType::Long),
            ("f", BasicType::Float),
            ("d", BasicType::Double),
            ("b", BasicType::Boolean),
            ("ts", BasicType::TimestampMillis),
        ]);
        let clock = clock();
        let converter = RowConverter::new(&schema, &clock).unwrap();
        let outcome = converter.convert(&row(&["a", "-1", "9000000000", "1.5", "2.25", "true", "17"]));
        let ConversionOutcome::Accepted(record) = outcome else {
            panic!("expected accepted, got {outcome:?}");
        };
        assert_eq!(
            record.values().cloned().collect::<Vec<_>>(),
            vec![
                Value::String("I".into()),
                Value::String("2024-03-01 09:15:02.000000".into()),
                Value::String("a".into()),
                Value::Int(-1),
                Value::Long(9_000_000_000),
                Value::Float(1.5),
                Value::Double(2.25),
                Value::Boolean(true),
                Value::TimestampMillis(17),
                Value::Null,
            ]
        );
    }

    #[test]
    fn test_empty_row_is_discarded() {
        let schema = schema(&[("a", BasicType::Int)]);
        let clock = clock();
        let converter = RowConverter::new(&schema, &clock).unwrap();
        assert_eq!(converter.convert(&row(&["", "", ""])), ConversionOutcome::Discarded);
        assert_eq!(converter.convert(&[]), ConversionOutcome::Discarded);
    }

    #[test]
    fn test_type_mismatch_stops_at_first_bad_field() {
        let schema = schema(&[("a", BasicType::Int), ("b", BasicType::Boolean)]);
        let clock = clock();
        let converter = RowConverter::new(&schema, &clock).unwrap();
        match converter.convert(&row(&["x", "maybe"])) {
            ConversionOutcome::TypeMismatch { field, message } => {
                assert_eq!(field, "a");
                assert!(message.starts_with("a could not be converted to int"));
            }
            other => panic!("unexpected {other:?}"),
        }
        match converter.convert(&row(&["1", "True"])) {
            ConversionOutcome::TypeMismatch { field, .. } => assert_eq!(field, "b"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_int_width_is_enforced() {
        let schema = schema(&[("a", BasicType::Int)]);
        let clock = clock();
        let converter = RowConverter::new(&schema, &clock).unwrap();
        assert!(converter.convert(&row(&["2147483648"])).is_failure());
        assert!(converter.convert(&row(&["1.0"])).is_failure());
        assert!(!converter.convert(&row(&["+7"])).is_failure());
    }

    #[test]
    fn test_unsupported_type() {
        let mut registered = Schema::new("t", vec![Field::new("n", FieldType::Basic(BasicType::Int))]);
        registered
            .fields
            .push(Field::new("tags", FieldType::Unsupported(serde_json::json!({"type": "array", "items": "string"}))));
        let schema = to_processing_schema(&registered);
        let clock = clock();
        let converter = RowConverter::new(&schema, &clock).unwrap();
        match converter.convert(&row(&["1", "x"])) {
            ConversionOutcome::UnsupportedType { field, .. } => assert_eq!(field, "tags"),
            other => panic!("unexpected {other:?}"),
        }
        // empty cell is null whatever the type
        assert!(matches!(
            converter.convert(&row(&["1", ""])),
            ConversionOutcome::Accepted(_)
        ));
    }

    #[test]
    fn test_ragged_rows() {
        let schema = schema(&[("a", BasicType::String), ("b", BasicType::Int)]);
        let clock = clock();
        let converter = RowConverter::new(&schema, &clock).unwrap();

        let ConversionOutcome::Accepted(long) = converter.convert(&row(&["x", "1", "extra", "more"]))
        else {
            panic!("long row rejected");
        };
        assert_eq!(long.len(), 5);
        assert_eq!(long.get("b"), Some(&Value::Int(1)));
        assert_eq!(long.get("checkpoint_col"), Some(&Value::Null));

        let ConversionOutcome::Accepted(short) = converter.convert(&row(&["x"])) else {
            panic!("short row rejected");
        };
        assert_eq!(short.get("a"), Some(&Value::String("x".into())));
        assert_eq!(short.get("b"), Some(&Value::Null));
    }

    #[test]
    fn test_precondition_checked_on_construction() {
        let clock = clock();
        let raw = Schema::new("t", vec![Field::new("a", FieldType::nullable(FieldType::Basic(BasicType::Int)))]);
        assert!(matches!(
            RowConverter::new(&raw, &clock),
            Err(Error::InvalidProcessingSchema(_))
        ));

        let mut bad = to_processing_schema(&raw);
        bad.fields[2].field_type = FieldType::Basic(BasicType::Int);
        assert!(matches!(
            RowConverter::new(&bad, &clock),
            Err(Error::InvalidProcessingSchema(_))
        ));

        bad.fields[2].field_type = FieldType::Union(vec![
            FieldType::Null,
            FieldType::Basic(BasicType::Int),
            FieldType::Basic(BasicType::String),
        ]);
        assert!(RowConverter::new(&bad, &clock).is_err());
    }

    #[test]
    fn test_union_without_null_is_rejected() {
        let clock = clock();
        let registered = Schema::new(
            "t",
            vec![Field::new(
                "a",
                FieldType::Union(vec![
                    FieldType::Basic(BasicType::String),
                    FieldType::Basic(BasicType::Int),
                ]),
            )],
        );
        let schema = to_processing_schema(&registered);
        match RowConverter::new(&schema, &clock) {
            Err(err @ Error::InvalidProcessingSchema(_)) => assert!(err.is_configuration()),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("nested union accepted"),
        }
    }

    #[test]
    fn test_logical_types_use_their_primitive() {
        let schema = schema(&[
            ("day", BasicType::Date),
            ("at_ms", BasicType::TimeMillis),
            ("at_us", BasicType::TimeMicros),
            ("ns", BasicType::TimestampNanos),
            ("local_ms", BasicType::LocalTimestampMillis),
            ("local_us", BasicType::LocalTimestampMicros),
            ("local_ns", BasicType::LocalTimestampNanos),
            ("id", BasicType::Uuid),
        ]);
        let clock = clock();
        let converter = RowConverter::new(&schema, &clock).unwrap();
        let uuid = "8c3f3a2e-1b1c-4c53-9a55-6f0e0b8f1d2a";
        let ConversionOutcome::Accepted(record) = converter.convert(&row(&[
            "19000", "3600000", "1500", "7", "8", "9", "10", uuid,
        ])) else {
            panic!("logical types rejected");
        };
        assert_eq!(record.get("day"), Some(&Value::Date(19000)));
        assert_eq!(record.get("at_ms"), Some(&Value::TimeMillis(3_600_000)));
        assert_eq!(record.get("at_us"), Some(&Value::TimeMicros(1500)));
        assert_eq!(record.get("ns"), Some(&Value::TimestampNanos(7)));
        assert_eq!(record.get("local_ms"), Some(&Value::LocalTimestampMillis(8)));
        assert_eq!(record.get("local_us"), Some(&Value::LocalTimestampMicros(9)));
        assert_eq!(record.get("local_ns"), Some(&Value::LocalTimestampNanos(10)));
        assert_eq!(record.get("id"), Some(&Value::String(uuid.into())));

        match converter.convert(&row(&["2024-01-01"])) {
            ConversionOutcome::TypeMismatch { field, message } => {
                assert_eq!(field, "day");
                assert!(message.contains("date"), "{message}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_timestamp_has_microseconds() {
        let instant = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap()
            + chrono::Duration::microseconds(42);
        assert_eq!(format_timestamp(instant), "2023-12-31 23:59:59.000042");
    }
}
