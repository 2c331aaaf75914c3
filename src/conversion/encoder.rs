//! Parquet encoding of accepted records.
//!
//! This module provides:
//! - [`arrow_schema`] to map a processing schema onto an Arrow schema
//! - [`BatchEncoder`], which buffers [`Record`]s and writes them through
//!   `parquet::arrow::ArrowWriter` into an in-memory buffer
//! - [`encode_rows`], the per-file driver: convert every row, encode the
//!   accepted ones, stop at the first bad one
//! - [`read_parquet_records`] to decode produced bytes back into [`Record`]s
//!
//! Output is SNAPPY-compressed and carries the processing schema's Avro JSON
//! under the `parquet.avro.schema` metadata key.

use super::row::{Clock, RowConverter};
use super::transform::to_processing_schema;
use super::{BatchOutcome, ConversionOutcome, Record};
use crate::Row;
use crate::error::{Error, Result};
use crate::schema::{BasicType, FieldType, Schema};
use apache_avro::types::Value;
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanBuilder, Date32Builder, Float32Builder, Float64Builder,
    Int32Builder, Int64Builder, NullArray, StringBuilder, Time32MillisecondBuilder,
    Time64MicrosecondBuilder, TimestampMicrosecondBuilder, TimestampMillisecondBuilder,
    TimestampNanosecondBuilder,
};
use arrow::datatypes::{
    DataType, Date32Type, Field as ArrowField, Float32Type, Float64Type, Int32Type, Int64Type,
    Schema as ArrowSchema, SchemaRef, Time32MillisecondType, Time64MicrosecondType, TimeUnit,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use std::sync::Arc;
use tracing::debug;

/// Records buffered before a row batch is handed to the writer.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Parquet key/value metadata entry holding the Avro schema of the file.
pub const PARQUET_AVRO_SCHEMA_KEY: &str = "parquet.avro.schema";

const UTC: &str = "UTC";

fn data_type(field_type: &FieldType) -> DataType {
    match field_type.non_null_branch().unwrap_or(field_type) {
        FieldType::Basic(basic) => basic_data_type(*basic),
        // Only nulls can ever be accepted for these.
        FieldType::Null | FieldType::Union(_) | FieldType::Unsupported(_) => DataType::Null,
    }
}

fn basic_data_type(basic: BasicType) -> DataType {
    match basic {
        BasicType::String | BasicType::Uuid => DataType::Utf8,
        BasicType::Int => DataType::Int32,
        BasicType::Long => DataType::Int64,
        BasicType::Float => DataType::Float32,
        BasicType::Double => DataType::Float64,
        BasicType::Boolean => DataType::Boolean,
        BasicType::Date => DataType::Date32,
        BasicType::TimeMillis => DataType::Time32(TimeUnit::Millisecond),
        BasicType::TimeMicros => DataType::Time64(TimeUnit::Microsecond),
        BasicType::TimestampMillis => DataType::Timestamp(TimeUnit::Millisecond, Some(UTC.into())),
        BasicType::TimestampMicros => DataType::Timestamp(TimeUnit::Microsecond, Some(UTC.into())),
        BasicType::TimestampNanos => DataType::Timestamp(TimeUnit::Nanosecond, Some(UTC.into())),
        // Local timestamps carry no zone.
        BasicType::LocalTimestampMillis => DataType::Timestamp(TimeUnit::Millisecond, None),
        BasicType::LocalTimestampMicros => DataType::Timestamp(TimeUnit::Microsecond, None),
        BasicType::LocalTimestampNanos => DataType::Timestamp(TimeUnit::Nanosecond, None),
    }
}

/// Arrow schema for `schema`: one nullable column per field, in field order.
#[must_use]
pub fn arrow_schema(schema: &Schema) -> SchemaRef {
    let fields: Vec<ArrowField> = schema
        .fields
        .iter()
        .map(|f| ArrowField::new(&f.name, data_type(&f.field_type), true))
        .collect();
    Arc::new(ArrowSchema::new(fields))
}

fn unexpected(column: &str, expected: &DataType, found: &Value) -> Error {
    Error::Encode(format!(
        "column {column} expects {expected} but the record holds {found:?}"
    ))
}

macro_rules! build_column {
    ($builder:expr, $records:expr, $idx:expr, $name:expr, $dt:expr, $variant:path) => {{
        let mut builder = $builder;
        for record in $records {
            match value_at(record, $idx) {
                $variant(v) => builder.append_value(v.to_owned()),
                Value::Null => builder.append_null(),
                other => return Err(unexpected($name, $dt, other)),
            }
        }
        Arc::new(builder.finish()) as ArrayRef
    }};
}

fn value_at(record: &Record, idx: usize) -> &Value {
    record.fields().get(idx).map_or(&Value::Null, |(_, v)| v)
}

fn column(records: &[Record], idx: usize, field: &ArrowField) -> Result<ArrayRef> {
    let name = field.name().as_str();
    let dt = field.data_type();
    let n = records.len();
    let array = match dt {
        DataType::Utf8 => build_column!(StringBuilder::new(), records, idx, name, dt, Value::String),
        DataType::Int32 => {
            build_column!(Int32Builder::with_capacity(n), records, idx, name, dt, Value::Int)
        }
        DataType::Int64 => {
            build_column!(Int64Builder::with_capacity(n), records, idx, name, dt, Value::Long)
        }
        DataType::Float32 => {
            build_column!(Float32Builder::with_capacity(n), records, idx, name, dt, Value::Float)
        }
        DataType::Float64 => {
            build_column!(Float64Builder::with_capacity(n), records, idx, name, dt, Value::Double)
        }
        DataType::Boolean => build_column!(
            BooleanBuilder::with_capacity(n),
            records,
            idx,
            name,
            dt,
            Value::Boolean
        ),
        DataType::Date32 => {
            build_column!(Date32Builder::with_capacity(n), records, idx, name, dt, Value::Date)
        }
        DataType::Time32(TimeUnit::Millisecond) => build_column!(
            Time32MillisecondBuilder::with_capacity(n),
            records,
            idx,
            name,
            dt,
            Value::TimeMillis
        ),
        DataType::Time64(TimeUnit::Microsecond) => build_column!(
            Time64MicrosecondBuilder::with_capacity(n),
            records,
            idx,
            name,
            dt,
            Value::TimeMicros
        ),
        DataType::Timestamp(TimeUnit::Millisecond, Some(_)) => build_column!(
            TimestampMillisecondBuilder::with_capacity(n).with_timezone(UTC),
            records,
            idx,
            name,
            dt,
            Value::TimestampMillis
        ),
        DataType::Timestamp(TimeUnit::Microsecond, Some(_)) => build_column!(
            TimestampMicrosecondBuilder::with_capacity(n).with_timezone(UTC),
            records,
            idx,
            name,
            dt,
            Value::TimestampMicros
        ),
        DataType::Timestamp(TimeUnit::Nanosecond, Some(_)) => build_column!(
            TimestampNanosecondBuilder::with_capacity(n).with_timezone(UTC),
            records,
            idx,
            name,
            dt,
            Value::TimestampNanos
        ),
        DataType::Timestamp(TimeUnit::Millisecond, None) => build_column!(
            TimestampMillisecondBuilder::with_capacity(n),
            records,
            idx,
            name,
            dt,
            Value::LocalTimestampMillis
        ),
        DataType::Timestamp(TimeUnit::Microsecond, None) => build_column!(
            TimestampMicrosecondBuilder::with_capacity(n),
            records,
            idx,
            name,
            dt,
            Value::LocalTimestampMicros
        ),
        DataType::Timestamp(TimeUnit::Nanosecond, None) => build_column!(
            TimestampNanosecondBuilder::with_capacity(n),
            records,
            idx,
            name,
            dt,
            Value::LocalTimestampNanos
        ),
        DataType::Null => {
            if let Some(other) = records
                .iter()
                .map(|r| value_at(r, idx))
                .find(|v| !matches!(v, Value::Null))
            {
                return Err(unexpected(name, dt, other));
            }
            Arc::new(NullArray::new(n)) as ArrayRef
        }
        other => return Err(Error::Encode(format!("column {name} has unsupported type {other}"))),
    };
    Ok(array)
}

/// Streams records into an in-memory Parquet file.
pub struct BatchEncoder {
    schema: SchemaRef,
    writer: ArrowWriter<Vec<u8>>,
    pending: Vec<Record>,
    batch_size: usize,
    records: usize,
}

impl BatchEncoder {
    /// Open an encoder for records of `processing_schema`.
    ///
    /// # Errors
    ///
    /// Returns an error if the Parquet writer cannot be created.
    pub fn new(processing_schema: &Schema) -> Result<Self> {
        let schema = arrow_schema(processing_schema);
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .set_key_value_metadata(Some(vec![KeyValue::new(
                PARQUET_AVRO_SCHEMA_KEY.to_string(),
                processing_schema.to_avro_json().to_string(),
            )]))
            .build();
        let writer = ArrowWriter::try_new(Vec::new(), schema.clone(), Some(props))?;
        Ok(Self {
            schema,
            writer,
            pending: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            records: 0,
        })
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Records appended so far.
    #[must_use]
    pub const fn records(&self) -> usize {
        self.records
    }

    /// Queue `record`, writing a row batch once enough are buffered.
    ///
    /// # Errors
    ///
    /// Returns an error if a value does not fit its column or the write fails.
    pub fn append(&mut self, record: Record) -> Result<()> {
        self.pending.push(record);
        self.records += 1;
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let columns = self
            .schema
            .fields()
            .iter()
            .enumerate()
            .map(|(idx, field)| column(&self.pending, idx, field))
            .collect::<Result<Vec<_>>>()?;
        let batch = RecordBatch::try_new(self.schema.clone(), columns)?;
        debug!(rows = batch.num_rows(), "writing row batch");
        self.writer.write(&batch)?;
        self.pending.clear();
        Ok(())
    }

    /// Write any buffered records, close the file and return its bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the final write or the file footer fails.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.flush()?;
        Ok(self.writer.into_inner()?)
    }
}

/// Convert and encode every row of one file.
///
/// The registered `schema` is turned into the processing schema once. Accepted
/// records are encoded in row order and discarded rows are skipped. The first
/// type mismatch or unsupported type abandons the encoder and is returned as
/// [`BatchOutcome::Failed`].
///
/// # Errors
///
/// Returns an error only for encoder failures or an unusable schema, never for
/// bad row data.
pub fn encode_rows(schema: &Schema, rows: &[Row], clock: &dyn Clock) -> Result<BatchOutcome> {
    let processing = to_processing_schema(schema);
    let converter = RowConverter::new(&processing, clock)?;
    let mut encoder = BatchEncoder::new(&processing)?;

    for (row, cells) in rows.iter().enumerate() {
        match converter.convert(cells) {
            ConversionOutcome::Accepted(record) => encoder.append(record)?,
            ConversionOutcome::Discarded => {}
            outcome @ (ConversionOutcome::TypeMismatch { .. }
            | ConversionOutcome::UnsupportedType { .. }) => {
                debug!(row, %outcome, "row rejected, abandoning batch");
                return Ok(BatchOutcome::Failed { row, outcome });
            }
        }
    }

    let records = encoder.records();
    Ok(BatchOutcome::Encoded {
        bytes: encoder.finish()?,
        records,
    })
}

fn decode_value(array: &ArrayRef, row: usize) -> Result<Value> {
    if matches!(array.data_type(), DataType::Null) || array.is_null(row) {
        return Ok(Value::Null);
    }
    let value = match array.data_type() {
        DataType::Utf8 => Value::String(array.as_string::<i32>().value(row).to_string()),
        DataType::Int32 => Value::Int(array.as_primitive::<Int32Type>().value(row)),
        DataType::Int64 => Value::Long(array.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => Value::Float(array.as_primitive::<Float32Type>().value(row)),
        DataType::Float64 => Value::Double(array.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => Value::Boolean(array.as_boolean().value(row)),
        DataType::Date32 => Value::Date(array.as_primitive::<Date32Type>().value(row)),
        DataType::Time32(TimeUnit::Millisecond) => {
            Value::TimeMillis(array.as_primitive::<Time32MillisecondType>().value(row))
        }
        DataType::Time64(TimeUnit::Microsecond) => {
            Value::TimeMicros(array.as_primitive::<Time64MicrosecondType>().value(row))
        }
        DataType::Timestamp(unit, zone) => {
            let local = zone.is_none();
            match unit {
                TimeUnit::Millisecond => {
                    let v = array.as_primitive::<TimestampMillisecondType>().value(row);
                    if local { Value::LocalTimestampMillis(v) } else { Value::TimestampMillis(v) }
                }
                TimeUnit::Microsecond => {
                    let v = array.as_primitive::<TimestampMicrosecondType>().value(row);
                    if local { Value::LocalTimestampMicros(v) } else { Value::TimestampMicros(v) }
                }
                TimeUnit::Nanosecond => {
                    let v = array.as_primitive::<TimestampNanosecondType>().value(row);
                    if local { Value::LocalTimestampNanos(v) } else { Value::TimestampNanos(v) }
                }
                TimeUnit::Second => {
                    return Err(Error::Encode("cannot decode second-resolution timestamps".into()));
                }
            }
        }
        other => return Err(Error::Encode(format!("cannot decode column of type {other}"))),
    };
    Ok(value)
}

/// Decode Parquet bytes produced by [`BatchEncoder`] back into records.
///
/// # Errors
///
/// Returns an error if the bytes are not a readable Parquet file or hold a
/// column type this crate never writes.
pub fn read_parquet_records(bytes: &[u8]) -> Result<Vec<Record>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(bytes))?.build()?;

    let mut out = Vec::new();
    for batch in reader {
        let batch = batch?;
        let schema = batch.schema();
        for row in 0..batch.num_rows() {
            let fields = schema
                .fields()
                .iter()
                .zip(batch.columns())
                .map(|(field, array)| Ok((field.name().clone(), decode_value(array, row)?)))
                .collect::<Result<Vec<_>>>()?;
            out.push(Record::new(fields));
        }
    }
    Ok(out)
}
