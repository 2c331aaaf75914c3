//! Pre-built schemas, configuration and payloads for tests.

use crate::config::ProcessorConfig;
use crate::conversion::FixedClock;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};

/// Bucket that input files land in.
pub const LANDING_BUCKET: &str = "landing";

/// The instant [`fixed_clock`] reports.
#[must_use]
pub fn fixed_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 17, 14, 3, 9)
        .single()
        .unwrap_or_default()
        + chrono::Duration::microseconds(123_456)
}

/// `_timestamp` value for rows converted at [`fixed_instant`].
pub const FIXED_TIMESTAMP: &str = "2024-05-17 14:03:09.123456";

#[must_use]
pub fn fixed_clock() -> FixedClock {
    FixedClock(fixed_instant())
}

/// Configuration used throughout the tests.
///
/// Buckets: `structured` (output), `schema-registry`, `violations` with the
/// violations path `landing`. UTF-8, one header row, no CSV logging.
#[must_use]
pub fn test_config() -> ProcessorConfig {
    ProcessorConfig {
        output_bucket: "structured".to_string(),
        schema_registry_bucket: "schema-registry".to_string(),
        violations_bucket: "violations".to_string(),
        violations_path: "landing".to_string(),
        charset: encoding_rs::UTF_8,
        header_rows_to_skip: 1,
        log_csv: false,
    }
}

/// A registered schema with a string `col1` and an int `col2`.
#[must_use]
pub fn two_column_schema_json() -> String {
    json!({
        "type": "record",
        "name": "items",
        "namespace": "orders",
        "fields": [
            {"name": "col1", "type": "string"},
            {"name": "col2", "type": "int"}
        ]
    })
    .to_string()
}

/// A registered schema using every convertible type, with record and field
/// properties attached.
#[must_use]
pub fn all_types_schema_json() -> String {
    json!({
        "type": "record",
        "name": "everything",
        "doc": "One column per supported type",
        "primaryKey": "id",
        "fields": [
            {"name": "id", "type": "long", "nullable": false},
            {"name": "name", "type": ["null", "string"]},
            {"name": "quantity", "type": "int"},
            {"name": "ratio", "type": "float"},
            {"name": "price", "type": ["null", "double"]},
            {"name": "active", "type": "boolean"},
            {"name": "created", "type": {"type": "long", "logicalType": "timestamp-millis"}},
            {"name": "updated", "type": {"type": "long", "logicalType": "timestamp-micros"}}
        ]
    })
    .to_string()
}

/// An invocation payload in object-created notification shape.
#[must_use]
pub fn payload(bucket: &str, key: &str, token: Option<&str>) -> Value {
    let mut value = json!({
        "Records": [
            {"s3": {"bucket": {"name": bucket}, "object": {"key": key}}}
        ]
    });
    if let (Some(token), Some(obj)) = (token, value.as_object_mut()) {
        obj.insert("stepFunctionToken".to_string(), json!(token));
    }
    value
}
