//! Assertion functions for decoded records.

use crate::conversion::{Record, TIMESTAMP_COLUMN_NAME};
use apache_avro::types::Value;

/// Assert that `record` holds exactly `expected`, field by field and in order.
///
/// # Panics
///
/// Panics if the field names or values differ.
pub fn assert_record(record: &Record, expected: &[(&str, Value)]) {
    assert_eq!(
        record.len(),
        expected.len(),
        "Record length mismatch:\n  Expected: {expected:?}\n  Actual: {record:?}"
    );
    for (i, ((name, value), (exp_name, exp_value))) in
        record.fields().iter().zip(expected).enumerate()
    {
        assert_eq!(name.as_str(), *exp_name, "Field name mismatch at index {i}");
        assert_eq!(
            value, exp_value,
            "Value mismatch for field {name}:\n  Expected: {exp_value:?}\n  Actual: {value:?}"
        );
    }
}

/// Assert two record sequences are equal apart from their `_timestamp` values.
///
/// # Panics
///
/// Panics if the sequences differ in length or in any non-timestamp field.
pub fn assert_records_equal_ignoring_timestamp(actual: &[Record], expected: &[Record]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Record count mismatch:\n  Expected: {}\n  Actual: {}",
        expected.len(),
        actual.len()
    );
    let strip = |r: &Record| -> Vec<(String, Value)> {
        r.fields()
            .iter()
            .filter(|(n, _)| n.as_str() != TIMESTAMP_COLUMN_NAME)
            .cloned()
            .collect()
    };
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert_eq!(strip(a), strip(e), "Record mismatch at index {i}");
    }
}
