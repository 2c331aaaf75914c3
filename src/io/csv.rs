//! Reading landed delimited text into untyped rows.
//!
//! This module provides:
//! - [`decode_text`] to turn raw object bytes into text using the configured charset
//! - [`parse_rows`] / [`read_rows`] to split text into rows of string cells,
//!   dropping a configured number of leading header rows
//! - [`render_rows`] to re-render rows as CSV for diagnostic logging
//!
//! # Design notes
//! - Rows are **untyped**: every cell is kept as the exact text between
//!   delimiters, with quoting removed. Typing happens later against the schema.
//! - The reader is **flexible**: rows may have different numbers of cells.
//!   Ragged input is reconciled against the schema by the row converter.
//! - Blank lines produce no row at all.

use crate::error::{Error, Result};
use crate::Row;
use csv::{ReaderBuilder, Terminator, WriterBuilder};
use encoding_rs::Encoding;
use std::borrow::Cow;
use tracing::warn;

/// Decode raw bytes with `charset`, stripping a leading byte order mark.
///
/// Malformed sequences are replaced with U+FFFD and a warning is logged.
#[must_use]
pub fn decode_text<'a>(bytes: &'a [u8], charset: &'static Encoding) -> Cow<'a, str> {
    let (text, had_errors) = charset.decode_with_bom_removal(bytes);
    if had_errors {
        warn!(
            charset = charset.name(),
            "input contained byte sequences invalid for the charset; they were replaced"
        );
    }
    text
}

/// Parse CSV text into rows, skipping the first `header_rows_to_skip` rows.
///
/// # Errors
///
/// Returns [`Error::HeaderRows`] if the text has fewer rows than
/// `header_rows_to_skip`, or [`Error::Csv`] if the text cannot be read as CSV.
pub fn parse_rows(text: &str, header_rows_to_skip: usize) -> Result<Vec<Row>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::<Row>::new();
    for rec in rdr.records() {
        let rec = rec?;
        rows.push(rec.iter().map(str::to_string).collect());
    }

    if header_rows_to_skip > 0 {
        if rows.len() < header_rows_to_skip {
            return Err(Error::HeaderRows {
                expected: header_rows_to_skip,
                found: rows.len(),
            });
        }
        rows.drain(..header_rows_to_skip);
    }
    Ok(rows)
}

/// Decode `bytes` with `charset` and parse them into rows.
///
/// # Errors
///
/// See [`parse_rows`].
pub fn read_rows(
    bytes: &[u8],
    charset: &'static Encoding,
    header_rows_to_skip: usize,
) -> Result<Vec<Row>> {
    parse_rows(&decode_text(bytes, charset), header_rows_to_skip)
}

/// Render rows back to CSV text with `\n` line endings.
///
/// # Errors
///
/// Returns an error if a row cannot be written.
pub fn render_rows(rows: &[Row]) -> Result<String> {
    let mut wtr = WriterBuilder::new()
        .flexible(true)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for row in rows {
        wtr.write_record(row)?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| Error::Encode(format!("flush CSV rows: {}", e.error())))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
