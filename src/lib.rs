//! # Landing zone processing
//!
//! Converts delimited text files that land in object storage into Parquet,
//! typed by an externally registered Avro schema. Files whose data does not fit
//! the schema are moved, unchanged, to a quarantine area instead of failing the
//! batch.
//!
//! ## Flow
//!
//! An invocation names one input locator (a file, or a prefix covering many
//! files) and optionally a workflow token:
//!
//! 1. [`BatchProcessor`] lists every object under the locator.
//! 2. [`FileProcessor`] handles each file in turn: fetch the rows, fetch the
//!    registered schema, convert.
//! 3. [`encode_rows`] derives the processing schema ([`to_processing_schema`]),
//!    converts each row with a [`RowConverter`] and streams accepted records
//!    into an in-memory Parquet file.
//! 4. Clean files are written to the output bucket and deleted from landing;
//!    files with a bad row are moved to the violations bucket.
//! 5. Once every file is done, the workflow token (if any) is notified.
//!
//! ## Errors
//!
//! Bad *data* never produces an [`Error`]: it shows up as a
//! [`ConversionOutcome`] and results in quarantine. Everything else (missing
//! configuration, malformed payloads, unreadable schemas, storage failures)
//! is an [`Error`] that aborts the invocation.
//!
//! ## Example
//!
//! ```
//! use landing_zone_processing::*;
//! use landing_zone_processing::io::cloud::{FakeObjectIO, FakeTaskNotifier, ObjectIO};
//! use landing_zone_processing::testing::{payload, test_config, two_column_schema_json};
//!
//! # fn main() -> Result<()> {
//! let storage = FakeObjectIO::new();
//! let notifier = FakeTaskNotifier::new();
//! let config = test_config();
//!
//! storage.put_object("schema-registry", "orders/items.avsc", two_column_schema_json().as_bytes())?;
//! storage.put_object("landing", "orders/items/batch.csv", b"col1,col2\na,1\n")?;
//!
//! let message = handle_invocation(
//!     payload("landing", "orders/items/batch.csv", None),
//!     &storage,
//!     &notifier,
//!     &config,
//! )?;
//! assert_eq!(message, COMPLETION_MESSAGE);
//! assert!(storage.object_exists("structured", "orders/items/LOAD-batch.csv.parquet")?);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod conversion;
pub mod error;
pub mod io;
pub mod locator;
pub mod logging;
pub mod pipeline;
pub mod schema;
pub mod testing;

/// One line of landed text: the cells between delimiters, untyped.
pub type Row = Vec<String>;

pub use batch::{BatchProcessor, BatchSummary, COMPLETION_MESSAGE, handle_invocation};
pub use config::{ConfigError, ProcessorConfig};
pub use conversion::{
    BatchOutcome, Clock, ConversionOutcome, FixedClock, Record, RowConverter, SystemClock,
    encode_rows, read_parquet_records, to_processing_schema,
};
pub use error::{Error, Result};
pub use locator::{FileLocator, InvocationPayload};
pub use pipeline::{FileOutcome, FileProcessor};
pub use schema::{BasicType, Field, FieldType, Schema};
