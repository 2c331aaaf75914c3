//! Error types for the landing zone processor.
//!
//! [`Error`] covers every failure that aborts an invocation: configuration
//! problems, malformed payloads, broken schemas, and infrastructure failures
//! (storage, notifier, encoder). Bad *data* is never an [`Error`]; it is
//! reported through [`ConversionOutcome`](crate::conversion::ConversionOutcome)
//! and [`BatchOutcome`](crate::conversion::BatchOutcome) so the caller can
//! quarantine the source file and carry on.

use crate::config::ConfigError;
use crate::io::cloud::CloudIOError;
use thiserror::Error;

/// The top-level error type for landing zone processing.
#[derive(Debug, Error)]
pub enum Error {
    /// A required configuration value is missing or invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The invocation payload is missing a required element or is malformed.
    #[error("invalid payload: {0}")]
    Payload(String),

    /// The registered schema could not be parsed by the Avro parser.
    #[error("invalid Avro schema: {0}")]
    Avro(#[from] apache_avro::Error),

    /// The registered schema parsed but has a shape we cannot process.
    #[error("unsupported schema: {0}")]
    Schema(String),

    /// A schema handed to the row converter lacks the synthetic columns or
    /// contains a field that is not a two-branch nullable union.
    #[error("invalid processing schema: {0}")]
    InvalidProcessingSchema(String),

    /// The file has fewer rows than the configured number of header rows.
    #[error("configured to skip {expected} header rows but the file only has {found} rows")]
    HeaderRows { expected: usize, found: usize },

    /// Object storage or workflow notifier failure.
    #[error("storage error: {0}")]
    Storage(#[from] CloudIOError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// A record could not be laid out in the columnar encoder.
    #[error("encoding error: {0}")]
    Encode(String),
}

impl Error {
    /// Returns true for configuration-class failures (bad config, payload or schema).
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Payload(_)
                | Self::Avro(_)
                | Self::Schema(_)
                | Self::InvalidProcessingSchema(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
