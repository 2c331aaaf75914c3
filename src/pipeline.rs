//! Per-file processing: fetch, convert, then write or quarantine.

use crate::config::ProcessorConfig;
use crate::conversion::{BatchOutcome, Clock, encode_rows};
use crate::error::{Error, Result};
use crate::io::cloud::ObjectIO;
use crate::io::csv::{read_rows, render_rows};
use crate::locator::FileLocator;
use crate::schema::Schema;
use tracing::{info, info_span, warn};

/// What happened to one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Parquet output written and the source deleted.
    Converted { output: FileLocator, records: usize },
    /// The source was moved, unchanged, to the quarantine area.
    Quarantined {
        violation: FileLocator,
        reason: String,
    },
}

/// Processes single input files against their registered schemas.
pub struct FileProcessor<'a> {
    storage: &'a dyn ObjectIO,
    config: &'a ProcessorConfig,
    clock: &'a dyn Clock,
}

impl<'a> FileProcessor<'a> {
    pub fn new(storage: &'a dyn ObjectIO, config: &'a ProcessorConfig, clock: &'a dyn Clock) -> Self {
        Self {
            storage,
            config,
            clock,
        }
    }

    fn fetch_schema(&self, locator: &FileLocator) -> Result<Schema> {
        let bytes = self.storage.get_object(&locator.bucket, &locator.key)?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| Error::Schema(format!("{locator} is not UTF-8: {e}")))?;
        Schema::parse_str(text)
    }

    /// Move `source` to `destination`: copy, then delete the original.
    fn move_object(&self, source: &FileLocator, destination: &FileLocator) -> Result<()> {
        self.storage.copy_object(
            &source.bucket,
            &source.key,
            &destination.bucket,
            &destination.key,
        )?;
        self.storage.delete_object(&source.bucket, &source.key)?;
        Ok(())
    }

    /// Convert `source` to Parquet, or quarantine it if its data does not fit
    /// the registered schema.
    ///
    /// On success the output is written before the source is deleted. On a
    /// data failure nothing is written to the output bucket.
    ///
    /// # Errors
    ///
    /// Storage failures, an unreadable or missing schema, too few rows for the
    /// configured header, and encoder failures are returned as errors and are
    /// never quarantined.
    pub fn process_file(&self, source: &FileLocator) -> Result<FileOutcome> {
        let span = info_span!("file", bucket = %source.bucket, key = %source.key);
        let _enter = span.enter();

        info!("retrieving CSV data");
        let bytes = self.storage.get_object(&source.bucket, &source.key)?;
        let rows = read_rows(&bytes, self.config.charset, self.config.header_rows_to_skip)?;
        if self.config.log_csv {
            info!("CSV file:\n\n{}", render_rows(&rows)?);
        }

        let schema_file = source.schema_locator(self.config);
        let output_file = source.output_locator(self.config);
        info!(
            charset = self.config.charset.name(),
            skipped = self.config.header_rows_to_skip,
            rows = rows.len(),
            schema = %schema_file,
            output = %output_file,
            "resolved locations"
        );

        let schema = self.fetch_schema(&schema_file)?;
        info!("converting CSV data to Parquet");
        match encode_rows(&schema, &rows, self.clock)? {
            BatchOutcome::Encoded { bytes, records } => {
                info!(records, size = bytes.len(), "writing Parquet data");
                self.storage
                    .put_object(&output_file.bucket, &output_file.key, &bytes)?;
                info!("deleting source CSV file");
                self.storage.delete_object(&source.bucket, &source.key)?;
                Ok(FileOutcome::Converted {
                    output: output_file,
                    records,
                })
            }
            BatchOutcome::Failed { row, outcome } => {
                let violation = source.violation_locator(self.config);
                let reason = format!("row {}: {outcome}", row + 1);
                warn!(%violation, %reason, "violation: moving source file to quarantine");
                self.move_object(source, &violation)?;
                Ok(FileOutcome::Quarantined { violation, reason })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::cloud::{FakeObjectIO, FakeOp};
    use crate::testing::{fixed_clock, test_config, two_column_schema_json};

    fn storage_with(csv: &str) -> FakeObjectIO {
        let storage = FakeObjectIO::new();
        storage
            .put_object("landing", "orders/items/batch.csv", csv.as_bytes())
            .unwrap();
        storage
            .put_object(
                "schema-registry",
                "orders/items.avsc",
                two_column_schema_json().as_bytes(),
            )
            .unwrap();
        storage
    }

    #[test]
    fn test_converted_file() {
        let storage = storage_with("col1,col2\na,1\n");
        let config = test_config();
        let clock = fixed_clock();
        let source = FileLocator::new("landing", "orders/items/batch.csv");

        let outcome = FileProcessor::new(&storage, &config, &clock)
            .process_file(&source)
            .unwrap();
        assert_eq!(
            outcome,
            FileOutcome::Converted {
                output: FileLocator::new("structured", "orders/items/LOAD-batch.csv.parquet"),
                records: 1,
            }
        );
        assert!(storage.keys("landing").is_empty());
    }

    #[test]
    fn test_quarantined_file() {
        let storage = storage_with("col1,col2\na,notanint\n");
        let config = test_config();
        let clock = fixed_clock();
        let source = FileLocator::new("landing", "orders/items/batch.csv");

        let outcome = FileProcessor::new(&storage, &config, &clock)
            .process_file(&source)
            .unwrap();
        let FileOutcome::Quarantined { violation, reason } = outcome else {
            panic!("expected quarantine");
        };
        assert_eq!(violation.key, "landing/orders/items/batch.csv");
        assert!(reason.starts_with("row 1: col2 could not be converted"));
        assert!(storage.keys("structured").is_empty());
        assert!(storage.keys("landing").is_empty());
        assert_eq!(
            storage.get_object("violations", &violation.key).unwrap(),
            b"col1,col2\na,notanint\n"
        );
    }

    #[test]
    fn test_missing_schema_is_an_error() {
        let storage = FakeObjectIO::new();
        storage.put_object("landing", "x/y.csv", b"h\n1\n").unwrap();
        let config = test_config();
        let clock = fixed_clock();
        let err = FileProcessor::new(&storage, &config, &clock)
            .process_file(&FileLocator::new("landing", "x/y.csv"))
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(storage.keys("landing"), vec!["x/y.csv"]);
    }

    #[test]
    fn test_unusable_schema_is_not_quarantined() {
        let storage = storage_with("col1,col2\na,1\n");
        storage
            .put_object(
                "schema-registry",
                "orders/items.avsc",
                br#"{"type": "record", "name": "items", "fields": [{"name": "col1", "type": ["string", "int"]}]}"#,
            )
            .unwrap();
        let config = test_config();
        let clock = fixed_clock();
        let err = FileProcessor::new(&storage, &config, &clock)
            .process_file(&FileLocator::new("landing", "orders/items/batch.csv"))
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(storage.keys("violations").is_empty());
        assert!(storage.keys("structured").is_empty());
        assert_eq!(storage.keys("landing"), vec!["orders/items/batch.csv"]);
    }

    #[test]
    fn test_failed_write_keeps_source() {
        let storage = storage_with("col1,col2\na,1\n");
        storage.fail_on(FakeOp::Put, "LOAD-");
        let config = test_config();
        let clock = fixed_clock();
        let result = FileProcessor::new(&storage, &config, &clock)
            .process_file(&FileLocator::new("landing", "orders/items/batch.csv"));
        assert!(matches!(result, Err(Error::Storage(_))));
        assert_eq!(storage.keys("landing"), vec!["orders/items/batch.csv"]);
    }

    #[test]
    fn test_too_few_header_rows_is_an_error() {
        let storage = storage_with("");
        let config = test_config();
        let clock = fixed_clock();
        let result = FileProcessor::new(&storage, &config, &clock)
            .process_file(&FileLocator::new("landing", "orders/items/batch.csv"));
        assert!(matches!(
            result,
            Err(Error::HeaderRows {
                expected: 1,
                found: 0
            })
        ));
    }
}
