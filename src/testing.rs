//! Testing utilities for landing zone processing.
//!
//! This module provides:
//!
//! - **Fixtures**: sample registered schemas, a ready-made [`ProcessorConfig`],
//!   invocation payload builders and a fixed clock
//! - **Assertions**: compare decoded [`Record`]s with expected values
//! - [`TestLandingZone`]: in-memory storage and notifier wired to a
//!   [`BatchProcessor`], so a whole invocation can be run in a unit test
//!
//! # Quick Start
//!
//! ```
//! use landing_zone_processing::testing::*;
//!
//! # fn main() -> landing_zone_processing::Result<()> {
//! let zone = TestLandingZone::new();
//! zone.register_schema("orders/items.avsc", &two_column_schema_json());
//! zone.land("orders/items/batch.csv", b"col1,col2\na,1\n");
//!
//! let summary = zone.process("orders/items/batch.csv", Some("token"))?;
//! assert_eq!(summary.converted, 1);
//! assert_eq!(zone.output("orders/items/LOAD-batch.csv.parquet")?.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;

use crate::batch::{BatchProcessor, BatchSummary};
use crate::config::ProcessorConfig;
use crate::conversion::{FixedClock, Record, read_parquet_records};
use crate::error::Result;
use crate::io::cloud::{FakeObjectIO, FakeTaskNotifier, ObjectIO};
use crate::locator::InvocationPayload;

/// Landing, registry, output and violations buckets backed by memory.
///
/// Bucket names come from [`test_config`]; input files land in
/// [`LANDING_BUCKET`].
#[derive(Clone)]
pub struct TestLandingZone {
    pub storage: FakeObjectIO,
    pub notifier: FakeTaskNotifier,
    pub config: ProcessorConfig,
    pub clock: FixedClock,
}

impl Default for TestLandingZone {
    fn default() -> Self {
        Self::new()
    }
}

impl TestLandingZone {
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: FakeObjectIO::new(),
            notifier: FakeTaskNotifier::new(),
            config: test_config(),
            clock: fixed_clock(),
        }
    }

    /// Store `contents` at `key` in the landing bucket.
    ///
    /// # Panics
    ///
    /// Panics if the fake storage was told to fail puts for this key.
    pub fn land(&self, key: &str, contents: &[u8]) {
        self.storage
            .put_object(LANDING_BUCKET, key, contents)
            .expect("landing a file in fake storage");
    }

    /// Store an `.avsc` document at `key` in the schema registry bucket.
    ///
    /// # Panics
    ///
    /// Panics if the fake storage was told to fail puts for this key.
    pub fn register_schema(&self, key: &str, avsc: &str) {
        self.storage
            .put_object(&self.config.schema_registry_bucket, key, avsc.as_bytes())
            .expect("registering a schema in fake storage");
    }

    /// Run one invocation for `key` in the landing bucket.
    ///
    /// # Errors
    ///
    /// Returns whatever the batch returns.
    pub fn process(&self, key: &str, token: Option<&str>) -> Result<BatchSummary> {
        let payload = InvocationPayload::from_value(payload(LANDING_BUCKET, key, token))?;
        BatchProcessor::new(&self.storage, &self.notifier, &self.config)
            .with_clock(&self.clock)
            .process(&payload)
    }

    /// Decode the Parquet object at `key` in the output bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if the object is missing or not valid Parquet.
    pub fn output(&self, key: &str) -> Result<Vec<Record>> {
        let bytes = self.storage.get_object(&self.config.output_bucket, key)?;
        read_parquet_records(&bytes)
    }
}
