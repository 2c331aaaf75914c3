//! Invocation handling: resolve the input, process each file, notify.

use crate::config::ProcessorConfig;
use crate::conversion::{Clock, SystemClock};
use crate::error::Result;
use crate::io::cloud::{ObjectIO, TaskNotifier};
use crate::locator::{FileLocator, InvocationPayload};
use crate::pipeline::{FileOutcome, FileProcessor};
use tracing::info;

/// Returned to the host when an invocation succeeds.
pub const COMPLETION_MESSAGE: &str = "Completed execution.";

/// Output document sent with the workflow success signal.
pub const NOTIFICATION_OUTPUT: &str = "{}";

/// Totals for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Files found under the input locator.
    pub files: usize,
    pub converted: usize,
    pub quarantined: usize,
    /// Whether the workflow was signalled.
    pub notified: bool,
}

/// Processes every file named by an invocation payload, one after another.
pub struct BatchProcessor<'a> {
    storage: &'a dyn ObjectIO,
    notifier: &'a dyn TaskNotifier,
    config: &'a ProcessorConfig,
    clock: &'a dyn Clock,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(
        storage: &'a dyn ObjectIO,
        notifier: &'a dyn TaskNotifier,
        config: &'a ProcessorConfig,
    ) -> Self {
        Self {
            storage,
            notifier,
            config,
            clock: &SystemClock,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Process the files under `payload.input` in listing order.
    ///
    /// The input key is used as a listing prefix, so a file key resolves to
    /// that file. If a workflow token is present it is notified once, after
    /// every file has been converted or quarantined.
    ///
    /// # Errors
    ///
    /// The first error from any file stops the batch: later files are not
    /// attempted, earlier ones stay processed, and no notification is sent.
    pub fn process(&self, payload: &InvocationPayload) -> Result<BatchSummary> {
        let input = &payload.input;
        let objects = self.storage.list_objects(&input.bucket, &input.key)?;
        info!(%input, files = objects.len(), "listed input files");

        let processor = FileProcessor::new(self.storage, self.config, self.clock);
        let mut summary = BatchSummary {
            files: objects.len(),
            ..BatchSummary::default()
        };
        for object in objects {
            let source = FileLocator::new(&input.bucket, object.key);
            match processor.process_file(&source)? {
                FileOutcome::Converted { .. } => summary.converted += 1,
                FileOutcome::Quarantined { .. } => summary.quarantined += 1,
            }
        }

        if let Some(token) = &payload.workflow_token {
            info!("notifying workflow of success");
            self.notifier.notify_success(token, NOTIFICATION_OUTPUT)?;
            summary.notified = true;
        }

        info!(
            files = summary.files,
            converted = summary.converted,
            quarantined = summary.quarantined,
            "batch complete"
        );
        Ok(summary)
    }
}

/// Handle one raw invocation payload end to end.
///
/// # Errors
///
/// Returns an error if the payload is malformed or any file fails with a
/// non-data error.
pub fn handle_invocation(
    payload: serde_json::Value,
    storage: &dyn ObjectIO,
    notifier: &dyn TaskNotifier,
    config: &ProcessorConfig,
) -> Result<&'static str> {
    let payload = InvocationPayload::from_value(payload)?;
    BatchProcessor::new(storage, notifier, config).process(&payload)?;
    Ok(COMPLETION_MESSAGE)
}
