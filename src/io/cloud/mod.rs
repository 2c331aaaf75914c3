//! Abstractions over the external services a batch talks to.
//!
//! This module provides **generic traits** for the two collaborators the
//! processor needs, kept provider-agnostic so the core never depends on an SDK:
//!
//! - [`ObjectIO`] - Object storage (S3, GCS, Azure Blob): fetch, list, put,
//!   delete and copy over bucket/key pairs, with paginated listing
//! - [`TaskNotifier`] - The workflow engine waiting on a batch (Step Functions
//!   task tokens and similar)
//!
//! Each trait comes with:
//!
//! - **Synchronous interface** - All operations are blocking by design, wrapping async
//!   operations internally where needed
//! - **Fake implementations** - In-memory implementations for unit testing without external
//!   dependencies, with injectable failures
//! - **Local implementations** - Filesystem-backed storage and log/file notifiers for
//!   running the processor on a workstation
//!
//! ## Usage
//!
//! ```
//! use landing_zone_processing::io::cloud::*;
//!
//! # fn main() -> CloudResult<()> {
//! let storage = FakeObjectIO::new();
//! storage.put_object("bucket", "orders/items/batch.csv", b"a,1\n")?;
//!
//! let listed = storage.list_objects("bucket", "orders/")?;
//! assert_eq!(listed.len(), 1);
//! assert!(storage.object_exists("bucket", "orders/items/batch.csv")?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`CloudResult<T>`] where the error is [`CloudIOError`],
//! categorized by [`ErrorKind`]. The processor never retries: any storage or
//! notifier error aborts the invocation, and re-invocation is the retry mechanism.

pub mod fake;
pub mod local;
pub mod traits;

pub use fake::*;
pub use local::*;
pub use traits::*;
