//! Core traits for the external services the processor talks to.
//!
//! These traits provide synchronous interfaces for object storage and for the
//! workflow engine that waits on a batch, with internal async handling left to
//! implementations where necessary.

use std::error::Error;
use std::fmt;

// ============================================================================
// Core Error Type
// ============================================================================

/// Generic error type for cloud IO operations
#[derive(Debug, Clone)]
pub struct CloudIOError {
    pub message: String,
    pub kind: ErrorKind,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Authorization,
    NotFound,
    InvalidInput,
    Network,
    Timeout,
    ServiceUnavailable,
    InternalError,
    Other,
}

impl fmt::Display for CloudIOError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

impl Error for CloudIOError {}

impl CloudIOError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl From<std::io::Error> for CloudIOError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::Authorization,
            std::io::ErrorKind::InvalidInput => ErrorKind::InvalidInput,
            std::io::ErrorKind::TimedOut => ErrorKind::Timeout,
            _ => ErrorKind::InternalError,
        };
        Self::new(kind, err.to_string())
    }
}

pub type CloudResult<T> = Result<T, CloudIOError>;

// ============================================================================
// ObjectIO - Object Storage
// ============================================================================

/// Metadata for an object in storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub key: String,
    pub size: u64,
}

/// One page of a listing, plus the token for the next page if there is one
#[derive(Debug, Clone, Default)]
pub struct ObjectListing {
    pub objects: Vec<ObjectMetadata>,
    pub next_continuation_token: Option<String>,
}

/// Trait for object storage operations
pub trait ObjectIO: Send + Sync {
    /// Upload data to object storage
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket doesn't exist, permissions are not enough, or the upload fails
    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> CloudResult<()>;

    /// Download data from object storage
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist, permissions are not enough, or the download fails
    fn get_object(&self, bucket: &str, key: &str) -> CloudResult<Vec<u8>>;

    /// Delete an object
    ///
    /// # Errors
    ///
    /// Returns an error if permissions are not enough or the deletion fails
    fn delete_object(&self, bucket: &str, key: &str) -> CloudResult<()>;

    /// List one page of objects whose key starts with `prefix`, in key order
    ///
    /// Pass the previous page's `next_continuation_token` to continue a listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket doesn't exist, permissions are not enough, or the listing fails
    fn list_objects_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> CloudResult<ObjectListing>;

    /// List every object under `prefix`, following continuation tokens until exhausted
    ///
    /// # Errors
    ///
    /// Returns an error if fetching any page fails
    fn list_objects(&self, bucket: &str, prefix: &str) -> CloudResult<Vec<ObjectMetadata>> {
        let mut all = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.list_objects_page(bucket, prefix, token.as_deref())?;
            all.extend(page.objects);
            match page.next_continuation_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(all)
    }

    /// Check if an object exists
    ///
    /// # Errors
    ///
    /// Returns an error if permissions are not enough or the check fails
    fn object_exists(&self, bucket: &str, key: &str) -> CloudResult<bool>;

    /// Copy an object within or between buckets
    ///
    /// # Errors
    ///
    /// Returns an error if the source doesn't exist, permissions are not enough, or the copy fails
    fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> CloudResult<()>;
}

// ============================================================================
// TaskNotifier - Workflow Completion
// ============================================================================

/// Trait for signalling a waiting workflow step that its task finished
pub trait TaskNotifier: Send + Sync {
    /// Report task success for `token` with a JSON `output` document
    ///
    /// # Errors
    ///
    /// Returns an error if the token is unknown or expired, or the call fails
    fn notify_success(&self, token: &str, output: &str) -> CloudResult<()>;
}
