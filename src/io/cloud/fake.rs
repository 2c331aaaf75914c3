//! Fake implementations for testing.
//!
//! These implementations use in-memory data structures to simulate cloud services,
//! making them ideal for unit testing without external dependencies.

use crate::io::cloud::traits::{
    CloudIOError, CloudResult, ErrorKind, ObjectIO, ObjectListing, ObjectMetadata, TaskNotifier,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

// Type aliases for complex nested types
type BucketStorage = Arc<Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>>;

const DEFAULT_PAGE_SIZE: usize = 1000;

/// Storage operations a [`FakeObjectIO`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    Put,
    Get,
    Delete,
    List,
    Copy,
}

/// A recorded storage call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeCall {
    pub op: FakeOp,
    pub bucket: String,
    pub key: String,
}

// ============================================================================
// FakeObjectIO
// ============================================================================

#[derive(Clone)]
pub struct FakeObjectIO {
    storage: BucketStorage,
    page_size: usize,
    failures: Arc<Mutex<Vec<(FakeOp, String)>>>,
    calls: Arc<Mutex<Vec<FakeCall>>>,
}

impl FakeObjectIO {
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: Arc::new(Mutex::new(HashMap::new())),
            page_size: DEFAULT_PAGE_SIZE,
            failures: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Return listings in pages of at most `page_size` keys.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make every `op` whose key contains `key_fragment` fail with `ServiceUnavailable`.
    ///
    /// # Panics
    ///
    /// Panics if the mutex protecting the failure list is poisoned.
    pub fn fail_on(&self, op: FakeOp, key_fragment: &str) {
        self.failures
            .lock()
            .expect("failures mutex poisoned")
            .push((op, key_fragment.to_string()));
    }

    /// All calls made so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the mutex protecting the call log is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    /// Keys currently stored in `bucket`, in key order.
    ///
    /// # Panics
    ///
    /// Panics if the mutex protecting the storage is poisoned.
    #[must_use]
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.storage
            .lock()
            .expect("storage mutex poisoned")
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn record(&self, op: FakeOp, bucket: &str, key: &str) -> CloudResult<()> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push(FakeCall {
                op,
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        let failures = self.failures.lock().expect("failures mutex poisoned");
        if failures
            .iter()
            .any(|(o, fragment)| *o == op && key.contains(fragment.as_str()))
        {
            return Err(CloudIOError::new(
                ErrorKind::ServiceUnavailable,
                format!("injected {op:?} failure for {bucket}/{key}"),
            ));
        }
        Ok(())
    }
}

impl Default for FakeObjectIO {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectIO for FakeObjectIO {
    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> CloudResult<()> {
        self.record(FakeOp::Put, bucket, key)?;
        self.storage
            .lock()
            .expect("storage mutex poisoned")
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn get_object(&self, bucket: &str, key: &str) -> CloudResult<Vec<u8>> {
        self.record(FakeOp::Get, bucket, key)?;
        let storage = self.storage.lock().expect("storage mutex poisoned");
        storage
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned()
            .ok_or_else(|| {
                CloudIOError::new(
                    ErrorKind::NotFound,
                    format!("Object {bucket}/{key} not found"),
                )
            })
    }

    fn delete_object(&self, bucket: &str, key: &str) -> CloudResult<()> {
        self.record(FakeOp::Delete, bucket, key)?;
        if let Some(bucket_map) = self
            .storage
            .lock()
            .expect("storage mutex poisoned")
            .get_mut(bucket)
        {
            bucket_map.remove(key);
        }
        Ok(())
    }

    fn list_objects_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> CloudResult<ObjectListing> {
        self.record(FakeOp::List, bucket, prefix)?;
        let storage = self.storage.lock().expect("storage mutex poisoned");
        let Some(bucket_map) = storage.get(bucket) else {
            return Ok(ObjectListing::default());
        };

        // The token is the last key of the previous page.
        let mut matching = bucket_map
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| continuation_token.is_none_or(|after| key.as_str() > after))
            .map(|(key, data)| ObjectMetadata {
                key: key.clone(),
                size: data.len() as u64,
            });

        let objects: Vec<ObjectMetadata> = matching.by_ref().take(self.page_size).collect();
        let has_more = matching.next().is_some();
        let next_continuation_token = if has_more {
            objects.last().map(|o| o.key.clone())
        } else {
            None
        };
        Ok(ObjectListing {
            objects,
            next_continuation_token,
        })
    }

    fn object_exists(&self, bucket: &str, key: &str) -> CloudResult<bool> {
        let storage = self.storage.lock().expect("storage mutex poisoned");
        Ok(storage.get(bucket).is_some_and(|b| b.contains_key(key)))
    }

    fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> CloudResult<()> {
        self.record(FakeOp::Copy, src_bucket, src_key)?;
        let data = {
            let storage = self.storage.lock().expect("storage mutex poisoned");
            storage
                .get(src_bucket)
                .and_then(|b| b.get(src_key))
                .cloned()
                .ok_or_else(|| {
                    CloudIOError::new(
                        ErrorKind::NotFound,
                        format!("Object {src_bucket}/{src_key} not found"),
                    )
                })?
        };
        self.storage
            .lock()
            .expect("storage mutex poisoned")
            .entry(dst_bucket.to_string())
            .or_default()
            .insert(dst_key.to_string(), data);
        Ok(())
    }
}

// ============================================================================
// FakeTaskNotifier
// ============================================================================

#[derive(Clone, Default)]
pub struct FakeTaskNotifier {
    notifications: Arc<Mutex<Vec<(String, String)>>>,
    fail: bool,
}

impl FakeTaskNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every call fails with `ServiceUnavailable`.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// `(token, output)` pairs received so far.
    ///
    /// # Panics
    ///
    /// Panics if the mutex protecting the notifications is poisoned.
    #[must_use]
    pub fn notifications(&self) -> Vec<(String, String)> {
        self.notifications
            .lock()
            .expect("notifications mutex poisoned")
            .clone()
    }
}

impl TaskNotifier for FakeTaskNotifier {
    fn notify_success(&self, token: &str, output: &str) -> CloudResult<()> {
        if self.fail {
            return Err(CloudIOError::new(
                ErrorKind::ServiceUnavailable,
                format!("cannot notify task {token}"),
            ));
        }
        self.notifications
            .lock()
            .expect("notifications mutex poisoned")
            .push((token.to_string(), output.to_string()));
        Ok(())
    }
}
