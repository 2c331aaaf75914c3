//! Filesystem-backed implementations for running the processor locally.
//!
//! [`LocalObjectIO`] maps each bucket to a directory below a root and each key
//! to a relative path inside it. [`LogTaskNotifier`] and [`FileTaskNotifier`]
//! stand in for the workflow engine.

use crate::io::cloud::traits::{
    CloudIOError, CloudResult, ErrorKind, ObjectIO, ObjectListing, ObjectMetadata, TaskNotifier,
};
use serde_json::json;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

const DEFAULT_PAGE_SIZE: usize = 1000;

/// Object storage rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalObjectIO {
    root: PathBuf,
    page_size: usize,
}

impl LocalObjectIO {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn bucket_dir(&self, bucket: &str) -> CloudResult<PathBuf> {
        check_relative(bucket)?;
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> CloudResult<PathBuf> {
        check_relative(key)?;
        Ok(self.bucket_dir(bucket)?.join(key))
    }
}

/// Reject names that would escape the storage root.
fn check_relative(name: &str) -> CloudResult<()> {
    let path = Path::new(name);
    let escapes = name.is_empty()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(CloudIOError::new(
            ErrorKind::InvalidInput,
            format!("'{name}' is not a relative storage name"),
        ));
    }
    Ok(())
}

fn collect_keys(dir: &Path, base: &Path, out: &mut Vec<(String, u64)>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_keys(&path, base, out)?;
        } else if file_type.is_file()
            && let Ok(rel) = path.strip_prefix(base)
        {
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push((key, entry.metadata()?.len()));
        }
    }
    Ok(())
}

impl ObjectIO for LocalObjectIO {
    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> CloudResult<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CloudIOError::from(e).with_source(parent.display().to_string()))?;
        }
        fs::write(&path, data)
            .map_err(|e| CloudIOError::from(e).with_source(path.display().to_string()))
    }

    fn get_object(&self, bucket: &str, key: &str) -> CloudResult<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        fs::read(&path).map_err(|e| CloudIOError::from(e).with_source(path.display().to_string()))
    }

    fn delete_object(&self, bucket: &str, key: &str) -> CloudResult<()> {
        let path = self.object_path(bucket, key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            // Deleting a missing object is not an error in object stores.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CloudIOError::from(e).with_source(path.display().to_string())),
        }
    }

    fn list_objects_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> CloudResult<ObjectListing> {
        let dir = self.bucket_dir(bucket)?;
        if !dir.is_dir() {
            return Err(CloudIOError::new(
                ErrorKind::NotFound,
                format!("Bucket {bucket} not found"),
            ));
        }
        let mut keys = Vec::new();
        collect_keys(&dir, &dir, &mut keys)
            .map_err(|e| CloudIOError::from(e).with_source(dir.display().to_string()))?;
        keys.sort();

        let mut matching = keys
            .into_iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| continuation_token.is_none_or(|after| key.as_str() > after))
            .map(|(key, size)| ObjectMetadata { key, size });

        let objects: Vec<ObjectMetadata> = matching.by_ref().take(self.page_size).collect();
        let next_continuation_token = if matching.next().is_some() {
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
        Ok(self.object_path(bucket, key)?.is_file())
    }

    fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> CloudResult<()> {
        let data = self.get_object(src_bucket, src_key)?;
        self.put_object(dst_bucket, dst_key, &data)
    }
}

/// Notifier that only logs the success signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTaskNotifier;

impl TaskNotifier for LogTaskNotifier {
    fn notify_success(&self, token: &str, output: &str) -> CloudResult<()> {
        info!(token, output, "task success");
        Ok(())
    }
}

/// Notifier that appends each success signal as a JSON line to a file.
#[derive(Debug)]
pub struct FileTaskNotifier {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTaskNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl TaskNotifier for FileTaskNotifier {
    fn notify_success(&self, token: &str, output: &str) -> CloudResult<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| CloudIOError::new(ErrorKind::InternalError, "notifier lock poisoned"))?;
        let mut f: File = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = json!({ "taskToken": token, "output": output });
        writeln!(f, "{line}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_and_listing() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = LocalObjectIO::new(tmp.path()).with_page_size(1);
        storage.put_object("in", "a/b/one.csv", b"1").unwrap();
        storage.put_object("in", "a/two.csv", b"22").unwrap();
        storage.put_object("in", "z.csv", b"333").unwrap();

        assert_eq!(storage.get_object("in", "a/two.csv").unwrap(), b"22");
        let keys: Vec<String> = storage
            .list_objects("in", "a/")
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["a/b/one.csv", "a/two.csv"]);
    }

    #[test]
    fn test_delete_and_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = LocalObjectIO::new(tmp.path());
        storage.put_object("in", "k.csv", b"data").unwrap();
        storage.copy_object("in", "k.csv", "quarantine", "v/k.csv").unwrap();
        storage.delete_object("in", "k.csv").unwrap();
        storage.delete_object("in", "k.csv").unwrap();
        assert!(!storage.object_exists("in", "k.csv").unwrap());
        assert_eq!(storage.get_object("quarantine", "v/k.csv").unwrap(), b"data");
    }

    #[test]
    fn test_rejects_escaping_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = LocalObjectIO::new(tmp.path());
        let err = storage.put_object("in", "../outside", b"x").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert!(storage.get_object("in", "/etc/passwd").is_err());
    }

    #[test]
    fn test_missing_object_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = LocalObjectIO::new(tmp.path());
        assert_eq!(
            storage.get_object("in", "nope.csv").unwrap_err().kind,
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_file_notifier_appends_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("notifications.jsonl");
        let notifier = FileTaskNotifier::new(&path);
        notifier.notify_success("t1", "{}").unwrap();
        notifier.notify_success("t2", "{}").unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["taskToken"], "t2");
    }
}
