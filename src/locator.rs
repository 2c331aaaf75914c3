//! Object locations and the invocation payload.
//!
//! A [`FileLocator`] is a `(bucket, key)` pair. Every location the processor
//! touches besides the input (registered schema, Parquet output, quarantine
//! copy) is derived from the input key and the [`ProcessorConfig`]:
//!
//! | derived    | bucket                   | key                                        |
//! |------------|--------------------------|--------------------------------------------|
//! | schema     | schema registry bucket   | `prefix(K) + ".avsc"`                      |
//! | output     | output bucket            | `prefix(K) + "/LOAD-" + name(K) + ".parquet"` |
//! | violation  | violations bucket        | `violations_path + "/" + K`                |
//!
//! `prefix(K)` is everything before the last `/` and `name(K)` everything
//! after it; a key without `/` is its own prefix and its own name.

use crate::config::ProcessorConfig;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::fmt;

/// Extension of registered schema objects.
pub const SCHEMA_EXTENSION: &str = ".avsc";
/// File name prefix marking full-load output files.
pub const OUTPUT_FILE_PREFIX: &str = "LOAD-";
/// Extension of output objects.
pub const OUTPUT_EXTENSION: &str = ".parquet";

/// A stored object: bucket plus key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileLocator {
    pub bucket: String,
    pub key: String,
}

impl FileLocator {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Registered schema for this input file.
    #[must_use]
    pub fn schema_locator(&self, config: &ProcessorConfig) -> Self {
        Self::new(
            &config.schema_registry_bucket,
            format!("{}{SCHEMA_EXTENSION}", key_prefix(&self.key)),
        )
    }

    /// Parquet destination for this input file.
    #[must_use]
    pub fn output_locator(&self, config: &ProcessorConfig) -> Self {
        Self::new(
            &config.output_bucket,
            format!(
                "{}{OUTPUT_FILE_PREFIX}{}{OUTPUT_EXTENSION}",
                ensure_slash(key_prefix(&self.key)),
                key_name(&self.key)
            ),
        )
    }

    /// Quarantine destination for this input file.
    #[must_use]
    pub fn violation_locator(&self, config: &ProcessorConfig) -> Self {
        Self::new(
            &config.violations_bucket,
            format!("{}{}", ensure_slash(&config.violations_path), self.key),
        )
    }
}

impl fmt::Display for FileLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

fn key_prefix(key: &str) -> &str {
    key.rsplit_once('/').map_or(key, |(prefix, _)| prefix)
}

fn key_name(key: &str) -> &str {
    key.rsplit_once('/').map_or(key, |(_, name)| name)
}

fn ensure_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// Decode a form-URL-encoded object key: `+` is a space and `%XX` escapes
/// are bytes of a UTF-8 string.
///
/// # Errors
///
/// Returns [`Error::Payload`] on a truncated or non-hex escape, or if the
/// decoded bytes are not UTF-8.
pub fn decode_object_key(encoded: &str) -> Result<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| {
                        Error::Payload(format!("malformed escape at byte {i} of key '{encoded}'"))
                    })?;
                out.push(hex);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out)
        .map_err(|e| Error::Payload(format!("key '{encoded}' does not decode to UTF-8: {e}")))
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    #[serde(rename = "stepFunctionToken")]
    step_function_token: Option<String>,
    #[serde(rename = "Records", default)]
    records: Vec<RawRecord>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    s3: Option<RawS3>,
}

#[derive(Debug, Deserialize)]
struct RawS3 {
    bucket: Option<RawBucket>,
    object: Option<RawObject>,
}

#[derive(Debug, Deserialize)]
struct RawBucket {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawObject {
    key: Option<String>,
}

/// What one invocation was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationPayload {
    /// A single file, or a prefix naming every file below it.
    pub input: FileLocator,
    /// Workflow token to notify on success, if any.
    pub workflow_token: Option<String>,
}

impl InvocationPayload {
    /// Parse an invocation payload from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Payload`] if the text is not JSON or lacks the bucket
    /// name or object key of the first record.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| Error::Payload(format!("payload is not valid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Interpret an already parsed payload. Only `Records[0]` is consulted.
    ///
    /// # Errors
    ///
    /// See [`InvocationPayload::from_json`].
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let raw: RawPayload = serde_json::from_value(value)
            .map_err(|e| Error::Payload(format!("unexpected payload shape: {e}")))?;
        let s3 = raw.records.into_iter().next().and_then(|r| r.s3);
        let (bucket, object) = match s3 {
            Some(s3) => (s3.bucket, s3.object),
            None => (None, None),
        };
        let bucket = bucket
            .and_then(|b| b.name)
            .ok_or_else(|| Error::Payload("input bucket name must not be null".into()))?;
        let key = object
            .and_then(|o| o.key)
            .ok_or_else(|| Error::Payload("input object key must not be null".into()))?;

        Ok(Self {
            input: FileLocator::new(bucket, decode_object_key(&key)?),
            workflow_token: raw.step_function_token,
        })
    }
}
