//! Process configuration.
//!
//! All settings come from environment-style key/value pairs and are read once at
//! startup into a [`ProcessorConfig`], which is then passed by reference into the
//! orchestrators. Nothing below this module looks at the environment.

use encoding_rs::Encoding;
use std::fmt;
use thiserror::Error;

pub const OUTPUT_BUCKET_ENV_KEY: &str = "OUTPUT_BUCKET";
pub const SCHEMA_REGISTRY_BUCKET_ENV_KEY: &str = "SCHEMA_REGISTRY_BUCKET";
pub const VIOLATIONS_BUCKET_ENV_KEY: &str = "VIOLATIONS_BUCKET";
pub const VIOLATIONS_PATH_ENV_KEY: &str = "VIOLATIONS_PATH";
pub const CHARSET_ENV_KEY: &str = "CHARSET";
pub const NUMBER_OF_HEADER_ROWS_TO_SKIP_ENV_KEY: &str = "NUMBER_OF_HEADER_ROWS_TO_SKIP";
pub const LOG_CSV_ENV_KEY: &str = "LOG_CSV";

/// A configuration value is missing or cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} environment variable must not be null")]
    Missing(&'static str),

    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings shared by every file in an invocation.
#[derive(Clone)]
pub struct ProcessorConfig {
    pub output_bucket: String,
    pub schema_registry_bucket: String,
    pub violations_bucket: String,
    pub violations_path: String,
    pub charset: &'static Encoding,
    pub header_rows_to_skip: usize,
    pub log_csv: bool,
}

impl ProcessorConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if any key is unset or holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    ///
    /// # Errors
    ///
    /// Returns an error if any key is unset or holds an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        let charset_label = get(CHARSET_ENV_KEY)?;
        let charset = Encoding::for_label(charset_label.trim().as_bytes()).ok_or_else(|| {
            ConfigError::Invalid {
                key: CHARSET_ENV_KEY,
                value: charset_label.clone(),
                reason: "unknown character set".to_string(),
            }
        })?;

        let skip = get(NUMBER_OF_HEADER_ROWS_TO_SKIP_ENV_KEY)?;
        let header_rows_to_skip = skip.parse::<usize>().map_err(|e| ConfigError::Invalid {
            key: NUMBER_OF_HEADER_ROWS_TO_SKIP_ENV_KEY,
            value: skip.clone(),
            reason: e.to_string(),
        })?;

        let log_csv = parse_strict_bool(LOG_CSV_ENV_KEY, &get(LOG_CSV_ENV_KEY)?)?;

        Ok(Self {
            output_bucket: get(OUTPUT_BUCKET_ENV_KEY)?,
            schema_registry_bucket: get(SCHEMA_REGISTRY_BUCKET_ENV_KEY)?,
            violations_bucket: get(VIOLATIONS_BUCKET_ENV_KEY)?,
            violations_path: get(VIOLATIONS_PATH_ENV_KEY)?,
            charset,
            header_rows_to_skip,
            log_csv,
        })
    }
}

impl fmt::Debug for ProcessorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorConfig")
            .field("output_bucket", &self.output_bucket)
            .field("schema_registry_bucket", &self.schema_registry_bucket)
            .field("violations_bucket", &self.violations_bucket)
            .field("violations_path", &self.violations_path)
            .field("charset", &self.charset.name())
            .field("header_rows_to_skip", &self.header_rows_to_skip)
            .field("log_csv", &self.log_csv)
            .finish()
    }
}

fn parse_strict_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            value: other.to_string(),
            reason: "expected 'true' or 'false'".to_string(),
        }),
    }
}
