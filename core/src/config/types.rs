use serde::{Deserialize, Serialize};

use crate::destination::{DEFAULT_LOG_POSTFIX, DEFAULT_UPLOAD_BUFFER_BYTES};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_confirm_dialog")]
    pub confirm_dialog: bool,

    /// Template for the run name when none is given explicitly.
    #[serde(default)]
    pub default_name_template: Option<String>,

    #[serde(default)]
    pub file: FileConfig,

    #[serde(default)]
    pub s3: ObjectStoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub upload: UploadConfig,
}

fn default_confirm_dialog() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            confirm_dialog: default_confirm_dialog(),
            default_name_template: None,
            file: FileConfig::default(),
            s3: ObjectStoreConfig::default(),
            logging: LoggingConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    /// Directory for local execution logs. Unset means no local log unless
    /// nothing else is configured either.
    #[serde(default)]
    pub dir: Option<String>,

    #[serde(default = "default_log_file_postfix")]
    pub log_file_postfix: String,
}

fn default_log_file_postfix() -> String {
    DEFAULT_LOG_POSTFIX.to_string()
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            dir: None,
            log_file_postfix: default_log_file_postfix(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    #[serde(default)]
    pub bucket: Option<String>,

    #[serde(default)]
    pub object_prefix: String,

    /// Path-style endpoint, e.g. `http://localhost:9000`. When unset the
    /// virtual-hosted AWS endpoint for `region` is used.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    /// Bearer token sent with every request.
    #[serde(default)]
    pub token: Option<String>,
}

impl ObjectStoreConfig {
    pub fn is_enabled(&self) -> bool {
        self.bucket
            .as_deref()
            .map(|b| !b.trim().is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default)]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "runonce_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: false,
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Capacity of the in-memory pipe between the transcript and the upload.
    #[serde(default = "default_buffer_bytes")]
    pub buffer_bytes: usize,
}

fn default_buffer_bytes() -> usize {
    DEFAULT_UPLOAD_BUFFER_BYTES
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            buffer_bytes: default_buffer_bytes(),
        }
    }
}
