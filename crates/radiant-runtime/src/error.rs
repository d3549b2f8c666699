use std::path::PathBuf;

use radiant_core::CellError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Failures of a backing store or of a storage-backed cell.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed store file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("default for stored key {key} is invalid: {source}")]
    InvalidDefault {
        key: String,
        #[source]
        source: CellError,
    },
}

/// Failures while loading configuration or installing logging.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("invalid log filter {filter:?}: {message}")]
    InvalidLogFilter { filter: String, message: String },

    #[error("logging already initialized: {0}")]
    LoggingInit(String),
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
