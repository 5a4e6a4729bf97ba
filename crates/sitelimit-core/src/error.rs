//! Core error types for sitelimit-core.
//!
//! Every fallible operation in the library reports one of these. Callers at
//! the edges (the tracker service, the CLI) decide which failures degrade to
//! "skip this evaluation" and which are shown to the user.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for sitelimit-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Key-value store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Settings validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Host (idle/window/tab) query errors
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    /// Alarm registration errors
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Key-value store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked by another writer
    #[error("Store is locked")]
    Locked,

    /// A previous holder of the store lock panicked
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Settings validation errors.
///
/// The messages are shown verbatim to whoever tried to change the limit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Time limit must be a number")]
    NotANumber,

    #[error("Time limit must be a whole number")]
    NotAnInteger,

    #[error("Time limit must be at least {min} minutes")]
    BelowMinimum { min: u32 },

    #[error("Time limit must not exceed {max} minutes")]
    AboveMaximum { max: u32 },
}

/// Failures of idle, window or tab queries against the host.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The host has not reported any state yet
    #[error("Host state unavailable")]
    Unavailable,

    /// The last host report is too old to trust
    #[error("Host state is stale ({age_secs}s old)")]
    Stale { age_secs: u64 },

    /// A specific query failed
    #[error("Host query '{query}' failed: {message}")]
    QueryFailed { query: String, message: String },
}

/// Alarm registration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Alarms need a running tokio runtime
    #[error("No async runtime available to arm '{0}'")]
    NoRuntime(String),

    /// The alarm cannot be registered as requested
    #[error("Invalid alarm '{name}': {message}")]
    Invalid { name: String, message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                StoreError::Locked
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        StoreError::Poisoned
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
