//! Core error types for cadence-core.
//!
//! This module defines the error hierarchy using thiserror. Engine
//! operations surface [`ConfigurationError`] for bad inputs; storage
//! adapters surface [`DatabaseError`]; lifecycle misuse surfaces
//! [`TransitionError`] or [`ValidationError`].

use std::path::PathBuf;
use thiserror::Error;

use chrono::{NaiveDate, NaiveTime};

use crate::entry::EntryStatus;

/// Core error type for cadence-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid engine input (window, time range, missing field)
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Config file errors
    #[error("Config file error: {0}")]
    ConfigFile(#[from] ConfigError),

    /// Invalid status transition
    #[error("{0}")]
    Transition(#[from] TransitionError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Entry lookup failed
    #[error("Schedule entry not found: {0}")]
    EntryNotFound(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Invalid input handed to the recurrence engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Window start is after window end
    #[error("Invalid window: start ({start}) is after end ({end})")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },

    /// Start time does not precede end time within a single day
    #[error("Invalid time range: end ({end}) must be after start ({start}) on the same day")]
    InvalidTimeRange { start: NaiveTime, end: NaiveTime },

    /// Required field missing or blank
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Malformed time-of-day token
    #[error("Invalid time of day '{0}', expected HH:MM")]
    InvalidTimeOfDay(String),

    /// Malformed weekday token
    #[error("Invalid weekday '{0}'")]
    InvalidWeekday(String),

    /// Recurrence rule interval must be at least one
    #[error("Recurrence interval must be >= 1, got {0}")]
    InvalidInterval(u32),

    /// Task split must produce at least one part
    #[error("Cannot split into {0} parts")]
    InvalidSplit(u32),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration file errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown or mistyped key
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Error returned when an invalid status transition is attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid status transition: {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: EntryStatus,
    pub to: EntryStatus,
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Hours must be non-negative and finite
    #[error("Invalid hours for '{field}': {value}")]
    InvalidHours { field: &'static str, value: f64 },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                DatabaseError::Locked
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
