//! Error types for the takeoff import pipeline

use std::time::Duration;

use thiserror::Error;

use crate::types::{ImportErrorKind, ImportIssue};

/// Problems that stop an import before any data row is validated
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("File too large: {size} bytes (limit is {limit})")]
    FileTooLarge { size: usize, limit: String },

    #[error("Too many rows: {count} data rows (Maximum {limit} rows)")]
    RowCountExceeded { count: usize, limit: String },

    #[error("Too many components: {count} would be created (Maximum {limit} components)")]
    ComponentCountExceeded { count: u64, limit: String },

    #[error("Malformed CSV at row {row}: {message}")]
    MalformedCsv { row: u32, message: String },

    #[error("CSV file contains no header row")]
    MissingHeader,

    #[error("CSV file contains no data rows")]
    NoDataRows,
}

impl StructuralError {
    pub fn kind(&self) -> ImportErrorKind {
        match self {
            StructuralError::FileTooLarge { .. } => ImportErrorKind::FileTooLarge,
            StructuralError::RowCountExceeded { .. } => ImportErrorKind::RowCountExceeded,
            StructuralError::ComponentCountExceeded { .. } => ImportErrorKind::ComponentCountExceeded,
            StructuralError::MalformedCsv { .. } => ImportErrorKind::MalformedCsv,
            StructuralError::MissingHeader | StructuralError::NoDataRows => ImportErrorKind::EmptyFile,
        }
    }

    pub fn to_issue(&self) -> ImportIssue {
        let row = match self {
            StructuralError::MalformedCsv { row, .. } => *row,
            _ => 0,
        };
        ImportIssue::new(row, None, self.kind(), self.to_string())
    }
}

/// Persistence failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store already holds a component with one of the keys
    #[error("identity key conflict: {0}")]
    Conflict(String),

    #[error("store did not respond within {0:?}")]
    Timeout(Duration),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Postgres unique_violation
const UNIQUE_VIOLATION: &str = "23505";

impl StoreError {
    /// Lift unique-constraint violations out of raw database errors
    pub fn from_database(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return StoreError::Conflict(db_err.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}
