//! Error types for the sync engine.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Main error type for sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cannot reach a source or target database. Fatal to the enclosing pair.
    #[error("Connection to {target} failed: {message}")]
    Connection { target: String, message: String },

    /// A listed table could not be introspected.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A deferred BLOB value did not resolve in time.
    #[error("BLOB fetch timed out after {0:?}")]
    BlobTimeout(Duration),

    /// A batch INSERT (or the value coercion feeding it) failed.
    #[error("Batch load failed for table {table}: {message}")]
    BatchLoad { table: String, message: String },

    /// Firebird driver error
    #[error("Source database error: {0}")]
    Source(String),

    /// Target database query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// One or more tables or pairs failed during a run.
    #[error("{0}")]
    Aggregate(AggregateRunError),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Itemized failure report for a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateRunError {
    pub total_tables: usize,
    pub total_ok: usize,
    pub total_rows: u64,
    /// `pair.table: message` for table failures, `pair: message` for pair failures.
    pub errors: Vec<String>,
}

impl fmt::Display for AggregateRunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Firebird sync completed with {} error(s): {}",
            self.errors.len(),
            self.errors.join("; ")
        )
    }
}

impl std::error::Error for AggregateRunError {}

impl SyncError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl fmt::Display, context: impl Into<String>) -> Self {
        SyncError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Connection error
    pub fn connection(target: impl Into<String>, message: impl fmt::Display) -> Self {
        SyncError::Connection {
            target: target.into(),
            message: message.to_string(),
        }
    }

    /// Create a BatchLoad error
    pub fn batch_load(table: impl Into<String>, message: impl fmt::Display) -> Self {
        SyncError::BatchLoad {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::Aggregate(_) => 1,
            SyncError::Config(_) | SyncError::Yaml(_) => 2,
            _ => 3,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        if let SyncError::Aggregate(agg) = self {
            for item in &agg.errors {
                output.push_str(&format!("  - {}\n", item));
            }
        }

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
