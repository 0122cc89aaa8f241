//! Core traits for the sync engine.
//!
//! - [`SourceReader`]: schema introspection and row extraction from a source database
//! - [`SourceConnector`]: opens one [`SourceReader`] per configured pair
//! - [`TargetWriter`]: DDL, truncate and batched inserts against a target database
//! - [`TargetProvider`]: hands out per-database target handles and owns their pools
//!
//! Production implementations live in `source::firebird`, `target::postgres`
//! and `target::registry`; tests substitute in-memory versions.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::PairConfig;
use crate::error::Result;
use crate::state::MetadataStore;

use super::schema::{ColumnDefinition, RawColumn};
use super::value::{SourceValue, SqlValue};

/// Read schema and rows from a source database.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// List user tables (no system relations, no views) in a stable order.
    async fn list_user_tables(&self) -> Result<Vec<String>>;

    /// Column descriptors for a table, ordered by declared field position.
    ///
    /// Fails with [`SyncError::Schema`](crate::error::SyncError::Schema) when
    /// the table no longer exists.
    async fn get_columns(&self, table: &str) -> Result<Vec<RawColumn>>;

    /// Read every row of `table`, restricted to `columns` and in that order.
    ///
    /// Text BLOB columns are returned as [`SourceValue::Deferred`] handles.
    async fn read_rows(
        &self,
        table: &str,
        columns: &[ColumnDefinition],
    ) -> Result<Vec<Vec<SourceValue>>>;

    /// Release the underlying connection. Safe to call more than once.
    async fn detach(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "firebird").
    fn db_type(&self) -> &str;
}

/// Open source connections for configured pairs.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    async fn attach(&self, pair: &PairConfig) -> Result<Box<dyn SourceReader>>;
}

/// Write schema and rows to a target database.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// `CREATE TABLE IF NOT EXISTS` with one column per definition.
    async fn ensure_table(&self, table: &str, columns: &[ColumnDefinition]) -> Result<()>;

    /// Remove all rows from a table.
    async fn truncate(&self, table: &str) -> Result<()>;

    /// Insert one batch of rows with a single multi-row statement.
    async fn insert_batch(
        &self,
        table: &str,
        columns: &[ColumnDefinition],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64>;

    /// Check that the target answers queries.
    async fn ping(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "postgres").
    fn db_type(&self) -> &str;
}

/// Writer and metadata store bound to one target database.
#[derive(Clone)]
pub struct TargetHandle {
    pub database: String,
    pub writer: Arc<dyn TargetWriter>,
    pub metadata: Arc<dyn MetadataStore>,
}

/// Hand out target handles per database name.
#[async_trait]
pub trait TargetProvider: Send + Sync {
    /// Get (or create) the handle for `database`.
    async fn target(&self, database: &str) -> Result<TargetHandle>;

    /// Close every pool created so far.
    async fn close_all(&self);
}
