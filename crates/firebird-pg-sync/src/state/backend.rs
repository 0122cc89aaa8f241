//! Metadata store trait for per-table sync status.
//!
//! The [`MetadataStore`] trait is the interface for the status table each
//! target database carries. Implementations:
//!
//! - **PostgreSQL**: [`DbMetadataStore`](super::DbMetadataStore) in `db.rs`
//! - **Memory**: [`MemoryMetadataStore`](super::MemoryMetadataStore) in `memory.rs`
//!
//! The orchestrator works with `Arc<dyn MetadataStore>` without knowing the
//! concrete type.

use async_trait::async_trait;

use crate::core::schema::{SyncMetadataRecord, TableSyncResult};
use crate::error::Result;

/// Persistence for the latest outcome of every table.
///
/// Implementations must be `Send + Sync` to allow sharing across async tasks.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Create the metadata table if it is missing.
    ///
    /// This should be idempotent - safe to call on every run.
    async fn ensure(&self) -> Result<()>;

    /// Upsert the record for `result.table_name`.
    ///
    /// Exactly one record exists per table name; it always reflects the most
    /// recent attempt, with the error message cleared on success.
    async fn record(&self, result: &TableSyncResult) -> Result<()>;

    /// All records, ordered by table name.
    ///
    /// Read-only: a store whose table was never created yields no records.
    async fn load_all(&self) -> Result<Vec<SyncMetadataRecord>>;

    /// Get the backend type name for logging/debugging.
    fn backend_type(&self) -> &'static str;
}

/// Clamp a row count into the metadata table's INTEGER column.
pub fn stored_row_count(row_count: u64) -> i32 {
    i32::try_from(row_count).unwrap_or(i32::MAX)
}
