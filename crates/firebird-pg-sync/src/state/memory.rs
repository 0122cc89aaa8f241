//! In-memory metadata store.
//!
//! Same upsert semantics as the database store, without a database. Handy for
//! dry runs and tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::backend::{stored_row_count, MetadataStore};
use crate::core::schema::{SyncMetadataRecord, TableSyncResult};
use crate::error::{Result, SyncError};

/// Metadata records held in a map keyed by table name.
#[derive(Default)]
pub struct MemoryMetadataStore {
    records: Mutex<BTreeMap<String, SyncMetadataRecord>>,
    ensured: Mutex<bool>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether [`MetadataStore::ensure`] has been called.
    pub fn is_ensured(&self) -> bool {
        self.ensured.lock().map(|e| *e).unwrap_or(false)
    }

    /// The current record for one table.
    pub fn get(&self, table: &str) -> Option<SyncMetadataRecord> {
        self.records.lock().ok()?.get(table).cloned()
    }

    fn poisoned() -> SyncError {
        SyncError::Source("metadata store lock poisoned".into())
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn ensure(&self) -> Result<()> {
        *self.ensured.lock().map_err(|_| Self::poisoned())? = true;
        Ok(())
    }

    async fn record(&self, result: &TableSyncResult) -> Result<()> {
        let record = SyncMetadataRecord {
            table_name: result.table_name.clone(),
            last_sync_at: Utc::now().naive_utc(),
            row_count: i64::from(stored_row_count(result.row_count)),
            status: result.status,
            error_message: result.error_message.clone(),
        };
        self.records
            .lock()
            .map_err(|_| Self::poisoned())?
            .insert(record.table_name.clone(), record);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<SyncMetadataRecord>> {
        let records = self.records.lock().map_err(|_| Self::poisoned())?;
        Ok(records.values().cloned().collect())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
