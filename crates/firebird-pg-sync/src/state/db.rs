//! Database-backed metadata store.
//!
//! Keeps one row per mirrored table in a status table (default `_sync_meta`)
//! inside the target database itself, so reporting tools can read sync health
//! next to the data.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use deadpool_postgres::{Object, Pool};
use tokio_postgres::error::SqlState;

use super::backend::{stored_row_count, MetadataStore};
use crate::core::identifier::quote_ident;
use crate::core::schema::{SyncMetadataRecord, TableSyncResult};
use crate::error::{Result, SyncError};

/// PostgreSQL metadata store for one target database.
pub struct DbMetadataStore {
    pool: Pool,
    table: String,
}

impl DbMetadataStore {
    /// Create a store writing to `table` through `pool`.
    pub fn new(pool: Pool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    async fn client(&self) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| SyncError::pool(e, format!("accessing {}", self.table)))
    }
}

pub(crate) fn create_table_sql(table: &str) -> Result<String> {
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (
            table_name VARCHAR(255) PRIMARY KEY,
            last_sync_at TIMESTAMP NOT NULL DEFAULT NOW(),
            row_count INTEGER NOT NULL DEFAULT 0,
            status VARCHAR(20) NOT NULL DEFAULT 'ok',
            error_message TEXT
        )",
        quote_ident(table)?
    ))
}

pub(crate) fn upsert_sql(table: &str) -> Result<String> {
    Ok(format!(
        "INSERT INTO {} (table_name, last_sync_at, row_count, status, error_message)
         VALUES ($1, NOW(), $2, $3, $4)
         ON CONFLICT (table_name) DO UPDATE SET
            last_sync_at = NOW(),
            row_count = EXCLUDED.row_count,
            status = EXCLUDED.status,
            error_message = EXCLUDED.error_message",
        quote_ident(table)?
    ))
}

#[async_trait]
impl MetadataStore for DbMetadataStore {
    async fn ensure(&self) -> Result<()> {
        let conn = self.client().await?;
        conn.batch_execute(&create_table_sql(&self.table)?).await?;
        Ok(())
    }

    async fn record(&self, result: &TableSyncResult) -> Result<()> {
        let conn = self.client().await?;
        conn.execute(
            upsert_sql(&self.table)?.as_str(),
            &[
                &result.table_name,
                &stored_row_count(result.row_count),
                &result.status.as_str(),
                &result.error_message,
            ],
        )
        .await?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<SyncMetadataRecord>> {
        let conn = self.client().await?;
        let queried = conn
            .query(
                format!(
                    "SELECT table_name, last_sync_at, row_count, status, error_message
                     FROM {}
                     ORDER BY table_name",
                    quote_ident(&self.table)?
                )
                .as_str(),
                &[],
            )
            .await;
        let rows = match queried {
            Ok(rows) => rows,
            // Never synced: reading must not create the table.
            Err(e) if e.code() == Some(&SqlState::UNDEFINED_TABLE) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let last_sync_at: NaiveDateTime = row.get(1);
            let row_count: i32 = row.get(2);
            let status: String = row.get(3);
            records.push(SyncMetadataRecord {
                table_name: row.get(0),
                last_sync_at,
                row_count: i64::from(row_count),
                status: status.parse()?,
                error_message: row.get(4),
            });
        }
        Ok(records)
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }
}
