//! PostgreSQL target writer.

use async_trait::async_trait;
use deadpool_postgres::{Object, Pool};
use tokio_postgres::types::ToSql;
use tracing::debug;

use super::loader::{build_create_table_sql, build_insert_sql, build_truncate_sql};
use crate::core::schema::ColumnDefinition;
use crate::core::traits::TargetWriter;
use crate::core::value::SqlValue;
use crate::error::{Result, SyncError};

/// Writes mirrored tables into one PostgreSQL database.
#[derive(Clone)]
pub struct PgTarget {
    pool: Pool,
    database: String,
}

impl PgTarget {
    pub fn new(pool: Pool, database: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
        }
    }

    async fn client(&self, context: &str) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| SyncError::pool(e, format!("{} ({})", context, self.database)))
    }
}

#[async_trait]
impl TargetWriter for PgTarget {
    async fn ensure_table(&self, table: &str, columns: &[ColumnDefinition]) -> Result<()> {
        let sql = build_create_table_sql(table, columns)?;
        debug!("{}: {}", self.database, sql);
        let client = self.client("creating target table").await?;
        client.batch_execute(&sql).await?;
        Ok(())
    }

    async fn truncate(&self, table: &str) -> Result<()> {
        let sql = build_truncate_sql(table)?;
        let client = self.client("truncating target table").await?;
        client.batch_execute(&sql).await?;
        Ok(())
    }

    async fn insert_batch(
        &self,
        table: &str,
        columns: &[ColumnDefinition],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let sql = build_insert_sql(table, columns, rows.len())?;
        let params: Vec<Box<dyn ToSql + Sync + Send>> =
            rows.iter().flatten().map(SqlValue::to_param).collect();
        let param_refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let client = self.client("inserting batch").await?;
        let inserted = client.execute(sql.as_str(), &param_refs).await?;
        Ok(inserted)
    }

    async fn ping(&self) -> Result<()> {
        let client = self.client("health check").await?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "postgres"
    }
}
