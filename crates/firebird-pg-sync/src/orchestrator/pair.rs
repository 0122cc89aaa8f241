//! Sync of one source/target database pair.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{PairConfig, SyncConfig};
use crate::core::schema::{SyncStatus, TableSyncResult};
use crate::core::traits::{SourceConnector, SourceReader, TargetProvider};
use crate::error::Result;
use crate::sync::TableSyncer;

/// A failed table within a pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableError {
    pub table: String,
    pub message: String,
}

/// Counts and failures for one pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub pair_name: String,
    pub target_database: String,
    pub tables_total: usize,
    pub tables_ok: usize,
    pub tables_skipped: usize,
    pub tables_error: usize,
    pub total_rows: u64,
    /// Tables whose sync failed; one entry per `tables_error`.
    pub errors: Vec<TableError>,
    /// Tables whose outcome could not be written to the metadata table.
    pub metadata_errors: Vec<TableError>,
    /// Per-table outcomes in sync order.
    pub tables: Vec<TableSyncResult>,
}

impl RunSummary {
    fn new(pair: &PairConfig) -> Self {
        Self {
            pair_name: pair.name.clone(),
            target_database: pair.target_database.clone(),
            ..Default::default()
        }
    }

    fn add(&mut self, result: TableSyncResult) {
        self.tables_total += 1;
        match result.status {
            SyncStatus::Ok => self.tables_ok += 1,
            SyncStatus::Skipped => self.tables_skipped += 1,
            SyncStatus::Error => {
                self.tables_error += 1;
                self.errors.push(TableError {
                    table: result.table_name.clone(),
                    message: result.error_message.clone().unwrap_or_default(),
                });
            }
        }
        self.total_rows += result.row_count;
        self.tables.push(result);
    }

    /// `pair.table: message` for every failure, sync failures first.
    pub fn error_strings(&self) -> Vec<String> {
        self.errors
            .iter()
            .chain(&self.metadata_errors)
            .map(|e| format!("{}.{}: {}", self.pair_name, e.table, e.message))
            .collect()
    }
}

/// Sync every user table of one pair.
///
/// The source is detached on every path once attached. An error here means the
/// pair as a whole failed (connection, target, metadata table or table listing);
/// table-level failures are reported inside the summary instead.
pub async fn sync_pair(
    pair: &PairConfig,
    connector: &dyn SourceConnector,
    targets: &dyn TargetProvider,
    config: &SyncConfig,
) -> Result<RunSummary> {
    info!("Starting sync for {} -> {}", pair.name, pair.target_database);

    let source = connector.attach(pair).await?;
    let outcome = sync_tables(pair, source.as_ref(), targets, config).await;

    if let Err(e) = source.detach().await {
        warn!("{}: detach failed: {}", pair.name, e);
    }
    outcome
}

async fn sync_tables(
    pair: &PairConfig,
    source: &dyn SourceReader,
    targets: &dyn TargetProvider,
    config: &SyncConfig,
) -> Result<RunSummary> {
    let target = targets.target(&pair.target_database).await?;
    target.metadata.ensure().await?;

    let tables = source.list_user_tables().await?;
    info!("{}: found {} tables", pair.name, tables.len());

    let syncer = TableSyncer::new(source, target.writer.as_ref(), config);
    let mut summary = RunSummary::new(pair);

    for table in &tables {
        let result = syncer.sync(table).await;

        if let Err(e) = target.metadata.record(&result).await {
            error!("{}: failed to record status for {}: {}", pair.name, table, e);
            summary.metadata_errors.push(TableError {
                table: table.clone(),
                message: format!("metadata update failed: {}", e),
            });
        }
        summary.add(result);
    }

    info!(
        "{}: done - {}/{} OK, {} skipped, {} errors, {} total rows",
        pair.name,
        summary.tables_ok,
        summary.tables_total,
        summary.tables_skipped,
        summary.tables_error,
        summary.total_rows
    );
    if !summary.metadata_errors.is_empty() {
        warn!(
            "{}: {} table outcomes missing from {}",
            pair.name,
            summary.metadata_errors.len(),
            config.metadata_table
        );
    }
    Ok(summary)
}
