//! Batched full reload of one target table.
//!
//! Rows are written with multi-row parameterized INSERTs. The batch size is
//! derived from the column count so that one statement never binds more than
//! the configured parameter ceiling.

use tracing::debug;

use crate::config::SyncConfig;
use crate::core::identifier::{quote_ident, quote_list};
use crate::core::schema::ColumnDefinition;
use crate::core::traits::TargetWriter;
use crate::core::value::{coerce, SourceValue, SqlValue};
use crate::error::{Result, SyncError};

/// Per-statement limits for batched inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_batch_rows: usize,
    pub max_parameters: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for BatchLimits {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_batch_rows: config.max_batch_rows,
            max_parameters: config.max_parameters,
        }
    }
}

/// Rows per INSERT for a table with `column_count` columns.
///
/// Returns `min(max_batch_rows, max_parameters / column_count)`, so the
/// result `B` always satisfies `B * column_count <= max_parameters`.
pub fn batch_size(column_count: usize, limits: &BatchLimits) -> Result<usize> {
    if column_count == 0 {
        return Err(SyncError::batch_load("", "cannot batch rows without columns"));
    }
    let size = limits
        .max_batch_rows
        .min(limits.max_parameters / column_count);
    if size == 0 {
        return Err(SyncError::batch_load(
            "",
            format!(
                "{} columns exceed the {} parameter ceiling for one row",
                column_count, limits.max_parameters
            ),
        ));
    }
    Ok(size)
}

/// `CREATE TABLE IF NOT EXISTS` for the sync set, in column order.
pub fn build_create_table_sql(table: &str, columns: &[ColumnDefinition]) -> Result<String> {
    let defs = columns
        .iter()
        .map(|c| Ok(format!("{} {}", quote_ident(&c.name)?, c.target_declaration())))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(table)?,
        defs.join(", ")
    ))
}

/// `TRUNCATE TABLE` for a target table.
pub fn build_truncate_sql(table: &str) -> Result<String> {
    Ok(format!("TRUNCATE TABLE {}", quote_ident(table)?))
}

/// Multi-row INSERT with `$n` placeholders numbered row-major.
pub fn build_insert_sql(
    table: &str,
    columns: &[ColumnDefinition],
    row_count: usize,
) -> Result<String> {
    let col_list = quote_list(columns.iter().map(|c| c.name.as_str()))?;
    let width = columns.len();

    let placeholders = (0..row_count)
        .map(|row| {
            let params = (1..=width)
                .map(|col| format!("${}", row * width + col))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({})", params)
        })
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table)?,
        col_list,
        placeholders
    ))
}

/// Replace the contents of `table` with `rows`.
///
/// Truncates first, then inserts in batches. Any failure aborts the table
/// as [`SyncError::BatchLoad`]; rows from batches already committed stay.
pub async fn reload(
    writer: &dyn TargetWriter,
    table: &str,
    columns: &[ColumnDefinition],
    rows: Vec<Vec<SourceValue>>,
    limits: &BatchLimits,
) -> Result<u64> {
    let size = batch_size(columns.len(), limits).map_err(|e| with_table(e, table))?;

    writer
        .truncate(table)
        .await
        .map_err(|e| with_table(e, table))?;

    let total = rows.len();
    let mut inserted = 0u64;
    let mut rows = rows.into_iter().enumerate().peekable();

    while rows.peek().is_some() {
        let mut batch = Vec::with_capacity(size);
        for (index, row) in rows.by_ref().take(size) {
            batch.push(coerce_row(table, index, row, columns)?);
        }

        inserted += writer
            .insert_batch(table, columns, &batch)
            .await
            .map_err(|e| with_table(e, table))?;
        debug!("{}: inserted {}/{} rows", table, inserted, total);
    }

    Ok(inserted)
}

fn coerce_row(
    table: &str,
    index: usize,
    row: Vec<SourceValue>,
    columns: &[ColumnDefinition],
) -> Result<Vec<SqlValue>> {
    if row.len() != columns.len() {
        return Err(SyncError::batch_load(
            table,
            format!(
                "row {} has {} values for {} columns",
                index,
                row.len(),
                columns.len()
            ),
        ));
    }
    row.into_iter()
        .zip(columns)
        .map(|(value, col)| {
            coerce(value, col.target_type).map_err(|message| {
                SyncError::batch_load(table, format!("row {}, column {}: {}", index, col.name, message))
            })
        })
        .collect()
}

fn with_table(err: SyncError, table: &str) -> SyncError {
    match err {
        SyncError::BatchLoad { message, .. } => SyncError::batch_load(table, message),
        other => SyncError::batch_load(table, other),
    }
}
