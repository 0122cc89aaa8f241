//! Per-table sync state machine.
//!
//! One table goes through
//! `introspecting -> mapping -> (skipped | table_ready) -> extracting ->
//! resolving_blobs -> loading -> ok | error`. Every path ends in exactly one
//! [`TableSyncResult`]; errors never escape [`TableSyncer::sync`].

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::core::identifier::validate_identifier;
use crate::core::schema::{ColumnDefinition, TableSyncResult};
use crate::core::traits::{SourceReader, TargetWriter};
use crate::core::value::SourceValue;
use crate::error::SyncError;
use crate::source::resolve_text_blob;
use crate::target::loader::{self, BatchLimits};

/// Non-terminal phases of a table sync, reported with failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Introspecting,
    Mapping,
    TableReady,
    Extracting,
    ResolvingBlobs,
    Loading,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncPhase::Introspecting => "introspecting",
            SyncPhase::Mapping => "mapping",
            SyncPhase::TableReady => "table_ready",
            SyncPhase::Extracting => "extracting",
            SyncPhase::ResolvingBlobs => "resolving_blobs",
            SyncPhase::Loading => "loading",
        };
        f.write_str(s)
    }
}

enum Outcome {
    Skipped(&'static str),
    Loaded(u64),
}

struct PhaseError {
    phase: SyncPhase,
    error: SyncError,
}

trait InPhase<T> {
    fn in_phase(self, phase: SyncPhase) -> Result<T, PhaseError>;
}

impl<T> InPhase<T> for crate::error::Result<T> {
    fn in_phase(self, phase: SyncPhase) -> Result<T, PhaseError> {
        self.map_err(|error| PhaseError { phase, error })
    }
}

/// Syncs single tables from one source into one target.
pub struct TableSyncer<'a> {
    source: &'a dyn SourceReader,
    writer: &'a dyn TargetWriter,
    limits: BatchLimits,
    blob_timeout: Duration,
}

impl<'a> TableSyncer<'a> {
    pub fn new(source: &'a dyn SourceReader, writer: &'a dyn TargetWriter, config: &SyncConfig) -> Self {
        Self {
            source,
            writer,
            limits: BatchLimits::from(config),
            blob_timeout: config.blob_timeout(),
        }
    }

    /// Fully reload `table` and report the outcome.
    pub async fn sync(&self, table: &str) -> TableSyncResult {
        let start = Instant::now();
        let outcome = self.run(table).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Outcome::Loaded(rows)) => {
                info!("  {}: {} rows ({}ms)", table, rows, duration_ms);
                TableSyncResult::ok(table, rows, duration_ms)
            }
            Ok(Outcome::Skipped(reason)) => {
                debug!("  {}: skipped ({})", table, reason);
                TableSyncResult::skipped(table, duration_ms)
            }
            Err(PhaseError { phase, error }) => {
                warn!("  {}: ERROR while {} - {}", table, phase, error);
                TableSyncResult::error(table, error.to_string(), duration_ms)
            }
        }
    }

    async fn run(&self, table: &str) -> Result<Outcome, PhaseError> {
        let raw = self
            .source
            .get_columns(table)
            .await
            .in_phase(SyncPhase::Introspecting)?;
        if raw.is_empty() {
            return Ok(Outcome::Skipped("no columns"));
        }

        validate_identifier(table).in_phase(SyncPhase::Mapping)?;
        for col in &raw {
            validate_identifier(&col.name).in_phase(SyncPhase::Mapping)?;
        }
        let columns = sync_set(raw.into_iter().map(ColumnDefinition::from_raw).collect());
        if columns.is_empty() {
            return Ok(Outcome::Skipped("only binary columns"));
        }

        self.writer
            .ensure_table(table, &columns)
            .await
            .in_phase(SyncPhase::TableReady)?;

        let mut rows = self
            .source
            .read_rows(table, &columns)
            .await
            .in_phase(SyncPhase::Extracting)?;

        let resolved = self.resolve_blobs(&mut rows, &columns).await;
        if resolved > 0 {
            debug!("  {}: {} resolved {} values", table, SyncPhase::ResolvingBlobs, resolved);
        }

        let inserted = loader::reload(self.writer, table, &columns, rows, &self.limits)
            .await
            .in_phase(SyncPhase::Loading)?;
        Ok(Outcome::Loaded(inserted))
    }

    /// Replace deferred text BLOB handles with their contents, or NULL.
    async fn resolve_blobs(&self, rows: &mut [Vec<SourceValue>], columns: &[ColumnDefinition]) -> usize {
        let blob_cols: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_text_blob())
            .map(|(i, _)| i)
            .collect();
        if blob_cols.is_empty() {
            return 0;
        }

        let mut resolved = 0;
        for row in rows.iter_mut() {
            for &i in &blob_cols {
                let Some(slot) = row.get_mut(i) else { continue };
                let SourceValue::Deferred(handle) = slot else { continue };
                let value = match resolve_text_blob(handle.as_ref(), self.blob_timeout).await {
                    Some(text) => SourceValue::Text(text),
                    None => SourceValue::Null,
                };
                *slot = value;
                resolved += 1;
            }
        }
        resolved
    }
}

/// Drop opaque binary columns, keeping declared order.
pub fn sync_set(columns: Vec<ColumnDefinition>) -> Vec<ColumnDefinition> {
    columns
        .into_iter()
        .filter(|c| !c.target_type.is_opaque_binary())
        .collect()
}
