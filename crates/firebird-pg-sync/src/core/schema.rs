//! Column metadata and per-table sync outcome types.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::typemap::{firebird_to_postgres, PgType};

/// Column descriptor as read from the Firebird catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawColumn {
    /// Column name (trimmed).
    pub name: String,
    /// `RDB$FIELD_TYPE`.
    pub field_type: i16,
    /// `RDB$FIELD_LENGTH`.
    pub length: i32,
    /// `RDB$FIELD_PRECISION` (0 when unset).
    pub precision: i32,
    /// `RDB$FIELD_SCALE` (negative for fixed-point decimals).
    pub scale: i32,
    /// `RDB$FIELD_SUB_TYPE`.
    pub sub_type: Option<i16>,
}

/// A source column together with its mapped target type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub field_type: i16,
    pub length: i32,
    pub precision: i32,
    pub scale: i32,
    pub sub_type: Option<i16>,
    pub target_type: PgType,
}

impl ColumnDefinition {
    /// Map a raw catalog column.
    pub fn from_raw(raw: RawColumn) -> Self {
        let target_type = firebird_to_postgres(
            raw.field_type,
            raw.length,
            raw.precision,
            raw.scale,
            raw.sub_type,
        );
        Self {
            name: raw.name,
            field_type: raw.field_type,
            length: raw.length,
            precision: raw.precision,
            scale: raw.scale,
            sub_type: raw.sub_type,
            target_type,
        }
    }

    /// PostgreSQL type declaration, e.g. `VARCHAR(50)`.
    pub fn target_declaration(&self) -> String {
        self.target_type.to_string()
    }

    /// True for BLOB SUB_TYPE TEXT and other columns resolved through a deferred handle.
    pub fn is_text_blob(&self) -> bool {
        self.field_type == crate::typemap::field_type::BLOB && self.target_type == PgType::Text
    }
}

/// Outcome of one table attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Ok,
    Skipped,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Ok => "ok",
            SyncStatus::Skipped => "skipped",
            SyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(SyncStatus::Ok),
            "skipped" => Ok(SyncStatus::Skipped),
            "error" => Ok(SyncStatus::Error),
            _ => Err(SyncError::Config(format!("Invalid sync status: {}", s))),
        }
    }
}

/// Result of syncing one table in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSyncResult {
    pub table_name: String,
    pub row_count: u64,
    pub status: SyncStatus,
    pub error_message: Option<String>,
    pub duration_ms: u64,
}

impl TableSyncResult {
    pub fn ok(table_name: impl Into<String>, row_count: u64, duration_ms: u64) -> Self {
        Self {
            table_name: table_name.into(),
            row_count,
            status: SyncStatus::Ok,
            error_message: None,
            duration_ms,
        }
    }

    pub fn skipped(table_name: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            table_name: table_name.into(),
            row_count: 0,
            status: SyncStatus::Skipped,
            error_message: None,
            duration_ms,
        }
    }

    pub fn error(table_name: impl Into<String>, message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            table_name: table_name.into(),
            row_count: 0,
            status: SyncStatus::Error,
            error_message: Some(message.into()),
            duration_ms,
        }
    }
}

/// One row of the metadata table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMetadataRecord {
    pub table_name: String,
    pub last_sync_at: NaiveDateTime,
    pub row_count: i64,
    pub status: SyncStatus,
    pub error_message: Option<String>,
}
