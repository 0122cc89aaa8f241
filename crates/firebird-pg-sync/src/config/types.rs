//! Configuration type definitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Shared PostgreSQL connection settings.
    pub target: TargetConfig,

    /// Source/target database pairs, synced in order.
    #[serde(default)]
    pub pairs: Vec<PairConfig>,

    /// Sync behavior configuration.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Target database (PostgreSQL) configuration.
///
/// The database name comes from each pair; host and credentials are shared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host (default: 127.0.0.1).
    #[serde(default = "default_pg_host")]
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode: disable, require, verify-full (default: disable).
    #[serde(default = "default_disable")]
    pub ssl_mode: String,

    /// Maximum pooled connections per target database (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// One Firebird database and the PostgreSQL database it mirrors into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairConfig {
    /// Short pair name used in logs and error reports (e.g. "cmms").
    pub name: String,

    /// PostgreSQL database receiving the mirrored tables.
    pub target_database: String,

    /// Firebird connection settings.
    pub source: FirebirdConfig,
}

/// Source database (Firebird) configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirebirdConfig {
    /// Database host. Pairs without a host are skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Database port (default: 3050).
    #[serde(default = "default_fb_port")]
    pub port: u16,

    /// Database path or alias on the server.
    #[serde(default)]
    pub database: String,

    /// Username (default: SYSDBA).
    #[serde(default = "default_fb_user")]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,
}

impl FirebirdConfig {
    /// The configured host, if any non-blank one is set.
    pub fn host(&self) -> Option<&str> {
        self.host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
    }
}

/// Sync behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Upper bound on rows per INSERT statement (default: 1000).
    #[serde(default = "default_max_batch_rows")]
    pub max_batch_rows: usize,

    /// Bind parameter ceiling per statement, kept below PostgreSQL's 65535 (default: 50000).
    #[serde(default = "default_max_parameters")]
    pub max_parameters: usize,

    /// Time allowed to fetch one text BLOB before it is stored as NULL (default: 5000).
    #[serde(default = "default_blob_timeout_ms")]
    pub blob_timeout_ms: u64,

    /// Name of the per-target status table (default: _sync_meta).
    #[serde(default = "default_metadata_table")]
    pub metadata_table: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_batch_rows: default_max_batch_rows(),
            max_parameters: default_max_parameters(),
            blob_timeout_ms: default_blob_timeout_ms(),
            metadata_table: default_metadata_table(),
        }
    }
}

impl SyncConfig {
    pub fn blob_timeout(&self) -> Duration {
        Duration::from_millis(self.blob_timeout_ms)
    }
}

/// PostgreSQL's hard limit on bind parameters per statement.
pub const PG_MAX_PARAMETERS: usize = 65_535;

// Default value functions for serde
pub(crate) fn default_pg_host() -> String {
    "127.0.0.1".to_string()
}

pub(crate) fn default_pg_port() -> u16 {
    5432
}

pub(crate) fn default_disable() -> String {
    "disable".to_string()
}

pub(crate) fn default_max_connections() -> usize {
    4
}

pub(crate) fn default_fb_port() -> u16 {
    3050
}

pub(crate) fn default_fb_user() -> String {
    "SYSDBA".to_string()
}

fn default_max_batch_rows() -> usize {
    1000
}

fn default_max_parameters() -> usize {
    50_000
}

fn default_blob_timeout_ms() -> u64 {
    5000
}

fn default_metadata_table() -> String {
    "_sync_meta".to_string()
}
