//! # firebird-pg-sync
//!
//! Full-reload replication of Firebird databases into PostgreSQL.
//!
//! Each configured pair mirrors every user table of one Firebird database
//! into one PostgreSQL database:
//!
//! - **Type mapping** from Firebird catalog descriptors to PostgreSQL columns
//! - **Truncate and reload** with batched, parameterized multi-row INSERTs
//! - **Text BLOB resolution** bounded by a timeout (NULL on failure)
//! - **Status table** (`_sync_meta`) upserted per table in every target
//! - **Failure isolation** per table and per pair, reported once per run
//!
//! ## Example
//!
//! ```rust,no_run
//! use firebird_pg_sync::{Config, SyncRunCoordinator};
//!
//! #[tokio::main]
//! async fn main() -> firebird_pg_sync::Result<()> {
//!     let config = Config::from_env()?;
//!     let coordinator = SyncRunCoordinator::from_config(config)?;
//!     let result = coordinator.run().await;
//!     coordinator.shutdown().await;
//!     println!("{}", result?.headline());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod source;
pub mod state;
pub mod sync;
pub mod target;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, FirebirdConfig, PairConfig, SyncConfig, TargetConfig};
pub use crate::core::{ColumnDefinition, RawColumn, SourceValue, SqlValue, SyncStatus, TableSyncResult};
pub use error::{AggregateRunError, Result, SyncError};
pub use orchestrator::{HealthReport, PairStatus, RunResult, RunSummary, SyncRunCoordinator};
pub use state::{DbMetadataStore, MemoryMetadataStore, MetadataStore};
pub use sync::TableSyncer;
pub use target::PoolRegistry;
pub use typemap::{firebird_to_postgres, PgType};
