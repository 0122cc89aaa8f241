//! Target database (PostgreSQL) operations.
//!
//! - [`loader`]: batch sizing, DDL/INSERT builders and the truncate-and-reload loop
//! - [`PgTarget`]: [`TargetWriter`](crate::core::TargetWriter) over a deadpool pool
//! - [`PoolRegistry`]: per-database pools, handed out as [`TargetHandle`](crate::core::TargetHandle)s

pub mod loader;
mod postgres;
mod registry;
mod tls;

pub use loader::{batch_size, reload, BatchLimits};
pub use postgres::PgTarget;
pub use registry::PoolRegistry;
pub use tls::SslMode;
