//! Per-table sync status persistence.

pub mod backend;
mod db;
mod memory;

pub use backend::MetadataStore;
pub use db::DbMetadataStore;
pub use memory::MemoryMetadataStore;
