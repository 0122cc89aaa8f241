//! Core abstractions shared by the source, target and orchestration layers.
//!
//! - [`schema`]: catalog column descriptors, mapped column definitions, sync results
//! - [`value`]: source values (including deferred BLOB handles) and typed target values
//! - [`traits`]: seams between the engine and concrete databases
//! - [`identifier`]: identifier validation and quoting

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use identifier::{quote_ident, quote_list, validate_identifier};
pub use schema::{ColumnDefinition, RawColumn, SyncMetadataRecord, SyncStatus, TableSyncResult};
pub use traits::{SourceConnector, SourceReader, TargetHandle, TargetProvider, TargetWriter};
pub use value::{coerce, BlobHandle, BufferedBlob, ChunkStream, SourceValue, SqlNullType, SqlValue};
