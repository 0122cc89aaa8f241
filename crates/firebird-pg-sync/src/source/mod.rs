//! Source database access.
//!
//! [`FirebirdSource`] implements [`SourceReader`](crate::core::SourceReader)
//! over the Firebird system catalog; [`blob`] turns deferred text BLOB handles
//! into strings.

pub mod blob;
mod firebird;

pub use blob::resolve_text_blob;
pub use firebird::{FirebirdConnector, FirebirdSource};
