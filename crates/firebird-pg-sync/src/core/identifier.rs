//! Identifier validation and quoting.
//!
//! Table and column names come from the source catalog and end up inside
//! dynamic SQL on both sides, so they are validated and double-quoted. Firebird
//! and PostgreSQL share the same quoting rules: wrap in `"` and double any
//! embedded `"`. Row data is never inlined; it is always bound as parameters.

use crate::error::{Result, SyncError};

/// Longest identifier accepted (Firebird 4 allows 63 characters, up to 4 bytes each).
const MAX_IDENTIFIER_LENGTH: usize = 252;

/// Reject empty names, names with NUL bytes and absurdly long names.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SyncError::Schema("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(SyncError::Schema(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(SyncError::Schema(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote an identifier for Firebird or PostgreSQL.
///
/// ```ignore
/// assert_eq!(quote_ident("EMP")?, "\"EMP\"");
/// assert_eq!(quote_ident("odd\"name")?, "\"odd\"\"name\"");
/// ```
pub fn quote_ident(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote every name and join them with `, `.
pub fn quote_list<'a, I>(names: I) -> Result<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let quoted = names
        .into_iter()
        .map(quote_ident)
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}
