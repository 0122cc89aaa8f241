//! Type mapping between Firebird and PostgreSQL.

use std::fmt;

/// `RDB$FIELD_TYPE` codes used by the Firebird system catalog.
pub mod field_type {
    pub const SHORT: i16 = 7;
    pub const LONG: i16 = 8;
    pub const FLOAT: i16 = 10;
    pub const DATE: i16 = 12;
    pub const TIME: i16 = 13;
    pub const TEXT: i16 = 14;
    pub const INT64: i16 = 16;
    pub const BOOLEAN: i16 = 23;
    pub const DOUBLE: i16 = 27;
    pub const TIMESTAMP: i16 = 35;
    pub const VARYING: i16 = 37;
    pub const BLOB: i16 = 261;
}

/// `RDB$FIELD_SUB_TYPE` of a BLOB holding text.
pub const BLOB_SUB_TYPE_TEXT: i16 = 1;

const DEFAULT_NUMERIC_PRECISION: i32 = 18;
const DEFAULT_CHAR_LENGTH: i32 = 1;
const DEFAULT_VARCHAR_LENGTH: i32 = 255;

/// A PostgreSQL column type produced by the mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PgType {
    SmallInt,
    Integer,
    BigInt,
    Numeric { precision: i32, scale: i32 },
    Real,
    DoublePrecision,
    Char(i32),
    Varchar(i32),
    Date,
    Time,
    Timestamp,
    Boolean,
    Text,
    Bytea,
}

impl PgType {
    /// Opaque binary columns are never read or written.
    pub fn is_opaque_binary(&self) -> bool {
        matches!(self, PgType::Bytea)
    }
}

impl fmt::Display for PgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PgType::SmallInt => f.write_str("SMALLINT"),
            PgType::Integer => f.write_str("INTEGER"),
            PgType::BigInt => f.write_str("BIGINT"),
            PgType::Numeric { precision, scale } => write!(f, "NUMERIC({},{})", precision, scale),
            PgType::Real => f.write_str("REAL"),
            PgType::DoublePrecision => f.write_str("DOUBLE PRECISION"),
            PgType::Char(len) => write!(f, "CHAR({})", len),
            PgType::Varchar(len) => write!(f, "VARCHAR({})", len),
            PgType::Date => f.write_str("DATE"),
            PgType::Time => f.write_str("TIME"),
            PgType::Timestamp => f.write_str("TIMESTAMP"),
            PgType::Boolean => f.write_str("BOOLEAN"),
            PgType::Text => f.write_str("TEXT"),
            PgType::Bytea => f.write_str("BYTEA"),
        }
    }
}

/// Map a Firebird field definition to a PostgreSQL column type.
///
/// Fixed-point NUMERIC/DECIMAL columns are stored by Firebird as SHORT, LONG
/// or INT64 with a negative `RDB$FIELD_SCALE`. Unknown codes map to `TEXT`.
pub fn firebird_to_postgres(
    type_code: i16,
    length: i32,
    precision: i32,
    scale: i32,
    sub_type: Option<i16>,
) -> PgType {
    use field_type::*;

    if matches!(type_code, SHORT | LONG | INT64) && scale < 0 {
        let precision = if precision > 0 {
            precision
        } else {
            DEFAULT_NUMERIC_PRECISION
        };
        return PgType::Numeric {
            precision,
            scale: scale.abs(),
        };
    }

    match type_code {
        SHORT => PgType::SmallInt,
        LONG => PgType::Integer,
        INT64 => PgType::BigInt,
        FLOAT => PgType::Real,
        DOUBLE => PgType::DoublePrecision,
        TEXT => PgType::Char(positive_or(length, DEFAULT_CHAR_LENGTH)),
        VARYING => PgType::Varchar(positive_or(length, DEFAULT_VARCHAR_LENGTH)),
        DATE => PgType::Date,
        TIME => PgType::Time,
        TIMESTAMP => PgType::Timestamp,
        BOOLEAN => PgType::Boolean,
        BLOB if sub_type == Some(BLOB_SUB_TYPE_TEXT) => PgType::Text,
        BLOB => PgType::Bytea,
        _ => PgType::Text,
    }
}

fn positive_or(value: i32, default: i32) -> i32 {
    if value > 0 {
        value
    } else {
        default
    }
}
