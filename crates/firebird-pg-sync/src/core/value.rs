//! Source and target value representations.
//!
//! [`SourceValue`] is what the Firebird reader hands back, including deferred
//! BLOB handles that still need fetching. [`SqlValue`] is the typed value bound
//! into a PostgreSQL INSERT, produced by [`coerce`] against the column's mapped
//! [`PgType`].

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use futures::stream::{self, BoxStream};
use rust_decimal::Decimal;
use tokio_postgres::types::ToSql;

use crate::error::Result;
use crate::typemap::PgType;

/// Stream of raw chunks making up one large value.
pub type ChunkStream = BoxStream<'static, Result<Bytes>>;

/// A lazily fetched large value.
///
/// Opening the handle starts the fetch; the caller accumulates chunks until
/// the stream ends.
#[async_trait]
pub trait BlobHandle: Send + Sync + fmt::Debug {
    async fn open(&self) -> Result<ChunkStream>;
}

/// BLOB contents the driver already pulled off the wire, replayed in chunks.
#[derive(Debug, Clone)]
pub struct BufferedBlob {
    data: Bytes,
    chunk_size: usize,
}

impl BufferedBlob {
    /// Firebird's default BLOB segment size.
    pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
        }
    }
}

#[async_trait]
impl BlobHandle for BufferedBlob {
    async fn open(&self) -> Result<ChunkStream> {
        let chunks: Vec<Result<Bytes>> = (0..self.data.len())
            .step_by(self.chunk_size.max(1))
            .map(|start| {
                let end = (start + self.chunk_size).min(self.data.len());
                Ok(self.data.slice(start..end))
            })
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

/// A value as read from the source database.
#[derive(Debug)]
pub enum SourceValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Boolean(bool),
    /// Large text still held by the driver; resolved before loading.
    Deferred(Box<dyn BlobHandle>),
}

impl SourceValue {
    pub fn is_deferred(&self) -> bool {
        matches!(self, SourceValue::Deferred(_))
    }
}

/// Type hint for NULL values so the bound parameter matches the column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlNullType {
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Bytes,
    Decimal,
    DateTime,
    Date,
    Time,
}

impl From<PgType> for SqlNullType {
    fn from(ty: PgType) -> Self {
        match ty {
            PgType::SmallInt => SqlNullType::I16,
            PgType::Integer => SqlNullType::I32,
            PgType::BigInt => SqlNullType::I64,
            PgType::Numeric { .. } => SqlNullType::Decimal,
            PgType::Real => SqlNullType::F32,
            PgType::DoublePrecision => SqlNullType::F64,
            PgType::Char(_) | PgType::Varchar(_) | PgType::Text => SqlNullType::String,
            PgType::Date => SqlNullType::Date,
            PgType::Time => SqlNullType::Time,
            PgType::Timestamp => SqlNullType::DateTime,
            PgType::Boolean => SqlNullType::Bool,
            PgType::Bytea => SqlNullType::Bytes,
        }
    }
}

/// A typed value ready to be bound as a PostgreSQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL with type hint for correct parameter encoding.
    Null(SqlNullType),
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Decimal(Decimal),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl SqlValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// Box the value as a `tokio-postgres` parameter.
    pub fn to_param(&self) -> Box<dyn ToSql + Sync + Send> {
        match self {
            SqlValue::Null(t) => match t {
                SqlNullType::Bool => Box::new(None::<bool>),
                SqlNullType::I16 => Box::new(None::<i16>),
                SqlNullType::I32 => Box::new(None::<i32>),
                SqlNullType::I64 => Box::new(None::<i64>),
                SqlNullType::F32 => Box::new(None::<f32>),
                SqlNullType::F64 => Box::new(None::<f64>),
                SqlNullType::String => Box::new(None::<String>),
                SqlNullType::Bytes => Box::new(None::<Vec<u8>>),
                SqlNullType::Decimal => Box::new(None::<Decimal>),
                SqlNullType::DateTime => Box::new(None::<NaiveDateTime>),
                SqlNullType::Date => Box::new(None::<NaiveDate>),
                SqlNullType::Time => Box::new(None::<NaiveTime>),
            },
            SqlValue::Bool(v) => Box::new(*v),
            SqlValue::I16(v) => Box::new(*v),
            SqlValue::I32(v) => Box::new(*v),
            SqlValue::I64(v) => Box::new(*v),
            SqlValue::F32(v) => Box::new(*v),
            SqlValue::F64(v) => Box::new(*v),
            SqlValue::Text(v) => Box::new(v.clone()),
            SqlValue::Bytes(v) => Box::new(v.clone()),
            SqlValue::Decimal(v) => Box::new(*v),
            SqlValue::DateTime(v) => Box::new(*v),
            SqlValue::Date(v) => Box::new(*v),
            SqlValue::Time(v) => Box::new(*v),
        }
    }
}

/// Convert a source value into the representation expected by a target column.
///
/// Returns a human-readable message when the value does not fit.
pub fn coerce(value: SourceValue, ty: PgType) -> std::result::Result<SqlValue, String> {
    if let SourceValue::Null = value {
        return Ok(SqlValue::Null(ty.into()));
    }
    if let SourceValue::Deferred(_) = value {
        return Err("deferred value was not resolved before loading".to_string());
    }

    let mismatch = |v: &SourceValue| format!("cannot store {} as {}", describe(v), ty);

    match ty {
        PgType::SmallInt => match value {
            SourceValue::Integer(i) => i16::try_from(i)
                .map(SqlValue::I16)
                .map_err(|_| format!("value {} out of range for SMALLINT", i)),
            other => Err(mismatch(&other)),
        },
        PgType::Integer => match value {
            SourceValue::Integer(i) => i32::try_from(i)
                .map(SqlValue::I32)
                .map_err(|_| format!("value {} out of range for INTEGER", i)),
            other => Err(mismatch(&other)),
        },
        PgType::BigInt => match value {
            SourceValue::Integer(i) => Ok(SqlValue::I64(i)),
            other => Err(mismatch(&other)),
        },
        PgType::Numeric { scale, .. } => {
            let decimal = match value {
                SourceValue::Integer(i) => Decimal::from(i),
                SourceValue::Float(f) => Decimal::try_from(f).map_err(|e| e.to_string())?,
                SourceValue::Text(ref s) => {
                    Decimal::from_str(s.trim()).map_err(|e| format!("invalid numeric '{}': {}", s, e))?
                }
                other => return Err(mismatch(&other)),
            };
            Ok(SqlValue::Decimal(decimal.round_dp(scale.max(0) as u32)))
        }
        PgType::Real => match value {
            SourceValue::Float(f) => Ok(SqlValue::F32(f as f32)),
            SourceValue::Integer(i) => Ok(SqlValue::F32(i as f32)),
            other => Err(mismatch(&other)),
        },
        PgType::DoublePrecision => match value {
            SourceValue::Float(f) => Ok(SqlValue::F64(f)),
            SourceValue::Integer(i) => Ok(SqlValue::F64(i as f64)),
            other => Err(mismatch(&other)),
        },
        PgType::Char(_) | PgType::Varchar(_) | PgType::Text => match value {
            SourceValue::Text(s) => Ok(SqlValue::Text(s)),
            SourceValue::Bytes(b) => Ok(SqlValue::Text(String::from_utf8_lossy(&b).into_owned())),
            SourceValue::Integer(i) => Ok(SqlValue::Text(i.to_string())),
            SourceValue::Float(f) => Ok(SqlValue::Text(f.to_string())),
            SourceValue::Timestamp(ts) => Ok(SqlValue::Text(ts.to_string())),
            SourceValue::Date(d) => Ok(SqlValue::Text(d.to_string())),
            SourceValue::Time(t) => Ok(SqlValue::Text(t.to_string())),
            SourceValue::Boolean(b) => Ok(SqlValue::Text(b.to_string())),
            other => Err(mismatch(&other)),
        },
        PgType::Date => match value {
            SourceValue::Date(d) => Ok(SqlValue::Date(d)),
            SourceValue::Timestamp(ts) => Ok(SqlValue::Date(ts.date())),
            other => Err(mismatch(&other)),
        },
        PgType::Time => match value {
            SourceValue::Time(t) => Ok(SqlValue::Time(t)),
            SourceValue::Timestamp(ts) => Ok(SqlValue::Time(ts.time())),
            other => Err(mismatch(&other)),
        },
        PgType::Timestamp => match value {
            SourceValue::Timestamp(ts) => Ok(SqlValue::DateTime(ts)),
            SourceValue::Date(d) => Ok(SqlValue::DateTime(d.and_time(NaiveTime::default()))),
            other => Err(mismatch(&other)),
        },
        PgType::Boolean => match value {
            SourceValue::Boolean(b) => Ok(SqlValue::Bool(b)),
            SourceValue::Integer(i) => Ok(SqlValue::Bool(i != 0)),
            other => Err(mismatch(&other)),
        },
        PgType::Bytea => match value {
            SourceValue::Bytes(b) => Ok(SqlValue::Bytes(b)),
            SourceValue::Text(s) => Ok(SqlValue::Bytes(s.into_bytes())),
            other => Err(mismatch(&other)),
        },
    }
}

fn describe(value: &SourceValue) -> &'static str {
    match value {
        SourceValue::Null => "NULL",
        SourceValue::Integer(_) => "integer",
        SourceValue::Float(_) => "float",
        SourceValue::Text(_) => "text",
        SourceValue::Bytes(_) => "binary",
        SourceValue::Timestamp(_) => "timestamp",
        SourceValue::Date(_) => "date",
        SourceValue::Time(_) => "time",
        SourceValue::Boolean(_) => "boolean",
        SourceValue::Deferred(_) => "deferred BLOB",
    }
}
