//! Firebird source reader.
//!
//! `rsfbclient` is a blocking driver, so every attached database gets its own
//! OS thread that owns the connection. Async callers talk to it through a
//! request channel and receive results on oneshot replies.
//!
//! Text BLOBs are not read with the row. The row SELECT returns the record's
//! `RDB$DB_KEY` and a null flag per text BLOB column; each non-null value is
//! fetched later by key as a raw binary BLOB, one request per value, so a
//! bad or slow value only affects itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use async_trait::async_trait;
use rsfbclient::prelude::*;
use rsfbclient::{FbError, Row, SqlType};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::{FirebirdConfig, PairConfig};
use crate::core::identifier::quote_ident;
use crate::core::schema::{ColumnDefinition, RawColumn};
use crate::core::traits::{SourceConnector, SourceReader};
use crate::core::value::{BlobHandle, BufferedBlob, ChunkStream, SourceValue};
use crate::error::{Result, SyncError};

const LIST_TABLES_SQL: &str = "SELECT TRIM(RDB$RELATION_NAME) AS TABLE_NAME \
     FROM RDB$RELATIONS \
     WHERE RDB$SYSTEM_FLAG = 0 AND RDB$VIEW_BLR IS NULL \
     ORDER BY RDB$RELATION_NAME";

const COLUMNS_SQL: &str = "SELECT TRIM(RF.RDB$FIELD_NAME) AS FIELD_NAME, \
     F.RDB$FIELD_TYPE, F.RDB$FIELD_LENGTH, F.RDB$FIELD_PRECISION, \
     F.RDB$FIELD_SCALE, F.RDB$FIELD_SUB_TYPE \
     FROM RDB$RELATION_FIELDS RF \
     JOIN RDB$FIELDS F ON RF.RDB$FIELD_SOURCE = F.RDB$FIELD_NAME \
     WHERE RF.RDB$RELATION_NAME = ? \
     ORDER BY RF.RDB$FIELD_POSITION";

const RELATION_EXISTS_SQL: &str =
    "SELECT COUNT(*) FROM RDB$RELATIONS WHERE RDB$RELATION_NAME = ?";

/// Request channel depth; callers await every reply, so one slot is enough.
const REQUEST_BUFFER: usize = 1;

type Reply<T> = oneshot::Sender<std::result::Result<T, String>>;

enum Request {
    Query {
        sql: String,
        param: Option<String>,
        reply: Reply<Vec<Row>>,
    },
    FetchBlob {
        sql: String,
        reply: Reply<Option<Vec<u8>>>,
    },
    Close {
        reply: Reply<()>,
    },
}

/// Opens [`FirebirdSource`] connections for configured pairs.
#[derive(Debug, Default, Clone)]
pub struct FirebirdConnector;

impl FirebirdConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SourceConnector for FirebirdConnector {
    async fn attach(&self, pair: &PairConfig) -> Result<Box<dyn SourceReader>> {
        let source = FirebirdSource::attach(&pair.source).await?;
        Ok(Box::new(source))
    }
}

/// One attached Firebird database.
pub struct FirebirdSource {
    label: String,
    requests: mpsc::Sender<Request>,
    detached: AtomicBool,
}

impl FirebirdSource {
    /// Attach to a Firebird database, spawning the connection thread.
    pub async fn attach(config: &FirebirdConfig) -> Result<Self> {
        let label = config.describe();
        let host = config
            .host()
            .ok_or_else(|| SyncError::Config(format!("{}: source host is not set", label)))?
            .to_string();

        let (tx, rx) = mpsc::channel(REQUEST_BUFFER);
        let (ready_tx, ready_rx) = oneshot::channel();
        let settings = ConnectSettings {
            host,
            port: config.port,
            database: config.database.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
        };

        thread::Builder::new()
            .name(format!("firebird-{}", config.database))
            .spawn(move || connection_thread(settings, ready_tx, rx))
            .map_err(|e| SyncError::connection(&label, e))?;

        match ready_rx.await {
            Ok(Ok(())) => {
                info!("Connected to Firebird: {}", label);
                Ok(Self {
                    label,
                    requests: tx,
                    detached: AtomicBool::new(false),
                })
            }
            Ok(Err(message)) => Err(SyncError::connection(&label, message)),
            Err(_) => Err(SyncError::connection(
                &label,
                "connection thread exited during attach",
            )),
        }
    }

    async fn query(&self, sql: &str, param: Option<&str>) -> Result<Vec<Row>> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(Request::Query {
                sql: sql.to_string(),
                param: param.map(str::to_string),
                reply,
            })
            .await
            .map_err(|_| self.closed())?;

        rx.await
            .map_err(|_| self.closed())?
            .map_err(SyncError::Source)
    }

    fn closed(&self) -> SyncError {
        SyncError::Source(format!("connection to {} is closed", self.label))
    }
}

#[async_trait]
impl SourceReader for FirebirdSource {
    async fn list_user_tables(&self) -> Result<Vec<String>> {
        let rows = self.query(LIST_TABLES_SQL, None).await?;
        rows.into_iter()
            .map(|row| {
                row.cols
                    .into_iter()
                    .next()
                    .and_then(|c| text_of(c.value))
                    .ok_or_else(|| SyncError::Source("RDB$RELATION_NAME is null".into()))
            })
            .collect()
    }

    async fn get_columns(&self, table: &str) -> Result<Vec<RawColumn>> {
        let rows = self.query(COLUMNS_SQL, Some(table)).await?;

        if rows.is_empty() {
            let exists = self.query(RELATION_EXISTS_SQL, Some(table)).await?;
            let count = exists
                .into_iter()
                .next()
                .and_then(|r| r.cols.into_iter().next())
                .and_then(|c| int_of(&c.value))
                .unwrap_or(0);
            if count == 0 {
                return Err(SyncError::Schema(format!(
                    "table {} no longer exists in {}",
                    table, self.label
                )));
            }
            return Ok(Vec::new());
        }

        rows.into_iter().map(|row| raw_column(table, row)).collect()
    }

    async fn read_rows(
        &self,
        table: &str,
        columns: &[ColumnDefinition],
    ) -> Result<Vec<Vec<SourceValue>>> {
        let plan = SelectPlan::new(table, columns)?;
        debug!("{}: {}", self.label, plan.sql);

        let rows = self.query(&plan.sql, None).await?;
        Ok(rows
            .into_iter()
            .map(|row| plan.row_values(row.cols.into_iter().map(|c| c.value), &self.requests))
            .collect())
    }

    async fn detach(&self) -> Result<()> {
        if self.detached.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let (reply, rx) = oneshot::channel();
        if self.requests.send(Request::Close { reply }).await.is_err() {
            return Ok(());
        }
        match rx.await {
            Ok(Ok(())) => {
                info!("Detached from Firebird: {}", self.label);
                Ok(())
            }
            Ok(Err(message)) => Err(SyncError::Source(message)),
            Err(_) => Ok(()),
        }
    }

    fn db_type(&self) -> &str {
        "firebird"
    }
}

impl Drop for FirebirdSource {
    fn drop(&mut self) {
        if !self.detached.load(Ordering::SeqCst) {
            warn!("{} dropped without detach; closing on channel drop", self.label);
        }
    }
}

struct ConnectSettings {
    host: String,
    port: u16,
    database: String,
    user: String,
    password: String,
}

fn connection_thread(
    settings: ConnectSettings,
    ready: Reply<()>,
    mut requests: mpsc::Receiver<Request>,
) {
    let connected = rsfbclient::builder_pure_rust()
        .host(&settings.host)
        .port(settings.port)
        .db_name(&settings.database)
        .user(&settings.user)
        .pass(&settings.password)
        .connect();

    let mut conn = match connected {
        Ok(conn) => {
            let _ = ready.send(Ok(()));
            conn
        }
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };

    while let Some(request) = requests.blocking_recv() {
        match request {
            Request::Query { sql, param, reply } => {
                let result: std::result::Result<Vec<Row>, FbError> = match param {
                    Some(p) => conn.query(&sql, (p,)),
                    None => conn.query(&sql, ()),
                };
                let _ = reply.send(result.map_err(|e| e.to_string()));
            }
            Request::FetchBlob { sql, reply } => {
                let result: std::result::Result<Vec<Row>, FbError> = conn.query(&sql, ());
                let _ = reply.send(result.map_err(|e| e.to_string()).and_then(blob_bytes));
            }
            Request::Close { reply } => {
                let _ = reply.send(conn.close().map_err(|e| e.to_string()));
                return;
            }
        }
    }
}

fn raw_column(table: &str, row: Row) -> Result<RawColumn> {
    let mut values = row.cols.into_iter().map(|c| c.value);
    let mut next = || values.next().unwrap_or(SqlType::Null);

    let name = text_of(next())
        .ok_or_else(|| SyncError::Schema(format!("{}: column without a name", table)))?;
    let field_type = int_of(&next())
        .ok_or_else(|| SyncError::Schema(format!("{}.{}: missing RDB$FIELD_TYPE", table, name)))?;

    Ok(RawColumn {
        field_type: field_type as i16,
        length: int_of(&next()).unwrap_or(0) as i32,
        precision: int_of(&next()).unwrap_or(0) as i32,
        scale: int_of(&next()).unwrap_or(0) as i32,
        sub_type: int_of(&next()).map(|v| v as i16),
        name,
    })
}

fn text_of(value: SqlType) -> Option<String> {
    match value {
        SqlType::Text(s) => Some(s.trim().to_string()),
        SqlType::Binary(b) => Some(String::from_utf8_lossy(&b).trim().to_string()),
        _ => None,
    }
}

fn int_of(value: &SqlType) -> Option<i64> {
    match value {
        SqlType::Integer(i) => Some(*i),
        SqlType::Floating(f) => Some(*f as i64),
        _ => None,
    }
}

/// Row SELECT for a sync set, with text BLOB columns replaced by null flags.
struct SelectPlan {
    sql: String,
    /// Per column: the fetch statement up to the key literal, for text BLOBs.
    fetch_prefixes: Vec<Option<String>>,
    keyed: bool,
}

impl SelectPlan {
    fn new(table: &str, columns: &[ColumnDefinition]) -> Result<Self> {
        let table_ident = quote_ident(table)?;
        let mut exprs = Vec::with_capacity(columns.len() + 1);
        let mut fetch_prefixes = Vec::with_capacity(columns.len());

        for col in columns {
            let ident = quote_ident(&col.name)?;
            if col.is_text_blob() {
                exprs.push(format!("CASE WHEN {} IS NULL THEN 0 ELSE 1 END", ident));
                fetch_prefixes.push(Some(format!(
                    "SELECT CAST({} AS BLOB SUB_TYPE BINARY) FROM {} WHERE RDB$DB_KEY = ",
                    ident, table_ident
                )));
            } else {
                exprs.push(ident);
                fetch_prefixes.push(None);
            }
        }

        let keyed = fetch_prefixes.iter().any(Option::is_some);
        if keyed {
            exprs.insert(0, "RDB$DB_KEY".to_string());
        }

        Ok(Self {
            sql: format!("SELECT {} FROM {}", exprs.join(", "), table_ident),
            fetch_prefixes,
            keyed,
        })
    }

    fn row_values(
        &self,
        values: impl IntoIterator<Item = SqlType>,
        requests: &mpsc::Sender<Request>,
    ) -> Vec<SourceValue> {
        let mut values = values.into_iter();
        let key = if self.keyed {
            values.next().and_then(db_key_of)
        } else {
            None
        };

        values
            .zip(&self.fetch_prefixes)
            .map(|(value, prefix)| match prefix {
                None => convert(value),
                Some(prefix) => deferred_blob(value, prefix, key.as_deref(), requests),
            })
            .collect()
    }
}

fn db_key_of(value: SqlType) -> Option<Vec<u8>> {
    match value {
        SqlType::Binary(b) if !b.is_empty() => Some(b),
        SqlType::Text(s) if !s.is_empty() => Some(s.into_bytes()),
        _ => None,
    }
}

fn deferred_blob(
    flag: SqlType,
    prefix: &str,
    key: Option<&[u8]>,
    requests: &mpsc::Sender<Request>,
) -> SourceValue {
    match (flag, key) {
        (SqlType::Null | SqlType::Integer(0), _) => SourceValue::Null,
        (_, Some(key)) => SourceValue::Deferred(Box::new(KeyedBlob {
            requests: requests.clone(),
            sql: format!("{}X'{}'", prefix, hex::encode_upper(key)),
        })),
        (_, None) => {
            warn!("text BLOB row has no RDB$DB_KEY, storing NULL");
            SourceValue::Null
        }
    }
}

/// One text BLOB value, fetched by record key on the connection thread.
#[derive(Debug)]
struct KeyedBlob {
    requests: mpsc::Sender<Request>,
    sql: String,
}

#[async_trait]
impl BlobHandle for KeyedBlob {
    async fn open(&self) -> Result<ChunkStream> {
        let closed = || SyncError::Source("Firebird connection closed before BLOB fetch".into());
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(Request::FetchBlob {
                sql: self.sql.clone(),
                reply,
            })
            .await
            .map_err(|_| closed())?;

        let data = rx
            .await
            .map_err(|_| closed())?
            .map_err(SyncError::Source)?
            .ok_or_else(|| SyncError::Source("BLOB was NULL on fetch".into()))?;
        BufferedBlob::new(data).open().await
    }
}

fn blob_bytes(rows: Vec<Row>) -> std::result::Result<Option<Vec<u8>>, String> {
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| "record no longer exists".to_string())?;
    match row.cols.into_iter().next().map(|c| c.value) {
        Some(SqlType::Binary(b)) => Ok(Some(b)),
        Some(SqlType::Text(s)) => Ok(Some(s.into_bytes())),
        Some(SqlType::Null) | None => Ok(None),
        Some(other) => Err(format!("unexpected BLOB value {:?}", other)),
    }
}

fn convert(value: SqlType) -> SourceValue {
    match value {
        SqlType::Null => SourceValue::Null,
        SqlType::Integer(i) => SourceValue::Integer(i),
        SqlType::Floating(f) => SourceValue::Float(f),
        SqlType::Text(s) => SourceValue::Text(s),
        SqlType::Binary(b) => SourceValue::Bytes(b),
        SqlType::Timestamp(ts) => SourceValue::Timestamp(ts),
        SqlType::Boolean(b) => SourceValue::Boolean(b),
    }
}
