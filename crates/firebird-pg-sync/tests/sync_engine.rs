//! End-to-end runs of the sync engine against in-memory sources and targets.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use firebird_pg_sync::core::{
    BlobHandle, BufferedBlob, ChunkStream, SourceConnector, SourceReader, TargetHandle,
    TargetProvider, TargetWriter,
};
use firebird_pg_sync::{
    ColumnDefinition, Config, FirebirdConfig, MemoryMetadataStore, MetadataStore, PairConfig,
    RawColumn, Result, SourceValue, SqlValue, SyncConfig, SyncError, SyncRunCoordinator,
    SyncStatus, TargetConfig,
};
use firebird_pg_sync::orchestrator::sync_pair;

// ---------------------------------------------------------------------------
// Fake source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Cell {
    Null,
    Int(i64),
    Text(&'static str),
    Bytes(&'static [u8]),
    Blob(&'static str),
    StuckBlob,
}

#[derive(Debug)]
struct NeverResolves;

#[async_trait]
impl BlobHandle for NeverResolves {
    async fn open(&self) -> Result<ChunkStream> {
        futures::future::pending::<()>().await;
        unreachable!()
    }
}

impl Cell {
    fn to_source(&self) -> SourceValue {
        match self {
            Cell::Null => SourceValue::Null,
            Cell::Int(i) => SourceValue::Integer(*i),
            Cell::Text(s) => SourceValue::Text(s.to_string()),
            Cell::Bytes(b) => SourceValue::Bytes(b.to_vec()),
            Cell::Blob(s) => SourceValue::Deferred(Box::new(BufferedBlob::new(s.as_bytes().to_vec()))),
            Cell::StuckBlob => SourceValue::Deferred(Box::new(NeverResolves)),
        }
    }
}

#[derive(Default)]
struct FakeTable {
    columns: Vec<RawColumn>,
    rows: Vec<Vec<Cell>>,
    fail_read: Option<&'static str>,
}

#[derive(Default)]
struct FakeDatabase {
    tables: BTreeMap<String, FakeTable>,
    /// Listed by the catalog but dropped before their columns are read.
    vanished: Vec<String>,
    fail_listing: bool,
    /// Tables whose SELECT currently fails, toggled between runs.
    broken: Mutex<Vec<String>>,
    attaches: AtomicUsize,
    detaches: AtomicUsize,
}

impl FakeDatabase {
    fn with_table(mut self, name: &str, table: FakeTable) -> Self {
        self.tables.insert(name.to_string(), table);
        self
    }

    fn with_vanished(mut self, name: &str) -> Self {
        self.vanished.push(name.to_string());
        self
    }

    fn set_broken(&self, tables: &[&str]) {
        *self.broken.lock().unwrap() = tables.iter().map(|t| t.to_string()).collect();
    }
}

struct FakeSource {
    db: Arc<FakeDatabase>,
}

#[async_trait]
impl SourceReader for FakeSource {
    async fn list_user_tables(&self) -> Result<Vec<String>> {
        if self.db.fail_listing {
            return Err(SyncError::Source("catalog unavailable".into()));
        }
        let mut names: Vec<String> = self
            .db
            .tables
            .keys()
            .chain(&self.db.vanished)
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    async fn get_columns(&self, table: &str) -> Result<Vec<RawColumn>> {
        self.db
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| SyncError::Schema(format!("table {} no longer exists", table)))
    }

    async fn read_rows(
        &self,
        table: &str,
        columns: &[ColumnDefinition],
    ) -> Result<Vec<Vec<SourceValue>>> {
        let fake = &self.db.tables[table];
        if let Some(message) = fake.fail_read {
            return Err(SyncError::Source(message.to_string()));
        }
        if self.db.broken.lock().unwrap().iter().any(|t| t == table) {
            return Err(SyncError::Source(format!("lock conflict on {}", table)));
        }
        let positions: Vec<usize> = columns
            .iter()
            .map(|c| fake.columns.iter().position(|r| r.name == c.name).unwrap())
            .collect();
        Ok(fake
            .rows
            .iter()
            .map(|row| positions.iter().map(|&i| row[i].to_source()).collect())
            .collect())
    }

    async fn detach(&self) -> Result<()> {
        self.db.detaches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn db_type(&self) -> &str {
        "fake"
    }
}

#[derive(Default)]
struct FakeConnector {
    databases: HashMap<String, Arc<FakeDatabase>>,
}

impl FakeConnector {
    fn with(mut self, pair: &str, db: FakeDatabase) -> Self {
        self.databases.insert(pair.to_string(), Arc::new(db));
        self
    }

    fn db(&self, pair: &str) -> Arc<FakeDatabase> {
        self.databases[pair].clone()
    }
}

#[async_trait]
impl SourceConnector for FakeConnector {
    async fn attach(&self, pair: &PairConfig) -> Result<Box<dyn SourceReader>> {
        match self.databases.get(&pair.name) {
            Some(db) => {
                db.attaches.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(FakeSource { db: db.clone() }))
            }
            None => Err(SyncError::connection(
                pair.source.describe(),
                "Unable to complete network request",
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Fake target
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryWriter {
    tables: Mutex<BTreeMap<String, Vec<Vec<SqlValue>>>>,
    declarations: Mutex<BTreeMap<String, Vec<String>>>,
    batch_sizes: Mutex<Vec<usize>>,
}

impl MemoryWriter {
    fn rows(&self, table: &str) -> Vec<Vec<SqlValue>> {
        self.tables.lock().unwrap().get(table).cloned().unwrap_or_default()
    }

    fn has_table(&self, table: &str) -> bool {
        self.tables.lock().unwrap().contains_key(table)
    }
}

#[async_trait]
impl TargetWriter for MemoryWriter {
    async fn ensure_table(&self, table: &str, columns: &[ColumnDefinition]) -> Result<()> {
        self.declarations
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_insert_with(|| {
                columns
                    .iter()
                    .map(|c| format!("{} {}", c.name, c.target_declaration()))
                    .collect()
            });
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default();
        Ok(())
    }

    async fn truncate(&self, table: &str) -> Result<()> {
        match self.tables.lock().unwrap().get_mut(table) {
            Some(rows) => {
                rows.clear();
                Ok(())
            }
            None => Err(SyncError::Source(format!("relation {} does not exist", table))),
        }
    }

    async fn insert_batch(
        &self,
        table: &str,
        columns: &[ColumnDefinition],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64> {
        assert!(rows.len() * columns.len() <= 50_000);
        self.batch_sizes.lock().unwrap().push(rows.len());
        self.tables
            .lock()
            .unwrap()
            .get_mut(table)
            .ok_or_else(|| SyncError::Source(format!("relation {} does not exist", table)))?
            .extend_from_slice(rows);
        Ok(rows.len() as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }
}

#[derive(Clone, Default)]
struct MemoryTarget {
    writer: Arc<MemoryWriter>,
    metadata: Arc<MemoryMetadataStore>,
}

/// Metadata store that accepts the table DDL but rejects every upsert.
struct RejectingMetadata;

#[async_trait]
impl MetadataStore for RejectingMetadata {
    async fn ensure(&self) -> Result<()> {
        Ok(())
    }

    async fn record(&self, _result: &firebird_pg_sync::TableSyncResult) -> Result<()> {
        Err(SyncError::Source("permission denied for table _sync_meta".into()))
    }

    async fn load_all(&self) -> Result<Vec<firebird_pg_sync::core::SyncMetadataRecord>> {
        Ok(Vec::new())
    }

    fn backend_type(&self) -> &'static str {
        "rejecting"
    }
}

#[derive(Default)]
struct MemoryTargets {
    targets: Mutex<HashMap<String, MemoryTarget>>,
    reject_metadata: bool,
    closed: AtomicBool,
}

impl MemoryTargets {
    fn get(&self, database: &str) -> MemoryTarget {
        self.targets
            .lock()
            .unwrap()
            .entry(database.to_string())
            .or_default()
            .clone()
    }
}

#[async_trait]
impl TargetProvider for MemoryTargets {
    async fn target(&self, database: &str) -> Result<TargetHandle> {
        let target = self.get(database);
        let metadata: Arc<dyn MetadataStore> = if self.reject_metadata {
            Arc::new(RejectingMetadata)
        } else {
            target.metadata
        };
        Ok(TargetHandle {
            database: database.to_string(),
            writer: target.writer,
            metadata,
        })
    }

    async fn close_all(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn col(name: &str, field_type: i16, length: i32, sub_type: Option<i16>) -> RawColumn {
    RawColumn {
        name: name.to_string(),
        field_type,
        length,
        precision: 0,
        scale: 0,
        sub_type,
    }
}

fn pair(name: &str, host: Option<&str>) -> PairConfig {
    PairConfig {
        name: name.to_string(),
        target_database: format!("{}_pg", name),
        source: FirebirdConfig {
            host: host.map(str::to_string),
            port: 3050,
            database: format!("/data/{}.fdb", name),
            user: "SYSDBA".to_string(),
            password: "masterkey".to_string(),
        },
    }
}

fn config(pairs: Vec<PairConfig>) -> Config {
    Config {
        target: TargetConfig {
            host: "127.0.0.1".to_string(),
            port: 5432,
            user: "sync".to_string(),
            password: String::new(),
            ssl_mode: "disable".to_string(),
            max_connections: 1,
        },
        pairs,
        sync: SyncConfig {
            blob_timeout_ms: 50,
            ..SyncConfig::default()
        },
    }
}

fn emp_table() -> FakeTable {
    FakeTable {
        columns: vec![
            col("ID", 8, 4, None),
            col("NAME", 37, 50, None),
            col("NOTE", 261, 8, Some(1)),
        ],
        rows: vec![
            vec![Cell::Int(1), Cell::Text("Ann"), Cell::Blob("first note")],
            vec![Cell::Int(2), Cell::Text("Bob"), Cell::Null],
            vec![Cell::Int(3), Cell::Text("Cy"), Cell::StuckBlob],
        ],
        fail_read: None,
    }
}

fn simple_table(rows: i64) -> FakeTable {
    FakeTable {
        columns: vec![col("ID", 8, 4, None)],
        rows: (0..rows).map(|i| vec![Cell::Int(i)]).collect(),
        fail_read: None,
    }
}

fn coordinator(
    cfg: Config,
    connector: Arc<FakeConnector>,
    targets: Arc<MemoryTargets>,
) -> SyncRunCoordinator {
    SyncRunCoordinator::new(cfg, connector, targets)
}

fn aggregate(err: SyncError) -> firebird_pg_sync::AggregateRunError {
    match err {
        SyncError::Aggregate(agg) => agg,
        other => panic!("expected aggregate error, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_emp_table_with_unresolvable_blob() {
    let connector = Arc::new(FakeConnector::default().with("cmms", FakeDatabase::default().with_table("EMP", emp_table())));
    let targets = Arc::new(MemoryTargets::default());
    let run = coordinator(config(vec![pair("cmms", Some("fb"))]), connector.clone(), targets.clone());

    let result = run.run().await.unwrap();

    assert_eq!(result.total_tables, 1);
    assert_eq!(result.total_ok, 1);
    assert_eq!(result.total_rows, 3);

    let target = targets.get("cmms_pg");
    assert_eq!(
        target.writer.declarations.lock().unwrap()["EMP"],
        vec!["ID INTEGER", "NAME VARCHAR(50)", "NOTE TEXT"]
    );
    let rows = target.writer.rows("EMP");
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows[0],
        vec![
            SqlValue::I32(1),
            SqlValue::Text("Ann".into()),
            SqlValue::Text("first note".into())
        ]
    );
    assert!(rows[1][2].is_null());
    assert_eq!(rows[2][1], SqlValue::Text("Cy".into()));
    assert!(rows[2][2].is_null(), "stuck BLOB must load as NULL");

    let record = target.metadata.get("EMP").unwrap();
    assert_eq!(record.status, SyncStatus::Ok);
    assert_eq!(record.row_count, 3);
    assert!(record.error_message.is_none());
    assert!(target.metadata.is_ensured());

    let db = connector.db("cmms");
    assert_eq!(db.attaches.load(Ordering::SeqCst), 1);
    assert_eq!(db.detaches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_table_does_not_stop_the_pair() {
    let db = FakeDatabase::default()
        .with_table("A_ITEMS", simple_table(4))
        .with_table(
            "B_ORDERS",
            FakeTable {
                fail_read: Some("deadlock update conflicts"),
                ..simple_table(2)
            },
        )
        .with_table("C_PARTS", simple_table(6));
    let connector = Arc::new(FakeConnector::default().with("cmms", db));
    let targets = Arc::new(MemoryTargets::default());
    let run = coordinator(config(vec![pair("cmms", Some("fb"))]), connector, targets.clone());

    let agg = aggregate(run.run().await.unwrap_err());

    assert_eq!(agg.total_tables, 3);
    assert_eq!(agg.total_ok, 2);
    assert_eq!(agg.total_rows, 10);
    assert_eq!(agg.errors.len(), 1);
    assert!(agg.errors[0].starts_with("cmms.B_ORDERS: "));
    assert!(agg.errors[0].contains("deadlock update conflicts"));

    let target = targets.get("cmms_pg");
    assert_eq!(target.writer.rows("A_ITEMS").len(), 4);
    assert_eq!(target.writer.rows("C_PARTS").len(), 6);

    let records = target.metadata.load_all().await.unwrap();
    let statuses: Vec<(&str, SyncStatus)> = records
        .iter()
        .map(|r| (r.table_name.as_str(), r.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("A_ITEMS", SyncStatus::Ok),
            ("B_ORDERS", SyncStatus::Error),
            ("C_PARTS", SyncStatus::Ok),
        ]
    );
    assert!(records[1]
        .error_message
        .as_deref()
        .unwrap()
        .contains("deadlock"));
}

#[tokio::test]
async fn test_repeated_runs_are_idempotent() {
    let connector = Arc::new(FakeConnector::default().with(
        "cmms",
        FakeDatabase::default()
            .with_table("EMP", emp_table())
            .with_table("ITEMS", simple_table(25)),
    ));
    let targets = Arc::new(MemoryTargets::default());
    let run = coordinator(config(vec![pair("cmms", Some("fb"))]), connector, targets.clone());

    run.run().await.unwrap();
    let target = targets.get("cmms_pg");
    let first_emp = target.writer.rows("EMP");
    let first_items = target.writer.rows("ITEMS");

    run.run().await.unwrap();
    assert_eq!(target.writer.rows("EMP"), first_emp);
    assert_eq!(target.writer.rows("ITEMS"), first_items);

    let records = target.metadata.load_all().await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.status == SyncStatus::Ok));
}

#[tokio::test]
async fn test_metadata_reflects_latest_attempt() {
    let connector = Arc::new(FakeConnector::default().with(
        "cmms",
        FakeDatabase::default().with_table("ITEMS", simple_table(3)),
    ));
    let targets = Arc::new(MemoryTargets::default());
    let run = coordinator(config(vec![pair("cmms", Some("fb"))]), connector.clone(), targets.clone());
    let target = targets.get("cmms_pg");

    connector.db("cmms").set_broken(&["ITEMS"]);
    assert!(run.run().await.is_err());
    let failed = target.metadata.get("ITEMS").unwrap();
    assert_eq!(failed.status, SyncStatus::Error);
    assert_eq!(failed.row_count, 0);
    assert!(failed.error_message.is_some());

    connector.db("cmms").set_broken(&[]);
    run.run().await.unwrap();
    let fixed = target.metadata.get("ITEMS").unwrap();
    assert_eq!(fixed.status, SyncStatus::Ok);
    assert_eq!(fixed.row_count, 3);
    assert!(fixed.error_message.is_none());
    assert_eq!(target.metadata.load_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_extraction_keeps_previous_rows() {
    let connector = Arc::new(FakeConnector::default().with(
        "cmms",
        FakeDatabase::default().with_table("ITEMS", simple_table(3)),
    ));
    let targets = Arc::new(MemoryTargets::default());
    let run = coordinator(config(vec![pair("cmms", Some("fb"))]), connector.clone(), targets.clone());

    run.run().await.unwrap();
    connector.db("cmms").set_broken(&["ITEMS"]);
    assert!(run.run().await.is_err());

    assert_eq!(targets.get("cmms_pg").writer.rows("ITEMS").len(), 3);
}

#[tokio::test]
async fn test_skipped_tables_are_not_errors() {
    let db = FakeDatabase::default()
        .with_table("EMPTY_RELATION", FakeTable::default())
        .with_table(
            "PHOTOS",
            FakeTable {
                columns: vec![col("IMG", 261, 8, Some(0))],
                rows: vec![vec![Cell::Bytes(b"\x89PNG")]],
                fail_read: None,
            },
        )
        .with_table("ITEMS", simple_table(0));
    let connector = Arc::new(FakeConnector::default().with("cmms", db));
    let targets = Arc::new(MemoryTargets::default());
    let run = coordinator(config(vec![pair("cmms", Some("fb"))]), connector, targets.clone());

    let result = run.run().await.unwrap();

    assert_eq!(result.total_tables, 3);
    assert_eq!(result.total_ok, 1);
    assert_eq!(result.total_skipped, 2);
    assert_eq!(result.total_rows, 0);

    let target = targets.get("cmms_pg");
    assert!(!target.writer.has_table("PHOTOS"));
    assert!(!target.writer.has_table("EMPTY_RELATION"));
    assert!(target.writer.has_table("ITEMS"));
    assert_eq!(target.metadata.get("PHOTOS").unwrap().status, SyncStatus::Skipped);
    assert_eq!(
        target.metadata.get("EMPTY_RELATION").unwrap().status,
        SyncStatus::Skipped
    );
    assert_eq!(target.metadata.get("ITEMS").unwrap().status, SyncStatus::Ok);
}

#[tokio::test]
async fn test_binary_columns_are_left_out() {
    let db = FakeDatabase::default().with_table(
        "DOCS",
        FakeTable {
            columns: vec![
                col("ID", 8, 4, None),
                col("SCAN", 261, 8, Some(0)),
                col("TITLE", 37, 20, None),
            ],
            rows: vec![vec![Cell::Int(7), Cell::Bytes(b"\x00\x01"), Cell::Text("Invoice")]],
            fail_read: None,
        },
    );
    let connector = Arc::new(FakeConnector::default().with("cmms", db));
    let targets = Arc::new(MemoryTargets::default());
    coordinator(config(vec![pair("cmms", Some("fb"))]), connector, targets.clone())
        .run()
        .await
        .unwrap();

    let target = targets.get("cmms_pg");
    assert_eq!(
        target.writer.declarations.lock().unwrap()["DOCS"],
        vec!["ID INTEGER", "TITLE VARCHAR(20)"]
    );
    assert_eq!(
        target.writer.rows("DOCS"),
        vec![vec![SqlValue::I32(7), SqlValue::Text("Invoice".into())]]
    );
}

#[tokio::test]
async fn test_pair_failure_is_isolated() {
    // "cmms" has no fake database, so attaching fails.
    let connector = Arc::new(FakeConnector::default().with(
        "formy",
        FakeDatabase::default().with_table("FORMS", simple_table(2)),
    ));
    let targets = Arc::new(MemoryTargets::default());
    let run = coordinator(
        config(vec![pair("cmms", Some("fb1")), pair("formy", Some("fb2"))]),
        connector.clone(),
        targets.clone(),
    );

    let agg = aggregate(run.run().await.unwrap_err());

    assert_eq!(agg.errors.len(), 1);
    assert!(agg.errors[0].starts_with("cmms: Connection to firebird://fb1:3050/"));
    assert_eq!(agg.total_tables, 1);
    assert_eq!(agg.total_ok, 1);
    assert_eq!(agg.total_rows, 2);
    assert_eq!(targets.get("formy_pg").writer.rows("FORMS").len(), 2);
    assert_eq!(connector.db("formy").detaches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_source_detached_when_listing_fails() {
    let db = FakeDatabase {
        fail_listing: true,
        ..Default::default()
    };
    let connector = Arc::new(FakeConnector::default().with("cmms", db));
    let targets = Arc::new(MemoryTargets::default());
    let run = coordinator(config(vec![pair("cmms", Some("fb"))]), connector.clone(), targets);

    let agg = aggregate(run.run().await.unwrap_err());

    assert_eq!(agg.errors, vec!["cmms: Source database error: catalog unavailable".to_string()]);
    assert_eq!(agg.total_tables, 0);
    let db = connector.db("cmms");
    assert_eq!(db.attaches.load(Ordering::SeqCst), 1);
    assert_eq!(db.detaches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pairs_without_host_are_skipped() {
    let connector = Arc::new(FakeConnector::default().with(
        "cmms",
        FakeDatabase::default().with_table("ITEMS", simple_table(1)),
    ));
    let targets = Arc::new(MemoryTargets::default());
    let run = coordinator(
        config(vec![pair("cmms", Some("fb")), pair("formy", None)]),
        connector,
        targets,
    );

    let result = run.run().await.unwrap();

    assert_eq!(result.pairs.len(), 1);
    assert_eq!(result.pairs[0].pair_name, "cmms");
    assert_eq!(result.skipped_pairs, vec!["formy".to_string()]);
    assert_eq!(result.headline(), "Synced 1/1 tables (1 rows) across 1 databases");
}

#[tokio::test]
async fn test_wide_table_batches_stay_under_parameter_ceiling() {
    let columns: Vec<RawColumn> = (0..60).map(|i| col(&format!("C{}", i), 8, 4, None)).collect();
    let rows: Vec<Vec<Cell>> = (0..2_000)
        .map(|r| (0..60).map(|c| Cell::Int(r * 100 + c)).collect())
        .collect();
    let db = FakeDatabase::default().with_table(
        "WIDE",
        FakeTable {
            columns,
            rows,
            fail_read: None,
        },
    );
    let connector = Arc::new(FakeConnector::default().with("cmms", db));
    let targets = Arc::new(MemoryTargets::default());
    let result = coordinator(config(vec![pair("cmms", Some("fb"))]), connector, targets.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(result.total_rows, 2_000);
    let target = targets.get("cmms_pg");
    assert_eq!(*target.writer.batch_sizes.lock().unwrap(), vec![833, 833, 334]);
    let rows = target.writer.rows("WIDE");
    assert_eq!(rows[1999][59], SqlValue::I32(199_959));
}

#[tokio::test]
async fn test_status_and_shutdown() {
    let connector = Arc::new(FakeConnector::default().with(
        "cmms",
        FakeDatabase::default().with_table("EMP", emp_table()),
    ));
    let targets = Arc::new(MemoryTargets::default());
    let run = coordinator(config(vec![pair("cmms", Some("fb"))]), connector, targets.clone());

    run.run().await.unwrap();
    let status = run.status().await.unwrap();
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].target_database, "cmms_pg");
    assert_eq!(status[0].records.len(), 1);
    assert_eq!(status[0].records[0].row_count, 3);

    let health = run.health_check().await.unwrap();
    assert!(health.healthy());

    run.shutdown().await;
    assert!(targets.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_health_check_reports_unreachable_source() {
    let connector = Arc::new(FakeConnector::default());
    let targets = Arc::new(MemoryTargets::default());
    let run = coordinator(config(vec![pair("cmms", Some("fb"))]), connector, targets);

    let health = run.health_check().await.unwrap();
    assert!(!health.healthy());
    assert!(!health.pairs[0].source.ok);
    assert!(health.pairs[0].target.ok);
}

#[tokio::test]
async fn test_table_dropped_after_listing_fails_alone() {
    let db = FakeDatabase::default()
        .with_table("A_ITEMS", simple_table(2))
        .with_vanished("B_GONE")
        .with_table("C_PARTS", simple_table(3));
    let connector = Arc::new(FakeConnector::default().with("cmms", db));
    let targets = Arc::new(MemoryTargets::default());
    let run = coordinator(config(vec![pair("cmms", Some("fb"))]), connector, targets.clone());

    let agg = aggregate(run.run().await.unwrap_err());

    assert_eq!(agg.total_tables, 3);
    assert_eq!(agg.total_ok, 2);
    assert_eq!(agg.total_rows, 5);
    assert_eq!(agg.errors.len(), 1);
    assert!(agg.errors[0].starts_with("cmms.B_GONE: "));
    assert!(agg.errors[0].contains("no longer exists"));

    let target = targets.get("cmms_pg");
    assert!(!target.writer.has_table("B_GONE"));
    assert_eq!(target.writer.rows("C_PARTS").len(), 3);
    let gone = target.metadata.get("B_GONE").unwrap();
    assert_eq!(gone.status, SyncStatus::Error);
    assert!(gone.error_message.unwrap().contains("B_GONE"));
    assert_eq!(target.metadata.get("C_PARTS").unwrap().status, SyncStatus::Ok);
}

#[tokio::test]
async fn test_metadata_write_failures_are_counted_apart() {
    let connector = FakeConnector::default().with(
        "cmms",
        FakeDatabase::default()
            .with_table("A_ITEMS", simple_table(2))
            .with_table("C_PARTS", simple_table(3)),
    );
    let targets = MemoryTargets {
        reject_metadata: true,
        ..Default::default()
    };

    let summary = sync_pair(
        &pair("cmms", Some("fb")),
        &connector,
        &targets,
        &SyncConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(summary.tables_ok, 2);
    assert_eq!(summary.tables_error, 0);
    assert_eq!(summary.tables_error, summary.errors.len());
    assert_eq!(summary.metadata_errors.len(), 2);

    let errors = summary.error_strings();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].starts_with("cmms.A_ITEMS: metadata update failed: "));
    assert!(errors[1].contains("permission denied"));
}

#[tokio::test]
async fn test_status_does_not_create_metadata_table() {
    let connector = Arc::new(FakeConnector::default().with(
        "cmms",
        FakeDatabase::default().with_table("EMP", emp_table()),
    ));
    let targets = Arc::new(MemoryTargets::default());
    let run = coordinator(config(vec![pair("cmms", Some("fb"))]), connector, targets.clone());

    let status = run.status().await.unwrap();

    assert_eq!(status.len(), 1);
    assert!(status[0].records.is_empty());
    assert!(!targets.get("cmms_pg").metadata.is_ensured());
}
