//! Sync run coordinator - main workflow entry point.
//!
//! A run walks the configured pairs in order and syncs each one through
//! [`sync_pair`]. Pair failures are logged and collected; the run only fails
//! at the end, with one [`AggregateRunError`] listing every table and pair that
//! did not make it.

mod pair;

pub use pair::{sync_pair, RunSummary, TableError};

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{Config, PairConfig};
use crate::core::schema::SyncMetadataRecord;
use crate::core::traits::{SourceConnector, TargetProvider};
use crate::error::{AggregateRunError, Result, SyncError};
use crate::source::FirebirdConnector;
use crate::target::PoolRegistry;

/// Result of a successful sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Unique run identifier.
    pub run_id: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Per-pair summaries, in configuration order.
    pub pairs: Vec<RunSummary>,

    /// Pairs not attempted because no source host is configured.
    pub skipped_pairs: Vec<String>,

    pub total_tables: usize,
    pub total_ok: usize,
    pub total_skipped: usize,
    pub total_rows: u64,
}

impl RunResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One-line summary, e.g. `Synced 3/4 tables (120 rows) across 2 databases`.
    pub fn headline(&self) -> String {
        format!(
            "Synced {}/{} tables ({} rows) across {} databases",
            self.total_ok,
            self.total_tables,
            self.total_rows,
            self.pairs.len()
        )
    }
}

/// Metadata table contents for one pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairStatus {
    pub pair_name: String,
    pub target_database: String,
    pub records: Vec<SyncMetadataRecord>,
}

/// Outcome of one connectivity probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    fn from_result(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self { ok: true, error: None },
            Err(e) => Self {
                ok: false,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Connectivity of one pair's source and target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairHealth {
    pub pair_name: String,
    pub source: ProbeResult,
    pub target: ProbeResult,
}

/// Health check result for every configured pair with a source host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub pairs: Vec<PairHealth>,
}

impl HealthReport {
    pub fn healthy(&self) -> bool {
        self.pairs.iter().all(|p| p.source.ok && p.target.ok)
    }
}

/// Runs all configured pairs and owns the target pools.
pub struct SyncRunCoordinator {
    config: Config,
    connector: Arc<dyn SourceConnector>,
    targets: Arc<dyn TargetProvider>,
}

impl SyncRunCoordinator {
    /// Create a coordinator with explicit source and target implementations.
    pub fn new(
        config: Config,
        connector: Arc<dyn SourceConnector>,
        targets: Arc<dyn TargetProvider>,
    ) -> Self {
        Self {
            config,
            connector,
            targets,
        }
    }

    /// Create a coordinator using Firebird sources and pooled PostgreSQL targets.
    pub fn from_config(config: Config) -> Result<Self> {
        let registry = PoolRegistry::new(config.target.clone(), &config.sync)?;
        Ok(Self::new(
            config,
            Arc::new(FirebirdConnector::new()),
            Arc::new(registry),
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Pairs with a configured source host; the rest are logged and skipped.
    fn active_pairs(&self) -> (Vec<&PairConfig>, Vec<String>) {
        let mut active = Vec::new();
        let mut skipped = Vec::new();
        for pair in &self.config.pairs {
            if pair.source.host().is_some() {
                active.push(pair);
            } else {
                warn!(
                    "Skipping {} - FIREBIRD_{}_HOST not set",
                    pair.name,
                    pair.name.to_uppercase()
                );
                skipped.push(pair.name.clone());
            }
        }
        (active, skipped)
    }

    /// Sync every configured pair.
    ///
    /// Returns [`SyncError::Aggregate`] if any table or pair failed; every
    /// table's outcome is still recorded in its target's metadata table.
    pub async fn run(&self) -> Result<RunResult> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting sync run: {}", run_id);

        let (pairs, skipped_pairs) = self.active_pairs();
        let mut summaries = Vec::new();
        let mut errors = Vec::new();

        for pair in pairs {
            match sync_pair(
                pair,
                self.connector.as_ref(),
                self.targets.as_ref(),
                &self.config.sync,
            )
            .await
            {
                Ok(summary) => {
                    errors.extend(summary.error_strings());
                    summaries.push(summary);
                }
                Err(e) => {
                    error!("{}: FATAL - {}", pair.name, e);
                    errors.push(format!("{}: {}", pair.name, e));
                }
            }
        }

        let result = RunResult {
            run_id,
            started_at,
            duration_seconds: timer.elapsed().as_secs_f64(),
            total_tables: summaries.iter().map(|s| s.tables_total).sum(),
            total_ok: summaries.iter().map(|s| s.tables_ok).sum(),
            total_skipped: summaries.iter().map(|s| s.tables_skipped).sum(),
            total_rows: summaries.iter().map(|s| s.total_rows).sum(),
            pairs: summaries,
            skipped_pairs,
        };
        info!("{}", result.headline());

        if !errors.is_empty() {
            return Err(SyncError::Aggregate(AggregateRunError {
                total_tables: result.total_tables,
                total_ok: result.total_ok,
                total_rows: result.total_rows,
                errors,
            }));
        }
        Ok(result)
    }

    /// Read back the metadata table of every pair's target database.
    ///
    /// Does not create anything; a target never synced reports no records.
    pub async fn status(&self) -> Result<Vec<PairStatus>> {
        let mut statuses = Vec::with_capacity(self.config.pairs.len());
        for pair in &self.config.pairs {
            let target = self.targets.target(&pair.target_database).await?;
            statuses.push(PairStatus {
                pair_name: pair.name.clone(),
                target_database: pair.target_database.clone(),
                records: target.metadata.load_all().await?,
            });
        }
        Ok(statuses)
    }

    /// Probe source and target connectivity of every active pair.
    pub async fn health_check(&self) -> Result<HealthReport> {
        let (pairs, _) = self.active_pairs();
        let mut report = HealthReport { pairs: Vec::new() };

        for pair in pairs {
            let source = match self.connector.attach(pair).await {
                Ok(reader) => {
                    let listed = reader.list_user_tables().await.map(|_| ());
                    let detached = reader.detach().await;
                    listed.and(detached)
                }
                Err(e) => Err(e),
            };
            let target = match self.targets.target(&pair.target_database).await {
                Ok(handle) => handle.writer.ping().await,
                Err(e) => Err(e),
            };

            report.pairs.push(PairHealth {
                pair_name: pair.name.clone(),
                source: ProbeResult::from_result(source),
                target: ProbeResult::from_result(target),
            });
        }
        Ok(report)
    }

    /// Close all target pools.
    pub async fn shutdown(&self) {
        self.targets.close_all().await;
    }
}
