//! Target connection pools keyed by database name.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio::sync::Mutex;
use tokio_postgres::{Config as PgConfig, NoTls};
use tracing::{debug, info};

use super::postgres::PgTarget;
use super::tls::SslMode;
use crate::config::{SyncConfig, TargetConfig};
use crate::core::traits::{TargetHandle, TargetProvider};
use crate::error::{Result, SyncError};
use crate::state::DbMetadataStore;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns one pool per target database and hands out handles bound to them.
///
/// Pools are created on first use, reused for later pairs and runs that name
/// the same database, and released together by [`TargetProvider::close_all`].
pub struct PoolRegistry {
    config: TargetConfig,
    metadata_table: String,
    ssl_mode: SslMode,
    pools: Mutex<HashMap<String, Pool>>,
}

impl PoolRegistry {
    pub fn new(config: TargetConfig, sync: &SyncConfig) -> Result<Self> {
        let ssl_mode = SslMode::parse(&config.ssl_mode)?;
        Ok(Self {
            config,
            metadata_table: sync.metadata_table.clone(),
            ssl_mode,
            pools: Mutex::new(HashMap::new()),
        })
    }

    /// Number of pools created so far.
    pub async fn len(&self) -> usize {
        self.pools.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn pool(&self, database: &str) -> Result<Pool> {
        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(database) {
            return Ok(pool.clone());
        }

        let pool = self.create_pool(database).await?;
        pools.insert(database.to_string(), pool.clone());
        Ok(pool)
    }

    async fn create_pool(&self, database: &str) -> Result<Pool> {
        let location = self.config.describe(database);

        let mut pg_config = PgConfig::new();
        pg_config.host(&self.config.host);
        pg_config.port(self.config.port);
        pg_config.dbname(database);
        pg_config.user(&self.config.user);
        pg_config.password(&self.config.password);
        pg_config.connect_timeout(CONNECT_TIMEOUT);
        pg_config.application_name("firebird-pg-sync");

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = match self.ssl_mode.connector()? {
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
            None => Manager::from_config(pg_config, NoTls, mgr_config),
        };
        let pool = Pool::builder(mgr)
            .max_size(self.config.max_connections)
            .build()
            .map_err(|e| SyncError::pool(e, format!("creating pool for {}", location)))?;

        // Fail here rather than on the first table.
        let client = pool
            .get()
            .await
            .map_err(|e| SyncError::connection(&location, e))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| SyncError::connection(&location, e))?;

        info!("Connected to PostgreSQL: {}", location);
        Ok(pool)
    }
}

#[async_trait]
impl TargetProvider for PoolRegistry {
    async fn target(&self, database: &str) -> Result<TargetHandle> {
        let pool = self.pool(database).await?;
        Ok(TargetHandle {
            database: database.to_string(),
            writer: Arc::new(PgTarget::new(pool.clone(), database)),
            metadata: Arc::new(DbMetadataStore::new(pool, self.metadata_table.clone())),
        })
    }

    async fn close_all(&self) {
        let mut pools = self.pools.lock().await;
        for (database, pool) in pools.drain() {
            pool.close();
            debug!("Closed pool for {}", database);
        }
    }
}
