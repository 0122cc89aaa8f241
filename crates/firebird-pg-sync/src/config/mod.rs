//! Configuration loading and validation.
//!
//! Configuration comes either from a YAML file or from environment variables
//! following the deployment's naming scheme:
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `POSTGRES_HOST` / `POSTGRES_PORT` | target server | `127.0.0.1` / `5432` |
//! | `POSTGRES_SYNC_USER` / `POSTGRES_SYNC_PASS` | target credentials | |
//! | `POSTGRES_SSL_MODE` | `disable`, `require`, `verify-full` | `disable` |
//! | `FIREBIRD_SYNC_PAIRS` | comma-separated pair names | `cmms,formy` |
//! | `FIREBIRD_<NAME>_HOST` / `_PORT` / `_DB` / `_USER` / `_PASS` | source per pair | port `3050`, user `SYSDBA` |
//! | `POSTGRES_<NAME>_DB` | target database per pair | pair name |

mod types;
mod validation;

pub use types::*;

use crate::error::{Result, SyncError};
use std::path::Path;

const DEFAULT_PAIRS: &str = "cmms,formy";

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let target = TargetConfig {
            host: var("POSTGRES_HOST").unwrap_or_else(default_pg_host),
            port: parse_port(var("POSTGRES_PORT"), "POSTGRES_PORT", default_pg_port())?,
            user: var("POSTGRES_SYNC_USER").unwrap_or_default(),
            password: var("POSTGRES_SYNC_PASS").unwrap_or_default(),
            ssl_mode: var("POSTGRES_SSL_MODE").unwrap_or_else(default_disable),
            max_connections: default_max_connections(),
        };

        let names = var("FIREBIRD_SYNC_PAIRS").unwrap_or_else(|| DEFAULT_PAIRS.to_string());
        let mut pairs = Vec::new();
        for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let upper = name.to_uppercase();
            let fb = |suffix: &str| var(&format!("FIREBIRD_{}_{}", upper, suffix));
            let port_key = format!("FIREBIRD_{}_PORT", upper);

            pairs.push(PairConfig {
                name: name.to_string(),
                target_database: var(&format!("POSTGRES_{}_DB", upper))
                    .unwrap_or_else(|| name.to_string()),
                source: FirebirdConfig {
                    host: fb("HOST"),
                    port: parse_port(fb("PORT"), &port_key, default_fb_port())?,
                    database: fb("DB").unwrap_or_default(),
                    user: fb("USER").unwrap_or_else(default_fb_user),
                    password: fb("PASS").unwrap_or_default(),
                },
            });
        }

        let config = Config {
            target,
            pairs,
            sync: SyncConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

fn parse_port(value: Option<String>, key: &str, default: u16) -> Result<u16> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| SyncError::Config(format!("{} must be a port number, got '{}'", key, v))),
        None => Ok(default),
    }
}

impl TargetConfig {
    /// Human-readable location of a target database (no credentials).
    pub fn describe(&self, database: &str) -> String {
        format!("postgres://{}:{}/{}", self.host, self.port, database)
    }
}

impl FirebirdConfig {
    /// Human-readable location of the source database (no credentials).
    pub fn describe(&self) -> String {
        format!(
            "firebird://{}:{}/{}",
            self.host().unwrap_or("<unset>"),
            self.port,
            self.database
        )
    }
}
