//! Configuration validation.

use std::collections::HashSet;

use super::{Config, PG_MAX_PARAMETERS};
use crate::error::{Result, SyncError};

const SSL_MODES: &[&str] = &["disable", "require", "verify-full"];

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Target validation
    if config.target.host.is_empty() {
        return Err(SyncError::Config("target.host is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(SyncError::Config("target.user is required".into()));
    }
    if !SSL_MODES.contains(&config.target.ssl_mode.to_lowercase().as_str()) {
        return Err(SyncError::Config(format!(
            "target.ssl_mode must be one of {}, got '{}'",
            SSL_MODES.join(", "),
            config.target.ssl_mode
        )));
    }
    if config.target.max_connections == 0 {
        return Err(SyncError::Config(
            "target.max_connections must be at least 1".into(),
        ));
    }

    // Pair validation
    if config.pairs.is_empty() {
        return Err(SyncError::Config("at least one pair is required".into()));
    }
    let mut names = HashSet::new();
    for pair in &config.pairs {
        if pair.name.trim().is_empty() {
            return Err(SyncError::Config("pairs[].name is required".into()));
        }
        if !names.insert(pair.name.as_str()) {
            return Err(SyncError::Config(format!(
                "duplicate pair name '{}'",
                pair.name
            )));
        }
        if pair.target_database.trim().is_empty() {
            return Err(SyncError::Config(format!(
                "pair '{}': target_database is required",
                pair.name
            )));
        }
        // A pair without a host is skipped at run time, so only check configured ones.
        if pair.source.host().is_some() && pair.source.database.trim().is_empty() {
            return Err(SyncError::Config(format!(
                "pair '{}': source.database is required when source.host is set",
                pair.name
            )));
        }
    }

    // Sync validation
    if config.sync.max_batch_rows == 0 {
        return Err(SyncError::Config(
            "sync.max_batch_rows must be at least 1".into(),
        ));
    }
    if config.sync.max_parameters == 0 || config.sync.max_parameters > PG_MAX_PARAMETERS {
        return Err(SyncError::Config(format!(
            "sync.max_parameters must be between 1 and {}",
            PG_MAX_PARAMETERS
        )));
    }
    if config.sync.blob_timeout_ms == 0 {
        return Err(SyncError::Config(
            "sync.blob_timeout_ms must be at least 1".into(),
        ));
    }
    if config.sync.metadata_table.trim().is_empty() {
        return Err(SyncError::Config("sync.metadata_table is required".into()));
    }

    Ok(())
}
