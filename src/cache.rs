//! Persistent status cache.
//!
//! One JSON record survives between reconciliation passes. It is a record,
//! not a log: each field independently holds at most one entry, always the
//! latest observation. The reconciler loads it at run start, mutates it in
//! memory, and persists it at exactly two checkpoints (after classifying a
//! foreign status, and after a successful status set).
//!
//! Corruption is never fatal. An unreadable or unparsable cache file is
//! replaced by a fresh default record, trading the remembered history for
//! a working run.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix timestamp in seconds.
pub fn epoch_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// The most recent fully-populated foreign status observed on the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignStatus {
    pub text: String,
    pub emoji: String,
    pub expiration: i64,
    /// When this snapshot was observed (epoch seconds).
    pub observed_at: i64,
}

/// Consecutive-empty-read tracking.
///
/// Reserved for the "require two empty reads" override guard. The field is
/// persisted for forward compatibility but the current decision logic never
/// reads or increments it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmptyRead {
    pub last_seen_at: i64,
    pub consecutive_count: u32,
}

/// The most recent status Herald itself wrote to the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScriptStatus {
    pub text: String,
    pub emoji: String,
    pub expiration: i64,
    /// When the set call succeeded (epoch seconds).
    pub set_at: i64,
}

/// The single cache record persisted between runs.
///
/// Unknown fields in the on-disk JSON are tolerated (and dropped on the
/// next save); every known field is individually defaulted so older cache
/// files load without migration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheRecord {
    /// Set on every save (epoch seconds).
    pub updated_at: i64,

    /// Latest foreign snapshot with both fields populated, if any.
    pub last_non_empty_non_owned: Option<ForeignStatus>,

    /// Reserved consecutive-empty-read counter, currently unwired.
    pub empty_read: Option<EmptyRead>,

    /// Latest value Herald wrote remotely, if any.
    pub last_set_by_script: Option<ScriptStatus>,
}

impl CacheRecord {
    /// Load the cache record from `path`.
    ///
    /// A missing file yields a fresh default record; so does a corrupt one,
    /// with a warning. This function never fails the run.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!("No cache file at {}, starting fresh", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(record) => record,
                Err(e) => {
                    warn!(
                        "Cache file {} is corrupt ({e}), starting with a fresh record",
                        path.display()
                    );
                    Self::default()
                }
            },
            Err(e) => {
                warn!(
                    "Could not read cache file {} ({e}), starting with a fresh record",
                    path.display()
                );
                Self::default()
            }
        }
    }

    /// Persist the record to `path`, stamping `updated_at`.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.updated_at = epoch_now();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize cache record")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write cache file {}", path.display()))?;
        debug!("Cache saved to {}", path.display());
        Ok(())
    }
}
