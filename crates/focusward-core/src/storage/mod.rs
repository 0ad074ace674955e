//! Persistence boundary.
//!
//! The core never holds canonical state in memory between operations.
//! Every record lives under a [`StoreKey`] in a [`Store`] and is
//! read-modify-written through [`StoreExt::update`]. Two backends ship
//! with the crate: [`MemoryStore`] for tests and embedding, and the
//! SQLite-backed [`Database`] used by the CLI.

mod config;
pub mod database;
pub mod memory;
pub mod migrations;

pub use config::{Config, SitesConfig, StatsConfig, TimerConfig};
pub use database::Database;
pub use memory::MemoryStore;

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result, StorageError};

/// Every record the core persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreKey {
    TimerState,
    DailyStats,
    SessionHistory,
    DistractionSiteList,
    WeeklyData,
    PatternStore,
    ReflectionsBySessionId,
    SchemaVersion,
    DistractionInterval,
}

impl StoreKey {
    pub const ALL: [StoreKey; 9] = [
        StoreKey::TimerState,
        StoreKey::DailyStats,
        StoreKey::SessionHistory,
        StoreKey::DistractionSiteList,
        StoreKey::WeeklyData,
        StoreKey::PatternStore,
        StoreKey::ReflectionsBySessionId,
        StoreKey::SchemaVersion,
        StoreKey::DistractionInterval,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::TimerState => "timer-state",
            StoreKey::DailyStats => "daily-stats",
            StoreKey::SessionHistory => "session-history",
            StoreKey::DistractionSiteList => "distraction-site-list",
            StoreKey::WeeklyData => "weekly-data",
            StoreKey::PatternStore => "pattern-store",
            StoreKey::ReflectionsBySessionId => "reflections-by-session-id",
            StoreKey::SchemaVersion => "schema-version",
            StoreKey::DistractionInterval => "distraction-interval",
        }
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closure applied by [`Store::modify`]: receives the stored value (if any)
/// and returns the value to write back.
pub type Modifier<'a> = dyn FnMut(Option<Value>) -> Result<Value> + 'a;

/// Raw key-value persistence collaborator.
///
/// Implementations must be usable from several handlers at once; the
/// bundled ones guard their state with a mutex.
pub trait Store: Send + Sync {
    /// Read the raw JSON stored under `key`.
    fn load(&self, key: StoreKey) -> Result<Option<Value>>;

    /// Replace the value stored under `key`.
    fn save(&self, key: StoreKey, value: Value) -> Result<()>;

    /// Delete `key`. Deleting a missing key is not an error.
    fn remove(&self, key: StoreKey) -> Result<()>;

    /// Read-modify-write one key. Backends with a lock hold it for the
    /// whole step; the default is a plain load followed by a save.
    fn modify(&self, key: StoreKey, f: &mut Modifier<'_>) -> Result<()> {
        let current = self.load(key)?;
        let next = f(current)?;
        self.save(key, next)
    }
}

/// Typed access on top of [`Store`].
pub trait StoreExt: Store {
    /// Decode the value under `key`, or `fallback` when it is missing or
    /// no longer decodes (corrupt records are logged, not propagated).
    fn get<T: DeserializeOwned>(&self, key: StoreKey, fallback: T) -> Result<T> {
        Ok(decode_or(key, self.load(key)?, fallback))
    }

    fn set<T: Serialize>(&self, key: StoreKey, value: &T) -> Result<()> {
        self.save(key, serde_json::to_value(value)?)
    }

    /// Apply `f` to the decoded record in one read-merge-write step and
    /// return whatever `f` returns.
    fn update<T, R, F>(&self, key: StoreKey, fallback: T, f: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T) -> R,
    {
        let mut pending = Some((fallback, f));
        let mut output = None;
        self.modify(key, &mut |current| {
            let Some((fallback, f)) = pending.take() else {
                return Err(StorageError::QueryFailed(format!("update of {key} re-entered")).into());
            };
            let mut record = decode_or(key, current, fallback);
            output = Some(f(&mut record));
            Ok(serde_json::to_value(&record)?)
        })?;
        output.ok_or_else(|| StorageError::QueryFailed(format!("update of {key} not applied")).into())
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

fn decode_or<T: DeserializeOwned>(key: StoreKey, value: Option<Value>, fallback: T) -> T {
    match value {
        None | Some(Value::Null) => fallback,
        Some(raw) => match serde_json::from_value(raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "discarding undecodable record");
                fallback
            }
        },
    }
}

/// Returns the Focusward data directory.
///
/// `FOCUSWARD_HOME` wins when set; otherwise `~/.config/focusward`, or
/// `~/.config/focusward-dev` with `FOCUSWARD_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("FOCUSWARD_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("FOCUSWARD_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("focusward-dev")
            } else {
                base_dir.join("focusward")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
