//! Record migrations.
//!
//! Migrations are versioned and applied when the service opens a store.
//! The `schema-version` key tracks the last applied version. Each step
//! rewrites stored records into the shape the current code expects.

use serde_json::Value;

use super::{Store, StoreExt, StoreKey};
use crate::distraction::normalize_site;
use crate::error::{Result, StorageError};
use crate::insights::PatternStore;

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Apply all pending migrations and stamp the schema version.
///
/// # Errors
/// Returns an error if a step cannot read or write its record.
pub fn migrate(store: &dyn Store) -> Result<u32> {
    let current: u32 = store.get(StoreKey::SchemaVersion, 0)?;
    if current >= CURRENT_SCHEMA_VERSION {
        return Ok(current);
    }

    if current < 1 {
        migrate_v1(store).map_err(|e| StorageError::MigrationFailed(format!("v1: {e}")))?;
    }
    if current < 2 {
        migrate_v2(store).map_err(|e| StorageError::MigrationFailed(format!("v2: {e}")))?;
    }

    store.set(StoreKey::SchemaVersion, &CURRENT_SCHEMA_VERSION)?;
    tracing::info!(from = current, to = CURRENT_SCHEMA_VERSION, "store migrated");
    Ok(CURRENT_SCHEMA_VERSION)
}

/// Migration v1: normalize and de-duplicate the distraction site list.
///
/// Older lists held raw user input (`https://www.Reddit.com/`). A record
/// that is not a list at all is dropped so it reseeds from config.
fn migrate_v1(store: &dyn Store) -> Result<()> {
    let Some(raw) = store.load(StoreKey::DistractionSiteList)? else {
        return Ok(());
    };
    let Value::Array(items) = raw else {
        tracing::warn!("site list is not an array, dropping it");
        return store.remove(StoreKey::DistractionSiteList);
    };

    let mut sites: Vec<String> = Vec::with_capacity(items.len());
    for site in items.iter().filter_map(Value::as_str).filter_map(normalize_site) {
        if !sites.contains(&site) {
            sites.push(site);
        }
    }
    store.set(StoreKey::DistractionSiteList, &sites)
}

/// Migration v2: rewrite the pattern store with exact-length finite arrays.
fn migrate_v2(store: &dyn Store) -> Result<()> {
    let Some(raw) = store.load(StoreKey::PatternStore)? else {
        return Ok(());
    };
    store.set(StoreKey::PatternStore, &PatternStore::from_value(Some(&raw)))
}
