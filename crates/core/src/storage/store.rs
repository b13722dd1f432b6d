//! Versioned, namespaced key-value store

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::Result;

use super::medium::StorageMedium;

/// Reserved slot holding the per-entity bookkeeping record.
const METADATA_SLOT: &str = "_metadata";

/// Bookkeeping for one entity slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMeta {
    pub last_updated: DateTime<Utc>,
    pub version: String,
}

/// The record kept under the reserved metadata slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub entities: BTreeMap<String, EntityMeta>,
}

/// Usage diagnostics for the medium behind a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    pub available: bool,
    pub total_size: usize,
    pub app_size: usize,
    pub total_item_count: usize,
    pub app_item_count: usize,
    pub usage_percentage: u32,
}

/// One record skipped while reconstructing a persisted collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub index: usize,
    pub reason: String,
}

/// Outcome of the eager load a repository performs at construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: Vec<SkippedRecord>,
}

/// One exported key with the version it was written under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportEntry {
    pub data: Value,
    pub version: String,
}

/// Whole-namespace backup produced by [`VersionedStore::export_data`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    pub app_name: String,
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub data: BTreeMap<String, ExportEntry>,
}

/// Namespaced, versioned key-value adapter over a [`StorageMedium`].
///
/// Keys are namespaced as `{app_name}_{entity}` so several applications can
/// share one medium. Clones share the same medium, which lets every
/// repository in an application sit on a single backing area.
///
/// No persistence failure crosses this boundary: `save` reports `false`,
/// `load` falls back to the caller's default, and the diagnostics go to the
/// log. Callers never handle storage errors.
#[derive(Clone)]
pub struct VersionedStore {
    app_name: String,
    version: String,
    medium: Arc<RwLock<dyn StorageMedium>>,
}

impl VersionedStore {
    pub fn new(
        app_name: impl Into<String>,
        version: impl Into<String>,
        medium: impl StorageMedium + 'static,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            version: version.into(),
            medium: Arc::new(RwLock::new(medium)),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Persist `value` under the entity slot and refresh its metadata
    /// entry. Returns whether the write landed.
    pub fn save<T: Serialize>(&self, entity: &str, value: &T) -> bool {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize '{}': {}", entity, e);
                return false;
            }
        };

        let key = self.full_key(entity);
        let mut medium = match self.medium.write() {
            Ok(medium) => medium,
            Err(e) => {
                error!("Storage medium lock poisoned: {}", e);
                return false;
            }
        };

        if let Err(e) = medium.set(&key, &payload) {
            warn!("Failed to save '{}': {}", key, e);
            return false;
        }

        let mut metadata = self.read_metadata(&*medium);
        metadata.entities.insert(
            entity.to_string(),
            EntityMeta {
                last_updated: Utc::now(),
                version: self.version.clone(),
            },
        );
        if let Err(e) = self.write_metadata(&mut *medium, &metadata) {
            warn!("Failed to update metadata for '{}': {}", key, e);
            return false;
        }

        debug!("Saved {} bytes under '{}'", payload.len(), key);
        true
    }

    /// Read the entity slot, falling back to `default` when the slot is
    /// absent or its payload does not parse.
    pub fn load<T: DeserializeOwned>(&self, entity: &str, default: T) -> T {
        let key = self.full_key(entity);
        let medium = match self.medium.read() {
            Ok(medium) => medium,
            Err(e) => {
                error!("Storage medium lock poisoned: {}", e);
                return default;
            }
        };

        let Some(payload) = medium.get(&key) else {
            return default;
        };

        match serde_json::from_str(&payload) {
            Ok(value) => value,
            Err(e) => {
                warn!("Discarding unreadable payload under '{}': {}", key, e);
                default
            }
        }
    }

    /// Drop the entity slot and its metadata entry. Removing an absent
    /// slot still reports success.
    pub fn remove(&self, entity: &str) -> bool {
        let key = self.full_key(entity);
        let mut medium = match self.medium.write() {
            Ok(medium) => medium,
            Err(e) => {
                error!("Storage medium lock poisoned: {}", e);
                return false;
            }
        };

        medium.remove(&key);

        let mut metadata = self.read_metadata(&*medium);
        if metadata.entities.remove(entity).is_some() {
            if let Err(e) = self.write_metadata(&mut *medium, &metadata) {
                warn!("Failed to update metadata after removing '{}': {}", key, e);
                return false;
            }
        }

        debug!("Removed '{}'", key);
        true
    }

    pub fn exists(&self, entity: &str) -> bool {
        let key = self.full_key(entity);
        match self.medium.read() {
            Ok(medium) => medium.get(&key).is_some(),
            Err(e) => {
                error!("Storage medium lock poisoned: {}", e);
                false
            }
        }
    }

    /// Remove every key in this store's namespace, metadata included.
    /// Keys belonging to other namespaces are untouched.
    pub fn clear(&self) -> bool {
        let prefix = self.prefix();
        let mut medium = match self.medium.write() {
            Ok(medium) => medium,
            Err(e) => {
                error!("Storage medium lock poisoned: {}", e);
                return false;
            }
        };

        let keys: Vec<String> = medium
            .keys()
            .into_iter()
            .filter(|key| key.starts_with(&prefix))
            .collect();
        for key in &keys {
            medium.remove(key);
        }

        debug!("Cleared {} keys under '{}'", keys.len(), prefix);
        true
    }

    /// Entity slots currently stored, sorted, the metadata slot excluded.
    pub fn entities(&self) -> Vec<String> {
        let prefix = self.prefix();
        let medium = match self.medium.read() {
            Ok(medium) => medium,
            Err(e) => {
                error!("Storage medium lock poisoned: {}", e);
                return Vec::new();
            }
        };

        let mut slots: Vec<String> = medium
            .keys()
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .filter(|slot| slot != METADATA_SLOT)
            .collect();
        slots.sort();
        slots
    }

    pub fn metadata(&self) -> StoreMetadata {
        match self.medium.read() {
            Ok(medium) => self.read_metadata(&*medium),
            Err(e) => {
                error!("Storage medium lock poisoned: {}", e);
                StoreMetadata::default()
            }
        }
    }

    /// Size and count diagnostics over the whole medium and this store's
    /// share of it.
    pub fn storage_info(&self) -> StorageInfo {
        let medium = match self.medium.read() {
            Ok(medium) => medium,
            Err(e) => {
                error!("Storage medium lock poisoned: {}", e);
                return StorageInfo {
                    available: false,
                    total_size: 0,
                    app_size: 0,
                    total_item_count: 0,
                    app_item_count: 0,
                    usage_percentage: 0,
                };
            }
        };

        let prefix = self.prefix();
        let mut info = StorageInfo {
            available: true,
            total_size: 0,
            app_size: 0,
            total_item_count: 0,
            app_item_count: 0,
            usage_percentage: 0,
        };

        for key in medium.keys() {
            let value_len = medium.get(&key).map(|value| value.len()).unwrap_or(0);
            let entry_size = key.len() + value_len;
            info.total_size += entry_size;
            info.total_item_count += 1;
            if key.starts_with(&prefix) {
                info.app_size += entry_size;
                info.app_item_count += 1;
            }
        }

        if info.total_size > 0 {
            info.usage_percentage =
                ((info.app_size as f64 / info.total_size as f64) * 100.0).round() as u32;
        }

        info
    }

    /// Snapshot every key in the namespace for backup. Each entry carries
    /// the version its slot was last written under.
    pub fn export_data(&self) -> ExportSnapshot {
        let mut snapshot = ExportSnapshot {
            app_name: self.app_name.clone(),
            version: self.version.clone(),
            exported_at: Utc::now(),
            data: BTreeMap::new(),
        };

        let medium = match self.medium.read() {
            Ok(medium) => medium,
            Err(e) => {
                error!("Storage medium lock poisoned: {}", e);
                return snapshot;
            }
        };

        let metadata = self.read_metadata(&*medium);
        let prefix = self.prefix();

        for key in medium.keys() {
            let Some(slot) = key.strip_prefix(&prefix) else {
                continue;
            };
            let Some(payload) = medium.get(&key) else {
                continue;
            };
            let value = match serde_json::from_str(&payload) {
                Ok(value) => value,
                Err(e) => {
                    warn!("Skipping unreadable payload under '{}' during export: {}", key, e);
                    continue;
                }
            };
            let version = metadata
                .entities
                .get(slot)
                .map(|meta| meta.version.clone())
                .unwrap_or_else(|| self.version.clone());
            snapshot.data.insert(key.clone(), ExportEntry { data: value, version });
        }

        snapshot
    }

    /// Restore a snapshot produced by [`VersionedStore::export_data`].
    ///
    /// A payload without an `appName` or a `data` map is rejected. A
    /// snapshot from a different application is imported anyway, with a
    /// warning; its keys keep their original namespace.
    pub fn import_data(&self, snapshot: &Value) -> bool {
        let Some(app_name) = snapshot
            .get("appName")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
        else {
            error!("Import rejected: missing appName");
            return false;
        };

        let Some(entries) = snapshot.get("data").and_then(Value::as_object) else {
            error!("Import rejected: missing data map");
            return false;
        };

        if app_name != self.app_name {
            warn!(
                "Importing data exported by '{}' into '{}'",
                app_name, self.app_name
            );
        }

        let mut medium = match self.medium.write() {
            Ok(medium) => medium,
            Err(e) => {
                error!("Storage medium lock poisoned: {}", e);
                return false;
            }
        };

        for (key, entry) in entries {
            let Some(value) = entry.get("data") else {
                warn!("Skipping import entry '{}' without a data field", key);
                continue;
            };
            let payload = match serde_json::to_string(value) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Skipping unserializable import entry '{}': {}", key, e);
                    continue;
                }
            };
            if let Err(e) = medium.set(key, &payload) {
                warn!("Failed to import '{}': {}", key, e);
                return false;
            }
        }

        debug!("Imported {} keys from '{}'", entries.len(), app_name);
        true
    }

    fn full_key(&self, entity: &str) -> String {
        format!("{}_{}", self.app_name, entity)
    }

    fn prefix(&self) -> String {
        format!("{}_", self.app_name)
    }

    fn metadata_key(&self) -> String {
        self.full_key(METADATA_SLOT)
    }

    fn read_metadata(&self, medium: &dyn StorageMedium) -> StoreMetadata {
        let Some(payload) = medium.get(&self.metadata_key()) else {
            return StoreMetadata::default();
        };
        match serde_json::from_str(&payload) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Discarding unreadable store metadata: {}", e);
                StoreMetadata::default()
            }
        }
    }

    fn write_metadata(
        &self,
        medium: &mut dyn StorageMedium,
        metadata: &StoreMetadata,
    ) -> Result<()> {
        let payload = serde_json::to_string(metadata)?;
        medium.set(&self.metadata_key(), &payload)
    }
}
