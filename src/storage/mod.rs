//! Instance store: the single mutable seed per instance.
//!
//! The write path is compare-and-set only. A plain read-then-write loses
//! updates under concurrent writers; callers that observe `Conflict` are
//! expected to re-read and retry.

pub mod ledger;

pub use ledger::{DeltaLedger, MemoryLedger};

use chrono::Utc;
use log::info;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::EngineError;
use crate::seed::Instance;

/// Durable mapping from instance id to its current seed.
pub trait InstanceStore: Send + Sync {
    fn get(&self, instance_id: &str) -> Result<Instance, EngineError>;

    /// Create a fresh instance for an application, starting at seed 1.
    fn create(&self, application_id: &str) -> Result<Instance, EngineError>;

    /// Conditional write: succeeds only if the stored seed still equals
    /// `expected`. Refreshes `updated_at` on success.
    fn compare_and_set(
        &self,
        instance_id: &str,
        expected: &BigUint,
        next: &BigUint,
    ) -> Result<Instance, EngineError>;

    /// Cascade delete of every instance owned by an application.
    /// Returns how many were removed.
    fn remove_application(&self, application_id: &str) -> usize;

    fn list(&self) -> Vec<Instance>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreMetadata {
    created_at: String,
    total_instances_ever: u64,
    total_updates: u64,
}

impl Default for StoreMetadata {
    fn default() -> Self {
        Self {
            created_at: Utc::now().to_rfc3339(),
            total_instances_ever: 0,
            total_updates: 0,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreInner {
    instances: HashMap<String, Instance>,
    metadata: StoreMetadata,
}

/// In-memory instance store with optional JSON persistence.
///
/// Open the file, work against memory, `save` when done. All methods take
/// `&self`; a single mutex guards the map so compare-and-set is atomic.
pub struct MemoryInstanceStore {
    inner: Mutex<StoreInner>,
    path: Option<PathBuf>,
}

impl MemoryInstanceStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            path: None,
        }
    }

    /// Load from a JSON file, or start empty if it does not exist or does
    /// not parse.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let inner = if path.exists() {
            std::fs::read_to_string(&path)
                .ok()
                .and_then(|data| serde_json::from_str(&data).ok())
                .unwrap_or_default()
        } else {
            StoreInner::default()
        };
        Self {
            inner: Mutex::new(inner),
            path: Some(path),
        }
    }

    pub fn save(&self) -> Result<(), EngineError> {
        if let Some(path) = &self.path {
            let json = {
                let inner = self.inner.lock().unwrap();
                serde_json::to_string_pretty(&*inner)?
            };
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().instances.len()
    }
}

impl Default for MemoryInstanceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceStore for MemoryInstanceStore {
    fn get(&self, instance_id: &str) -> Result<Instance, EngineError> {
        self.inner
            .lock()
            .unwrap()
            .instances
            .get(instance_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(instance_id.to_string()))
    }

    fn create(&self, application_id: &str) -> Result<Instance, EngineError> {
        let instance = Instance::new(application_id);
        let mut inner = self.inner.lock().unwrap();
        inner.metadata.total_instances_ever += 1;
        inner
            .instances
            .insert(instance.instance_id.clone(), instance.clone());
        info!("Created {}", instance.summary());
        Ok(instance)
    }

    fn compare_and_set(
        &self,
        instance_id: &str,
        expected: &BigUint,
        next: &BigUint,
    ) -> Result<Instance, EngineError> {
        let mut inner = self.inner.lock().unwrap();
        let instance = inner
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| EngineError::NotFound(instance_id.to_string()))?;
        if &instance.current_seed != expected {
            return Err(EngineError::Conflict {
                instance_id: instance_id.to_string(),
            });
        }
        instance.current_seed = next.clone();
        instance.updated_at = Utc::now();
        let updated = instance.clone();
        inner.metadata.total_updates += 1;
        Ok(updated)
    }

    fn remove_application(&self, application_id: &str) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.instances.len();
        inner
            .instances
            .retain(|_, i| i.application_id != application_id);
        let removed = before - inner.instances.len();
        if removed > 0 {
            info!(
                "Removed {} instance(s) for application {}",
                removed, application_id
            );
        }
        removed
    }

    fn list(&self) -> Vec<Instance> {
        self.inner.lock().unwrap().instances.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(n: u64) -> BigUint {
        BigUint::from(n)
    }

    #[test]
    fn test_create_and_get() {
        let store = MemoryInstanceStore::new();
        let instance = store.create("app-1").unwrap();
        let loaded = store.get(&instance.instance_id).unwrap();
        assert_eq!(loaded.current_seed, big(1));
        assert_eq!(loaded.application_id, "app-1");
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let store = MemoryInstanceStore::new();
        assert!(matches!(
            store.get("missing"),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_compare_and_set_success_and_conflict() {
        let store = MemoryInstanceStore::new();
        let instance = store.create("app-1").unwrap();

        let updated = store
            .compare_and_set(&instance.instance_id, &big(1), &big(6))
            .unwrap();
        assert_eq!(updated.current_seed, big(6));

        // Stale expectation: another writer moved the seed to 6 already.
        let err = store
            .compare_and_set(&instance.instance_id, &big(1), &big(12))
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict { .. }));

        // Seed unchanged by the failed write.
        assert_eq!(store.get(&instance.instance_id).unwrap().current_seed, big(6));
    }

    #[test]
    fn test_cascade_remove() {
        let store = MemoryInstanceStore::new();
        store.create("app-a").unwrap();
        store.create("app-a").unwrap();
        let kept = store.create("app-b").unwrap();

        assert_eq!(store.remove_application("app-a"), 2);
        assert_eq!(store.count(), 1);
        assert!(store.get(&kept.instance_id).is_ok());
    }

    #[test]
    fn test_open_save_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "seedstate-store-test-{}.json",
            uuid::Uuid::new_v4()
        ));
        let store = MemoryInstanceStore::open(&path);
        let instance = store.create("app-1").unwrap();
        store
            .compare_and_set(&instance.instance_id, &big(1), &big(30))
            .unwrap();
        store.save().unwrap();

        let reopened = MemoryInstanceStore::open(&path);
        assert_eq!(
            reopened.get(&instance.instance_id).unwrap().current_seed,
            big(30)
        );

        let _ = std::fs::remove_file(&path);
    }
}
