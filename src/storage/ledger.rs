//! Delta ledger: append-only audit log of accepted transitions.
//!
//! The public contract is append and read. No update, no delete. Rows
//! carry chained SHA-256 checksums so any tampering is detectable, and the
//! ledger of an instance replayed in order from seed 1 must land exactly
//! on the instance's current seed.

use log::info;
use num_bigint::BigUint;
use num_traits::One;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::EngineError;
use crate::seed::{DeltaRecord, OperationKind, Provenance};

/// Append-only log of every accepted delta.
pub trait DeltaLedger: Send + Sync {
    fn append(
        &self,
        instance_id: &str,
        magnitude: &BigUint,
        kind: OperationKind,
        provenance: Provenance,
    ) -> Result<DeltaRecord, EngineError>;

    /// All rows for an instance, in `sequence_id` order.
    fn records_for(&self, instance_id: &str) -> Vec<DeltaRecord>;

    /// Walk the checksum chain for an instance; false on any mismatch.
    fn verify(&self, instance_id: &str) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerInner {
    records: Vec<DeltaRecord>,
    /// Next sequence id per instance; sequence ids start at 1.
    next_sequence: HashMap<String, u64>,
}

/// In-memory ledger with optional JSON persistence, same open/save idiom
/// as the instance store.
pub struct MemoryLedger {
    inner: Mutex<LedgerInner>,
    path: Option<PathBuf>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LedgerInner::default()),
            path: None,
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let inner = if path.exists() {
            std::fs::read_to_string(&path)
                .ok()
                .and_then(|data| serde_json::from_str(&data).ok())
                .unwrap_or_default()
        } else {
            LedgerInner::default()
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

    /// Fold an instance's rows from seed 1 through the arithmetic core.
    /// This is the audit invariant: the result must equal the stored seed.
    pub fn replay(&self, instance_id: &str) -> Result<BigUint, EngineError> {
        let records = self.records_for(instance_id);
        let mut seed = BigUint::one();
        for record in &records {
            seed = record.kind.apply(&seed, &record.magnitude)?;
        }
        Ok(seed)
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl DeltaLedger for MemoryLedger {
    fn append(
        &self,
        instance_id: &str,
        magnitude: &BigUint,
        kind: OperationKind,
        provenance: Provenance,
    ) -> Result<DeltaRecord, EngineError> {
        let mut inner = self.inner.lock().unwrap();
        let sequence_id = *inner
            .next_sequence
            .entry(instance_id.to_string())
            .and_modify(|s| *s += 1)
            .or_insert(1);

        let prev_checksum = inner
            .records
            .iter()
            .rev()
            .find(|r| r.instance_id == instance_id)
            .map(|r| r.checksum.clone())
            .unwrap_or_default();

        let mut record = DeltaRecord {
            sequence_id,
            instance_id: instance_id.to_string(),
            magnitude: magnitude.clone(),
            kind,
            provenance,
            applied_at: chrono::Utc::now(),
            checksum: String::new(),
        };
        record.checksum = record.digest(&prev_checksum);

        info!(
            "Ledger append: instance={} seq={} {} {} by {}",
            instance_id, sequence_id, kind, magnitude, record.provenance
        );
        inner.records.push(record.clone());
        Ok(record)
    }

    fn records_for(&self, instance_id: &str) -> Vec<DeltaRecord> {
        let mut records: Vec<DeltaRecord> = self
            .inner
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| r.instance_id == instance_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.sequence_id);
        records
    }

    fn verify(&self, instance_id: &str) -> bool {
        let mut prev = String::new();
        for record in self.records_for(instance_id) {
            if record.digest(&prev) != record.checksum {
                return false;
            }
            prev = record.checksum;
        }
        true
    }

    fn len(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }
}
