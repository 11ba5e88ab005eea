//! Mutation coordinator: the only legitimate writer of a seed.
//!
//! `apply` runs the whole transition as one unit per instance: read the
//! current seed, compute the candidate, compare-and-set it, append the
//! ledger row. Conflicting writers are retried with exponential backoff
//! up to a bound; unrelated instances never contend.

pub mod topology;

pub use topology::{ApplicationRegistry, StaticRegistry, TopologyDescriptor};

use log::{error, info, warn};
use num_bigint::BigUint;
use num_traits::Zero;
use rand::Rng;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::EngineError;
use crate::seed::{math, DeltaRecord, Fact, Instance, OperationKind, Provenance};
use crate::storage::{DeltaLedger, InstanceStore};

/// Retry bound for compare-and-set conflicts. After this many attempts
/// the caller gets `TooManyConflicts` and is expected to resubmit.
pub const MAX_APPLY_ATTEMPTS: u32 = 5;

const BACKOFF_BASE_MS: u64 = 1;

pub struct SeedEngine {
    store: Arc<dyn InstanceStore>,
    ledger: Arc<dyn DeltaLedger>,
    registry: Arc<dyn ApplicationRegistry>,
}

impl SeedEngine {
    pub fn new(
        store: Arc<dyn InstanceStore>,
        ledger: Arc<dyn DeltaLedger>,
        registry: Arc<dyn ApplicationRegistry>,
    ) -> Self {
        Self {
            store,
            ledger,
            registry,
        }
    }

    /// Create an instance for an application, gated on the application
    /// existing and its topology being well-formed. An invalid topology
    /// blocks creation; it is never silently ignored.
    pub fn activate(&self, application_id: &str) -> Result<Instance, EngineError> {
        if !self.registry.application_exists(application_id) {
            return Err(EngineError::NotFound(application_id.to_string()));
        }
        let descriptor = self
            .registry
            .topology(application_id)
            .ok_or_else(|| EngineError::InvalidTopology(application_id.to_string()))?;
        if !descriptor.validate() {
            return Err(EngineError::InvalidTopology(application_id.to_string()));
        }
        self.store.create(application_id)
    }

    /// Apply one delta to one instance and return the new seed.
    ///
    /// Once the compare-and-set commits the operation is durable; a ledger
    /// failure after that point surfaces as `LedgerWriteFailed` so the
    /// divergence is visible for reconciliation instead of masked.
    pub fn apply(
        &self,
        instance_id: &str,
        magnitude: &BigUint,
        kind: OperationKind,
        provenance: Provenance,
    ) -> Result<BigUint, EngineError> {
        if magnitude.is_zero() {
            return Err(EngineError::InvalidRequest(
                "delta magnitude must be >= 1".into(),
            ));
        }

        let mut attempts = 0u32;
        loop {
            let instance = self.store.get(instance_id)?;
            let candidate = kind.apply(&instance.current_seed, magnitude)?;

            match self
                .store
                .compare_and_set(instance_id, &instance.current_seed, &candidate)
            {
                Ok(updated) => {
                    if let Err(append_err) =
                        self.ledger
                            .append(instance_id, magnitude, kind, provenance)
                    {
                        error!(
                            "Seed committed but ledger append failed on {}: {}",
                            instance_id, append_err
                        );
                        return Err(EngineError::LedgerWriteFailed {
                            instance_id: instance_id.to_string(),
                            seed: updated.current_seed,
                        });
                    }
                    info!(
                        "Applied {} {} on {}: seed {} -> {}",
                        kind, magnitude, instance_id, instance.current_seed, updated.current_seed
                    );
                    return Ok(updated.current_seed);
                }
                Err(EngineError::Conflict { .. }) => {
                    attempts += 1;
                    if attempts >= MAX_APPLY_ATTEMPTS {
                        warn!(
                            "Giving up on {} after {} conflicting attempts",
                            instance_id, attempts
                        );
                        return Err(EngineError::TooManyConflicts {
                            instance_id: instance_id.to_string(),
                            attempts,
                        });
                    }
                    let jitter = rand::thread_rng().gen_range(0..=BACKOFF_BASE_MS);
                    thread::sleep(Duration::from_millis(
                        (BACKOFF_BASE_MS << attempts) + jitter,
                    ));
                }
                Err(other) => return Err(other),
            }
        }
    }

    pub fn current_seed(&self, instance_id: &str) -> Result<BigUint, EngineError> {
        Ok(self.store.get(instance_id)?.current_seed)
    }

    /// Active facts, recomputed from the seed on demand.
    pub fn facts(&self, instance_id: &str) -> Result<Vec<Fact>, EngineError> {
        Ok(math::factorize(&self.store.get(instance_id)?.current_seed))
    }

    pub fn is_at_rest(&self, instance_id: &str) -> Result<bool, EngineError> {
        Ok(math::is_at_rest(&self.store.get(instance_id)?.current_seed))
    }

    pub fn history(&self, instance_id: &str) -> Vec<DeltaRecord> {
        self.ledger.records_for(instance_id)
    }

    /// Checksum-chain walk over the instance's ledger rows.
    pub fn verify_ledger(&self, instance_id: &str) -> bool {
        self.ledger.verify(instance_id)
    }

    /// Replay the ledger from seed 1 and compare against the stored seed.
    /// A mismatch means the store and ledger have diverged (e.g. after a
    /// `LedgerWriteFailed`) and the instance needs reconciliation.
    pub fn replay_check(&self, instance_id: &str) -> Result<bool, EngineError> {
        let stored = self.store.get(instance_id)?.current_seed;
        let mut replayed = BigUint::from(1u32);
        for record in self.ledger.records_for(instance_id) {
            replayed = record.kind.apply(&replayed, &record.magnitude)?;
        }
        Ok(replayed == stored)
    }

    /// Cascade removal of every instance owned by an application.
    pub fn deactivate_application(&self, application_id: &str) -> usize {
        self.store.remove_application(application_id)
    }
}
