//! Seed State Engine
//!
//! An application instance's entire mutable state is one positive integer,
//! a product of prime-power facts. Transitions are exact multiplications
//! and divisions of that seed, serialized per instance through optimistic
//! compare-and-set and logged to an append-only delta ledger that can
//! replay the instance from seed 1.

pub mod engine;
pub mod error;
pub mod seed;
pub mod storage;

pub use engine::{ApplicationRegistry, SeedEngine, StaticRegistry, TopologyDescriptor};
pub use error::EngineError;
pub use seed::{DeltaRecord, Fact, Instance, OperationKind, Provenance};
pub use storage::{DeltaLedger, InstanceStore, MemoryInstanceStore, MemoryLedger};
