//! Engine error taxonomy.
//!
//! Every fallible operation in the crate returns one of these variants.
//! `Conflict` is retried internally by the coordinator; everything else is
//! surfaced to the caller as-is.

use num_bigint::BigUint;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed input: zero magnitude, unparseable operation kind, etc.
    /// The caller must fix the request; retrying is pointless.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("instance not found: {0}")]
    NotFound(String),

    /// Division would not yield an integer. The stored seed is untouched.
    #[error("inexact division: {seed} is not divisible by {delta}")]
    InexactDivision { seed: BigUint, delta: BigUint },

    /// Another writer updated the instance between read and write.
    #[error("concurrent update conflict on instance {instance_id}")]
    Conflict { instance_id: String },

    #[error("gave up after {attempts} conflicting updates on instance {instance_id}")]
    TooManyConflicts { instance_id: String, attempts: u32 },

    #[error("invalid topology for application {0}")]
    InvalidTopology(String),

    /// The seed commit succeeded but the ledger append did not. The new
    /// seed is durable; the ledger is short one row until reconciled.
    #[error("ledger append failed after seed commit on instance {instance_id} (seed advanced to {seed})")]
    LedgerWriteFailed { instance_id: String, seed: BigUint },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
