//! Core data types: operations, provenance, facts, ledger rows, instances.
//!
//! Seeds and magnitudes cross every boundary as decimal strings, never as
//! fixed-width integers. The `biguint_dec` adapter enforces that on the
//! serde path.

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use num_traits::One;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::math;
use crate::error::EngineError;

/// Decimal-string serde adapter for arbitrary-precision values.
pub mod biguint_dec {
    use num_bigint::BigUint;
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let raw = String::deserialize(deserializer)?;
        BigUint::from_str(&raw)
            .map_err(|e| de::Error::custom(format!("invalid decimal integer '{}': {}", raw, e)))
    }
}

/// The two legal transitions on a seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Multiply,
    Divide,
}

impl OperationKind {
    /// Dispatch to the arithmetic core. Used both on the live apply path
    /// and when replaying a ledger.
    pub fn apply(&self, seed: &BigUint, delta: &BigUint) -> Result<BigUint, EngineError> {
        match self {
            OperationKind::Multiply => math::multiply(seed, delta),
            OperationKind::Divide => math::divide(seed, delta),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Multiply => "multiply",
            OperationKind::Divide => "divide",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiply" => Ok(OperationKind::Multiply),
            "divide" => Ok(OperationKind::Divide),
            other => Err(EngineError::InvalidRequest(format!(
                "unknown operation kind '{}' (expected multiply or divide)",
                other
            ))),
        }
    }
}

/// Who submitted a delta: role and device are opaque tags from the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub role: Option<String>,
    pub device: Option<String>,
}

impl Provenance {
    pub fn new(role: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            device: Some(device.into()),
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}",
            self.role.as_deref().unwrap_or("-"),
            self.device.as_deref().unwrap_or("-")
        )
    }
}

/// One unit of accumulated state, derived by factorizing a seed.
/// Never stored; always recomputed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    #[serde(with = "biguint_dec")]
    pub prime: BigUint,
    pub multiplicity: u32,
}

/// Immutable ledger row. Once appended it is never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaRecord {
    /// Monotonically increasing per instance; the replay key.
    pub sequence_id: u64,
    pub instance_id: String,
    #[serde(with = "biguint_dec")]
    pub magnitude: BigUint,
    pub kind: OperationKind,
    pub provenance: Provenance,
    pub applied_at: DateTime<Utc>,
    /// SHA-256 over this row's content chained to the previous row's
    /// checksum, so tampering anywhere breaks every later row.
    pub checksum: String,
}

impl DeltaRecord {
    /// Checksum of this row given the previous row's checksum (empty
    /// string for the first row of an instance).
    pub fn digest(&self, prev_checksum: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(prev_checksum.as_bytes());
        hasher.update(self.instance_id.as_bytes());
        hasher.update(self.sequence_id.to_be_bytes());
        hasher.update(self.magnitude.to_str_radix(10).as_bytes());
        hasher.update(self.kind.as_str().as_bytes());
        hasher.update(self.provenance.to_string().as_bytes());
        hasher.update(self.applied_at.to_rfc3339().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// One running copy of an application's state. Exactly one current seed
/// exists per instance; the coordinator is its only writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: String,
    pub application_id: String,
    #[serde(with = "biguint_dec")]
    pub current_seed: BigUint,
    pub updated_at: DateTime<Utc>,
}

impl Instance {
    /// Fresh instance at the rest state (seed 1).
    pub fn new(application_id: impl Into<String>) -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            application_id: application_id.into(),
            current_seed: BigUint::one(),
            updated_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Instance {} | app={} | seed={} | updated={}",
            self.instance_id,
            self.application_id,
            self.current_seed,
            self.updated_at.to_rfc3339()
        )
    }
}
