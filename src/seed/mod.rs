//! Seed state: the integer encoding and its pure arithmetic.
//!
//! A seed is a product of prime-power facts; seed 1 is the rest state.
//! `math` computes, `delta` names the things that flow through the engine.

pub mod math;

mod delta;

pub use delta::{biguint_dec, DeltaRecord, Fact, Instance, OperationKind, Provenance};
