//! Pure arithmetic over seeds.
//!
//! A seed is an arbitrary-precision integer `>= 1`, conceptually a product
//! of prime powers. Everything here is side-effect free: callers own the
//! read-modify-write discipline, this module only computes.

use num_bigint::BigUint;
use num_traits::{One, Zero};

use super::delta::Fact;
use crate::error::EngineError;

/// `seed * delta`. Rejects a zero delta rather than silently producing a
/// zero seed, which would violate the `seed >= 1` invariant.
pub fn multiply(seed: &BigUint, delta: &BigUint) -> Result<BigUint, EngineError> {
    if delta.is_zero() {
        return Err(EngineError::InvalidRequest(
            "delta magnitude must be >= 1".into(),
        ));
    }
    Ok(seed * delta)
}

/// Exact `seed / delta`. Fails with `InexactDivision` unless `delta`
/// divides `seed` with no remainder.
pub fn divide(seed: &BigUint, delta: &BigUint) -> Result<BigUint, EngineError> {
    if delta.is_zero() {
        return Err(EngineError::InvalidRequest(
            "delta magnitude must be >= 1".into(),
        ));
    }
    if !(seed % delta).is_zero() {
        return Err(EngineError::InexactDivision {
            seed: seed.clone(),
            delta: delta.clone(),
        });
    }
    Ok(seed / delta)
}

/// Unique prime factorization by trial division: 2 first, then odd
/// candidates up to `sqrt(remaining)`. Whatever is left above 1 after the
/// loop is itself prime. `factorize(1)` is the empty sequence.
pub fn factorize(seed: &BigUint) -> Vec<Fact> {
    let mut facts = Vec::new();
    let mut remaining = seed.clone();
    if remaining.is_zero() || remaining.is_one() {
        return facts;
    }

    let two = BigUint::from(2u32);
    let mut candidate = two.clone();
    while &candidate * &candidate <= remaining {
        if (&remaining % &candidate).is_zero() {
            let mut multiplicity = 0u32;
            while (&remaining % &candidate).is_zero() {
                remaining /= &candidate;
                multiplicity += 1;
            }
            facts.push(Fact {
                prime: candidate.clone(),
                multiplicity,
            });
        }
        candidate = if candidate == two {
            BigUint::from(3u32)
        } else {
            candidate + 2u32
        };
    }
    if remaining > BigUint::one() {
        facts.push(Fact {
            prime: remaining,
            multiplicity: 1,
        });
    }
    facts
}

/// Multiplicity of `prime` in `seed` by repeated exact division.
/// 0 and 1 are not primes; both yield multiplicity 0 instead of an error.
pub fn count_prime(seed: &BigUint, prime: &BigUint) -> u32 {
    if prime.is_zero() || prime.is_one() {
        return 0;
    }
    let mut remaining = seed.clone();
    let mut count = 0u32;
    while !remaining.is_zero() && (&remaining % prime).is_zero() {
        remaining /= prime;
        count += 1;
    }
    count
}

pub fn has_prime(seed: &BigUint, prime: &BigUint) -> bool {
    count_prime(seed, prime) > 0
}

/// Product of the given primes, as a single compound delta. Several
/// simultaneous facts collapse into one magnitude so they land in the
/// ledger as a single row. Empty input composes to 1 (the no-op delta).
pub fn compose_delta(primes: &[BigUint]) -> BigUint {
    primes.iter().fold(BigUint::one(), |acc, p| acc * p)
}

/// Rest state: seed 1, no active facts.
pub fn is_at_rest(seed: &BigUint) -> bool {
    seed.is_one()
}
