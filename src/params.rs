use std::fmt;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::config::SchemeConfig;
use crate::error::FeError;
use crate::utils::{is_probable_prime, random_below, random_odd_with_bits, small_residue, SMALL_PRIMES};

/// The safe prime search gives up after `PRIME_TRIAL_FACTOR * bits^2` candidates.
pub const PRIME_TRIAL_FACTOR: u64 = 16;

/// Number of Miller-Rabin witnesses applied to each of `Q` and `P`.
pub const MILLER_RABIN_ROUNDS: usize = 32;

/// Public description of a prime-order subgroup of `Z*_P`.
///
/// `G` generates the subgroup of quadratic residues modulo the safe prime
/// `P = 2Q + 1`, which has prime order `Q`. Every inner product the scheme
/// can recover is below `Q`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupParams {
    /// Safe prime modulus
    pub p: BigUint,
    /// Prime order of the subgroup generated by `g`
    pub q: BigUint,
    /// Generator of the order-`q` subgroup
    pub g: BigUint,
    /// Vector length `L`
    pub vec_len: usize,
    /// Exclusive bound `B` on input coordinates
    pub bound: BigUint,
}

impl GroupParams {
    /// Generates fresh group parameters for the given configuration.
    ///
    /// # Arguments
    /// * `config` - Modulus length, vector length, bound and number of encryptors
    /// * `rng` - A cryptographically secure random number generator
    ///
    /// # Errors
    /// Returns `Parameter` if the configuration is infeasible or no safe prime
    /// is found within the trial budget
    pub fn generate<R: RngCore + CryptoRng + ?Sized>(
        config: &SchemeConfig,
        rng: &mut R,
    ) -> Result<Self, FeError> {
        config.validate()?;

        let (p, q) = generate_safe_prime(config.modulus_bits, rng)?;

        // Any h outside {0, 1, P-1} squares to an element of order exactly Q
        let p_minus_three = &p - 3u32;
        let mut g = BigUint::one();
        while g.is_one() {
            let h = random_below(rng, &p_minus_three) + 2u32;
            g = h.modpow(&BigUint::from(2u32), &p);
        }

        let params = GroupParams {
            p,
            q,
            g,
            vec_len: config.vec_len,
            bound: config.bound.clone(),
        };
        params.check_range(config.slots)?;

        debug!(
            modulus_bits = config.modulus_bits,
            vec_len = config.vec_len,
            slots = config.slots,
            "generated group parameters"
        );
        Ok(params)
    }

    /// Builds parameters from known values, validating every group invariant.
    ///
    /// Primality of `p` and `q` is not re-checked; callers are expected to
    /// supply values produced by [`GroupParams::generate`] or a trusted source.
    ///
    /// # Errors
    /// Returns `Parameter` if `q` does not divide `p - 1`, `g` does not have
    /// order `q`, or `L * B^2 >= q`
    pub fn from_parts(
        p: BigUint,
        q: BigUint,
        g: BigUint,
        vec_len: usize,
        bound: BigUint,
    ) -> Result<Self, FeError> {
        let params = GroupParams {
            p,
            q,
            g,
            vec_len,
            bound,
        };
        params.check_group()?;
        params.check_range(1)?;
        Ok(params)
    }

    /// Exclusive upper bound on inner products of `slots` concatenated vectors: `slots * L * B^2`.
    pub fn recovery_range(&self, slots: usize) -> BigUint {
        &self.bound * &self.bound * BigUint::from(self.vec_len) * BigUint::from(slots)
    }

    /// Ensures inner products over `slots` encryptors fit strictly below `q`.
    pub fn check_range(&self, slots: usize) -> Result<(), FeError> {
        if self.vec_len == 0 || slots == 0 || self.bound.is_zero() {
            return Err(FeError::Parameter(
                "vector length, encryptor count and bound must be positive".to_string(),
            ));
        }
        if self.recovery_range(slots) >= self.q {
            return Err(FeError::Parameter(format!(
                "{} * {} * bound^2 must be smaller than the group order",
                slots, self.vec_len
            )));
        }
        Ok(())
    }

    pub(crate) fn check_group(&self) -> Result<(), FeError> {
        if self.q < BigUint::from(2u32) || self.p <= self.q {
            return Err(FeError::Parameter("group order must be in [2, p)".to_string()));
        }
        if !(&self.p - 1u32).is_multiple_of(&self.q) {
            return Err(FeError::Parameter("q must divide p - 1".to_string()));
        }
        if self.g <= BigUint::one() || self.g >= self.p {
            return Err(FeError::Parameter("generator must lie in (1, p)".to_string()));
        }
        if !self.g.modpow(&self.q, &self.p).is_one() {
            return Err(FeError::Parameter("generator must have order q".to_string()));
        }
        Ok(())
    }

    /// `G^e mod P`.
    pub fn pow_g(&self, e: &BigUint) -> BigUint {
        self.g.modpow(e, &self.p)
    }

    /// `base^e mod P`.
    pub fn pow(&self, base: &BigUint, e: &BigUint) -> BigUint {
        base.modpow(e, &self.p)
    }

    /// `a * b mod P`.
    pub fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.p
    }

    /// Multiplicative inverse modulo the prime `P`, via Fermat's little theorem.
    pub fn inv(&self, a: &BigUint) -> BigUint {
        a.modpow(&(&self.p - 2u32), &self.p)
    }
}

impl fmt::Display for GroupParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DDH (s-IND-CPA):")?;
        writeln!(f, "\tL: {}", self.vec_len)?;
        writeln!(f, "\tG: {}", self.g)?;
        writeln!(f, "\tP: {}", self.p)?;
        writeln!(f, "\tQ: {}", self.q)?;
        write!(f, "\tBound: {}", self.bound)
    }
}

/// Searches for a safe prime `P = 2Q + 1` of exactly `bits` bits.
///
/// Returns `(P, Q)`.
fn generate_safe_prime<R: RngCore + CryptoRng + ?Sized>(
    bits: u64,
    rng: &mut R,
) -> Result<(BigUint, BigUint), FeError> {
    let max_trials = PRIME_TRIAL_FACTOR * bits * bits;

    for trial in 1..=max_trials {
        let q = random_odd_with_bits(rng, bits - 1);
        if !survives_sieve(&q) {
            continue;
        }
        if !is_probable_prime(&q, MILLER_RABIN_ROUNDS, rng) {
            continue;
        }
        let p: BigUint = (&q << 1u32) + 1u32;
        if !is_probable_prime(&p, MILLER_RABIN_ROUNDS, rng) {
            continue;
        }

        debug!(bits, trial, "found safe prime");
        return Ok((p, q));
    }

    Err(FeError::Parameter(format!(
        "no safe prime of {} bits found within {} candidates",
        bits, max_trials
    )))
}

/// Rejects `q` when `q` or `2q + 1` has a small prime factor.
///
/// Assumes `q` is larger than every sieving prime.
fn survives_sieve(q: &BigUint) -> bool {
    SMALL_PRIMES.iter().all(|&sp| {
        let r = small_residue(q, sp) as u64;
        r != 0 && (2 * r + 1) % sp as u64 != 0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generate_params() {
        let mut rng = StdRng::seed_from_u64(1);
        let config = SchemeConfig::new(3).with_bound(BigUint::from(16u32));
        let params = GroupParams::generate(&config, &mut rng).unwrap();

        assert_eq!(params.p.bits(), 64);
        assert_eq!(params.p, (&params.q << 1u32) + 1u32);
        assert!(is_probable_prime(&params.q, 20, &mut rng));
        assert!(is_probable_prime(&params.p, 20, &mut rng));
        assert!(!params.g.is_one());
        assert!(params.g.modpow(&params.q, &params.p).is_one());
        assert_eq!(params.vec_len, 3);
        assert!(params.recovery_range(1) < params.q);
        assert!(params.check_group().is_ok());
    }

    #[test]
    fn test_generate_larger_modulus() {
        let mut rng = StdRng::seed_from_u64(2);
        let config = SchemeConfig::new(5)
            .with_modulus_bits(128)
            .with_bound(BigUint::from(1u64 << 32));
        let params = GroupParams::generate(&config, &mut rng).unwrap();
        assert_eq!(params.p.bits(), 128);
        assert!(params.recovery_range(1) < params.q);
    }

    #[test]
    fn test_generate_rejects_infeasible_bound() {
        let mut rng = StdRng::seed_from_u64(3);
        let config = SchemeConfig::new(4).with_bound(BigUint::from(1u64 << 31));
        assert!(matches!(
            GroupParams::generate(&config, &mut rng),
            Err(FeError::Parameter(_))
        ));
    }

    #[test]
    fn test_from_parts_validation() {
        // P = 23 = 2 * 11 + 1, 4 = 2^2 generates the order-11 subgroup
        let p = BigUint::from(23u32);
        let q = BigUint::from(11u32);
        let bound = BigUint::from(2u32);

        let params = GroupParams::from_parts(p.clone(), q.clone(), BigUint::from(4u32), 2, bound.clone());
        assert!(params.is_ok());

        // 5 is a generator of the full group (order 22), not of the subgroup
        let wrong_order = GroupParams::from_parts(p.clone(), q.clone(), BigUint::from(5u32), 2, bound.clone());
        assert!(matches!(wrong_order, Err(FeError::Parameter(_))));

        // q = 7 does not divide 22
        let wrong_q = GroupParams::from_parts(p.clone(), BigUint::from(7u32), BigUint::from(4u32), 2, bound);
        assert!(wrong_q.is_err());

        // 3 * 2^2 = 12 >= 11
        let too_wide = GroupParams::from_parts(p, q, BigUint::from(4u32), 3, BigUint::from(2u32));
        assert!(too_wide.is_err());
    }

    #[test]
    fn test_inverse() {
        let mut rng = StdRng::seed_from_u64(4);
        let params = GroupParams::generate(&SchemeConfig::new(2), &mut rng).unwrap();
        let a = params.pow_g(&BigUint::from(12_345u32));
        assert!(params.mul(&a, &params.inv(&a)).is_one());
    }

    #[test]
    fn test_display_lists_every_parameter() {
        let params = GroupParams::from_parts(
            BigUint::from(23u32),
            BigUint::from(11u32),
            BigUint::from(4u32),
            2,
            BigUint::from(2u32),
        )
        .unwrap();
        let rendered = params.to_string();
        assert!(rendered.contains("L: 2"));
        assert!(rendered.contains("P: 23"));
        assert!(rendered.contains("Q: 11"));
        assert!(rendered.contains("G: 4"));
        assert!(rendered.contains("Bound: 2"));
    }
}
