//! Configuration for DDH scheme instances.
//!
//! A [`SchemeConfig`] captures everything needed to generate a fresh
//! [`GroupParams`](crate::params::GroupParams): the modulus length, the
//! vector length `L`, the public coordinate bound `B` and, for the
//! multi-input scheme, the number of encryptors `N`.
//!
//! # Example
//!
//! ```rust
//! use ddh_ipfe::config::SchemeConfig;
//!
//! // 3-dimensional vectors with coordinates below 16 over a 64-bit group
//! let config = SchemeConfig::new(3).with_bound(16u32.into());
//! config.validate().expect("valid config");
//! ```

use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::FeError;

/// Default modulus length in bits.
pub const DEFAULT_MODULUS_BITS: u64 = 64;

/// Default coordinate bound (`2^16`).
pub const DEFAULT_BOUND: u64 = 1 << 16;

/// Smallest modulus accepted by the parameter generator.
pub const MIN_MODULUS_BITS: u64 = 16;

/// Parameters controlling group generation for one scheme instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemeConfig {
    /// Bit length of the safe prime modulus `P`
    pub modulus_bits: u64,
    /// Vector length `L`
    pub vec_len: usize,
    /// Exclusive upper bound `B` on every input coordinate
    pub bound: BigUint,
    /// Number of independent encryptors `N` (1 for the single-input scheme)
    pub slots: usize,
}

impl SchemeConfig {
    /// Creates a single-input configuration with the default modulus length and bound.
    pub fn new(vec_len: usize) -> Self {
        SchemeConfig {
            modulus_bits: DEFAULT_MODULUS_BITS,
            vec_len,
            bound: BigUint::from(DEFAULT_BOUND),
            slots: 1,
        }
    }

    pub fn with_modulus_bits(mut self, modulus_bits: u64) -> Self {
        self.modulus_bits = modulus_bits;
        self
    }

    pub fn with_bound(mut self, bound: BigUint) -> Self {
        self.bound = bound;
        self
    }

    pub fn with_slots(mut self, slots: usize) -> Self {
        self.slots = slots;
        self
    }

    /// Exclusive upper bound on any recoverable inner product: `N * L * B^2`.
    pub fn recovery_range(&self) -> BigUint {
        &self.bound * &self.bound * BigUint::from(self.vec_len) * BigUint::from(self.slots)
    }

    /// Checks the configuration for values no group can satisfy.
    ///
    /// # Errors
    /// Returns `Parameter` if a dimension or the bound is zero, the modulus is
    /// shorter than [`MIN_MODULUS_BITS`], or the recovery range cannot fit below
    /// a subgroup order of `modulus_bits - 1` bits
    pub fn validate(&self) -> Result<(), FeError> {
        if self.vec_len == 0 {
            return Err(FeError::Parameter(
                "vector length must be at least 1".to_string(),
            ));
        }
        if self.slots == 0 {
            return Err(FeError::Parameter(
                "number of encryptors must be at least 1".to_string(),
            ));
        }
        if self.bound.is_zero() {
            return Err(FeError::Parameter("bound must be at least 1".to_string()));
        }
        if self.modulus_bits < MIN_MODULUS_BITS {
            return Err(FeError::Parameter(format!(
                "modulus length must be at least {} bits, got {}",
                MIN_MODULUS_BITS, self.modulus_bits
            )));
        }

        // Q = (P - 1) / 2 has modulus_bits - 1 bits, so Q >= 2^(modulus_bits - 2)
        let range_bits = self.recovery_range().bits();
        if range_bits > self.modulus_bits - 2 {
            return Err(FeError::Parameter(format!(
                "N * L * bound^2 needs {} bits but a {}-bit modulus only guarantees {}",
                range_bits,
                self.modulus_bits,
                self.modulus_bits - 2
            )));
        }

        Ok(())
    }
}

impl Default for SchemeConfig {
    fn default() -> Self {
        SchemeConfig::new(2)
    }
}
