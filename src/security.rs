//! Security utilities for protecting secret key material
//!
//! This module provides:
//! - A zeroizing container for secret exponent vectors
//! - Constant-time comparison of big integers

use ark_serialize::{
    CanonicalDeserialize, CanonicalSerialize, Compress, Read, SerializationError, Valid, Validate,
    Write,
};
use num_bigint::BigUint;
use num_traits::Zero;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::encoding::{read_uints, uints_size, write_uints};

/// Vector of secret big integers that is wiped when dropped
///
/// Used for master secret exponents and one-time-pad keys.
///
/// # Security
/// - Automatically zeroizes its elements when dropped
/// - Equality is decided by a constant-time byte comparison
/// - `Debug` output never reveals the values
#[derive(Clone, Default)]
pub struct SecretVector {
    inner: Vec<BigUint>,
}

impl SecretVector {
    pub fn new(inner: Vec<BigUint>) -> Self {
        Self { inner }
    }

    /// Get a reference to the secret values
    ///
    /// # Security Warning
    /// The caller must ensure this reference is not used to leak the values
    pub fn expose_secret(&self) -> &[BigUint] {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Zeroize for SecretVector {
    fn zeroize(&mut self) {
        // BigUint keeps its limbs private: set_zero only releases them, the
        // freed limb memory is not wiped
        self.inner.iter_mut().for_each(|v| v.set_zero());
        self.inner.clear();
    }
}

impl ZeroizeOnDrop for SecretVector {}

impl Drop for SecretVector {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl CanonicalSerialize for SecretVector {
    fn serialize_with_mode<W: Write>(
        &self,
        mut writer: W,
        compress: Compress,
    ) -> Result<(), SerializationError> {
        write_uints(&self.inner, &mut writer, compress)
    }

    fn serialized_size(&self, _compress: Compress) -> usize {
        uints_size(&self.inner)
    }
}

impl CanonicalDeserialize for SecretVector {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        let inner = read_uints(&mut reader, compress, validate)?;
        Ok(SecretVector::new(inner))
    }
}

impl Valid for SecretVector {
    fn check(&self) -> Result<(), SerializationError> {
        Ok(())
    }
}

impl PartialEq for SecretVector {
    fn eq(&self, other: &Self) -> bool {
        self.inner.len() == other.inner.len()
            && self
                .inner
                .iter()
                .zip(other.inner.iter())
                .fold(true, |acc, (a, b)| constant_time_eq_uint(a, b) & acc)
    }
}

impl Eq for SecretVector {}

// Prevent debug output from leaking sensitive data
impl std::fmt::Debug for SecretVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretVector")
            .field("len", &self.inner.len())
            .field("data", &"[REDACTED]")
            .finish()
    }
}

/// Constant-time equality comparison for big integers
///
/// Both values are padded to the same width before comparison, so only
/// the larger of the two byte lengths is observable.
pub fn constant_time_eq_uint(a: &BigUint, b: &BigUint) -> bool {
    let mut a_bytes = a.to_bytes_le();
    let mut b_bytes = b.to_bytes_le();
    let width = a_bytes.len().max(b_bytes.len());
    a_bytes.resize(width, 0);
    b_bytes.resize(width, 0);

    let eq = subtle_constant_time_eq(&a_bytes, &b_bytes);
    a_bytes.zeroize();
    b_bytes.zeroize();
    eq
}

/// Constant-time byte slice comparison
///
/// Returns true if slices are equal, false otherwise.
fn subtle_constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SecretVector {
        SecretVector::new(vec![
            BigUint::from(1u64),
            BigUint::from(2u64),
            BigUint::from(u64::MAX),
        ])
    }

    #[test]
    fn test_secret_vector_zeroization() {
        let mut secret = sample();
        assert_eq!(secret.len(), 3);
        assert!(!secret.is_empty());

        secret.zeroize();
        assert_eq!(secret.len(), 0);
        assert!(secret.is_empty());
    }

    #[test]
    fn test_secret_vector_equality() {
        assert_eq!(sample(), sample());
        let other = SecretVector::new(vec![
            BigUint::from(1u64),
            BigUint::from(2u64),
            BigUint::from(u64::MAX - 1),
        ]);
        assert_ne!(sample(), other);
        assert_ne!(sample(), SecretVector::new(vec![BigUint::from(1u64)]));
    }

    #[test]
    fn test_constant_time_eq_uint() {
        let a = BigUint::from(0x1234_5678u64);
        let b = BigUint::from(0x1234_5678u64);
        let c = BigUint::from(0x1234_5679u64);
        assert!(constant_time_eq_uint(&a, &b));
        assert!(!constant_time_eq_uint(&a, &c));
        assert!(constant_time_eq_uint(&BigUint::zero(), &BigUint::zero()));
        assert!(!constant_time_eq_uint(&BigUint::zero(), &BigUint::from(256u32)));
    }

    #[test]
    fn test_subtle_constant_time_eq() {
        let a = vec![1u8, 2, 3, 4];
        let b = vec![1u8, 2, 3, 4];
        let c = vec![1u8, 2, 3, 5];

        assert!(super::subtle_constant_time_eq(&a, &b));
        assert!(!super::subtle_constant_time_eq(&a, &c));
    }

    #[test]
    fn test_secret_vector_debug() {
        let secret = SecretVector::new(vec![BigUint::from(987_654_321u64)]);
        let debug_str = format!("{:?}", secret);
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("987654321"));
    }
}
