use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};
use rand::rngs::StdRng;
use rand::{CryptoRng, RngCore, SeedableRng};
use zeroize::Zeroize;

use crate::error::FeError;

/// Odd primes below 512, used to discard candidates before Miller-Rabin.
pub(crate) const SMALL_PRIMES: [u32; 96] = [
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59,
    61, 67, 71, 73, 79, 83, 89, 97, 101, 103, 107, 109, 113, 127, 131, 137,
    139, 149, 151, 157, 163, 167, 173, 179, 181, 191, 193, 197, 199, 211, 223, 227,
    229, 233, 239, 241, 251, 257, 263, 269, 271, 277, 281, 283, 293, 307, 311, 313,
    317, 331, 337, 347, 349, 353, 359, 367, 373, 379, 383, 389, 397, 401, 409, 419,
    421, 431, 433, 439, 443, 449, 457, 461, 463, 467, 479, 487, 491, 499, 503, 509,
];

/// Creates a generator seeded from the operating system's entropy source.
///
/// # Errors
/// Returns `EntropyFailure` if the OS random source is unavailable
pub fn os_rng() -> Result<StdRng, FeError> {
    StdRng::try_from_os_rng().map_err(|e| FeError::EntropyFailure(e.to_string()))
}

/// Samples an integer uniformly from `[0, bound)` by rejection sampling.
///
/// # Panics
/// Panics in debug mode if `bound` is zero
pub fn random_below<R: RngCore + CryptoRng + ?Sized>(rng: &mut R, bound: &BigUint) -> BigUint {
    debug_assert!(!bound.is_zero());

    let bits = bound.bits();
    let len = ((bits + 7) / 8) as usize;
    let excess = (len as u64 * 8 - bits) as u32;
    let mut buf = vec![0u8; len];
    loop {
        rng.fill_bytes(&mut buf);
        buf[0] &= 0xffu8 >> excess;
        let candidate = BigUint::from_bytes_be(&buf);
        if &candidate < bound {
            buf.zeroize();
            return candidate;
        }
    }
}

/// Samples an integer with exactly `bits` bits (top bit set) and the low bit set.
pub(crate) fn random_odd_with_bits<R: RngCore + CryptoRng + ?Sized>(
    rng: &mut R,
    bits: u64,
) -> BigUint {
    debug_assert!(bits >= 2);

    let top = BigUint::one() << (bits - 1);
    let mut candidate = random_below(rng, &top) | &top;
    candidate |= BigUint::one();
    candidate
}

/// Returns `n mod p` for a small modulus.
pub(crate) fn small_residue(n: &BigUint, p: u32) -> u32 {
    (n % p).to_u32().unwrap_or_default()
}

/// Miller-Rabin probabilistic primality test with `rounds` random witnesses.
///
/// Small primes are answered exactly; everything else is trial-divided by
/// [`SMALL_PRIMES`] first.
pub fn is_probable_prime<R: RngCore + CryptoRng + ?Sized>(
    n: &BigUint,
    rounds: usize,
    rng: &mut R,
) -> bool {
    let two = BigUint::from(2u32);
    if n < &two {
        return false;
    }
    if n == &two {
        return true;
    }
    if n.is_even() {
        return false;
    }
    for &p in SMALL_PRIMES.iter() {
        if *n == BigUint::from(p) {
            return true;
        }
        if small_residue(n, p) == 0 {
            return false;
        }
    }

    // n - 1 = d * 2^s with d odd
    let n_minus_one = n - 1u32;
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;
    let witness_range = n - 3u32;

    'witness: for _ in 0..rounds {
        let a = random_below(rng, &witness_range) + 2u32;
        let mut x = a.modpow(&d, n);
        if x.is_one() || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }

    true
}

/// Computes `<a, b> mod q`.
pub fn inner_product_mod(a: &[BigUint], b: &[BigUint], q: &BigUint) -> BigUint {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .fold(BigUint::zero(), |acc, (a_i, b_i)| (acc + a_i * b_i) % q)
}

/// Computes `<a, b>` over the integers.
pub fn inner_product(a: &[BigUint], b: &[BigUint]) -> BigUint {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .fold(BigUint::zero(), |acc, (a_i, b_i)| acc + a_i * b_i)
}

/// Ensures a vector (or matrix dimension) has the expected length.
pub(crate) fn check_len(
    context: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), FeError> {
    if expected != actual {
        return Err(FeError::DimensionMismatch {
            context,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Ensures every coordinate of `x` lies in `[0, bound)`.
pub fn check_bound(x: &[BigUint], bound: &BigUint) -> Result<(), FeError> {
    match x.iter().position(|x_i| x_i >= bound) {
        Some(index) => Err(FeError::OutOfBound {
            index,
            value: x[index].clone(),
            bound: bound.clone(),
        }),
        None => Ok(()),
    }
}

/// Converts machine integers into a big-integer vector.
pub fn to_biguint_vec(values: &[u64]) -> Vec<BigUint> {
    values.iter().map(|&v| BigUint::from(v)).collect()
}

/// Parses a comma-separated list of non-negative decimal integers, e.g. `"5,128,1"`.
///
/// # Errors
/// Returns `MalformedInput` for empty input or any token that is not a decimal integer
pub fn parse_vector(s: &str) -> Result<Vec<BigUint>, FeError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(FeError::MalformedInput("empty vector".to_string()));
    }
    s.split(',')
        .map(|token| {
            let token = token.trim();
            if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
                return Err(FeError::MalformedInput(format!(
                    "'{}' is not a non-negative integer",
                    token
                )));
            }
            token
                .parse::<BigUint>()
                .map_err(|e| FeError::MalformedInput(format!("'{}': {}", token, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_random_below_stays_in_range() {
        let mut rng = test_rng();
        for bound in [1u64, 2, 3, 255, 256, 257, 1 << 40] {
            let bound = BigUint::from(bound);
            for _ in 0..64 {
                assert!(random_below(&mut rng, &bound) < bound);
            }
        }
    }

    #[test]
    fn test_random_odd_with_bits() {
        let mut rng = test_rng();
        for bits in [2u64, 8, 63, 64, 65, 200] {
            let n = random_odd_with_bits(&mut rng, bits);
            assert_eq!(n.bits(), bits);
            assert!(n.is_odd());
        }
    }

    #[test]
    fn test_is_probable_prime() {
        let mut rng = test_rng();
        let primes = [2u64, 3, 5, 509, 521, 65_537, 1_000_000_007, 18_446_744_073_709_551_557];
        let composites = [0u64, 1, 4, 9, 561, 1_105, 65_535, 1_000_000_007 * 3, 3_215_031_751];
        for p in primes {
            assert!(is_probable_prime(&BigUint::from(p), 20, &mut rng), "{} is prime", p);
        }
        for c in composites {
            assert!(!is_probable_prime(&BigUint::from(c), 20, &mut rng), "{} is composite", c);
        }

        // 2^127 - 1 is a Mersenne prime
        let m127 = (BigUint::one() << 127u32) - 1u32;
        assert!(is_probable_prime(&m127, 20, &mut rng));
        assert!(!is_probable_prime(&(&m127 * 3u32), 20, &mut rng));
    }

    #[test]
    fn test_inner_products() {
        let x = to_biguint_vec(&[5, 2, 9]);
        let y = to_biguint_vec(&[1, 0, 4]);
        assert_eq!(inner_product(&x, &y), BigUint::from(41u32));
        assert_eq!(inner_product_mod(&x, &y, &BigUint::from(7u32)), BigUint::from(6u32));
    }

    #[test]
    fn test_check_bound() {
        let bound = BigUint::from(16u32);
        assert!(check_bound(&to_biguint_vec(&[0, 15, 3]), &bound).is_ok());

        let err = check_bound(&to_biguint_vec(&[0, 16, 3]), &bound).unwrap_err();
        assert_eq!(
            err,
            FeError::OutOfBound {
                index: 1,
                value: BigUint::from(16u32),
                bound,
            }
        );
    }

    #[test]
    fn test_parse_vector() {
        assert_eq!(parse_vector("5,128,1,48,3").unwrap(), to_biguint_vec(&[5, 128, 1, 48, 3]));
        assert_eq!(parse_vector(" 1, 2 ,3 ").unwrap(), to_biguint_vec(&[1, 2, 3]));
        assert_eq!(
            parse_vector("340282366920938463463374607431768211456").unwrap(),
            vec![BigUint::one() << 128u32]
        );

        for bad in ["", "1,,2", "1,a", "-3,4", "1.5"] {
            assert!(
                matches!(parse_vector(bad), Err(FeError::MalformedInput(_))),
                "'{}' should be rejected",
                bad
            );
        }
    }
}
