//! Bounded discrete logarithm recovery.
//!
//! Decryption in both DDH schemes ends with a group element `G^v` where `v`
//! is known to lie in a public range `[0, R)`. [`BabyStepGiantStep`]
//! recovers `v` with `O(√R)` multiplications and a table of `O(√R)`
//! entries. The table depends only on the group and on `R`, so it is built
//! once and reused for every target.

use std::collections::HashMap;

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use tracing::{debug, trace};

use crate::error::FeError;
use crate::params::GroupParams;

/// Largest baby-step table that will be built (`2^26` entries).
pub const MAX_BABY_STEPS: u64 = 1 << 26;

/// Precomputed baby-step table for one group and one search range.
#[derive(Clone, Debug)]
pub struct BabyStepGiantStep {
    p: BigUint,
    range: BigUint,
    /// Number of baby steps, `⌈√range⌉`; also the giant-step cap
    steps: u64,
    /// `G^j -> j` for `j` in `[0, steps)`
    table: HashMap<BigUint, u64>,
    /// `G^{-steps} mod P`
    giant: BigUint,
}

impl BabyStepGiantStep {
    /// Precomputes the baby steps for searching `[0, range)`.
    ///
    /// # Errors
    /// Returns `Parameter` if the range is empty, reaches the group order, or
    /// would need more than [`MAX_BABY_STEPS`] table entries
    pub fn new(params: &GroupParams, range: &BigUint) -> Result<Self, FeError> {
        if range.is_zero() {
            return Err(FeError::Parameter("search range must not be empty".to_string()));
        }
        if range > &params.q {
            return Err(FeError::Parameter(
                "search range must not exceed the group order".to_string(),
            ));
        }

        let mut steps = range.sqrt();
        if &steps * &steps < *range {
            steps += 1u32;
        }
        let steps = match steps.to_u64() {
            Some(s) if s <= MAX_BABY_STEPS => s,
            _ => {
                return Err(FeError::Parameter(format!(
                    "search range {} needs more than {} baby steps",
                    range, MAX_BABY_STEPS
                )))
            }
        };

        let mut table = HashMap::with_capacity(steps as usize);
        let mut cur = BigUint::one();
        for j in 0..steps {
            table.entry(cur.clone()).or_insert(j);
            cur = params.mul(&cur, &params.g);
        }

        // steps <= range <= q, so q - steps is a valid exponent
        let giant = params.pow_g(&(&params.q - steps));

        debug!(steps, "built baby-step table");
        Ok(BabyStepGiantStep {
            p: params.p.clone(),
            range: range.clone(),
            steps,
            table,
            giant,
        })
    }

    /// Exclusive upper bound of the searched exponents.
    pub fn range(&self) -> &BigUint {
        &self.range
    }

    /// Finds `v` in `[0, range)` with `G^v = target`.
    ///
    /// At most `⌈√range⌉` giant steps are taken. The first match is the
    /// smallest candidate exponent, so a match at or beyond `range` means no
    /// exponent inside the range exists.
    ///
    /// # Errors
    /// Returns `NotFound` if the discrete logarithm of `target` is not in `[0, range)`
    pub fn solve(&self, target: &BigUint) -> Result<BigUint, FeError> {
        let mut gamma = target % &self.p;
        for i in 0..self.steps {
            if let Some(&j) = self.table.get(&gamma) {
                let v = BigUint::from(i as u128 * self.steps as u128 + j as u128);
                if v < self.range {
                    trace!(giant_steps = i + 1, "discrete log found");
                    return Ok(v);
                }
                break;
            }
            gamma = (&gamma * &self.giant) % &self.p;
        }

        Err(FeError::NotFound {
            range: self.range.clone(),
        })
    }
}

/// One-shot bounded discrete logarithm of `target` to base `G` over `[0, range)`.
pub fn discrete_log(
    params: &GroupParams,
    target: &BigUint,
    range: &BigUint,
) -> Result<BigUint, FeError> {
    BabyStepGiantStep::new(params, range)?.solve(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemeConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params() -> GroupParams {
        let mut rng = StdRng::seed_from_u64(11);
        GroupParams::generate(&SchemeConfig::new(2), &mut rng).unwrap()
    }

    #[test]
    fn test_recovers_values_across_range() {
        let params = params();
        let range = BigUint::from(10_000u32);
        let solver = BabyStepGiantStep::new(&params, &range).unwrap();
        for v in [0u32, 1, 99, 100, 101, 5_000, 9_999] {
            let target = params.pow_g(&BigUint::from(v));
            assert_eq!(solver.solve(&target).unwrap(), BigUint::from(v));
        }
    }

    #[test]
    fn test_range_boundary() {
        let params = params();
        // mixes perfect squares with ranges whose last giant step overshoots R
        for r in [1u32, 2, 10, 1_000, 1_001, 65_537] {
            let range = BigUint::from(r);
            let solver = BabyStepGiantStep::new(&params, &range).unwrap();

            let last = params.pow_g(&BigUint::from(r - 1));
            assert_eq!(solver.solve(&last).unwrap(), BigUint::from(r - 1));

            let outside = params.pow_g(&range);
            assert_eq!(
                solver.solve(&outside),
                Err(FeError::NotFound {
                    range: range.clone()
                })
            );
        }
    }

    #[test]
    fn test_far_outside_range() {
        let params = params();
        let range = BigUint::from(1_000u32);
        let target = params.pow_g(&BigUint::from(123_456_789u64));
        assert!(matches!(
            discrete_log(&params, &target, &range),
            Err(FeError::NotFound { .. })
        ));
    }

    #[test]
    fn test_element_outside_subgroup() {
        let params = params();
        // P - 1 = -1 is a non-residue for a safe prime P with Q odd, so it is never a power of G
        let target = &params.p - 1u32;
        assert!(discrete_log(&params, &target, &BigUint::from(4_096u32)).is_err());
    }

    #[test]
    fn test_rejects_bad_ranges() {
        let params = params();
        assert!(matches!(
            BabyStepGiantStep::new(&params, &BigUint::zero()),
            Err(FeError::Parameter(_))
        ));
        let huge = BigUint::from(MAX_BABY_STEPS + 1).pow(2);
        assert!(matches!(
            BabyStepGiantStep::new(&params, &huge),
            Err(FeError::Parameter(_))
        ));
        let beyond_order = &params.q + 1u32;
        assert!(BabyStepGiantStep::new(&params, &beyond_order).is_err());
    }
}
