//! Single-input DDH inner-product functional encryption.
//!
//! The authority holds `L` secret exponents `s_i`; the public key is
//! `G^{s_i}`. A ciphertext of `x` is `(G^r, G^{x_i} * (G^{s_i})^r)`, and the
//! function key for `y` is `<s, y> mod Q`. Combining both yields
//! `G^{<x, y>}`, from which the inner product is recovered by a bounded
//! discrete logarithm over `[0, L * B^2)`.

use std::fmt;
use std::sync::{Arc, OnceLock};

use num_bigint::BigUint;
use num_traits::One;
use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use tracing::debug;

use crate::config::SchemeConfig;
use crate::dlog::BabyStepGiantStep;
use crate::error::FeError;
use crate::params::GroupParams;
use crate::security::SecretVector;
use crate::utils::{check_bound, check_len, inner_product_mod, random_below};

/// Master secret key: `L` exponents drawn uniformly from `[0, Q)`.
///
/// Never leaves the key-issuing authority. The exponents are wiped on drop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MasterSecretKey {
    pub(crate) s: SecretVector,
}

impl MasterSecretKey {
    pub fn new(s: Vec<BigUint>) -> Self {
        MasterSecretKey {
            s: SecretVector::new(s),
        }
    }

    /// Get the secret exponents
    ///
    /// # Security Warning
    /// The caller must ensure the returned values are not leaked
    pub fn expose_secret(&self) -> &[BigUint] {
        self.s.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.s.len()
    }

    pub fn is_empty(&self) -> bool {
        self.s.is_empty()
    }

    /// Decimal exponents joined by `-`, the same layout as the public key's `Display`.
    ///
    /// # Security Warning
    /// The returned string contains the secret in the clear
    pub fn export(&self) -> String {
        join_decimal(self.s.expose_secret(), "-")
    }
}

/// Master public key: `G^{s_i} mod P` for every secret exponent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MasterPublicKey {
    pub elements: Vec<BigUint>,
}

/// A ciphertext of one input vector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ciphertext {
    /// Blinding element `G^r`
    pub c0: BigUint,
    /// One element per input coordinate: `G^{x_i} * mpk_i^r`
    pub ct: Vec<BigUint>,
}

/// Function key authorizing recovery of `<x, y>` for one weight vector `y`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionKey {
    /// `<s, y> mod Q`
    pub key: BigUint,
}

/// A single-input DDH scheme instance over one set of group parameters.
///
/// The baby-step table used by decryption is built on first use and then
/// shared read-only by every later decryption, including concurrent ones.
#[derive(Clone)]
pub struct Ddh {
    params: Arc<GroupParams>,
    table: OnceLock<BabyStepGiantStep>,
}

impl Ddh {
    /// Generates fresh group parameters and wraps them in a scheme instance.
    ///
    /// The baby-step table is not built here. Callers that will decrypt can
    /// call [`Ddh::dlog_table`] right after setup to have a range beyond
    /// [`MAX_BABY_STEPS`](crate::dlog::MAX_BABY_STEPS) reported immediately.
    ///
    /// # Errors
    /// Returns `Parameter` if the configuration is infeasible
    pub fn new<R: RngCore + CryptoRng + ?Sized>(
        config: &SchemeConfig,
        rng: &mut R,
    ) -> Result<Self, FeError> {
        let params = GroupParams::generate(config, rng)?;
        Self::from_params(Arc::new(params))
    }

    /// Creates a scheme instance over existing parameters.
    ///
    /// As with [`Ddh::new`], the baby-step table size is only checked by
    /// [`Ddh::dlog_table`] or the first decryption.
    ///
    /// # Errors
    /// Returns `Parameter` if `G` does not generate the order-`Q` subgroup of
    /// `Z*_P`, or `L * B^2` does not fit below the group order
    pub fn from_params(params: Arc<GroupParams>) -> Result<Self, FeError> {
        params.check_group()?;
        params.check_range(1)?;
        Ok(Ddh {
            params,
            table: OnceLock::new(),
        })
    }

    pub fn params(&self) -> &GroupParams {
        &self.params
    }

    /// Shared handle to the parameters, for building other instances over the same group.
    pub fn params_handle(&self) -> Arc<GroupParams> {
        Arc::clone(&self.params)
    }

    /// Generates a master key pair.
    ///
    /// # Arguments
    /// * `rng` - A cryptographically secure random number generator
    pub fn generate_master_keys<R: RngCore + CryptoRng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> (MasterSecretKey, MasterPublicKey) {
        let params = &*self.params;
        let s: Vec<BigUint> = (0..params.vec_len)
            .map(|_| random_below(rng, &params.q))
            .collect();
        let elements = s.par_iter().map(|s_i| params.pow_g(s_i)).collect();

        debug!(vec_len = params.vec_len, "generated master keys");
        (MasterSecretKey::new(s), MasterPublicKey { elements })
    }

    /// Encrypts `x` under the master public key with fresh randomness.
    ///
    /// # Arguments
    /// * `x` - Input vector of length `L` with every coordinate in `[0, B)`
    /// * `mpk` - The master public key
    /// * `rng` - A cryptographically secure random number generator
    ///
    /// # Errors
    /// Returns `DimensionMismatch` if `x` or `mpk` does not have length `L`,
    /// or `OutOfBound` if a coordinate is not below the bound
    pub fn encrypt<R: RngCore + CryptoRng + ?Sized>(
        &self,
        x: &[BigUint],
        mpk: &MasterPublicKey,
        rng: &mut R,
    ) -> Result<Ciphertext, FeError> {
        check_len("input vector", self.params.vec_len, x.len())?;
        check_bound(x, &self.params.bound)?;
        self.encrypt_exponents(x, mpk, rng)
    }

    /// Encrypts arbitrary exponents in `[0, Q)` without the bound check.
    pub(crate) fn encrypt_exponents<R: RngCore + CryptoRng + ?Sized>(
        &self,
        exponents: &[BigUint],
        mpk: &MasterPublicKey,
        rng: &mut R,
    ) -> Result<Ciphertext, FeError> {
        let params = &*self.params;
        check_len("input vector", params.vec_len, exponents.len())?;
        check_len("master public key", params.vec_len, mpk.elements.len())?;

        let r = random_below(rng, &params.q);
        let c0 = params.pow_g(&r);
        let ct = exponents
            .par_iter()
            .zip(mpk.elements.par_iter())
            .map(|(e_i, pk_i)| params.mul(&params.pow_g(e_i), &params.pow(pk_i, &r)))
            .collect();

        Ok(Ciphertext { c0, ct })
    }

    /// Derives the function key for weight vector `y`.
    ///
    /// `y` is not checked against the bound; weights outside `[0, B)` may
    /// push the inner product beyond the range that decryption can recover.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` if `msk` or `y` does not have length `L`
    pub fn derive_key(&self, msk: &MasterSecretKey, y: &[BigUint]) -> Result<FunctionKey, FeError> {
        check_len("weight vector", self.params.vec_len, y.len())?;
        check_len("master secret key", self.params.vec_len, msk.len())?;

        Ok(FunctionKey {
            key: inner_product_mod(msk.expose_secret(), y, &self.params.q),
        })
    }

    /// Recovers `<x, y>` from a ciphertext of `x` and the function key for `y`.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` if `c` or `y` does not have length `L`, or
    /// `DecryptionFailed` if no value in `[0, L * B^2)` matches (wrong key,
    /// wrong `y`, tampered ciphertext or an inner product beyond the range)
    pub fn decrypt(&self, c: &Ciphertext, fk: &FunctionKey, y: &[BigUint]) -> Result<BigUint, FeError> {
        check_len("weight vector", self.params.vec_len, y.len())?;
        check_len("ciphertext", self.params.vec_len, c.ct.len())?;

        let target = self.unblind(c, &fk.key, y);
        self.dlog_table()?
            .solve(&target)
            .map_err(FeError::into_decryption_failure)
            .inspect_err(|_| debug!("no inner product in the recovery range"))
    }

    /// `Π c_i^{y_i} / c0^{key}`, which equals `G^{<x, y>}` for a matching key.
    pub(crate) fn unblind(&self, c: &Ciphertext, key: &BigUint, y: &[BigUint]) -> BigUint {
        let params = &*self.params;
        let num = c
            .ct
            .par_iter()
            .zip(y.par_iter())
            .map(|(c_i, y_i)| params.pow(c_i, y_i))
            .reduce(BigUint::one, |a, b| params.mul(&a, &b));
        let denom = params.pow(&c.c0, key);

        params.mul(&num, &params.inv(&denom))
    }

    /// Builds the baby-step table for `[0, L * B^2)` if it does not exist yet.
    ///
    /// Decryption calls this implicitly; calling it up front moves the
    /// table construction cost out of the first decryption.
    ///
    /// # Errors
    /// Returns `Parameter` if the range needs more than
    /// [`MAX_BABY_STEPS`](crate::dlog::MAX_BABY_STEPS) baby steps
    pub fn dlog_table(&self) -> Result<&BabyStepGiantStep, FeError> {
        if let Some(table) = self.table.get() {
            return Ok(table);
        }
        let built = BabyStepGiantStep::new(&self.params, &self.params.recovery_range(1))?;
        Ok(self.table.get_or_init(|| built))
    }
}

impl fmt::Debug for Ddh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ddh")
            .field("params", &self.params)
            .field("dlog_table_ready", &self.table.get().is_some())
            .finish()
    }
}

fn join_decimal(values: &[BigUint], sep: &str) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Decimal elements joined by `-`.
impl fmt::Display for MasterPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_decimal(&self.elements, "-"))
    }
}

/// `[c0 c_1 ... c_L]` in decimal.
impl fmt::Display for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}]", self.c0, join_decimal(&self.ct, " "))
    }
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}
