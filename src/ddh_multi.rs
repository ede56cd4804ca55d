//! Multi-input DDH inner-product functional encryption.
//!
//! `N` encryptors each hold one slot: a single-input public key and a
//! one-time pad `otp_i` of `L` values in `[0, Q)`. Encryptor `i` encrypts
//! `x_i + otp_i mod Q` under its own key with its own randomness, so no
//! coordination between encryptors is needed and a ciphertext on its own
//! says nothing about `x_i`.
//!
//! For a weight matrix `Y` the authority issues one key per slot,
//! `k_i = <s_i, y_i> mod Q`, and a pad correction `z = Σ_i <otp_i, y_i> mod Q`.
//! Decryption computes
//!
//! ```text
//! Π_i ( Π_j c_{i,j}^{y_{i,j}} / c0_i^{k_i} ) / G^z = G^{Σ_i <x_i, y_i>}
//! ```
//!
//! and recovers the sum by a bounded discrete logarithm over `[0, N * L * B^2)`.
//! Each slot has its own `r_i`, which is why the key cannot collapse to a
//! single scalar.

use std::fmt;
use std::sync::{Arc, OnceLock};

use num_bigint::BigUint;
use num_traits::One;
use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use tracing::debug;

use crate::config::SchemeConfig;
use crate::ddh::{Ciphertext, Ddh, FunctionKey, MasterPublicKey, MasterSecretKey};
use crate::dlog::BabyStepGiantStep;
use crate::error::FeError;
use crate::params::GroupParams;
use crate::security::SecretVector;
use crate::utils::{check_bound, check_len, inner_product_mod, random_below};

/// Public keys of all encryptors, in slot order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiMasterPublicKey {
    pub keys: Vec<MasterPublicKey>,
}

impl MultiMasterPublicKey {
    /// The public key encryptor `slot` encrypts under.
    pub fn slot(&self, slot: usize) -> Option<&MasterPublicKey> {
        self.keys.get(slot)
    }
}

/// Secret keys and one-time pads of all encryptors, in slot order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiMasterSecretKey {
    pub keys: Vec<MasterSecretKey>,
    pub(crate) otps: Vec<SecretVector>,
}

impl MultiMasterSecretKey {
    /// The one-time pad handed to encryptor `slot`.
    pub fn client_otp(&self, slot: usize) -> Option<&[BigUint]> {
        self.otps.get(slot).map(SecretVector::expose_secret)
    }

    pub fn slots(&self) -> usize {
        self.keys.len()
    }
}

/// Function key for a full weight matrix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiFunctionKey {
    /// `<s_i, y_i> mod Q` for every slot
    pub keys: Vec<FunctionKey>,
    /// `Σ_i <otp_i, y_i> mod Q`
    pub otp_key: BigUint,
}

/// `N` weight vectors of length `L`, one per encryptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeightMatrix {
    rows: Vec<Vec<BigUint>>,
}

impl WeightMatrix {
    pub fn new(rows: Vec<Vec<BigUint>>) -> Self {
        WeightMatrix { rows }
    }

    /// Builds a matrix with `slots` copies of the same row.
    pub fn repeated(row: &[BigUint], slots: usize) -> Self {
        WeightMatrix {
            rows: vec![row.to_vec(); slots],
        }
    }

    pub fn rows(&self) -> &[Vec<BigUint>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

impl From<Vec<Vec<BigUint>>> for WeightMatrix {
    fn from(rows: Vec<Vec<BigUint>>) -> Self {
        WeightMatrix::new(rows)
    }
}

/// Encryption unit for one slot of a multi-input scheme.
#[derive(Clone, Debug)]
pub struct DdhMultiClient {
    slot: usize,
    ddh: Ddh,
}

impl DdhMultiClient {
    pub fn new(slot: usize, params: Arc<GroupParams>) -> Result<Self, FeError> {
        Ok(DdhMultiClient {
            slot,
            ddh: Ddh::from_params(params)?,
        })
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Encrypts this slot's input vector.
    ///
    /// # Arguments
    /// * `x` - Input vector of length `L` with every coordinate in `[0, B)`
    /// * `mpk` - This slot's public key
    /// * `otp` - This slot's one-time pad
    /// * `rng` - A cryptographically secure random number generator
    ///
    /// # Errors
    /// Returns `DimensionMismatch` if `x`, `mpk` or `otp` does not have length
    /// `L`, or `OutOfBound` if a coordinate is not below the bound
    pub fn encrypt<R: RngCore + CryptoRng + ?Sized>(
        &self,
        x: &[BigUint],
        mpk: &MasterPublicKey,
        otp: &[BigUint],
        rng: &mut R,
    ) -> Result<Ciphertext, FeError> {
        let params = self.ddh.params();
        check_len("input vector", params.vec_len, x.len())?;
        check_len("one-time pad", params.vec_len, otp.len())?;
        check_bound(x, &params.bound)?;

        let padded = SecretVector::new(
            x.iter()
                .zip(otp.iter())
                .map(|(x_j, otp_j)| (x_j + otp_j) % &params.q)
                .collect(),
        );
        self.ddh.encrypt_exponents(padded.expose_secret(), mpk, rng)
    }
}

/// A multi-input DDH scheme instance: `N` slot units over shared parameters.
#[derive(Clone)]
pub struct MultiDdh {
    params: Arc<GroupParams>,
    clients: Vec<DdhMultiClient>,
    table: OnceLock<BabyStepGiantStep>,
}

impl MultiDdh {
    /// Generates fresh group parameters for `config.slots` encryptors.
    ///
    /// # Errors
    /// Returns `Parameter` if the configuration is infeasible
    pub fn new<R: RngCore + CryptoRng + ?Sized>(
        config: &SchemeConfig,
        rng: &mut R,
    ) -> Result<Self, FeError> {
        let params = GroupParams::generate(config, rng)?;
        Self::from_params(Arc::new(params), config.slots)
    }

    /// Creates a scheme instance for `slots` encryptors over existing parameters.
    ///
    /// The baby-step table size is only checked by [`MultiDdh::dlog_table`]
    /// or the first decryption.
    ///
    /// # Errors
    /// Returns `Parameter` if `G` does not generate the order-`Q` subgroup of
    /// `Z*_P`, or `slots * L * B^2` does not fit below the group order
    pub fn from_params(params: Arc<GroupParams>, slots: usize) -> Result<Self, FeError> {
        params.check_group()?;
        params.check_range(slots)?;
        let clients = (0..slots)
            .map(|slot| DdhMultiClient::new(slot, Arc::clone(&params)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MultiDdh {
            params,
            clients,
            table: OnceLock::new(),
        })
    }

    pub fn params(&self) -> &GroupParams {
        &self.params
    }

    /// Number of encryptors `N`.
    pub fn slots(&self) -> usize {
        self.clients.len()
    }

    pub fn clients(&self) -> &[DdhMultiClient] {
        &self.clients
    }

    pub fn client(&self, slot: usize) -> Option<&DdhMultiClient> {
        self.clients.get(slot)
    }

    /// Generates an independent key pair and one-time pad for every slot.
    pub fn generate_master_keys<R: RngCore + CryptoRng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> (MultiMasterPublicKey, MultiMasterSecretKey) {
        let mut public = Vec::with_capacity(self.slots());
        let mut secret = Vec::with_capacity(self.slots());
        let mut otps = Vec::with_capacity(self.slots());

        for client in &self.clients {
            let (msk, mpk) = client.ddh.generate_master_keys(rng);
            let otp = (0..self.params.vec_len)
                .map(|_| random_below(rng, &self.params.q))
                .collect();
            public.push(mpk);
            secret.push(msk);
            otps.push(SecretVector::new(otp));
        }

        debug!(slots = self.slots(), "generated multi-input master keys");
        (
            MultiMasterPublicKey { keys: public },
            MultiMasterSecretKey {
                keys: secret,
                otps,
            },
        )
    }

    /// Derives the function key for weight matrix `y`.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` if `y` is not `N x L` or `msk` does not
    /// cover exactly `N` slots
    pub fn derive_key(
        &self,
        msk: &MultiMasterSecretKey,
        y: &WeightMatrix,
    ) -> Result<MultiFunctionKey, FeError> {
        self.check_weights(y)?;
        check_len("master secret keys", self.slots(), msk.keys.len())?;
        check_len("one-time pads", self.slots(), msk.otps.len())?;

        let keys = self
            .clients
            .iter()
            .zip(msk.keys.iter())
            .zip(y.rows())
            .map(|((client, msk_i), y_i)| client.ddh.derive_key(msk_i, y_i))
            .collect::<Result<Vec<_>, _>>()?;

        let q = &self.params.q;
        let mut otp_key = BigUint::default();
        for (otp_i, y_i) in msk.otps.iter().zip(y.rows()) {
            check_len("one-time pad", self.params.vec_len, otp_i.len())?;
            otp_key = (otp_key + inner_product_mod(otp_i.expose_secret(), y_i, q)) % q;
        }

        Ok(MultiFunctionKey { keys, otp_key })
    }

    /// Recovers `Σ_i <x_i, y_i>` from one ciphertext per slot.
    ///
    /// `ciphers[i]` must come from slot `i`; ciphertexts carry no slot tag.
    ///
    /// # Errors
    /// Returns `IncompleteInput` if fewer than `N` ciphertexts are given,
    /// `DimensionMismatch` for more than `N` ciphertexts or any shape
    /// disagreement, and `DecryptionFailed` if no value in
    /// `[0, N * L * B^2)` matches
    pub fn decrypt(
        &self,
        ciphers: &[Ciphertext],
        fk: &MultiFunctionKey,
        y: &WeightMatrix,
    ) -> Result<BigUint, FeError> {
        if ciphers.len() < self.slots() {
            return Err(FeError::IncompleteInput {
                expected: self.slots(),
                actual: ciphers.len(),
            });
        }
        check_len("ciphertexts", self.slots(), ciphers.len())?;
        check_len("function keys", self.slots(), fk.keys.len())?;
        self.check_weights(y)?;
        for c in ciphers {
            check_len("ciphertext", self.params.vec_len, c.ct.len())?;
        }

        let params = &*self.params;
        let combined = self
            .clients
            .par_iter()
            .zip(ciphers.par_iter())
            .zip(fk.keys.par_iter())
            .zip(y.rows().par_iter())
            .map(|(((client, c), k), y_i)| client.ddh.unblind(c, &k.key, y_i))
            .reduce(BigUint::one, |a, b| params.mul(&a, &b));
        let target = params.mul(&combined, &params.inv(&params.pow_g(&fk.otp_key)));

        self.dlog_table()?
            .solve(&target)
            .map_err(FeError::into_decryption_failure)
            .inspect_err(|_| debug!(slots = self.slots(), "no inner product sum in the recovery range"))
    }

    /// Builds the baby-step table for `[0, N * L * B^2)` if it does not exist yet.
    ///
    /// # Errors
    /// Returns `Parameter` if the range needs more than
    /// [`MAX_BABY_STEPS`](crate::dlog::MAX_BABY_STEPS) baby steps
    pub fn dlog_table(&self) -> Result<&BabyStepGiantStep, FeError> {
        if let Some(table) = self.table.get() {
            return Ok(table);
        }
        let range = self.params.recovery_range(self.slots());
        let built = BabyStepGiantStep::new(&self.params, &range)?;
        Ok(self.table.get_or_init(|| built))
    }

    fn check_weights(&self, y: &WeightMatrix) -> Result<(), FeError> {
        check_len("weight matrix rows", self.slots(), y.num_rows())?;
        for row in y.rows() {
            check_len("weight matrix row", self.params.vec_len, row.len())?;
        }
        Ok(())
    }
}

impl fmt::Debug for MultiDdh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiDdh")
            .field("params", &self.params)
            .field("slots", &self.clients.len())
            .field("dlog_table_ready", &self.table.get().is_some())
            .finish()
    }
}
