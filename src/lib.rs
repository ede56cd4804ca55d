//! DDH Inner-Product Functional Encryption
//!
//! This library implements inner-product functional encryption from the
//! Decisional Diffie-Hellman assumption, following the schemes of
//! [ePrint:2015/017](https://eprint.iacr.org/2015/017) (single-input) and
//! [ePrint:2017/972](https://eprint.iacr.org/2017/972) (multi-input).
//!
//! ## Overview
//!
//! An authority holding a master secret key issues function keys for weight
//! vectors `y`. Anyone can encrypt a bounded vector `x`, and a holder of the
//! key for `y` learns `<x, y>` and nothing else about `x`. In the
//! multi-input variant `N` independent encryptors each contribute one
//! vector, and a key for the weight matrix `Y` reveals only
//! `Σ_i <x_i, y_i>`.
//!
//! ## Key Components
//!
//! - **Parameters**: safe-prime groups `P = 2Q + 1` with a generator of the order-`Q` subgroup
//! - **Single-input scheme**: [`Ddh`] key generation, encryption, key derivation and decryption
//! - **Multi-input scheme**: [`MultiDdh`] with one [`DdhMultiClient`] per encryptor
//! - **Discrete logarithm**: baby-step/giant-step recovery over the bounded result range
//! - **Encoding**: canonical `ark-serialize` encodings of every value
//!
//! ## Example
//!
//! ```rust,no_run
//! use ddh_ipfe::{config::SchemeConfig, utils, Ddh};
//!
//! let mut rng = utils::os_rng().unwrap();
//! let ddh = Ddh::new(&SchemeConfig::new(3), &mut rng).unwrap();
//! let (msk, mpk) = ddh.generate_master_keys(&mut rng);
//!
//! let x = utils::to_biguint_vec(&[5, 2, 9]);
//! let y = utils::to_biguint_vec(&[1, 0, 4]);
//!
//! let ct = ddh.encrypt(&x, &mpk, &mut rng).unwrap();
//! let fk = ddh.derive_key(&msk, &y).unwrap();
//! assert_eq!(ddh.decrypt(&ct, &fk, &y).unwrap().to_string(), "41");
//! ```

pub mod config;
pub mod ddh;
pub mod ddh_multi;
pub mod dlog;
pub mod encoding;
pub mod error;
pub mod params;
pub mod security;
pub mod utils;

pub use config::SchemeConfig;
pub use ddh::{Ciphertext, Ddh, FunctionKey, MasterPublicKey, MasterSecretKey};
pub use ddh_multi::{
    DdhMultiClient, MultiDdh, MultiFunctionKey, MultiMasterPublicKey, MultiMasterSecretKey,
    WeightMatrix,
};
pub use error::FeError;
pub use params::GroupParams;
