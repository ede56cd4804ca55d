/// Error types for the DDH inner-product functional encryption library
use num_bigint::BigUint;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeError {
    /// Group or bound setup is infeasible (e.g., no safe prime found, bound too large)
    #[error("Invalid parameter: {0}")]
    Parameter(String),
    /// A vector or matrix does not have the expected shape
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },
    /// An input coordinate is not below the public bound
    #[error("Coordinate {index} is out of bound: {value} >= {bound}")]
    OutOfBound {
        index: usize,
        value: BigUint,
        bound: BigUint,
    },
    /// Fewer ciphertexts were supplied than there are encryptors
    #[error("Incomplete input: expected {expected} ciphertexts, got {actual}")]
    IncompleteInput { expected: usize, actual: usize },
    /// No exponent in the recovery range maps to the decrypted group element
    #[error("Decryption failed: no inner product in [0, {range})")]
    DecryptionFailed { range: BigUint },
    /// Bounded discrete logarithm search exhausted without a match
    #[error("Discrete logarithm not found in [0, {range})")]
    NotFound { range: BigUint },
    /// Secure randomness could not be obtained
    #[error("Entropy source unavailable: {0}")]
    EntropyFailure(String),
    /// Textual input could not be parsed
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FeError {
    /// Turns a raw discrete-log miss into a decryption failure; other errors pass through.
    pub(crate) fn into_decryption_failure(self) -> Self {
        match self {
            FeError::NotFound { range } => FeError::DecryptionFailed { range },
            other => other,
        }
    }
}

impl From<ark_serialize::SerializationError> for FeError {
    fn from(err: ark_serialize::SerializationError) -> Self {
        FeError::Serialization(err.to_string())
    }
}
