//! Cryptographic error types.

use thiserror::Error;

/// Cryptographic errors.
///
/// `Clone` so a recorded failure can be surfaced to more than one caller
/// (the pipeline stores the first failure and re-raises it on close).
#[derive(Debug, Clone, Error)]
pub enum CryptoError {
    /// Invalid key length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Key is not valid hex
    #[error("invalid hex key: {0}")]
    InvalidHexKey(String),

    /// Cipher initialization failed
    #[error("cipher initialization failed: {0}")]
    InitFailed(String),
}
