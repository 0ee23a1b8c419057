//! Stream cipher key handling.

use crate::{CryptoError, KEY_SIZE};
use zeroize::ZeroizeOnDrop;

/// Stream cipher key (32 bytes).
///
/// Wraps the raw key material; zeroized on drop. The `Debug` impl never
/// prints key bytes.
#[derive(Clone, ZeroizeOnDrop)]
pub struct CipherKey([u8; KEY_SIZE]);

impl CipherKey {
    /// Create a key from raw bytes.
    #[must_use]
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from slice.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyLength` if slice length is not 32 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self, CryptoError> {
        if slice.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Parse a hex-encoded key (64 hex digits).
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidHexKey` for malformed hex and
    /// `CryptoError::InvalidKeyLength` for a decoded length other than 32.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s.trim()).map_err(|e| CryptoError::InvalidHexKey(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Hex-encode the key (for key files).
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get raw key bytes.
    ///
    /// # Security
    ///
    /// Handle with extreme care - this exposes the raw key material.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CipherKey(..)")
    }
}
