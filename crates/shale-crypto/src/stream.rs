//! Stream cipher abstraction and the ChaCha20 default implementation.
//!
//! The pipeline re-initializes its cipher at every file header and, for
//! block-chained files, at every log block boundary. The seam is therefore
//! a mutable keystream that can be repositioned via [`StreamCipher::reinit`]
//! rather than a one-shot encrypt function.

use chacha20::ChaCha20;
use chacha20::cipher::{KeyIvInit, StreamCipher as _};

use crate::{CipherKey, CryptoError, IV_SIZE};

/// A per-byte stream cipher.
///
/// Implementations are used from a single dedicated thread only; no
/// internal synchronization is expected. Encryption and decryption are
/// the same transform for a keystream XOR cipher, so one trait serves
/// both directions.
pub trait StreamCipher {
    /// Re-initialize the keystream with a key and IV.
    ///
    /// Called once per file header and again at every block boundary for
    /// files with block-chained IVs.
    ///
    /// # Errors
    ///
    /// Returns a `CryptoError` if the cipher rejects the key/IV pair.
    fn reinit(&mut self, key: &CipherKey, iv: &[u8; IV_SIZE]) -> Result<(), CryptoError>;

    /// Transform a single byte, advancing the keystream by one position.
    fn crypt_byte(&mut self, byte: u8) -> u8;

    /// Transform a slice in place.
    ///
    /// Equivalent to applying [`StreamCipher::crypt_byte`] to every byte in
    /// order; implementations may override this with a bulk keystream
    /// application.
    fn apply(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            *byte = self.crypt_byte(*byte);
        }
    }
}

/// Factory producing a fresh cipher instance per pipeline run.
pub trait CipherProvider: Send {
    /// Create an uninitialized cipher.
    ///
    /// The pipeline initializes it via [`StreamCipher::reinit`] before the
    /// first payload byte is transformed.
    fn new_cipher(&self) -> Box<dyn StreamCipher + Send>;
}

/// ChaCha20 keystream cipher.
///
/// Until the first [`StreamCipher::reinit`] the cipher passes bytes through
/// unchanged; the pipeline initializes it at every file header before any
/// chunk bytes reach it.
#[derive(Default)]
pub struct ChaCha20Cipher {
    inner: Option<ChaCha20>,
}

impl ChaCha20Cipher {
    /// Create an uninitialized cipher.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: None }
    }
}

impl StreamCipher for ChaCha20Cipher {
    fn reinit(&mut self, key: &CipherKey, iv: &[u8; IV_SIZE]) -> Result<(), CryptoError> {
        self.inner = Some(ChaCha20::new(key.as_bytes().into(), iv.into()));
        Ok(())
    }

    fn crypt_byte(&mut self, byte: u8) -> u8 {
        let mut buf = [byte];
        if let Some(cipher) = self.inner.as_mut() {
            cipher.apply_keystream(&mut buf);
        }
        buf[0]
    }

    fn apply(&mut self, data: &mut [u8]) {
        if let Some(cipher) = self.inner.as_mut() {
            cipher.apply_keystream(data);
        }
    }
}

/// Provider for [`ChaCha20Cipher`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ChaCha20Provider;

impl CipherProvider for ChaCha20Provider {
    fn new_cipher(&self) -> Box<dyn StreamCipher + Send> {
        Box::new(ChaCha20Cipher::new())
    }
}
