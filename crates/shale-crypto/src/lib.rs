//! # SHALE Crypto
//!
//! Cryptographic seam for the SHALE log-encryption pipeline.
//!
//! This crate provides:
//! - A per-byte stream cipher abstraction re-initializable at block boundaries
//! - A `ChaCha20` default implementation (keystream XOR, no authentication)
//! - Deterministic IV derivation from a log block index (keyed BLAKE3)
//! - Zeroized key handling
//!
//! ## Cryptographic Suite
//!
//! | Function | Algorithm | Notes |
//! |----------|-----------|-------|
//! | Keystream | ChaCha20 | symmetric transform, 256-bit key |
//! | IV derivation | keyed BLAKE3 | block index -> 96-bit IV |
//!
//! The cipher here is a raw keystream: encryption and decryption are the same
//! operation, and no integrity protection is applied. Authenticated encryption
//! is deliberately out of scope for the log pipeline.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod error;
pub mod iv;
pub mod key;
pub mod stream;

pub use error::CryptoError;
pub use iv::derive_block_iv;
pub use key::CipherKey;
pub use stream::{ChaCha20Cipher, ChaCha20Provider, CipherProvider, StreamCipher};

/// Stream cipher key size (32 bytes / 256 bits).
pub const KEY_SIZE: usize = 32;

/// Derived IV size (12 bytes / 96 bits), matching the ChaCha20 nonce.
pub const IV_SIZE: usize = 12;
