//! Position-derived IV derivation.
//!
//! Every log block gets its own IV, derived deterministically from the
//! block index so that encryption and decryption agree on the keystream
//! for any byte address without coordination.

use crate::{CipherKey, IV_SIZE};

/// Derive the IV for a log block.
///
/// Keyed BLAKE3 over the little-endian block index. Deterministic for a
/// given key/index pair; one-way, so an observed IV reveals nothing about
/// the key or neighboring blocks.
#[must_use]
pub fn derive_block_iv(key: &CipherKey, block_index: u64) -> [u8; IV_SIZE] {
    let mut hasher = blake3::Hasher::new_keyed(key.as_bytes());
    hasher.update(&block_index.to_le_bytes());

    let mut iv = [0u8; IV_SIZE];
    hasher.finalize_xof().fill(&mut iv);
    iv
}
