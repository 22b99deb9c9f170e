//! XTEA block cipher, encrypt direction only.
//!
//! The login reply is encrypted with the four key words the client placed in its
//! RSA block. Blocks are two little-endian `u32` words; all arithmetic wraps.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// XTEA round constant
pub const XTEA_DELTA: u32 = 0x9E37_79B9;

/// Feistel cycles per block (64 rounds)
const CYCLES: usize = 32;

/// Block size in bytes
pub const XTEA_BLOCK_SIZE: usize = 8;

/// A per-connection XTEA key, wiped from memory when dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct XteaKey([u32; 4]);

impl XteaKey {
    pub fn new(words: [u32; 4]) -> Self {
        Self(words)
    }

    pub fn words(&self) -> &[u32; 4] {
        &self.0
    }

    /// Encrypt a single block given as two words.
    pub fn encrypt_block(&self, mut v0: u32, mut v1: u32) -> (u32, u32) {
        let k = &self.0;
        let mut sum: u32 = 0;

        for _ in 0..CYCLES {
            v0 = v0.wrapping_add(
                (((v1 << 4) ^ (v1 >> 5)).wrapping_add(v1)) ^ sum.wrapping_add(k[(sum & 3) as usize]),
            );
            sum = sum.wrapping_add(XTEA_DELTA);
            v1 = v1.wrapping_add(
                (((v0 << 4) ^ (v0 >> 5)).wrapping_add(v0))
                    ^ sum.wrapping_add(k[((sum >> 11) & 3) as usize]),
            );
        }

        (v0, v1)
    }

    /// Encrypt `data` in place, block by block.
    ///
    /// Callers pad to a multiple of [`XTEA_BLOCK_SIZE`] first; a trailing partial
    /// block is left as is.
    pub fn encrypt(&self, data: &mut [u8]) {
        for block in data.chunks_exact_mut(XTEA_BLOCK_SIZE) {
            let v0 = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
            let v1 = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
            let (v0, v1) = self.encrypt_block(v0, v1);
            block[..4].copy_from_slice(&v0.to_le_bytes());
            block[4..].copy_from_slice(&v1.to_le_bytes());
        }
    }

    /// Inverse of [`XteaKey::encrypt`], used to inspect replies in tests.
    #[cfg(test)]
    pub(crate) fn decrypt(&self, data: &mut [u8]) {
        let k = &self.0;
        for block in data.chunks_exact_mut(XTEA_BLOCK_SIZE) {
            let mut v0 = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
            let mut v1 = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
            let mut sum = XTEA_DELTA.wrapping_mul(CYCLES as u32);
            for _ in 0..CYCLES {
                v1 = v1.wrapping_sub(
                    (((v0 << 4) ^ (v0 >> 5)).wrapping_add(v0))
                        ^ sum.wrapping_add(k[((sum >> 11) & 3) as usize]),
                );
                sum = sum.wrapping_sub(XTEA_DELTA);
                v0 = v0.wrapping_sub(
                    (((v1 << 4) ^ (v1 >> 5)).wrapping_add(v1))
                        ^ sum.wrapping_add(k[(sum & 3) as usize]),
                );
            }
            block[..4].copy_from_slice(&v0.to_le_bytes());
            block[4..].copy_from_slice(&v1.to_le_bytes());
        }
    }
}

impl fmt::Debug for XteaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("XteaKey([REDACTED])")
    }
}
