//! Raw RSA for the 128-byte credential blocks.
//!
//! Clients encrypt their credential block with the server's public key and no
//! padding scheme. Decryption goes through the CRT path with blinding and a
//! re-encryption check. The first plaintext byte is a zero sentinel that
//! callers check to detect a key mismatch.

use std::fmt;
use std::path::Path;

use rsa::hazmat::rsa_decrypt_and_check;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey};
use tracing::{debug, instrument};

use crate::error::constants::{ERR_KEY_PARSE, ERR_KEY_SIZE, ERR_RSA_FAILED, ERR_RSA_TOO_LARGE};
use crate::error::{ProtocolError, Result};

/// Size of every RSA block on the wire
pub const RSA_BLOCK_SIZE: usize = 128;

/// Modulus size the protocol is built around
const MODULUS_BITS: usize = RSA_BLOCK_SIZE * 8;

/// The server's private key with its CRT values precomputed.
pub struct RsaDecryptor {
    key: RsaPrivateKey,
}

impl RsaDecryptor {
    /// Load a key from PEM text, PKCS#1 (`BEGIN RSA PRIVATE KEY`) or PKCS#8.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let pem = pem.trim();
        let mut key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| ProtocolError::KeyError(format!("{ERR_KEY_PARSE}: {e}")))?;
        key.precompute()
            .map_err(|e| ProtocolError::KeyError(format!("{ERR_KEY_PARSE}: {e}")))?;

        if key.n().bits() != MODULUS_BITS {
            return Err(ProtocolError::KeyError(format!(
                "{ERR_KEY_SIZE} (got {})",
                key.n().bits()
            )));
        }

        Ok(Self { key })
    }

    /// Load a key from a PEM file on disk.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_pem_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let pem = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ProtocolError::KeyError(format!(
                "Can't load private key {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let key = Self::from_pem(&pem)?;
        debug!("RSA private key loaded");
        Ok(key)
    }

    /// Decrypt one block, left-padded to 128 bytes.
    ///
    /// The ciphertext is blinded with a fresh OS random factor before the
    /// private exponent touches it. The sentinel is not checked here.
    pub fn decrypt(&self, block: &[u8]) -> Result<Vec<u8>> {
        if block.len() != RSA_BLOCK_SIZE {
            return Err(ProtocolError::RsaBlockLength(block.len()));
        }

        let c = BigUint::from_bytes_be(block);
        if &c >= self.key.n() {
            return Err(ProtocolError::RsaDecryption(ERR_RSA_TOO_LARGE));
        }

        let m = rsa_decrypt_and_check(&self.key, Some(&mut OsRng), &c)
            .map_err(|_| ProtocolError::RsaDecryption(ERR_RSA_FAILED))?;
        Ok(to_block(&m))
    }

    /// Encrypt one block with the public half: `c = m^e mod n`.
    ///
    /// This is what a client does with its credential block.
    pub fn encrypt(&self, block: &[u8]) -> Result<Vec<u8>> {
        if block.len() != RSA_BLOCK_SIZE {
            return Err(ProtocolError::RsaBlockLength(block.len()));
        }

        let m = BigUint::from_bytes_be(block);
        if &m >= self.key.n() {
            return Err(ProtocolError::RsaDecryption(ERR_RSA_TOO_LARGE));
        }

        Ok(to_block(&m.modpow(self.key.e(), self.key.n())))
    }

    /// Public modulus, big-endian
    pub fn modulus(&self) -> Vec<u8> {
        self.key.n().to_bytes_be()
    }
}

impl fmt::Debug for RsaDecryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaDecryptor")
            .field("bits", &self.key.n().bits())
            .finish_non_exhaustive()
    }
}

fn to_block(value: &BigUint) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    let mut block = vec![0u8; RSA_BLOCK_SIZE];
    // value < n < 2^1024, so it always fits
    let start = RSA_BLOCK_SIZE.saturating_sub(bytes.len());
    block[start..].copy_from_slice(&bytes[bytes.len().saturating_sub(RSA_BLOCK_SIZE)..]);
    block
}
