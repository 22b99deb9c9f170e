//! # Crypto Primitives
//!
//! The cryptography the login protocol is built on. None of it is general purpose:
//! RSA runs without padding on fixed 128-byte blocks, XTEA only ever encrypts, and
//! the checksum is the frame-level Adler-32.
//!
//! ## Components
//! - **RSA**: private-key decryption of credential blocks
//! - **XTEA**: reply encryption with the client-chosen key
//! - **Adler-32**: optional frame checksum
//! - **Password**: configured hash of the supplied password
//! - **TOTP**: two-factor token validation

pub mod adler;
pub mod password;
pub mod rsa;
pub mod totp;
pub mod xtea;

pub use adler::adler32;
pub use password::PasswordHash;
pub use rsa::{RsaDecryptor, RSA_BLOCK_SIZE};
pub use xtea::XteaKey;
