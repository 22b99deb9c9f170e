//! # Error Types
//!
//! Error handling for the login gateway.
//!
//! Every variant of [`ProtocolError`] is fatal to the connection that raised it:
//! the connection is dropped without a response and the cause is logged. Policy
//! outcomes that the client must be told about (wrong password, locked out,
//! unsupported client version) are not errors at this level; see
//! [`crate::protocol::message::LoginRejection`].
//!
//! ## Error Categories
//! - **Frame/bounds**: oversized frames, reads past the end of a packet, unknown packet types
//! - **Cryptographic**: RSA block length, RSA sentinel mismatch, key loading
//! - **External**: account store failures, I/O
//! - **Startup**: configuration and key material problems
//!
//! ## Example Usage
//! ```rust
//! use otls::core::packet::InputPacket;
//! use otls::error::{ProtocolError, Result};
//!
//! fn packet_type(frame: &[u8]) -> Result<u8> {
//!     let mut packet = InputPacket::new(frame.to_vec().into());
//!     packet.get_u8()
//! }
//!
//! assert!(matches!(
//!     packet_type(&[]),
//!     Err(ProtocolError::PacketOverflow { needed: 1, remaining: 0 })
//! ));
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Key loading
    pub const ERR_KEY_PARSE: &str = "Failed to parse RSA private key";
    pub const ERR_KEY_SIZE: &str = "RSA modulus must be 1024 bits";

    /// RSA block handling
    pub const ERR_RSA_TOO_LARGE: &str = "RSA ciphertext is not smaller than the modulus";
    pub const ERR_RSA_FAILED: &str = "RSA private key operation failed";

    /// Address normalization
    pub const ERR_UNSPECIFIED_ADDRESS: &str = "Unspecified address 0.0.0.0 is not accepted";
}

/// Primary error type for all gateway operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("Read past end of packet: needed {needed} bytes, {remaining} remaining")]
    PacketOverflow { needed: usize, remaining: usize },

    #[error("Output buffer full: needed {needed} bytes, {available} available")]
    OutputOverflow { needed: usize, available: usize },

    #[error("Output packet already carries a header field")]
    HeaderAlreadyWritten,

    #[error("Unknown packet type: 0x{0:02X}")]
    UnknownPacketType(u8),

    #[error("RSA block must be exactly 128 bytes, got {0}")]
    RsaBlockLength(usize),

    #[error("RSA plaintext does not start with the zero sentinel")]
    RsaSentinel,

    #[error("Login request carries no credentials")]
    MissingCredentials,

    #[error("RSA decryption failed: {0}")]
    RsaDecryption(&'static str),

    #[error("Key error: {0}")]
    KeyError(String),

    #[error("Account store error: {0}")]
    Store(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Connection timed out (no activity)")]
    ConnectionTimeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
