//! # otls
//!
//! Login gateway for the classic Tibia-protocol client family (versions 7.x
//! through 10.x).
//!
//! A client opens a TCP connection, sends one length-prefixed frame and receives
//! one reply before the connection is closed. The frame is either a status
//! query, answered with a cached XML document, or a login request. Login
//! requests carry RSA-wrapped credentials and an XTEA session key chosen by the
//! client; the reply (a character list or an error message) is encrypted with
//! that key.
//!
//! ## Modules
//! - [`core`]: frame codec, packet reader/writer, per-version request layout
//! - [`crypto`]: RSA, XTEA, Adler-32, password hashing, TOTP
//! - [`protocol`]: request parsing, authentication, replies, status document
//! - [`store`]: account store interface and the bundled in-memory store
//! - [`transport`]: TCP accept loop and connection handling
//! - [`utils`]: rate limiter, logging, metrics, time helpers
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use otls::config::LoginConfig;
//! use otls::crypto::RsaDecryptor;
//! use otls::protocol::LoginService;
//! use otls::store::MemoryStore;
//!
//! # async fn run() -> otls::error::Result<()> {
//! let config = Arc::new(LoginConfig::default());
//! let rsa = Arc::new(RsaDecryptor::from_pem_file(&config.crypto.private_key)?);
//! let store = Arc::new(MemoryStore::new());
//!
//! let service = Arc::new(LoginService::new(config.clone(), rsa, store));
//! let listener = otls::transport::bind(config.server.address.as_str()).await?;
//! otls::transport::start_server(listener, service).await
//! # }
//! ```

pub mod config;
pub mod core;
pub mod crypto;
pub mod error;
pub mod protocol;
pub mod store;
pub mod transport;
pub mod utils;

pub use error::{ProtocolError, Result};
