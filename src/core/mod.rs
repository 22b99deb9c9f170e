//! # Core Protocol Components
//!
//! Frame delimiting, packet reading and writing, and the per-version request layout.
//!
//! ## Components
//! - **Codec**: Tokio codec splitting the TCP stream into frames
//! - **Packet**: bounds-checked reader and header-prepending writer
//! - **Layout**: table of request fields per client version
//!
//! ## Wire Format
//! ```text
//! [Size(2)] [Checksum(4), optional] [Type(1)] [Body(N)]
//! ```
//!
//! ## Security
//! - Maximum frame size: 1024 bytes, checked before buffering the body
//! - Every read is bounds-checked; a short packet is an error, never a panic

pub mod codec;
pub mod layout;
pub mod packet;
