//! # Transport
//!
//! The TCP side of the gateway: accept loop, per-connection admission, the
//! single-exchange connection task, and a framed client for tests and tools.

pub mod tcp;

pub use tcp::{
    bind, connect, serve_until_signal, start_server, start_server_with_shutdown, ConnectionState,
};
