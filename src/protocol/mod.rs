//! # Login Protocol
//!
//! Everything between a decoded frame and the reply frame.
//!
//! ## Components
//! - **Handshake**: packet header and login request parsing
//! - **Message**: rejection outcomes and character list replies
//! - **Status**: cached XML status document
//! - **Login**: the service tying parsing, authentication and replies together

pub mod handshake;
pub mod login;
pub mod message;
pub mod status;


pub use handshake::{AccountId, LoginRequest, PacketKind};
pub use login::{LoginService, Reply};
pub use message::LoginRejection;
