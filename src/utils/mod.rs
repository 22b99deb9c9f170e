//! # Utility Modules
//!
//! Supporting pieces shared by the protocol handler and the connection manager.
//!
//! ## Components
//! - **Rate Limit**: per-address connection and failed-login windows
//! - **Logging**: subscriber setup and redaction wrapper
//! - **Metrics**: atomic counters
//! - **Time**: Unix clock helpers
//! - **Timeout**: async timeout wrappers and fixed limits

pub mod logging;
pub mod metrics;
pub mod rate_limit;
pub mod time;
pub mod timeout;

pub use rate_limit::{AddressKey, RateLimitTier, RateLimiter};
