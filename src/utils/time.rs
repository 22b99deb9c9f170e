//! Wall-clock helpers.
//!
//! Rate-limit windows and session keys use Unix time. A clock before the epoch
//! reads as zero rather than failing a login.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Whole seconds since the Unix epoch
pub fn unix_secs() -> u64 {
    unix_millis() / 1000
}
