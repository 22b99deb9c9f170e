//! Time-based one-time tokens (RFC 6238, HMAC-SHA1).
//!
//! Accounts with two-factor authentication store a base32 secret. A token is
//! accepted when it matches any time step within [`TOLERANCE_STEPS`] of now.

use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Seconds per token step
pub const TIME_STEP_SECS: u64 = 30;

/// Digits in a token
pub const TOKEN_DIGITS: u32 = 6;

/// Steps accepted on either side of the current one
pub const TOLERANCE_STEPS: u64 = 2;

/// Decode a base32 secret, ignoring spaces, case and trailing padding.
pub fn decode_secret(secret: &str) -> Option<Vec<u8>> {
    let normalized: String = secret
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let normalized = normalized.trim_end_matches('=');
    if normalized.is_empty() {
        return None;
    }
    base32::decode(base32::Alphabet::Rfc4648 { padding: false }, normalized)
}

/// Token for a raw key at a given step counter.
pub fn generate(key: &[u8], counter: u64) -> Option<u32> {
    let mut mac = HmacSha1::new_from_slice(key).ok()?;
    mac.update(&counter.to_be_bytes());
    let hash = mac.finalize().into_bytes();

    let offset = (hash[hash.len() - 1] & 0x0F) as usize;
    let code = u32::from_be_bytes([
        hash[offset] & 0x7F,
        hash[offset + 1],
        hash[offset + 2],
        hash[offset + 3],
    ]);
    Some(code % 10u32.pow(TOKEN_DIGITS))
}

/// Check `token` against a base32 `secret` at `unix_secs`.
///
/// Malformed secrets and tokens that are not exactly six digits never match.
pub fn validate_token(token: &str, secret: &str, unix_secs: u64) -> bool {
    if token.len() != TOKEN_DIGITS as usize || !token.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let Ok(expected) = token.parse::<u32>() else {
        return false;
    };
    let Some(key) = decode_secret(secret) else {
        return false;
    };

    let current = unix_secs / TIME_STEP_SECS;
    let first = current.saturating_sub(TOLERANCE_STEPS);
    let last = current.saturating_add(TOLERANCE_STEPS);

    (first..=last).any(|step| generate(&key, step) == Some(expected))
}
