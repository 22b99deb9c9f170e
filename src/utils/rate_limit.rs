//! Per-address rate limiting for connections and failed logins.
//!
//! Two independent tables are kept: one counts every accepted connection, the
//! other counts failed authentications. Each address has one fixed window per
//! configured tier (for example one minute and one hour). A window that has run
//! for at least its interval restarts at zero before it is looked at.
//!
//! A tier with `max = N` rejects an event once its count reaches N.
//! [`RateLimiter::admit`] counts the connection first, so N-1 connections get
//! through per window and the N-th is refused. [`RateLimiter::check_auth`] never
//! counts and rejects once N failures have been recorded.
//!
//! Each table is bounded: once more than [`TABLE_CAPACITY`] addresses are tracked
//! the whole table is dropped. This is a blunt guard against address-spraying,
//! not an eviction policy.

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::constants::ERR_UNSPECIFIED_ADDRESS;
use crate::error::{ProtocolError, Result};
use crate::utils::time::unix_millis;

/// Addresses tracked per table before it is cleared
pub const TABLE_CAPACITY: usize = 10_000;

/// One window size and the count that trips it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitTier {
    /// Window length in seconds
    pub interval: u64,
    /// Count that trips the tier
    pub max: u32,
}

impl RateLimitTier {
    pub const fn new(interval: u64, max: u32) -> Self {
        Self { interval, max }
    }

    fn interval_ms(&self) -> u64 {
        self.interval.saturating_mul(1000)
    }
}

/// IPv4 address normalized to the 32-bit key the tables use.
///
/// The key is the address in network byte order read as a big-endian integer, so
/// `1.2.3.4` becomes `0x01020304` whichever form it arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressKey(u32);

impl AddressKey {
    /// Wrap a raw key; zero (0.0.0.0) is rejected.
    pub fn new(raw: u32) -> Result<Self> {
        if raw == 0 {
            return Err(ProtocolError::InvalidAddress(
                ERR_UNSPECIFIED_ADDRESS.to_string(),
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for AddressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ipv4Addr::from(self.0).fmt(f)
    }
}

impl TryFrom<u32> for AddressKey {
    type Error = ProtocolError;

    fn try_from(raw: u32) -> Result<Self> {
        Self::new(raw)
    }
}

impl TryFrom<[u8; 4]> for AddressKey {
    type Error = ProtocolError;

    fn try_from(octets: [u8; 4]) -> Result<Self> {
        Self::new(u32::from_be_bytes(octets))
    }
}

impl TryFrom<Ipv4Addr> for AddressKey {
    type Error = ProtocolError;

    fn try_from(addr: Ipv4Addr) -> Result<Self> {
        Self::try_from(addr.octets())
    }
}

impl TryFrom<IpAddr> for AddressKey {
    type Error = ProtocolError;

    /// IPv4-mapped IPv6 addresses use their IPv4 part; other IPv6 addresses are
    /// folded into 32 bits by XOR of their four words.
    fn try_from(addr: IpAddr) -> Result<Self> {
        match addr {
            IpAddr::V4(v4) => Self::try_from(v4),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => Self::try_from(v4),
                None => {
                    let bits = u128::from(v6);
                    let folded = (bits as u32)
                        ^ ((bits >> 32) as u32)
                        ^ ((bits >> 64) as u32)
                        ^ ((bits >> 96) as u32);
                    Self::new(folded)
                }
            },
        }
    }
}

impl FromStr for AddressKey {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let addr = s
            .trim()
            .parse::<Ipv4Addr>()
            .map_err(|e| ProtocolError::InvalidAddress(format!("{s}: {e}")))?;
        Self::try_from(addr)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Window {
    start_ms: u64,
    count: u32,
}

/// One address table with its tiers
#[derive(Debug)]
struct Table {
    name: &'static str,
    tiers: Vec<RateLimitTier>,
    entries: Mutex<HashMap<AddressKey, Box<[Window]>>>,
}

impl Table {
    fn new(name: &'static str, tiers: Vec<RateLimitTier>) -> Self {
        Self {
            name,
            tiers,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Poisoning is ignored; entries only hold counters.
    fn lock(&self) -> MutexGuard<'_, HashMap<AddressKey, Box<[Window]>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn roll(tiers: &[RateLimitTier], windows: &mut [Window], now_ms: u64) {
        for (tier, window) in tiers.iter().zip(windows.iter_mut()) {
            if now_ms.saturating_sub(window.start_ms) >= tier.interval_ms() {
                window.start_ms = now_ms;
                window.count = 0;
            }
        }
    }

    /// Count one event; returns whether every tier is still below its max.
    fn increment(&self, key: AddressKey, now_ms: u64) -> bool {
        let mut entries = self.lock();
        let windows = entries
            .entry(key)
            .or_insert_with(|| vec![Window::default(); self.tiers.len()].into_boxed_slice());

        Self::roll(&self.tiers, windows, now_ms);
        for window in windows.iter_mut() {
            window.count = window.count.saturating_add(1);
        }
        let within = self
            .tiers
            .iter()
            .zip(windows.iter())
            .all(|(tier, window)| window.count < tier.max);

        if entries.len() > TABLE_CAPACITY {
            warn!(
                table = self.name,
                tracked = entries.len(),
                "Rate limit table over capacity, clearing"
            );
            entries.clear();
        }

        within
    }

    /// Whether an address is below every max, without counting.
    fn within_limits(&self, key: AddressKey, now_ms: u64) -> bool {
        let mut entries = self.lock();
        let Some(windows) = entries.get_mut(&key) else {
            return true;
        };

        Self::roll(&self.tiers, windows, now_ms);
        self.tiers
            .iter()
            .zip(windows.iter())
            .all(|(tier, window)| window.count < tier.max)
    }

    fn counts(&self, key: AddressKey) -> Option<Vec<u32>> {
        self.lock()
            .get(&key)
            .map(|windows| windows.iter().map(|w| w.count).collect())
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Table sizes, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterStats {
    pub tracked_connections: usize,
    pub tracked_authorizations: usize,
}

/// Shared connection and failed-login limiter
#[derive(Debug)]
pub struct RateLimiter {
    connections: Table,
    authorizations: Table,
}

impl RateLimiter {
    pub fn new(connection_tiers: Vec<RateLimitTier>, auth_tiers: Vec<RateLimitTier>) -> Self {
        Self {
            connections: Table::new("connections", connection_tiers),
            authorizations: Table::new("authorizations", auth_tiers),
        }
    }

    /// Count a new connection from `addr` and decide whether to serve it.
    pub fn admit(&self, addr: AddressKey) -> bool {
        self.admit_at(addr, unix_millis())
    }

    #[instrument(level = "trace", skip(self))]
    pub fn admit_at(&self, addr: AddressKey, now_ms: u64) -> bool {
        let admitted = self.connections.increment(addr, now_ms);
        if !admitted {
            debug!(addr = %addr, "Connection rate limit exceeded");
        }
        admitted
    }

    /// Whether `addr` may attempt to authenticate. Never counts.
    pub fn check_auth(&self, addr: AddressKey) -> bool {
        self.check_auth_at(addr, unix_millis())
    }

    pub fn check_auth_at(&self, addr: AddressKey, now_ms: u64) -> bool {
        let allowed = self.authorizations.within_limits(addr, now_ms);
        if !allowed {
            debug!(addr = %addr, "Authorization rate limit exceeded");
        }
        allowed
    }

    /// Record a failed authentication from `addr`.
    pub fn record_failure(&self, addr: AddressKey) {
        self.record_failure_at(addr, unix_millis());
    }

    pub fn record_failure_at(&self, addr: AddressKey, now_ms: u64) {
        self.authorizations.increment(addr, now_ms);
        debug!(addr = %addr, "Failed authorization recorded");
    }

    /// Per-tier connection counts for `addr`, if tracked
    pub fn connection_counts(&self, addr: AddressKey) -> Option<Vec<u32>> {
        self.connections.counts(addr)
    }

    /// Per-tier failure counts for `addr`, if tracked
    pub fn failure_counts(&self, addr: AddressKey) -> Option<Vec<u32>> {
        self.authorizations.counts(addr)
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            tracked_connections: self.connections.len(),
            tracked_authorizations: self.authorizations.len(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn addr(s: &str) -> AddressKey {
        s.parse().unwrap()
    }

    fn limiter(max: u32) -> RateLimiter {
        RateLimiter::new(
            vec![RateLimitTier::new(60, max)],
            vec![RateLimitTier::new(60, max)],
        )
    }

    #[test]
    fn test_connection_reaching_max_is_rejected() {
        let limiter = limiter(5);
        let a = addr("10.0.0.1");
        let t0 = 1_000_000;

        for i in 0..4 {
            assert!(limiter.admit_at(a, t0 + i * 1000), "attempt {} rejected", i + 1);
        }
        assert!(!limiter.admit_at(a, t0 + 4_000));
        assert!(!limiter.admit_at(a, t0 + 5_000));
        assert_eq!(limiter.connection_counts(a), Some(vec![6]));
    }

    #[test]
    fn test_same_instant_burst_admits_max_minus_one() {
        let limiter = limiter(5);
        let a = addr("10.0.0.1");
        let results: Vec<bool> = (0..6).map(|_| limiter.admit_at(a, 1_000)).collect();
        assert_eq!(results, vec![true, true, true, true, false, false]);
    }

    #[test]
    fn test_window_resets_after_interval() {
        let limiter = limiter(5);
        let a = addr("10.0.0.1");
        let t0 = 1_000_000;

        for _ in 0..6 {
            limiter.admit_at(a, t0);
        }
        assert!(!limiter.admit_at(a, t0 + 59_999));
        assert!(limiter.admit_at(a, t0 + 60_000));
        assert_eq!(limiter.connection_counts(a), Some(vec![1]));
    }

    #[test]
    fn test_addresses_are_independent() {
        let limiter = limiter(2);
        assert!(limiter.admit_at(addr("10.0.0.1"), 1_000));
        assert!(limiter.admit_at(addr("10.0.0.2"), 1_000));
        assert!(!limiter.admit_at(addr("10.0.0.1"), 1_000));
    }

    #[test]
    fn test_every_tier_must_pass() {
        let limiter = RateLimiter::new(
            vec![RateLimitTier::new(1, 10), RateLimitTier::new(3600, 4)],
            vec![],
        );
        let a = addr("192.168.1.1");
        assert!(limiter.admit_at(a, 0));
        assert!(limiter.admit_at(a, 2_000));
        assert!(limiter.admit_at(a, 4_000));
        // short tier has reset, long tier has not
        assert!(!limiter.admit_at(a, 6_000));
        assert_eq!(limiter.connection_counts(a), Some(vec![1, 4]));
    }

    #[test]
    fn test_check_auth_gates_on_recorded_failures() {
        let limiter = limiter(3);
        let a = addr("172.16.0.9");
        let t0 = 5_000_000;

        assert!(limiter.check_auth_at(a, t0));
        assert_eq!(limiter.failure_counts(a), None);

        for _ in 0..2 {
            limiter.record_failure_at(a, t0);
        }
        assert!(limiter.check_auth_at(a, t0));
        limiter.record_failure_at(a, t0);
        assert!(!limiter.check_auth_at(a, t0));
        assert!(!limiter.check_auth_at(a, t0 + 30_000));
        assert_eq!(limiter.failure_counts(a), Some(vec![3]));
    }

    #[test]
    fn test_check_auth_releases_stale_windows() {
        let limiter = limiter(1);
        let a = addr("172.16.0.9");
        limiter.record_failure_at(a, 0);
        assert!(!limiter.check_auth_at(a, 1_000));
        assert!(limiter.check_auth_at(a, 60_000));
        assert_eq!(limiter.failure_counts(a), Some(vec![0]));
    }

    #[test]
    fn test_table_cleared_past_capacity() {
        let limiter = limiter(100);
        for raw in 1..=TABLE_CAPACITY as u32 {
            limiter.admit_at(AddressKey::new(raw).unwrap(), 1_000);
        }
        assert_eq!(limiter.stats().tracked_connections, TABLE_CAPACITY);
        assert!(limiter.connection_counts(AddressKey::new(1).unwrap()).is_some());

        limiter.admit_at(AddressKey::new(TABLE_CAPACITY as u32 + 1).unwrap(), 1_000);
        assert_eq!(limiter.stats().tracked_connections, 0);
        assert_eq!(limiter.connection_counts(AddressKey::new(1).unwrap()), None);
    }

    #[test]
    fn test_address_forms_agree() {
        let from_str = addr("1.2.3.4");
        let from_octets = AddressKey::try_from([1u8, 2, 3, 4]).unwrap();
        let from_raw = AddressKey::try_from(0x0102_0304u32).unwrap();
        let from_ip = AddressKey::try_from(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4))).unwrap();
        let mapped: IpAddr = "::ffff:1.2.3.4".parse().unwrap();

        assert_eq!(from_str, from_octets);
        assert_eq!(from_str, from_raw);
        assert_eq!(from_str, from_ip);
        assert_eq!(from_str, AddressKey::try_from(mapped).unwrap());
        assert_eq!(from_str.to_string(), "1.2.3.4");
    }

    #[test]
    fn test_rejects_unusable_addresses() {
        assert!("0.0.0.0".parse::<AddressKey>().is_err());
        assert!("not an ip".parse::<AddressKey>().is_err());
        assert!("1.2.3".parse::<AddressKey>().is_err());
        assert!(AddressKey::new(0).is_err());
    }

    #[test]
    fn test_ipv6_is_folded() {
        let v6: IpAddr = "2001:db8::1".parse().unwrap();
        let key = AddressKey::try_from(v6).unwrap();
        assert_eq!(key.as_u32(), 0x2001_0db8 ^ 0x1);
    }
}
