//! Gateway counters
//!
//! Atomic counters for connection handling and login outcomes. One [`Metrics`]
//! instance is owned by the server state and shared with every connection task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

#[derive(Debug)]
pub struct Metrics {
    /// Sockets accepted
    pub connections_total: AtomicU64,
    /// Sockets currently being served
    pub connections_active: AtomicU64,
    /// Sockets dropped by the connection limiter or the connection cap
    pub connections_rejected: AtomicU64,
    /// Complete frames received
    pub frames_received: AtomicU64,
    /// Connections dropped on a parse, crypto, store or timeout error
    pub protocol_errors: AtomicU64,
    /// Login requests parsed
    pub logins_total: AtomicU64,
    /// Logins answered with a character list
    pub logins_success: AtomicU64,
    /// Logins answered with an error message or token failure
    pub logins_rejected: AtomicU64,
    /// Status queries answered
    pub status_queries: AtomicU64,
    /// Bytes written to clients
    pub bytes_sent: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            connections_rejected: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            logins_total: AtomicU64::new(0),
            logins_success: AtomicU64::new(0),
            logins_rejected: AtomicU64::new(0),
            status_queries: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_attempt(&self) {
        self.logins_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_success(&self) {
        self.logins_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_rejected(&self) {
        self.logins_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn status_query(&self) {
        self.status_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: u64) {
        self.bytes_sent.fetch_add(count, Ordering::Relaxed);
    }

    /// Seconds since this collector was created
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            logins_total: self.logins_total.load(Ordering::Relaxed),
            logins_success: self.logins_success.load(Ordering::Relaxed),
            logins_rejected: self.logins_rejected.load(Ordering::Relaxed),
            status_queries: self.status_queries.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            uptime_seconds: self.uptime_seconds(),
        }
    }

    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            connections_rejected = snapshot.connections_rejected,
            frames_received = snapshot.frames_received,
            protocol_errors = snapshot.protocol_errors,
            logins_total = snapshot.logins_total,
            logins_success = snapshot.logins_success,
            logins_rejected = snapshot.logins_rejected,
            status_queries = snapshot.status_queries,
            bytes_sent = snapshot.bytes_sent,
            uptime_seconds = snapshot.uptime_seconds,
            "Gateway metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`Metrics`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub connections_rejected: u64,
    pub frames_received: u64,
    pub protocol_errors: u64,
    pub logins_total: u64,
    pub logins_success: u64,
    pub logins_rejected: u64,
    pub status_queries: u64,
    pub bytes_sent: u64,
    pub uptime_seconds: u64,
}
