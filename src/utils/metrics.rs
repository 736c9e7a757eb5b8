//! Observability and Metrics
//!
//! Counters for the relay's hot paths. All counters are relaxed atomics: they
//! are diagnostics, never used for control flow.
//!
//! One `Metrics` instance is created at startup and shared by `Arc` with the
//! acceptor, every session and the discovery announcer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

#[derive(Debug)]
pub struct Metrics {
    /// Total sessions registered since startup
    pub sessions_total: AtomicU64,
    /// Sessions currently registered
    pub sessions_active: AtomicU64,
    /// Packets decoded from clients
    pub packets_received: AtomicU64,
    /// Bytes decoded from clients, headers included
    pub bytes_received: AtomicU64,
    /// Packet copies handed to recipient queues
    pub packets_relayed: AtomicU64,
    /// Recipients whose queue was full or closed
    pub delivery_failures: AtomicU64,
    /// Sessions ended by a protocol violation
    pub protocol_errors: AtomicU64,
    /// Sessions ended by a transport error
    pub transport_errors: AtomicU64,
    /// Identity fields overwritten by sanitization
    pub identity_rewrites: AtomicU64,
    /// Discovery datagrams sent
    pub announcements_sent: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            sessions_total: AtomicU64::new(0),
            sessions_active: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            packets_relayed: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            identity_rewrites: AtomicU64::new(0),
            announcements_sent: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn session_opened(&self) {
        self.sessions_total.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_closed(&self) {
        self.sessions_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn packet_received(&self, byte_count: u64) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn packets_relayed(&self, recipients: u64) {
        self.packets_relayed.fetch_add(recipients, Ordering::Relaxed);
    }

    pub fn delivery_failed(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn identity_rewritten(&self) {
        self.identity_rewrites.fetch_add(1, Ordering::Relaxed);
    }

    pub fn announcement_sent(&self) {
        self.announcements_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_total: self.sessions_total.load(Ordering::Relaxed),
            sessions_active: self.sessions_active.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            packets_relayed: self.packets_relayed.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            identity_rewrites: self.identity_rewrites.load(Ordering::Relaxed),
            announcements_sent: self.announcements_sent.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            sessions_total = snapshot.sessions_total,
            sessions_active = snapshot.sessions_active,
            packets_received = snapshot.packets_received,
            bytes_received = snapshot.bytes_received,
            packets_relayed = snapshot.packets_relayed,
            delivery_failures = snapshot.delivery_failures,
            protocol_errors = snapshot.protocol_errors,
            transport_errors = snapshot.transport_errors,
            identity_rewrites = snapshot.identity_rewrites,
            announcements_sent = snapshot.announcements_sent,
            uptime_seconds = snapshot.uptime_seconds,
            "Relay metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub sessions_total: u64,
    pub sessions_active: u64,
    pub packets_received: u64,
    pub bytes_received: u64,
    pub packets_relayed: u64,
    pub delivery_failures: u64,
    pub protocol_errors: u64,
    pub transport_errors: u64,
    pub identity_rewrites: u64,
    pub announcements_sent: u64,
    pub uptime_seconds: u64,
}
