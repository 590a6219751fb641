// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Live counters shared by every task of an endpoint.
#[derive(Debug)]
pub struct EndpointStats {
    /// Frames accepted by the transport.
    pub sent: AtomicU64,

    /// Messages given up on (retry exhausted or retry queue full).
    pub dropped: AtomicU64,

    /// Frames received from the transport.
    pub received: AtomicU64,

    /// Supervised task relaunches.
    pub restarts: AtomicU64,

    /// Endpoint creation time.
    pub created: Instant,
}

impl Default for EndpointStats {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointStats {
    pub fn new() -> Self {
        Self {
            sent: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            received: AtomicU64::new(0),
            restarts: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
            uptime_secs: self.created.elapsed().as_secs(),
        }
    }
}

/// Snapshot of endpoint statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub sent: u64,
    pub dropped: u64,
    pub received: u64,
    pub restarts: u64,
    pub uptime_secs: u64,
}

impl StatsSnapshot {
    /// Sent frames per second over the endpoint lifetime.
    pub fn send_rate(&self) -> f64 {
        if self.uptime_secs > 0 {
            self.sent as f64 / self.uptime_secs as f64
        } else {
            0.0
        }
    }
}
