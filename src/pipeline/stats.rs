//! Per-stage message counters

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Live counters shared between a stage worker and the pipeline handle
#[derive(Debug)]
pub struct StageStats {
    /// Stage name
    pub name: &'static str,
    received: AtomicU64,
    rewritten: AtomicU64,
    passed_through: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    created: Instant,
}

impl StageStats {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            received: AtomicU64::new(0),
            rewritten: AtomicU64::new(0),
            passed_through: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Message forwarded with a change applied
    pub fn record_rewritten(&self) {
        self.rewritten.fetch_add(1, Ordering::Relaxed);
    }

    /// Message forwarded untouched (every delivery, for the subscriber and publisher)
    pub fn record_passed_through(&self) {
        self.passed_through.fetch_add(1, Ordering::Relaxed);
    }

    /// Message forwarded untouched because its rule failed
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Message not forwarded (undecodable, or rejected by the publisher)
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StageStatsSnapshot {
        StageStatsSnapshot {
            name: self.name,
            received: self.received.load(Ordering::Relaxed),
            rewritten: self.rewritten.load(Ordering::Relaxed),
            passed_through: self.passed_through.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            uptime_secs: self.created.elapsed().as_secs(),
        }
    }
}

/// Point-in-time copy of a stage's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageStatsSnapshot {
    pub name: &'static str,
    pub received: u64,
    pub rewritten: u64,
    pub passed_through: u64,
    pub failed: u64,
    pub dropped: u64,
    pub uptime_secs: u64,
}

impl StageStatsSnapshot {
    /// Messages that left the stage
    pub fn forwarded(&self) -> u64 {
        self.rewritten + self.passed_through + self.failed
    }
}

impl fmt::Display for StageStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: received={} rewritten={} passed_through={} failed={} dropped={} uptime={}s",
            self.name,
            self.received,
            self.rewritten,
            self.passed_through,
            self.failed,
            self.dropped,
            self.uptime_secs
        )
    }
}
