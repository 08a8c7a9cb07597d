//! Request counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the dispatcher, safe to share across requests.
#[derive(Debug, Default)]
pub struct DavStats {
    requests: AtomicU64,
    errors: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    lock_conflicts: AtomicU64,
}

/// Point-in-time copy of [`DavStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DavStatsSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub lock_conflicts: u64,
}

impl DavStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Bytes served to clients.
    pub fn record_read(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Bytes stored on behalf of clients.
    pub fn record_write(&self, bytes: u64) {
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_lock_conflict(&self) {
        self.lock_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DavStatsSnapshot {
        DavStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            lock_conflicts: self.lock_conflicts.load(Ordering::Relaxed),
        }
    }
}
