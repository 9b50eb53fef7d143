//! Pool statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Resources in existence: idle, checked out, or being created.
    pub total: usize,
    /// Resources waiting in the idle queue.
    pub idle: usize,
    /// Resources checked out or being created (`total - idle`).
    pub in_use: usize,
    /// Threads blocked in `acquire`.
    pub waiting: usize,
    /// Empty bookkeeping slots kept for reuse.
    pub spare_slots: usize,
    /// Resources ever created.
    pub created: u64,
    /// Resources ever destroyed.
    pub destroyed: u64,
    /// Successful acquisitions.
    pub acquired: u64,
    /// Resources returned to the idle queue.
    pub released: u64,
    /// Resources discarded through `invalidate`.
    pub invalidated: u64,
    /// Acquisitions that gave up waiting.
    pub timed_out: u64,
}

/// Lifetime counters, updated without the pool lock.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    created: AtomicU64,
    destroyed: AtomicU64,
    acquired: AtomicU64,
    released: AtomicU64,
    invalidated: AtomicU64,
    timed_out: AtomicU64,
}

impl Counters {
    pub(crate) fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_destroyed(&self, n: u64) {
        self.destroyed.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn record_acquired(&self) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalidated(&self) {
        self.invalidated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    /// Fill the counter fields of `stats`.
    pub(crate) fn fill(&self, stats: &mut PoolStats) {
        stats.created = self.created.load(Ordering::Relaxed);
        stats.destroyed = self.destroyed.load(Ordering::Relaxed);
        stats.acquired = self.acquired.load(Ordering::Relaxed);
        stats.released = self.released.load(Ordering::Relaxed);
        stats.invalidated = self.invalidated.load(Ordering::Relaxed);
        stats.timed_out = self.timed_out.load(Ordering::Relaxed);
    }
}
