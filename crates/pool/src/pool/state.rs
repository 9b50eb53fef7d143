//! Lock-protected pool state and the housekeeping planner.

use crate::pool::config::{AcquireOrder, PoolConfig};
use crate::queue::{Idle, IdleQueue};

/// Everything guarded by the pool mutex.
#[derive(Debug)]
pub(crate) struct PoolState<T> {
    pub(crate) idle: IdleQueue<T>,
    /// Idle + checked out + reserved for construction.
    pub(crate) total: usize,
    /// Reservations made by housekeeping growth that have not landed yet.
    pub(crate) growing: usize,
    pub(crate) closed: bool,
}

/// Work decided under the lock and carried out after releasing it.
#[derive(Debug)]
pub(crate) struct Housekeeping<T> {
    /// Slots reserved in `total` for new idle resources.
    pub(crate) grow: usize,
    /// Expired resources already unlinked from the queue, still counted in `total`.
    pub(crate) expired: Vec<T>,
}

impl<T> Housekeeping<T> {
    pub(crate) fn is_empty(&self) -> bool {
        self.grow == 0 && self.expired.is_empty()
    }
}

impl<T> PoolState<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            idle: IdleQueue::with_capacity(capacity),
            total: 0,
            growing: 0,
            closed: false,
        }
    }

    pub(crate) fn pop_idle(&mut self, order: AcquireOrder) -> Option<Idle<T>> {
        match order {
            AcquireOrder::Fifo => self.idle.pop_front(),
            AcquireOrder::Lifo => self.idle.pop_back(),
        }
    }

    /// Decide the grow/shrink pass.
    ///
    /// Growth tops the idle set up to `minimum` without exceeding `maximum`
    /// and reserves its slots immediately. Shrinking only happens when no
    /// growth is planned: idle resources above `average` are unlinked from the
    /// head for as long as the head has been idle for at least `expiration`.
    /// The queue is ordered by queue time, so the first young head ends the scan.
    pub(crate) fn plan_housekeeping(&mut self, config: &PoolConfig) -> Housekeeping<T> {
        let mut plan = Housekeeping {
            grow: 0,
            expired: Vec::new(),
        };
        if self.closed {
            return plan;
        }

        let wanted = config
            .minimum
            .saturating_sub(self.idle.len() + self.growing);
        let room = config.maximum.saturating_sub(self.total);
        plan.grow = wanted.min(room);
        if plan.grow > 0 {
            self.total += plan.grow;
            self.growing += plan.grow;
            return plan;
        }

        while self.idle.len() > config.average {
            match self.idle.front_created() {
                Some(created) if created.elapsed() >= config.expiration => {}
                _ => break,
            }
            if let Some(entry) = self.idle.pop_front() {
                plan.expired.push(entry.payload);
            }
        }
        plan
    }
}
