//! Blocking, bounded resource pool driven by a [`Manager`].
//!
//! The pool keeps between `minimum` and `maximum` resources alive. Idle
//! resources wait in a queue ordered by the time they were returned;
//! `acquire` takes from the head (oldest first) unless configured for LIFO.
//! When the queue is empty and the pool is below `maximum`, `acquire` creates
//! a resource on demand; at `maximum` it blocks until one is released,
//! invalidated, or the acquire timeout passes.
//!
//! Every release runs a housekeeping pass: the idle set is topped up to
//! `minimum`, and otherwise idle resources above `average` that have been
//! idle for `expiration` are destroyed, oldest first.
//!
//! Manager callbacks never run under the pool lock. Capacity is reserved in
//! `total` before a `create` and rolled back if it fails, so `total` never
//! exceeds `maximum`.

pub mod config;
mod state;

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::guard::Pooled;
use crate::manager::Manager;
use crate::signal::{Signal, WaitOutcome};
use crate::stats::{Counters, PoolStats};

pub use config::{AcquireOrder, PoolConfig};
use state::{Housekeeping, PoolState};

/// What a housekeeping pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Maintenance {
    /// Idle resources created to reach `minimum`.
    pub created: usize,
    /// Expired idle resources destroyed.
    pub destroyed: usize,
}

#[derive(Debug, Clone, Copy)]
enum Wait {
    Never,
    Until(Instant),
    Forever,
}

impl Wait {
    /// Deadline `timeout` after `start`. A zero timeout, or one too large
    /// for `Instant`, waits forever.
    fn after(start: Instant, timeout: Duration) -> Self {
        if timeout.is_zero() {
            return Self::Forever;
        }
        start.checked_add(timeout).map_or(Self::Forever, Self::Until)
    }
}

enum Checkout<T> {
    Ready(T),
    Exhausted { total: usize },
}

/// Inner shared state for the pool.
struct PoolInner<M: Manager> {
    manager: M,
    config: PoolConfig,
    state: Mutex<PoolState<M::Resource>>,
    /// Parks acquirers while the pool is exhausted.
    available: Signal,
    counters: Counters,
}

impl<M: Manager> Drop for PoolInner<M> {
    fn drop(&mut self) {
        let drained = self.state.get_mut().idle.drain();
        if drained.is_empty() {
            return;
        }
        let n = drained.len();
        for resource in drained {
            self.manager.destroy(resource);
        }
        tracing::debug!(
            resource_id = self.manager.id(),
            destroyed = n,
            "Pool dropped, idle resources destroyed"
        );
    }
}

/// Blocking resource pool.
///
/// Cloning is cheap; all clones share the same resources. Checked-out
/// resources are handed out as [`Pooled`] guards, which return them on drop.
pub struct Pool<M: Manager> {
    inner: Arc<PoolInner<M>>,
}

impl<M: Manager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Manager> std::fmt::Debug for Pool<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("resource_id", &self.inner.manager.id())
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<M: Manager> Pool<M> {
    /// Create a pool and warm it up to `config.minimum` idle resources.
    ///
    /// # Errors
    /// `Error::Configuration` if `config` is invalid (the manager is not
    /// called), or `Error::Create` if warm-up fails. Resources created before
    /// the failure are destroyed; no partial pool is left behind.
    pub fn new(manager: M, config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let counters = Counters::default();
        let mut warm = Vec::with_capacity(config.minimum);
        for _ in 0..config.minimum.min(config.maximum) {
            match manager.create() {
                Ok(resource) => {
                    counters.record_created();
                    warm.push(resource);
                }
                Err(e) => {
                    let created = warm.len();
                    for resource in warm {
                        manager.destroy(resource);
                    }
                    tracing::warn!(
                        resource_id = manager.id(),
                        created,
                        error = %e,
                        "Pool warm-up failed"
                    );
                    return Err(Error::create(manager.id(), e));
                }
            }
        }

        let mut state = PoolState::new(config.maximum);
        state.total = warm.len();
        for resource in warm {
            state.idle.push_back(resource);
        }
        tracing::debug!(
            resource_id = manager.id(),
            minimum = config.minimum,
            average = config.average,
            maximum = config.maximum,
            "Pool ready"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                manager,
                config,
                state: Mutex::new(state),
                available: Signal::new(),
                counters,
            }),
        })
    }

    /// The manager backing this pool.
    pub fn manager(&self) -> &M {
        &self.inner.manager
    }

    /// The configuration the pool was created with.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Acquire a resource, waiting up to `acquire_timeout` when exhausted.
    ///
    /// # Errors
    /// `Error::Timeout` when nothing became available in time,
    /// `Error::Create` when an on-demand creation failed, `Error::Closed`
    /// after [`shutdown`](Self::shutdown).
    pub fn acquire(&self) -> Result<Pooled<M>> {
        let start = Instant::now();
        let wait = match self.inner.config.acquire_timeout {
            Some(timeout) => Wait::after(start, timeout),
            None => Wait::Forever,
        };
        self.acquire_with(wait, start)
    }

    /// Acquire a resource, waiting at most `timeout` instead of the configured
    /// timeout. A zero `timeout` waits forever; use
    /// [`try_acquire`](Self::try_acquire) to not wait at all.
    ///
    /// # Errors
    /// Same as [`acquire`](Self::acquire).
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<Pooled<M>> {
        let start = Instant::now();
        self.acquire_with(Wait::after(start, timeout), start)
    }

    /// Acquire a resource without waiting. `Ok(None)` means the pool is exhausted.
    ///
    /// # Errors
    /// `Error::Create` when an on-demand creation failed, `Error::Closed`
    /// after [`shutdown`](Self::shutdown).
    pub fn try_acquire(&self) -> Result<Option<Pooled<M>>> {
        match self.checkout(Wait::Never)? {
            Checkout::Ready(resource) => Ok(Some(self.hand_out(resource))),
            Checkout::Exhausted { .. } => Ok(None),
        }
    }

    fn acquire_with(&self, wait: Wait, start: Instant) -> Result<Pooled<M>> {
        match self.checkout(wait)? {
            Checkout::Ready(resource) => Ok(self.hand_out(resource)),
            Checkout::Exhausted { total } => {
                self.inner.counters.record_timed_out();
                let waited_ms = start.elapsed().as_millis() as u64;
                tracing::warn!(
                    resource_id = self.inner.manager.id(),
                    waited_ms,
                    total,
                    "Timed out waiting for a resource"
                );
                Err(Error::Timeout {
                    resource_id: self.inner.manager.id().to_string(),
                    waited_ms,
                    total,
                    maximum: self.inner.config.maximum,
                })
            }
        }
    }

    fn hand_out(&self, resource: M::Resource) -> Pooled<M> {
        self.inner.counters.record_acquired();
        tracing::trace!(resource_id = self.inner.manager.id(), "Acquired resource");
        Pooled::new(self.clone(), resource)
    }

    fn checkout(&self, wait: Wait) -> Result<Checkout<M::Resource>> {
        let inner = &*self.inner;
        let id = inner.manager.id();
        let mut state = inner.state.lock();

        loop {
            if state.closed {
                return Err(Error::closed(id));
            }

            if let Some(entry) = state.pop_idle(inner.config.order) {
                tracing::trace!(
                    resource_id = id,
                    idle_ms = entry.created.elapsed().as_millis() as u64,
                    "Reusing idle resource"
                );
                let mut resource = entry.payload;
                if !inner.config.validate_on_acquire {
                    return Ok(Checkout::Ready(resource));
                }
                let checked =
                    MutexGuard::unlocked(&mut state, || inner.manager.check(&mut resource));
                match checked {
                    Ok(()) => return Ok(Checkout::Ready(resource)),
                    Err(e) => {
                        tracing::warn!(
                            resource_id = id,
                            error = %e,
                            "Idle resource failed health check, destroying"
                        );
                        MutexGuard::unlocked(&mut state, || inner.manager.destroy(resource));
                        inner.counters.record_destroyed(1);
                        state.total -= 1;
                        inner.available.notify_one();
                        continue;
                    }
                }
            }

            if state.total < inner.config.maximum {
                state.total += 1;
                let created = MutexGuard::unlocked(&mut state, || inner.manager.create());
                return match created {
                    Ok(resource) => {
                        inner.counters.record_created();
                        tracing::debug!(
                            resource_id = id,
                            total = state.total,
                            "Created resource on demand"
                        );
                        Ok(Checkout::Ready(resource))
                    }
                    Err(e) => {
                        state.total -= 1;
                        inner.available.notify_one();
                        tracing::warn!(resource_id = id, error = %e, "Failed to create resource");
                        Err(Error::create(id, e))
                    }
                };
            }

            let deadline = match wait {
                Wait::Never => return Ok(Checkout::Exhausted { total: state.total }),
                Wait::Until(deadline) => Some(deadline),
                Wait::Forever => None,
            };
            let outcome = inner.available.wait(&mut state, deadline);
            if outcome == WaitOutcome::TimedOut
                && !state.closed
                && state.idle.is_empty()
                && state.total >= inner.config.maximum
            {
                return Ok(Checkout::Exhausted { total: state.total });
            }
        }
    }

    /// Return a resource to the idle queue and run housekeeping.
    pub(crate) fn release_resource(&self, mut resource: M::Resource) -> Result<()> {
        let inner = &*self.inner;
        let id = inner.manager.id();

        if let Err(e) = inner.manager.recycle(&mut resource) {
            tracing::warn!(resource_id = id, error = %e, "Recycle failed, destroying resource");
            self.discard(resource);
            return Err(Error::recycle(id, e));
        }

        let mut state = inner.state.lock();
        if state.closed {
            drop(state);
            self.discard(resource);
            tracing::debug!(
                resource_id = id,
                "Released into a closed pool, resource destroyed"
            );
            return Ok(());
        }

        state.idle.push_back(resource);
        inner.counters.record_released();
        let handed_off = inner.available.notify_one();
        let plan = state.plan_housekeeping(&inner.config);
        drop(state);
        tracing::trace!(resource_id = id, handed_off, "Released resource");

        if let Err(e) = self.run_housekeeping(plan) {
            tracing::warn!(resource_id = id, error = %e, "Housekeeping after release failed");
        }
        Ok(())
    }

    /// Destroy a checked-out resource without returning it.
    pub(crate) fn invalidate_resource(&self, resource: M::Resource) {
        self.discard(resource);
        self.inner.counters.record_invalidated();
        tracing::debug!(resource_id = self.inner.manager.id(), "Invalidated resource");
    }

    /// Stop counting a checked-out resource the caller has taken ownership of.
    pub(crate) fn detach_resource(&self) {
        let mut state = self.inner.state.lock();
        state.total -= 1;
        let handed_off = self.inner.available.notify_one();
        drop(state);
        tracing::debug!(
            resource_id = self.inner.manager.id(),
            handed_off,
            "Detached resource from pool"
        );
    }

    /// Destroy a resource that is counted in `total` but not queued.
    fn discard(&self, resource: M::Resource) {
        let inner = &*self.inner;
        inner.manager.destroy(resource);
        inner.counters.record_destroyed(1);
        let mut state = inner.state.lock();
        state.total -= 1;
        // Capacity freed: a blocked acquirer may now create a replacement.
        inner.available.notify_one();
    }

    /// Run the grow/shrink pass now, e.g. from a timer.
    ///
    /// # Errors
    /// `Error::Closed` after shutdown, `Error::Create` when topping up to
    /// `minimum` failed. Resources created before the failure stay queued.
    pub fn maintain(&self) -> Result<Maintenance> {
        let plan = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(Error::closed(self.inner.manager.id()));
            }
            state.plan_housekeeping(&self.inner.config)
        };
        self.run_housekeeping(plan)
    }

    fn run_housekeeping(&self, plan: Housekeeping<M::Resource>) -> Result<Maintenance> {
        let inner = &*self.inner;
        let id = inner.manager.id();
        let mut report = Maintenance::default();
        if plan.is_empty() {
            return Ok(report);
        }

        if !plan.expired.is_empty() {
            let n = plan.expired.len();
            for resource in plan.expired {
                inner.manager.destroy(resource);
            }
            inner.counters.record_destroyed(n as u64);
            let mut state = inner.state.lock();
            state.total -= n;
            inner.available.notify_all();
            drop(state);
            report.destroyed = n;
            tracing::debug!(
                resource_id = id,
                destroyed = n,
                "Destroyed expired idle resources"
            );
        }

        for remaining in (1..=plan.grow).rev() {
            match inner.manager.create() {
                Ok(resource) => {
                    inner.counters.record_created();
                    let mut state = inner.state.lock();
                    if state.closed {
                        state.total -= remaining;
                        state.growing -= remaining;
                        drop(state);
                        inner.manager.destroy(resource);
                        inner.counters.record_destroyed(1);
                        return Ok(report);
                    }
                    state.growing -= 1;
                    state.idle.push_back(resource);
                    inner.available.notify_one();
                    report.created += 1;
                }
                Err(e) => {
                    let mut state = inner.state.lock();
                    state.total -= remaining;
                    state.growing -= remaining;
                    inner.available.notify_all();
                    drop(state);
                    tracing::warn!(
                        resource_id = id,
                        created = report.created,
                        error = %e,
                        "Failed to top up idle resources"
                    );
                    return Err(Error::create(id, e));
                }
            }
        }
        if report.created > 0 {
            tracing::debug!(
                resource_id = id,
                created = report.created,
                "Topped up idle resources"
            );
        }
        Ok(report)
    }

    /// Shut the pool down.
    ///
    /// Destroys every idle resource and wakes blocked acquirers, which fail
    /// with `Error::Closed`. Resources still checked out are destroyed when
    /// their guards are released or dropped. Returns how many idle resources
    /// were destroyed; calling it again returns 0.
    pub fn shutdown(&self) -> usize {
        let inner = &*self.inner;
        let (drained, woken) = {
            let mut state = inner.state.lock();
            if state.closed {
                return 0;
            }
            state.closed = true;
            let drained = state.idle.drain();
            let woken = inner.available.notify_all();
            (drained, woken)
        };

        let n = drained.len();
        for resource in drained {
            inner.manager.destroy(resource);
        }
        inner.counters.record_destroyed(n as u64);
        inner.state.lock().total -= n;
        tracing::debug!(
            resource_id = inner.manager.id(),
            destroyed = n,
            woken,
            "Pool shut down"
        );
        n
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let mut stats = {
            let state = self.inner.state.lock();
            PoolStats {
                total: state.total,
                idle: state.idle.len(),
                in_use: state.total - state.idle.len(),
                waiting: self.inner.available.waiting(),
                spare_slots: state.idle.spare(),
                ..Default::default()
            }
        };
        self.inner.counters.fill(&mut stats);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::from_fns;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("refused")]
    struct Refused;

    fn counting() -> impl Manager<Resource = u32, Error = Refused> {
        let next = AtomicU32::new(0);
        from_fns(
            "test",
            move || Ok::<_, Refused>(next.fetch_add(1, Ordering::SeqCst)),
            drop,
        )
    }

    #[test]
    fn acquire_returns_instance() {
        let pool = Pool::new(counting(), PoolConfig::new(1, 1, 2)).unwrap();
        let guard = pool.acquire().unwrap();
        assert_eq!(*guard, 0);
    }

    #[test]
    fn fifo_serves_oldest_idle_first() {
        let pool = Pool::new(counting(), PoolConfig::new(3, 3, 3)).unwrap();
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_eq!((*a, *b), (0, 1));

        // Queue is now [2]; returning a then b gives [2, 0, 1].
        a.release().unwrap();
        b.release().unwrap();
        let c = pool.try_acquire().unwrap().unwrap();
        let d = pool.try_acquire().unwrap().unwrap();
        let e = pool.try_acquire().unwrap().unwrap();
        assert_eq!([*c, *d, *e], [2, 0, 1]);
    }

    #[test]
    fn lifo_serves_newest_idle_first() {
        let config = PoolConfig::new(2, 2, 2).with_order(AcquireOrder::Lifo);
        let pool = Pool::new(counting(), config).unwrap();
        assert_eq!(*pool.acquire().unwrap(), 1);
    }

    #[test]
    fn try_acquire_does_not_wait() {
        let pool = Pool::new(counting(), PoolConfig::new(1, 1, 1)).unwrap();
        let held = pool.try_acquire().unwrap().expect("one idle resource");
        assert!(pool.try_acquire().unwrap().is_none());
        assert_eq!(pool.stats().timed_out, 0);
        drop(held);
        assert!(pool.try_acquire().unwrap().is_some());
    }

    #[test]
    fn closed_pool_rejects_acquire() {
        let pool = Pool::new(counting(), PoolConfig::new(1, 1, 1)).unwrap();
        assert_eq!(pool.shutdown(), 1);
        assert!(pool.is_closed());
        assert!(matches!(pool.acquire(), Err(Error::Closed { .. })));
        assert!(matches!(pool.maintain(), Err(Error::Closed { .. })));
        assert_eq!(pool.shutdown(), 0);
    }
}
