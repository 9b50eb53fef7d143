//! RAII guard for checked-out resources

use std::time::{Duration, Instant};

use crate::error::Result;
use crate::manager::Manager;
use crate::pool::Pool;

/// A resource checked out of a [`Pool`].
///
/// Dereferences to the resource. Dropping the guard releases the resource
/// back to the pool; use [`invalidate`](Self::invalidate) to destroy it
/// instead, or [`release`](Self::release) to observe recycle failures.
pub struct Pooled<M: Manager> {
    resource: Option<M::Resource>,
    pool: Pool<M>,
    acquired_at: Instant,
}

impl<M: Manager> Pooled<M> {
    pub(crate) fn new(pool: Pool<M>, resource: M::Resource) -> Self {
        Self {
            resource: Some(resource),
            pool,
            acquired_at: Instant::now(),
        }
    }

    /// Return the resource to the pool.
    ///
    /// # Errors
    /// `Error::Recycle` if the manager could not prepare the resource for
    /// reuse. The resource has been destroyed in that case.
    pub fn release(mut self) -> Result<()> {
        match self.resource.take() {
            Some(resource) => self.pool.release_resource(resource),
            None => Ok(()),
        }
    }

    /// Destroy the resource instead of returning it, e.g. after the peer
    /// dropped the connection. Frees its capacity for a replacement.
    pub fn invalidate(mut self) {
        if let Some(resource) = self.resource.take() {
            self.pool.invalidate_resource(resource);
        }
    }

    /// Take the resource out of the pool for good.
    ///
    /// The pool stops counting it and never destroys it; the caller owns it.
    #[must_use]
    pub fn detach(mut self) -> M::Resource {
        let resource = self
            .resource
            .take()
            .expect("resource already returned to pool");
        self.pool.detach_resource();
        resource
    }

    /// How long this guard has held the resource.
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    /// The pool this resource came from.
    pub fn pool(&self) -> &Pool<M> {
        &self.pool
    }
}

impl<M: Manager> std::ops::Deref for Pooled<M> {
    type Target = M::Resource;

    fn deref(&self) -> &M::Resource {
        self.resource
            .as_ref()
            .expect("resource already returned to pool")
    }
}

impl<M: Manager> std::ops::DerefMut for Pooled<M> {
    fn deref_mut(&mut self) -> &mut M::Resource {
        self.resource
            .as_mut()
            .expect("resource already returned to pool")
    }
}

impl<M: Manager> Drop for Pooled<M> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take()
            && let Err(e) = self.pool.release_resource(resource)
        {
            tracing::warn!(
                resource_id = self.pool.manager().id(),
                error = %e,
                "Dropped resource could not be recycled"
            );
        }
    }
}

impl<M: Manager> std::fmt::Debug for Pooled<M>
where
    M::Resource: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pooled")
            .field("resource", &self.resource)
            .field("held_for", &self.held_for())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::from_fns;
    use crate::pool::PoolConfig;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("unreachable")]
    struct Never;

    fn string_pool(
        destroyed: Arc<AtomicUsize>,
    ) -> Pool<impl Manager<Resource = String, Error = Never>> {
        let manager = from_fns(
            "strings",
            || Ok::<_, Never>(String::from("hello")),
            move |_| {
                destroyed.fetch_add(1, Ordering::SeqCst);
            },
        );
        Pool::new(manager, PoolConfig::new(1, 1, 2)).unwrap()
    }

    #[test]
    fn guard_deref() {
        let pool = string_pool(Arc::default());
        let guard = pool.acquire().unwrap();
        assert_eq!(guard.as_str(), "hello");
    }

    #[test]
    fn guard_deref_mut() {
        let pool = string_pool(Arc::default());
        let mut guard = pool.acquire().unwrap();
        guard.push_str(" world");
        assert_eq!(*guard, "hello world");
    }

    #[test]
    fn guard_drop_returns_to_pool() {
        let pool = string_pool(Arc::default());
        let guard = pool.acquire().unwrap();
        assert_eq!(pool.stats().in_use, 1);
        drop(guard);
        let stats = pool.stats();
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.released, 1);
    }

    #[test]
    fn invalidate_destroys_resource() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let pool = string_pool(Arc::clone(&destroyed));
        pool.acquire().unwrap().invalidate();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        let stats = pool.stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.invalidated, 1);
    }

    #[test]
    fn detach_hands_ownership_to_caller() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let pool = string_pool(Arc::clone(&destroyed));
        let owned: String = pool.acquire().unwrap().detach();
        assert_eq!(owned, "hello");
        assert_eq!(pool.stats().total, 0);
        drop(pool);
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
    }
}
