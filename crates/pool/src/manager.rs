//! Resource factory trait.
//!
//! A [`Manager`] tells the pool how to create, health-check, recycle and
//! destroy its resources. The manager value doubles as the context those
//! callbacks need (connection strings, credentials, counters).

use std::fmt;

/// Resource factory driven by [`Pool`](crate::Pool).
///
/// None of these methods are called with the pool lock held, so a slow
/// `create` only delays the caller that triggered it.
pub trait Manager: Send + Sync + 'static {
    /// The pooled resource.
    type Resource: Send + 'static;

    /// Error reported by `create`, `check` and `recycle`.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Label used in log events and errors (e.g. "mysql").
    fn id(&self) -> &str;

    /// Open a new resource. On failure, any partial work must already be
    /// cleaned up: `destroy` is never called for a resource that was not created.
    fn create(&self) -> Result<Self::Resource, Self::Error>;

    /// Health check, e.g. a ping. Used by `validate_on_acquire` and by the
    /// [`Refresher`](crate::Refresher).
    fn check(&self, _resource: &mut Self::Resource) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Prepare a released resource for reuse. A failure destroys the resource.
    fn recycle(&self, _resource: &mut Self::Resource) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Release everything the resource holds. Must not fail.
    fn destroy(&self, resource: Self::Resource) {
        drop(resource);
    }
}

type CreateFn<T, E> = Box<dyn Fn() -> Result<T, E> + Send + Sync>;
type CheckFn<T, E> = Box<dyn Fn(&mut T) -> Result<(), E> + Send + Sync>;
type DestroyFn<T> = Box<dyn Fn(T) + Send + Sync>;

/// [`Manager`] assembled from closures: a constructor, a destructor and an
/// optional validator.
pub struct FnManager<T, E> {
    id: String,
    create: CreateFn<T, E>,
    check: Option<CheckFn<T, E>>,
    destroy: DestroyFn<T>,
}

/// Build a [`FnManager`] from a constructor and a destructor.
pub fn from_fns<T, E, C, D>(id: impl Into<String>, create: C, destroy: D) -> FnManager<T, E>
where
    C: Fn() -> Result<T, E> + Send + Sync + 'static,
    D: Fn(T) + Send + Sync + 'static,
{
    FnManager {
        id: id.into(),
        create: Box::new(create),
        check: None,
        destroy: Box::new(destroy),
    }
}

impl<T, E> FnManager<T, E> {
    /// Attach a validator.
    pub fn with_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&mut T) -> Result<(), E> + Send + Sync + 'static,
    {
        self.check = Some(Box::new(check));
        self
    }
}

impl<T, E> fmt::Debug for FnManager<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnManager")
            .field("id", &self.id)
            .field("check", &self.check.is_some())
            .finish()
    }
}

impl<T, E> Manager for FnManager<T, E>
where
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    type Resource = T;
    type Error = E;

    fn id(&self) -> &str {
        &self.id
    }

    fn create(&self) -> Result<T, E> {
        (self.create)()
    }

    fn check(&self, resource: &mut T) -> Result<(), E> {
        match &self.check {
            Some(check) => check(resource),
            None => Ok(()),
        }
    }

    fn destroy(&self, resource: T) {
        (self.destroy)(resource);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("dead connection {0}")]
    struct Dead(u32);

    #[test]
    fn fn_manager_calls_closures() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&destroyed);
        let manager = from_fns(
            "conn",
            || Ok::<_, Dead>(7u32),
            move |_| {
                d.fetch_add(1, Ordering::SeqCst);
            },
        );

        assert_eq!(manager.id(), "conn");
        let mut conn = manager.create().unwrap();
        assert!(manager.check(&mut conn).is_ok());
        manager.destroy(conn);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fn_manager_uses_validator() {
        let manager = from_fns("conn", || Ok::<_, Dead>(3u32), drop)
            .with_check(|c: &mut u32| if *c % 2 == 0 { Ok(()) } else { Err(Dead(*c)) });

        let mut odd = manager.create().unwrap();
        let err = manager.check(&mut odd).unwrap_err();
        assert_eq!(err.to_string(), "dead connection 3");

        let mut even = 4;
        assert!(manager.check(&mut even).is_ok());
        assert!(format!("{manager:?}").contains("check: true"));
    }
}
