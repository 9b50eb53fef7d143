//! Background keepalive for idle resources.
//!
//! Servers drop connections that sit idle for too long. A [`Refresher`]
//! periodically runs the pool's housekeeping pass and exercises one idle
//! resource with a caller-supplied keepalive (typically a trivial query).
//! A resource whose keepalive fails is invalidated so the next `acquire`
//! gets a fresh one.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::{Error, Result};
use crate::manager::Manager;
use crate::pool::Pool;

/// Handle to a running keepalive thread. Dropping it stops the thread.
#[derive(Debug)]
pub struct Refresher {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Refresher {
    /// Start refreshing `pool` every `interval`.
    ///
    /// # Errors
    /// `Error::Configuration` for a zero interval, `Error::Spawn` if the OS
    /// refused to start the thread.
    pub fn spawn<M, F>(pool: Pool<M>, interval: Duration, keepalive: F) -> Result<Self>
    where
        M: Manager,
        F: Fn(&mut M::Resource) -> std::result::Result<(), M::Error> + Send + 'static,
    {
        if interval.is_zero() {
            return Err(Error::configuration("refresh interval must be greater than zero"));
        }

        let name = format!("{}-refresh", pool.manager().id());
        let (shutdown, stopped) = channel::bounded::<()>(0);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run(&pool, interval, &stopped, &keepalive))
            .map_err(|source| Error::Spawn { name, source })?;

        Ok(Self {
            shutdown: Some(shutdown),
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(mut self) {
        self.stop_inner();
    }

    /// Whether the thread has exited, e.g. because the pool was shut down.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    fn stop_inner(&mut self) {
        // Disconnecting the channel wakes the select below.
        drop(self.shutdown.take());
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("Refresher thread panicked");
        }
    }
}

impl Drop for Refresher {
    fn drop(&mut self) {
        self.stop_inner();
    }
}

fn run<M, F>(pool: &Pool<M>, interval: Duration, stopped: &Receiver<()>, keepalive: &F)
where
    M: Manager,
    F: Fn(&mut M::Resource) -> std::result::Result<(), M::Error>,
{
    let id = pool.manager().id();
    let ticker = channel::tick(interval);
    tracing::debug!(resource_id = id, ?interval, "Refresher started");

    loop {
        crossbeam::select! {
            recv(ticker) -> _ => {
                if !refresh_once(pool, keepalive) {
                    break;
                }
            }
            recv(stopped) -> _ => break,
        }
    }
    tracing::debug!(resource_id = id, "Refresher stopped");
}

/// One refresh tick. Returns `false` once the pool is closed.
fn refresh_once<M, F>(pool: &Pool<M>, keepalive: &F) -> bool
where
    M: Manager,
    F: Fn(&mut M::Resource) -> std::result::Result<(), M::Error>,
{
    let id = pool.manager().id();
    match pool.maintain() {
        Ok(_) => {}
        Err(Error::Closed { .. }) => return false,
        Err(e) => tracing::warn!(resource_id = id, error = %e, "Refresh housekeeping failed"),
    }

    let mut resource = match pool.try_acquire() {
        Ok(Some(resource)) => resource,
        Ok(None) => {
            tracing::trace!(resource_id = id, "Pool exhausted, skipping keepalive");
            return true;
        }
        Err(Error::Closed { .. }) => return false,
        Err(e) => {
            tracing::warn!(resource_id = id, error = %e, "Refresh acquire failed");
            return true;
        }
    };

    match keepalive(&mut *resource) {
        Ok(()) => {
            if let Err(e) = resource.release() {
                tracing::warn!(
                    resource_id = id,
                    error = %e,
                    "Refreshed resource could not be recycled"
                );
            }
        }
        Err(e) => {
            tracing::warn!(resource_id = id, error = %e, "Keepalive failed, invalidating resource");
            resource.invalidate();
        }
    }
    true
}
