//! Pool exhaustion and recovery tests

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use cistern_pool::{Error, Manager, Pool, PoolConfig};

#[derive(Debug, thiserror::Error)]
#[error("unreachable")]
struct Never;

#[derive(Default)]
struct Counting {
    created: Arc<AtomicU32>,
}

impl Manager for Counting {
    type Resource = u32;
    type Error = Never;

    fn id(&self) -> &str {
        "test-pool"
    }

    fn create(&self) -> Result<u32, Never> {
        Ok(self.created.fetch_add(1, Ordering::SeqCst))
    }
}

fn pool(maximum: usize, timeout: Option<Duration>) -> Pool<Counting> {
    let config = PoolConfig {
        acquire_timeout: timeout,
        ..PoolConfig::new(1, 1, maximum)
    };
    Pool::new(Counting::default(), config).unwrap()
}

#[test]
fn pool_exhaustion_returns_timeout() {
    let pool = pool(2, Some(Duration::from_millis(100)));

    let _r1 = pool.acquire().expect("first acquire should succeed");
    let _r2 = pool.acquire().expect("second acquire should succeed");
    let before = pool.stats();

    let started = Instant::now();
    let err = pool.acquire().expect_err("third acquire should time out");
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(100), "failed early after {waited:?}");
    assert!(
        waited < Duration::from_millis(100) + Duration::from_millis(500),
        "overshot the deadline: {waited:?}"
    );
    assert!(
        matches!(err, Error::Timeout { total: 2, maximum: 2, .. }),
        "expected Timeout, got: {err:?}"
    );
    assert!(err.is_retryable());

    let after = pool.stats();
    assert_eq!((after.total, after.idle), (before.total, before.idle));
    assert_eq!(after.timed_out, 1);
}

#[test]
fn release_unblocks_waiter() {
    let pool = pool(2, Some(Duration::from_secs(5)));
    let r1 = pool.acquire().unwrap();
    let _r2 = pool.acquire().unwrap();

    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.acquire().map(|r| *r))
    };
    while pool.stats().waiting == 0 {
        thread::sleep(Duration::from_millis(1));
    }

    let first = *r1;
    drop(r1);
    let got = waiter.join().unwrap().expect("waiter should get the released resource");
    assert_eq!(got, first);
    assert_eq!(pool.stats().created, 2);
}

#[test]
fn invalidate_unblocks_waiter_with_fresh_resource() {
    let pool = pool(2, Some(Duration::from_secs(5)));
    let r1 = pool.acquire().unwrap();
    let _r2 = pool.acquire().unwrap();

    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.acquire().map(|r| *r))
    };
    while pool.stats().waiting == 0 {
        thread::sleep(Duration::from_millis(1));
    }

    r1.invalidate();
    let got = waiter.join().unwrap().expect("waiter should get a new resource");
    assert_eq!(got, 2);
    let stats = pool.stats();
    assert_eq!(stats.created, 3);
    assert_eq!(stats.destroyed, 1);
    assert!(stats.total <= 2);
}

#[test]
fn no_timeout_waits_until_release() {
    let pool = pool(1, None);
    let held = pool.acquire().unwrap();

    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.acquire().is_ok())
    };
    thread::sleep(Duration::from_millis(100));
    assert!(!waiter.is_finished());

    drop(held);
    assert!(waiter.join().unwrap());
}

#[test]
fn shutdown_wakes_waiters_with_closed() {
    let pool = pool(1, None);
    let held = pool.acquire().unwrap();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let pool = pool.clone();
            thread::spawn(move || pool.acquire().map(|_| ()))
        })
        .collect();
    while pool.stats().waiting < 3 {
        thread::sleep(Duration::from_millis(1));
    }

    pool.shutdown();
    for waiter in waiters {
        let err = waiter.join().unwrap().unwrap_err();
        assert!(matches!(err, Error::Closed { .. }), "got {err:?}");
    }

    // The straggler is destroyed on release instead of queued.
    held.release().unwrap();
    let stats = pool.stats();
    assert_eq!(stats.total, 0);
    assert_eq!(stats.idle, 0);
}

#[test]
fn try_acquire_on_exhausted_pool_returns_none() {
    let pool = pool(1, Some(Duration::from_secs(5)));
    let _held = pool.acquire().unwrap();

    let started = Instant::now();
    assert!(pool.try_acquire().unwrap().is_none());
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn acquire_timeout_overrides_config() {
    let pool = pool(1, None);
    let _held = pool.acquire().unwrap();

    let err = pool.acquire_timeout(Duration::from_millis(50)).unwrap_err();
    assert!(matches!(err, Error::Timeout { maximum: 1, .. }));
}

#[test]
fn pool_reuses_after_drop() {
    let pool = pool(1, Some(Duration::from_secs(1)));
    {
        let _r1 = pool.acquire().unwrap();
    }
    let _r2 = pool.acquire().expect("should reuse after drop");

    let stats = pool.stats();
    assert_eq!(stats.acquired, 2);
    assert_eq!(stats.created, 1);
}

#[test]
fn unrepresentable_timeout_waits_forever() {
    let pool = pool(1, Some(Duration::MAX));
    let held = pool.acquire().expect("huge configured timeout on a free pool");

    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.acquire_timeout(Duration::from_secs(u64::MAX)).map(|r| *r))
    };
    while pool.stats().waiting == 0 {
        thread::sleep(Duration::from_millis(1));
    }

    let first = *held;
    drop(held);
    assert_eq!(waiter.join().unwrap().unwrap(), first);
}

#[test]
fn zero_timeout_waits_until_release() {
    let pool = pool(1, Some(Duration::ZERO));
    let held = pool.acquire().unwrap();

    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.acquire().map(|r| *r))
    };
    while pool.stats().waiting == 0 {
        thread::sleep(Duration::from_millis(1));
    }
    // Still parked well past a zero deadline.
    thread::sleep(Duration::from_millis(50));
    assert!(!waiter.is_finished());

    let first = *held;
    drop(held);
    assert_eq!(waiter.join().unwrap().unwrap(), first);
    assert_eq!(pool.stats().timed_out, 0);
}
