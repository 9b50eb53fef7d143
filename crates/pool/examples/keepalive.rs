//! Keepalive example
//!
//! Simulates a database whose server closes sessions after a few pings and
//! keeps a small pool of sessions healthy with a background [`Refresher`].
//!
//! Run with `RUST_LOG=cistern_pool=debug` to see the pool's housekeeping.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use cistern_pool::{Manager, Pool, PoolConfig, Refresher};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum DbError {
    #[error("server has gone away (session {0})")]
    GoneAway(usize),
}

#[derive(Debug)]
struct Session {
    id: usize,
    queries: usize,
}

impl Session {
    fn ping(&mut self) -> Result<(), DbError> {
        self.queries += 1;
        if self.queries > 5 {
            return Err(DbError::GoneAway(self.id));
        }
        Ok(())
    }
}

/// Opens simulated sessions against `host`.
struct Database {
    host: String,
    next: AtomicUsize,
}

impl Manager for Database {
    type Resource = Session;
    type Error = DbError;

    fn id(&self) -> &str {
        &self.host
    }

    fn create(&self) -> Result<Session, DbError> {
        // Simulate connection setup
        thread::sleep(Duration::from_millis(20));
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        tracing::info!(session = id, host = %self.host, "Opened session");
        Ok(Session { id, queries: 0 })
    }

    fn check(&self, session: &mut Session) -> Result<(), DbError> {
        session.ping()
    }

    fn destroy(&self, session: Session) {
        tracing::info!(session = session.id, queries = session.queries, "Closed session");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Keepalive Pool Example ===\n");

    let config = PoolConfig::new(2, 3, 5)
        .with_expiration(Duration::from_millis(300))
        .with_acquire_timeout(Some(Duration::from_secs(2)))
        .with_validate_on_acquire(true);
    let database = Database {
        host: "db.local".to_string(),
        next: AtomicUsize::new(0),
    };
    let pool = Pool::new(database, config)?;
    println!("Pool ready: {:?}\n", pool.stats());

    let refresher = Refresher::spawn(pool.clone(), Duration::from_millis(100), Session::ping)?;

    // A burst of workers grows the pool past its average.
    let workers: Vec<_> = (0..5)
        .map(|worker| {
            let pool = pool.clone();
            thread::spawn(move || -> cistern_pool::Result<()> {
                for _ in 0..3 {
                    let mut session = pool.acquire()?;
                    if session.ping().is_err() {
                        session.invalidate();
                        continue;
                    }
                    println!("worker {worker} used session {}", session.id);
                    thread::sleep(Duration::from_millis(30));
                }
                Ok(())
            })
        })
        .collect();
    for worker in workers {
        if let Err(e) = worker.join().expect("worker panicked") {
            println!("worker failed: {e}");
        }
    }
    println!("\nAfter burst: {:?}", pool.stats());

    // Let the refresher expire the surplus and replace dead sessions.
    thread::sleep(Duration::from_secs(1));
    println!("After idle: {:?}", pool.stats());

    refresher.stop();
    let destroyed = pool.shutdown();
    println!("\nShut down, {destroyed} idle sessions closed");
    Ok(())
}
