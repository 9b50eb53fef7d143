//! # Cistern Pool
//!
//! Blocking pool of expensive resources (database connections, sockets,
//! sessions) for thread-per-request servers.
//!
//! A [`Pool`] is elastic between three bounds: it keeps at least `minimum`
//! resources alive, lets surplus idle resources above `average` expire, and
//! never holds more than `maximum`. [`Pool::acquire`] blocks while the pool
//! is at `maximum` and nothing is idle. Resources come back through the
//! [`Pooled`] guard, either released for reuse or invalidated when they are
//! known to be broken.
//!
//! ```
//! use cistern_pool::{Pool, PoolConfig, from_fns};
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("refused")]
//! struct Refused;
//!
//! let manager = from_fns("demo", || Ok::<_, Refused>(String::from("conn")), drop);
//! let pool = Pool::new(manager, PoolConfig::new(1, 2, 4)).unwrap();
//!
//! let conn = pool.acquire().unwrap();
//! assert_eq!(conn.as_str(), "conn");
//! conn.release().unwrap();
//! ```

pub mod error;
pub mod guard;
pub mod manager;
pub mod pool;
pub mod refresh;
pub mod stats;

mod queue;
mod signal;

pub use error::{BoxError, Error, Result};
pub use guard::Pooled;
pub use manager::{FnManager, Manager, from_fns};
pub use pool::{AcquireOrder, Maintenance, Pool, PoolConfig};
pub use refresh::Refresher;
pub use stats::PoolStats;
