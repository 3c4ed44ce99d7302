//! Connection pooling for the GalenDARY backend using asupersync.
//!
//! - [`Pool`]: a bounded, lazily filled pool with FIFO waiters.
//! - [`ExecutionContext`] and [`ensure_pool`]: the shared pool slot and its
//!   create-or-recreate lifecycle.
//! - [`execute`]: run one statement on a pooled connection and release it.

pub mod executor;
pub mod manager;
pub mod pool;

pub use executor::execute;
pub use manager::{ConnectorPoolFactory, ExecutionContext, FactoryPool, PoolFactory, ensure_pool};
pub use pool::{DEFAULT_MAX_CONNECTIONS, Pool, PoolConfig, PoolStats, PooledConnection};
