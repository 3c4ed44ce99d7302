//! Execution context and pool lifecycle.
//!
//! The execution context is the long-lived state shared by every request: a
//! slot holding at most one pool, the factory that builds pools, and the time the
//! current request started. [`ensure_pool`] is the only way the slot changes.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use galendary_core::{Connector, Error};

use crate::pool::{Pool, PoolConfig};

/// Builds pools from fixed connection configuration.
pub trait PoolFactory: Send + Sync + 'static {
    type Connector: Connector;

    /// Build a fresh pool. Building never opens a connection.
    fn create_pool(&self) -> Arc<Pool<Self::Connector>>;
}

/// The usual factory: one shared connector plus pool settings.
#[derive(Debug)]
pub struct ConnectorPoolFactory<K> {
    connector: Arc<K>,
    config: PoolConfig,
}

impl<K: Connector> ConnectorPoolFactory<K> {
    pub fn new(connector: K, config: PoolConfig) -> Self {
        Self {
            connector: Arc::new(connector),
            config,
        }
    }

    pub fn connector(&self) -> &K {
        &self.connector
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl<K: Connector> PoolFactory for ConnectorPoolFactory<K> {
    type Connector = K;

    fn create_pool(&self) -> Arc<Pool<K>> {
        Pool::new(Arc::clone(&self.connector), self.config.clone())
    }
}

/// Pool shorthand for a factory's connector.
pub type FactoryPool<F> = Pool<<F as PoolFactory>::Connector>;

struct Shared<F: PoolFactory> {
    factory: F,
    slot: RwLock<Option<Arc<FactoryPool<F>>>>,
}

/// State shared across requests, plus the start time of one request.
///
/// Cloning shares the pool slot. [`ExecutionContext::for_request`] shares the
/// slot and restarts the clock.
pub struct ExecutionContext<F: PoolFactory> {
    shared: Arc<Shared<F>>,
    begin: Instant,
}

impl<F: PoolFactory> ExecutionContext<F> {
    /// A context with an empty pool slot.
    pub fn new(factory: F) -> Self {
        Self {
            shared: Arc::new(Shared {
                factory,
                slot: RwLock::new(None),
            }),
            begin: Instant::now(),
        }
    }

    /// A context for a new request, sharing this one's pool slot.
    pub fn for_request(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            begin: Instant::now(),
        }
    }

    pub fn factory(&self) -> &F {
        &self.shared.factory
    }

    /// The pool currently attached, if any.
    pub fn current_pool(&self) -> Option<Arc<FactoryPool<F>>> {
        self.shared
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn begin(&self) -> Instant {
        self.begin
    }

    /// Time since the request started.
    pub fn elapsed(&self) -> Duration {
        self.begin.elapsed()
    }

    fn replace_pool(&self, pool: Arc<FactoryPool<F>>) {
        *self
            .shared
            .slot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(pool);
    }
}

impl<F: PoolFactory> Clone for ExecutionContext<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            begin: self.begin,
        }
    }
}

impl<F: PoolFactory> std::fmt::Debug for ExecutionContext<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("pool", &self.current_pool())
            .field("elapsed", &self.elapsed())
            .finish_non_exhaustive()
    }
}

/// Make sure the context holds an open pool and return it.
///
/// Builds a pool when none is attached or the attached one is closed. A second
/// call with a healthy pool returns the same pool. Racing recreations are
/// last-writer-wins; the losing pool is simply dropped once unused.
pub fn ensure_pool<F: PoolFactory>(
    context: Option<&ExecutionContext<F>>,
) -> Result<Arc<FactoryPool<F>>, Error> {
    let Some(context) = context else {
        return Err(Error::InvalidContext(
            "execution context must be supplied".to_string(),
        ));
    };

    if let Some(pool) = context.current_pool() {
        if !pool.is_closed() {
            return Ok(pool);
        }
        tracing::info!("Terminating old, closed pool");
    }

    tracing::info!("Creating connection pool");
    let pool = context.factory().create_pool();
    context.replace_pool(Arc::clone(&pool));

    if pool.is_closed() {
        return Err(Error::UnrecoverablePool(
            "failed to reopen connection pool".to_string(),
        ));
    }
    Ok(pool)
}
