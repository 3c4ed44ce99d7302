//! Bounded connection pool.
//!
//! Connections are opened lazily through a [`Connector`] up to
//! `max_connections`. Callers that find the pool exhausted park in a FIFO queue
//! and are woken one at a time as connections come back. Closing the pool wakes
//! every waiter; each then fails with an acquisition error.

use std::collections::VecDeque;
use std::future::poll_fn;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Poll, Waker};

use asupersync::{Cx, Outcome};
use galendary_core::{Connection, Connector, Error, PoolError, PoolErrorKind};

/// Default upper bound on open connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// Pool sizing and checkout behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound on open connections. Zero is rejected.
    pub max_connections: usize,
    /// Waiters allowed in the queue before checkout fails fast. Zero means
    /// unlimited.
    pub queue_limit: usize,
    /// Ping idle connections before handing them out.
    pub test_on_acquire: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            queue_limit: 0,
            test_on_acquire: false,
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn queue_limit(mut self, limit: usize) -> Self {
        self.queue_limit = limit;
        self
    }

    pub fn test_on_acquire(mut self, enabled: bool) -> Self {
        self.test_on_acquire = enabled;
        self
    }

    /// Check the settings, returning a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("max_connections must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Successful checkouts.
    pub acquires: u64,
    /// Connections returned, whether re-idled or discarded.
    pub releases: u64,
    /// Connections opened.
    pub created: u64,
    /// Connections thrown away (broken, failed ping, or pool closed).
    pub discarded: u64,
    /// Connections sitting idle.
    pub idle: usize,
    /// Connections checked out or being opened.
    pub active: usize,
}

struct Waiter {
    ticket: u64,
    waker: Option<Waker>,
}

struct PoolState<C> {
    idle: Vec<C>,
    total: usize,
    closed: bool,
    waiters: VecDeque<Waiter>,
    next_ticket: u64,
    acquires: u64,
    releases: u64,
    created: u64,
    discarded: u64,
}

impl<C> PoolState<C> {
    fn wake_next(&mut self) {
        if let Some(waiter) = self.waiters.pop_front() {
            if let Some(waker) = waiter.waker {
                waker.wake();
            }
        }
    }

    fn wake_all(&mut self) {
        for waiter in self.waiters.drain(..) {
            if let Some(waker) = waiter.waker {
                waker.wake();
            }
        }
    }

    fn is_queued(&self, ticket: u64) -> bool {
        self.waiters.iter().any(|w| w.ticket == ticket)
    }
}

enum Step<C> {
    Ready(C),
    Create,
    Wait(u64),
    Fail(PoolError),
}

/// A bounded pool of connections opened by `K`.
pub struct Pool<K: Connector> {
    connector: Arc<K>,
    config: PoolConfig,
    state: Mutex<PoolState<K::Conn>>,
}

impl<K: Connector> Pool<K> {
    /// Create a pool. No connection is opened until the first checkout.
    ///
    /// A pool built from an invalid configuration starts out closed.
    pub fn new(connector: Arc<K>, config: PoolConfig) -> Arc<Self> {
        let closed = match config.validate() {
            Ok(()) => false,
            Err(reason) => {
                tracing::warn!(reason = %reason, "Invalid pool configuration, pool starts closed");
                true
            }
        };

        Arc::new(Self {
            connector,
            config,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                total: 0,
                closed,
                waiters: VecDeque::new(),
                next_ticket: 0,
                acquires: 0,
                releases: 0,
                created: 0,
                discarded: 0,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, PoolState<K::Conn>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn connector(&self) -> &K {
        &self.connector
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Close the pool.
    ///
    /// Idle connections are dropped, queued waiters fail, and connections still
    /// checked out are discarded when they come back.
    pub fn close(&self) {
        let idle = {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let idle = std::mem::take(&mut state.idle);
            state.total -= idle.len();
            state.discarded += idle.len() as u64;
            state.wake_all();
            idle
        };
        tracing::info!(dropped_idle = idle.len(), "Connection pool closed");
        drop(idle);
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.lock();
        PoolStats {
            acquires: state.acquires,
            releases: state.releases,
            created: state.created,
            discarded: state.discarded,
            idle: state.idle.len(),
            active: state.total - state.idle.len(),
        }
    }

    /// Check a connection out of the pool.
    ///
    /// Reuses an idle connection, opens a new one while under the limit, or
    /// waits for one to be released. Fails with [`Error::Acquisition`] if the
    /// pool is closed, the wait queue is full, or opening a connection fails.
    pub async fn acquire(self: &Arc<Self>, cx: &Cx) -> Outcome<PooledConnection<K>, Error> {
        // Held from the moment a ticket is queued until the turn it grants is
        // used; dropping it early hands the turn to the next waiter.
        let mut turn: Option<Queued<'_, K>> = None;
        loop {
            if let Some(reason) = cx.cancel_reason() {
                return Outcome::Cancelled(reason);
            }

            let step = {
                let mut state = self.lock();
                let step = self.next_step(&mut state);
                if let Some(turn) = turn.take() {
                    turn.settle(&mut state, matches!(step, Step::Fail(_)));
                }
                step
            };

            match step {
                Step::Ready(mut conn) => {
                    if self.config.test_on_acquire {
                        match conn.ping(cx).await {
                            Outcome::Ok(()) => {}
                            Outcome::Err(e) => {
                                tracing::debug!(error = %e, "Idle connection failed ping, discarding");
                                self.forget_slot();
                                drop(conn);
                                continue;
                            }
                            Outcome::Cancelled(r) => {
                                self.forget_slot();
                                return Outcome::Cancelled(r);
                            }
                            Outcome::Panicked(p) => {
                                self.forget_slot();
                                return Outcome::Panicked(p);
                            }
                        }
                    }
                    return Outcome::Ok(self.checkout(conn));
                }
                Step::Create => match self.connector.connect(cx).await {
                    Outcome::Ok(conn) => {
                        self.lock().created += 1;
                        tracing::debug!("Opened new pooled connection");
                        return Outcome::Ok(self.checkout(conn));
                    }
                    Outcome::Err(e) => {
                        self.forget_slot();
                        tracing::warn!(error = %e, "Failed to open pooled connection");
                        return Outcome::Err(Error::Acquisition(PoolError::new(
                            PoolErrorKind::Connect,
                            e.to_string(),
                        )));
                    }
                    Outcome::Cancelled(r) => {
                        self.forget_slot();
                        return Outcome::Cancelled(r);
                    }
                    Outcome::Panicked(p) => {
                        self.forget_slot();
                        return Outcome::Panicked(p);
                    }
                },
                Step::Wait(ticket) => {
                    let queued = Queued::new(self, ticket);
                    self.wait_turn(cx, ticket).await;
                    turn = Some(queued);
                }
                Step::Fail(e) => return Outcome::Err(Error::Acquisition(e)),
            }
        }
    }

    fn next_step(&self, state: &mut PoolState<K::Conn>) -> Step<K::Conn> {
        if state.closed {
            return Step::Fail(PoolError::new(PoolErrorKind::Closed, "pool is closed"));
        }
        if let Some(conn) = state.idle.pop() {
            return Step::Ready(conn);
        }
        if state.total < self.config.max_connections {
            state.total += 1;
            return Step::Create;
        }
        if self.config.queue_limit > 0 && state.waiters.len() >= self.config.queue_limit {
            return Step::Fail(PoolError::new(
                PoolErrorKind::QueueFull,
                format!("{} callers already waiting", state.waiters.len()),
            ));
        }

        // Enqueue while still holding the lock so a release cannot slip in
        // between the check and the wait.
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.waiters.push_back(Waiter {
            ticket,
            waker: None,
        });
        Step::Wait(ticket)
    }

    /// Park until `ticket` leaves the queue or the caller is cancelled.
    async fn wait_turn(&self, cx: &Cx, ticket: u64) {
        poll_fn(|task| {
            if cx.cancel_reason().is_some() {
                return Poll::Ready(());
            }
            let mut state = self.lock();
            match state.waiters.iter_mut().find(|w| w.ticket == ticket) {
                Some(waiter) => {
                    waiter.waker = Some(task.waker().clone());
                    Poll::Pending
                }
                None => Poll::Ready(()),
            }
        })
        .await;
    }

    fn checkout(self: &Arc<Self>, conn: K::Conn) -> PooledConnection<K> {
        self.lock().acquires += 1;
        PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(self),
            broken: false,
        }
    }

    /// Give up a reserved or checked-out slot without returning a connection.
    fn forget_slot(&self) {
        let mut state = self.lock();
        state.total -= 1;
        state.discarded += 1;
        state.wake_next();
    }

    fn release(&self, conn: K::Conn, broken: bool) {
        let discard = {
            let mut state = self.lock();
            state.releases += 1;
            let discard = if broken || state.closed || conn.is_broken() {
                state.total -= 1;
                state.discarded += 1;
                Some(conn)
            } else {
                state.idle.push(conn);
                None
            };
            state.wake_next();
            discard
        };
        if discard.is_some() {
            tracing::debug!("Discarded connection on release");
        }
    }
}

impl<K: Connector> std::fmt::Debug for Pool<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("Pool")
            .field("max_connections", &self.config.max_connections)
            .field("closed", &self.is_closed())
            .field("idle", &stats.idle)
            .field("active", &stats.active)
            .finish_non_exhaustive()
    }
}

/// A waiter's place in the queue.
///
/// Dropped while still queued, it leaves the queue. Dropped after a release
/// already dequeued it, the wakeup it received is passed to the next waiter.
struct Queued<'a, K: Connector> {
    pool: &'a Pool<K>,
    ticket: u64,
    armed: bool,
}

impl<'a, K: Connector> Queued<'a, K> {
    fn new(pool: &'a Pool<K>, ticket: u64) -> Self {
        Self {
            pool,
            ticket,
            armed: true,
        }
    }

    /// Consume the turn under the pool lock. `pass_on` is set when the turn
    /// did not lead to a checkout or a new place in the queue.
    fn settle(mut self, state: &mut PoolState<K::Conn>, pass_on: bool) {
        self.armed = false;
        Self::leave(state, self.ticket, pass_on);
    }

    fn leave(state: &mut PoolState<K::Conn>, ticket: u64, pass_on: bool) {
        if state.is_queued(ticket) {
            state.waiters.retain(|w| w.ticket != ticket);
        } else if pass_on {
            state.wake_next();
        }
    }
}

impl<K: Connector> Drop for Queued<'_, K> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.pool.lock();
            Self::leave(&mut state, self.ticket, true);
        }
    }
}

/// A connection checked out of a [`Pool`].
///
/// Returned to the pool exactly once, when dropped. Marking it broken makes the
/// pool discard it instead of re-idling it.
pub struct PooledConnection<K: Connector> {
    conn: Option<K::Conn>,
    pool: Arc<Pool<K>>,
    broken: bool,
}

impl<K: Connector> PooledConnection<K> {
    /// Have the pool discard this connection on release.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    pub fn pool(&self) -> &Arc<Pool<K>> {
        &self.pool
    }
}

impl<K: Connector> Deref for PooledConnection<K> {
    type Target = K::Conn;

    fn deref(&self) -> &K::Conn {
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("connection already returned to the pool"),
        }
    }
}

impl<K: Connector> DerefMut for PooledConnection<K> {
    fn deref_mut(&mut self) -> &mut K::Conn {
        match &mut self.conn {
            Some(conn) => conn,
            None => unreachable!("connection already returned to the pool"),
        }
    }
}

impl<K: Connector> Drop for PooledConnection<K> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, self.broken);
        }
    }
}

impl<K: Connector> std::fmt::Debug for PooledConnection<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("broken", &self.broken)
            .finish_non_exhaustive()
    }
}
