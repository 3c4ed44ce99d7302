//! Database connection traits.
//!
//! Drivers implement [`Connection`] for a live session and [`Connector`] for the
//! fixed recipe that opens new sessions. The pool only ever talks to these two
//! traits, so tests can substitute in-memory implementations.

use std::future::Future;

use asupersync::{Cx, Outcome};

use crate::error::Error;
use crate::row::StatementResult;

/// A live database session.
///
/// A connection is used by one statement at a time; the pool hands it out
/// exclusively, hence `&mut self`.
pub trait Connection: Send + 'static {
    /// Execute one rendered statement and collect every result it produces.
    fn query(
        &mut self,
        cx: &Cx,
        sql: &str,
    ) -> impl Future<Output = Outcome<StatementResult, Error>> + Send;

    /// Round-trip to the server without running a statement.
    fn ping(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Whether the session saw an unrecoverable I/O or protocol failure and must
    /// not be handed out again.
    fn is_broken(&self) -> bool {
        false
    }

    /// Politely end the session.
    fn close(self, cx: &Cx) -> impl Future<Output = crate::Result<()>> + Send;
}

/// Opens new connections from static configuration.
pub trait Connector: Send + Sync + 'static {
    type Conn: Connection;

    fn connect(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Conn, Error>> + Send;
}
