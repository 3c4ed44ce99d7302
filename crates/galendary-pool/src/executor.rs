//! Statement execution against the context's pool.

use asupersync::{Cx, Outcome};
use galendary_core::{Connection, Error, StatementResult};
use galendary_query::Statement;

use crate::manager::{ExecutionContext, PoolFactory, ensure_pool};

/// Run one statement on a pooled connection.
///
/// The connection is released before this returns, on success and on failure
/// alike. A connection that fails at the I/O or protocol level is discarded
/// instead of going back to the idle set. Nothing is retried.
#[tracing::instrument(level = "debug", skip_all, fields(kind = statement.kind().as_str()))]
pub async fn execute<F: PoolFactory>(
    cx: &Cx,
    statement: &Statement,
    context: Option<&ExecutionContext<F>>,
) -> Outcome<StatementResult, Error> {
    let pool = match ensure_pool(context) {
        Ok(pool) => pool,
        Err(e) => return Outcome::Err(e),
    };

    let mut conn = match pool.acquire(cx).await {
        Outcome::Ok(conn) => conn,
        Outcome::Err(e) => {
            tracing::warn!(error = %e, "Could not acquire connection");
            return Outcome::Err(e);
        }
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };

    let outcome = conn.query(cx, statement.sql()).await;
    if let Outcome::Err(e) = &outcome {
        if e.is_fatal_to_connection() {
            conn.mark_broken();
        }
    }
    drop(conn);

    if let Some(context) = context {
        let elapsed_ms = context.elapsed().as_millis();
        match &outcome {
            Outcome::Ok(_) => tracing::debug!(elapsed_ms, "Executed statement"),
            Outcome::Err(e) => tracing::debug!(elapsed_ms, error = %e, "Statement failed"),
            _ => {}
        }
    }
    outcome
}
