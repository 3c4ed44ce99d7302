//! One handler per command.
//!
//! Handlers pull their fields from the request first and only then render and
//! run a statement, so a missing field never reaches the database. Composed
//! handlers run their statements one after another and stop at the first error.

use asupersync::{Cx, Outcome};
use galendary_core::{Error, Request, StatementResult, Value};
use galendary_pool::{ExecutionContext, PoolFactory, execute};
use galendary_query::Statement;

pub mod accounts;
pub mod entries;
pub mod groups;
pub mod membership;
pub mod related;

/// Everything a handler needs for one request.
pub struct Call<'a, F: PoolFactory> {
    pub cx: &'a Cx,
    pub request: &'a Request,
    pub context: Option<&'a ExecutionContext<F>>,
}

impl<'a, F: PoolFactory> Call<'a, F> {
    pub fn new(cx: &'a Cx, request: &'a Request, context: Option<&'a ExecutionContext<F>>) -> Self {
        Self {
            cx,
            request,
            context,
        }
    }

    /// Render `template` with `params` and run it.
    pub async fn run(&self, template: &str, params: &[Value]) -> Outcome<StatementResult, Error> {
        let statement = Statement::new(template, params);
        tracing::trace!(sql = %statement, "Rendered statement");
        execute(self.cx, &statement, self.context).await
    }

    pub fn require(&self, name: &str) -> Result<Value, Error> {
        self.request.require(name)
    }

    pub fn require_int(&self, name: &str) -> Result<Value, Error> {
        self.request.require_int(name)
    }

    pub fn optional(&self, name: &str) -> Value {
        self.request.optional(name)
    }
}

/// Pull several required fields in order, stopping at the first missing one.
pub(crate) fn require_all<F: PoolFactory>(
    call: &Call<'_, F>,
    names: &[&str],
) -> Result<Vec<Value>, Error> {
    names.iter().map(|name| call.require(name)).collect()
}

/// The named column of the first row of the first result set.
pub(crate) fn first_cell<'r>(result: &'r StatementResult, column: &str) -> Option<&'r Value> {
    result.first_row().and_then(|row| row.get(column))
}

/// Health probe.
pub async fn test<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<crate::Payload, Error> {
    let result = galendary_core::try_outcome!(call.run("SELECT 1 AS ok", &[]).await);
    match first_cell(&result, "ok").and_then(Value::as_i64) {
        Some(1) => Outcome::Ok(crate::Payload::Health { database: "up" }),
        _ => Outcome::Err(Error::rejected("test", "database health probe returned no row")),
    }
}
