//! GalenDARY command backend.
//!
//! `galendary` is the **facade crate**: it ties the request model, statement
//! rendering, the pool and the MySQL driver together behind one dispatcher.
//!
//! # Flow
//!
//! 1. A transport decodes a flat key/value [`Request`].
//! 2. [`Dispatcher::dispatch`] normalizes sentinel nulls, resolves the command
//!    token and runs exactly one handler.
//! 3. The handler pulls its fields, renders a statement and runs it through the
//!    [`ExecutionContext`]'s pool.
//! 4. The result comes back as a [`Payload`] or an [`Error`].
//!
//! # Example
//!
//! ```ignore
//! use galendary::prelude::*;
//!
//! let context = galendary::mysql_context(
//!     MySqlConfig::new().host("db").user("galendary").database("galendary"),
//!     PoolConfig::default(),
//! );
//! let dispatcher = Dispatcher::default();
//! let request = Request::new()
//!     .with("c", "verify_login")
//!     .with("username", "ann@example.com")
//!     .with("passhash", "5baa61e4c9b93f3f0682250b6cf8331b7ee68fd8");
//! let payload = dispatcher.dispatch(&cx, request, Some(&context)).await;
//! ```

pub mod command;
pub mod credentials;
pub mod dispatcher;
pub mod handlers;
pub mod payload;

pub use command::Command;
pub use dispatcher::Dispatcher;
pub use payload::Payload;

pub use galendary_core::{
    Connection, Connector, Cx, Error, NULL_SENTINEL, Outcome, Request, Row, StatementResult, Value,
};
pub use galendary_mysql::{MySqlConfig, MySqlConnector};
pub use galendary_notify::{DisabledNotifier, Notifier, SmtpConfig, SmtpNotifier};
pub use galendary_pool::{ConnectorPoolFactory, ExecutionContext, PoolConfig, PoolFactory};

/// Execution context backed by a MySQL pool.
pub type MySqlContext = ExecutionContext<ConnectorPoolFactory<MySqlConnector>>;

/// A context whose pool opens MySQL connections from `config`. No connection is
/// made until the first statement runs.
pub fn mysql_context(config: MySqlConfig, pool: PoolConfig) -> MySqlContext {
    ExecutionContext::new(ConnectorPoolFactory::new(MySqlConnector::new(config), pool))
}

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        Command, ConnectorPoolFactory, Cx, DisabledNotifier, Dispatcher, Error, ExecutionContext,
        MySqlConfig, MySqlConnector, MySqlContext, Notifier, Outcome, Payload, PoolConfig,
        PoolFactory, Request, SmtpConfig, SmtpNotifier, StatementResult, Value,
    };
}
