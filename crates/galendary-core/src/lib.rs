//! Core types and traits for the GalenDARY command backend.
//!
//! `galendary-core` is the **foundation layer** every other crate in the workspace
//! builds on.
//!
//! # Role In The Architecture
//!
//! - **Contract layer**: `Connection` and `Connector` are implemented by database
//!   drivers (`galendary-mysql`) and consumed by the pool and executor.
//! - **Data model**: `Value`, `Row` and `StatementResult` carry statement inputs and
//!   outputs; `Request` is the flat key/value command request.
//! - **Error taxonomy**: a single `Error` enum tags every failure with the stage
//!   that produced it.
//! - **Structured concurrency**: re-exports `Cx` and `Outcome` from asupersync so
//!   every database operation is cancel-correct.

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod error;
pub mod request;
pub mod row;
pub mod validate;
pub mod value;

pub use connection::{Connection, Connector};
pub use error::{
    ConnectionError, ConnectionErrorKind, Error, PoolError, PoolErrorKind, Result, Stage,
    StatementError,
};
pub use request::{NULL_SENTINEL, Request};
pub use row::{ColumnInfo, OkStatus, Row, StatementResult};
pub use validate::{EMAIL_PATTERN, is_email};
pub use value::Value;

/// Unwrap an `Outcome::Ok`, returning early from the enclosing async function on
/// any other variant.
///
/// `Outcome` has four variants, so `?` does not apply; this keeps call sites flat.
#[macro_export]
macro_rules! try_outcome {
    ($expr:expr) => {
        match $expr {
            $crate::Outcome::Ok(value) => value,
            $crate::Outcome::Err(err) => return $crate::Outcome::Err(err.into()),
            $crate::Outcome::Cancelled(reason) => return $crate::Outcome::Cancelled(reason),
            $crate::Outcome::Panicked(payload) => return $crate::Outcome::Panicked(payload),
        }
    };
}

/// Unwrap a `Result`, converting `Err` into `Outcome::Err` and returning early.
#[macro_export]
macro_rules! try_result {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(err) => return $crate::Outcome::Err(err.into()),
        }
    };
}
