//! Statement rendering for the GalenDARY backend.
//!
//! The backend's statements are fixed templates with `?` placeholders. This crate
//! renders them into complete SQL text with MySQL escaping, the way a
//! client-side "format" helper does for drivers that speak the text protocol.

pub mod format;
pub mod statement;

pub use format::{escape_identifier, escape_string, escape_value, format};
pub use statement::{Statement, StatementKind};
