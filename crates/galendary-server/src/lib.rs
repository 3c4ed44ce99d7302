//! Process wrapper around the GalenDARY dispatcher.
//!
//! Reads JSON requests from stdin, answers on stdout and restarts itself after
//! failures.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod mail;
pub mod service;
pub mod supervisor;
pub mod transport;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use supervisor::{Exit, Supervisor};
