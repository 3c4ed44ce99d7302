//! Errors that end a service run.

use std::error::Error as StdError;
use std::fmt;

/// Why the service stopped.
#[derive(Debug)]
pub enum ServerError {
    /// Reading requests or writing responses failed.
    Io {
        context: &'static str,
        source: std::io::Error,
    },
    /// Configuration could not be loaded or is invalid.
    Config(String),
    /// The backend failed outside of any single request.
    Backend(galendary::Error),
    /// A handler panicked; the supervisor restarts the service.
    HandlerPanicked(String),
    /// The async runtime could not be built.
    Runtime(String),
}

impl ServerError {
    pub fn io(context: &'static str, source: std::io::Error) -> Self {
        ServerError::Io { context, source }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Io { context, source } => write!(f, "{}: {}", context, source),
            ServerError::Config(msg) => write!(f, "configuration error: {}", msg),
            ServerError::Backend(e) => write!(f, "{}", e),
            ServerError::HandlerPanicked(msg) => write!(f, "handler panicked: {}", msg),
            ServerError::Runtime(msg) => write!(f, "runtime error: {}", msg),
        }
    }
}

impl StdError for ServerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ServerError::Io { source, .. } => Some(source),
            ServerError::Backend(e) => Some(e),
            _ => None,
        }
    }
}

impl From<galendary::Error> for ServerError {
    fn from(err: galendary::Error) -> Self {
        match err {
            galendary::Error::Config(msg) => ServerError::Config(msg),
            other => ServerError::Backend(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
