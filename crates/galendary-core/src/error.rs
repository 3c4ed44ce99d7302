//! Error taxonomy for the command backend.
//!
//! Every failure a caller can observe is one of the variants below. Nothing is
//! retried or recovered internally; errors travel back to the caller unchanged,
//! tagged only by the stage that produced them (see [`Error::stage`]).

use std::error::Error as StdError;
use std::fmt;

/// Result alias used across the workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The stage of request processing that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Resolving the command token.
    Dispatch,
    /// Reading or validating request parameters.
    Parameters,
    /// Attaching or recreating the connection pool.
    Pool,
    /// Checking a connection out of the pool.
    Acquire,
    /// Opening or talking to the database server.
    Connection,
    /// Executing a statement on the server.
    Statement,
    /// A handler-level refusal after a successful statement.
    Handler,
    /// Delivering an out-of-band notification.
    Notification,
    /// Static configuration.
    Config,
}

impl Stage {
    /// Stable lower-case name for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::Dispatch => "dispatch",
            Stage::Parameters => "parameters",
            Stage::Pool => "pool",
            Stage::Acquire => "acquire",
            Stage::Connection => "connection",
            Stage::Statement => "statement",
            Stage::Handler => "handler",
            Stage::Notification => "notification",
            Stage::Config => "config",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The main error type.
#[derive(Debug)]
pub enum Error {
    /// A required request field is absent.
    MissingParameter { name: String },
    /// A request field is present but unusable.
    InvalidParameter { name: String, reason: String },
    /// The command token is empty or missing.
    NoCommand,
    /// The command token is not in the known set.
    UnknownCommand(String),
    /// No execution context was supplied by the transport layer.
    InvalidContext(String),
    /// A freshly created pool was already closed.
    UnrecoverablePool(String),
    /// No connection could be checked out of the pool.
    Acquisition(PoolError),
    /// The server rejected a statement.
    Statement(StatementError),
    /// Connecting to or communicating with the server failed.
    Connection(ConnectionError),
    /// The server sent bytes this client cannot interpret.
    Protocol(String),
    /// A handler refused to produce a result.
    Rejected { command: String, message: String },
    /// The notification collaborator failed.
    Notification(String),
    /// Static configuration is invalid.
    Config(String),
}

impl Error {
    /// Shorthand for [`Error::MissingParameter`].
    pub fn missing(name: impl Into<String>) -> Self {
        Error::MissingParameter { name: name.into() }
    }

    /// Shorthand for [`Error::InvalidParameter`].
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::Rejected`].
    pub fn rejected(command: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Rejected {
            command: command.into(),
            message: message.into(),
        }
    }

    /// The stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            Error::MissingParameter { .. } | Error::InvalidParameter { .. } => Stage::Parameters,
            Error::NoCommand | Error::UnknownCommand(_) => Stage::Dispatch,
            Error::InvalidContext(_) | Error::UnrecoverablePool(_) => Stage::Pool,
            Error::Acquisition(_) => Stage::Acquire,
            Error::Statement(_) => Stage::Statement,
            Error::Connection(_) | Error::Protocol(_) => Stage::Connection,
            Error::Rejected { .. } => Stage::Handler,
            Error::Notification(_) => Stage::Notification,
            Error::Config(_) => Stage::Config,
        }
    }

    /// Whether the error came from the database server rather than from the
    /// request or from this process.
    pub fn is_database_error(&self) -> bool {
        matches!(self, Error::Statement(_))
    }

    /// Whether a connection that observed this error can no longer be reused.
    pub fn is_fatal_to_connection(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Protocol(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingParameter { name } => {
                write!(f, "event requires property \"{}\"", name)
            }
            Error::InvalidParameter { name, reason } => {
                write!(f, "invalid value for \"{}\": {}", name, reason)
            }
            Error::NoCommand => write!(f, "no command given"),
            Error::UnknownCommand(token) => write!(f, "invalid command: {}", token),
            Error::InvalidContext(msg) => write!(f, "invalid context: {}", msg),
            Error::UnrecoverablePool(msg) => write!(f, "unrecoverable pool error: {}", msg),
            Error::Acquisition(e) => write!(f, "{}", e),
            Error::Statement(e) => write!(f, "{}", e),
            Error::Connection(e) => write!(f, "{}", e),
            Error::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Error::Rejected { command, message } => write!(f, "{}: {}", command, message),
            Error::Notification(msg) => write!(f, "notification failed: {}", msg),
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Acquisition(e) => Some(e),
            Error::Statement(e) => Some(e),
            Error::Connection(e) => e
                .source
                .as_ref()
                .map(|s| s.as_ref() as &(dyn StdError + 'static)),
            _ => None,
        }
    }
}

impl From<PoolError> for Error {
    fn from(err: PoolError) -> Self {
        Error::Acquisition(err)
    }
}

impl From<StatementError> for Error {
    fn from(err: StatementError) -> Self {
        Error::Statement(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

/// Why a pool could not hand out a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolErrorKind {
    /// The pool was closed before or while waiting.
    Closed,
    /// The wait queue is full.
    QueueFull,
    /// Opening a new connection failed.
    Connect,
}

/// Connection checkout failure.
#[derive(Debug, Clone)]
pub struct PoolError {
    pub kind: PoolErrorKind,
    pub message: String,
}

impl PoolError {
    pub fn new(kind: PoolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to acquire connection: {}", self.message)
    }
}

impl StdError for PoolError {}

/// A server-side statement failure, including constraint violations and
/// `SIGNAL`s raised by stored procedures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementError {
    /// Server error number (e.g. 1062 for a duplicate key).
    pub code: u16,
    /// Five-character SQLSTATE.
    pub sql_state: String,
    pub message: String,
}

impl fmt::Display for StatementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ER {} ({}): {}", self.code, self.sql_state, self.message)
    }
}

impl StdError for StatementError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// TCP connect failed.
    Connect,
    /// The server refused the connection.
    Refused,
    /// The server rejected the credentials.
    Authentication,
    /// The peer went away mid-conversation.
    Disconnected,
    /// The server requires something this client does not support.
    Unsupported,
}

/// Failure while connecting to or talking with a server.
#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl ConnectionError {
    pub fn new(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection error: {}", self.message)
    }
}

impl StdError for ConnectionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn StdError + 'static))
    }
}
