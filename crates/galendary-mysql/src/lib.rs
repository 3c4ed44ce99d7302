//! MySQL driver for the GalenDARY backend.
//!
//! Implements the client side of the MySQL wire protocol directly on asupersync's
//! TCP primitives:
//!
//! - Packet framing with sequence ids and continuation packets
//! - Login with `mysql_native_password` or `caching_sha2_password` (fast path)
//! - The text query protocol, including multi-result `CALL` responses
//! - `COM_PING` health checks and `COM_QUIT` on close

pub mod auth;
pub mod config;
pub mod connection;
pub mod connector;
pub mod protocol;

pub use config::MySqlConfig;
pub use connection::MySqlConnection;
pub use connector::MySqlConnector;
