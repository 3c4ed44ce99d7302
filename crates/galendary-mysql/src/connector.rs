//! Opens [`MySqlConnection`]s from a fixed configuration.

use std::future::Future;

use asupersync::{Cx, Outcome};
use galendary_core::{Connector, Error};

use crate::config::MySqlConfig;
use crate::connection::MySqlConnection;

/// The static recipe the pool uses to open new sessions.
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    config: MySqlConfig,
}

impl MySqlConnector {
    pub fn new(config: MySqlConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MySqlConfig {
        &self.config
    }
}

impl Connector for MySqlConnector {
    type Conn = MySqlConnection;

    fn connect(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Conn, Error>> + Send {
        tracing::debug!(
            host = %self.config.host,
            port = self.config.port,
            database = ?self.config.database,
            "Opening MySQL connection"
        );
        MySqlConnection::connect(cx, self.config.clone())
    }
}
