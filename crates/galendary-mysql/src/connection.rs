//! Async MySQL connection over asupersync TCP.
//!
//! Speaks the text protocol only: statements arrive fully rendered, so there is
//! no need for server-side prepared statements. Multi-results are enabled so
//! `CALL` can return its result sets followed by the final status.

// Allow `impl Future` return types in trait methods
#![allow(clippy::manual_async_fn)]
// The Error type carries full context
#![allow(clippy::result_large_err)]

use std::future::Future;

use asupersync::io::{AsyncRead, AsyncWrite, ReadBuf};
use asupersync::net::TcpStream;
use asupersync::{Cx, Outcome};

use galendary_core::{
    ColumnInfo, Connection, ConnectionError, ConnectionErrorKind, Error, Row, StatementResult,
    try_outcome, try_result,
};

use crate::auth::{AuthPlugin, FAST_AUTH_SUCCESS, PERFORM_FULL_AUTHENTICATION};
use crate::config::MySqlConfig;
use crate::protocol::{
    AUTH_MORE_DATA_HEADER, ColumnDefinition, EOF_HEADER, ERR_HEADER, Handshake,
    HandshakeResponse, LOCAL_INFILE_HEADER, OK_HEADER, PacketFramer, PacketReader, ProtocolError,
    capabilities, command, eof_status, is_eof, parse_err, parse_ok, parse_text_row, status,
    frame,
};

/// Async MySQL connection.
pub struct MySqlConnection {
    stream: TcpStream,
    config: MySqlConfig,
    framer: PacketFramer,
    read_buf: Vec<u8>,
    seq: u8,
    connection_id: u32,
    server_version: String,
    server_status: u16,
    broken: bool,
}

impl std::fmt::Debug for MySqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlConnection")
            .field("connection_id", &self.connection_id)
            .field("server_version", &self.server_version)
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("database", &self.config.database)
            .field("broken", &self.broken)
            .finish_non_exhaustive()
    }
}

impl MySqlConnection {
    /// Open a TCP connection and log in.
    pub async fn connect(cx: &Cx, config: MySqlConfig) -> Outcome<Self, Error> {
        let socket_addr = try_result!(config.resolve());

        let stream = match TcpStream::connect_timeout(socket_addr, config.connect_timeout).await {
            Ok(s) => s,
            Err(e) => {
                let kind = if e.kind() == std::io::ErrorKind::ConnectionRefused {
                    ConnectionErrorKind::Refused
                } else {
                    ConnectionErrorKind::Connect
                };
                return Outcome::Err(Error::Connection(
                    ConnectionError::new(
                        kind,
                        format!("Failed to connect to {}: {}", config.socket_addr(), e),
                    )
                    .with_source(e),
                ));
            }
        };

        stream.set_nodelay(true).ok();

        let framer = PacketFramer::with_max_size(config.max_packet_size as usize);
        let mut conn = Self {
            stream,
            config,
            framer,
            read_buf: vec![0u8; 8192],
            seq: 0,
            connection_id: 0,
            server_version: String::new(),
            server_status: 0,
            broken: false,
        };

        try_outcome!(conn.handshake(cx).await);
        tracing::debug!(
            connection_id = conn.connection_id,
            server_version = %conn.server_version,
            "MySQL connection established"
        );
        Outcome::Ok(conn)
    }

    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Status flags from the most recent OK or EOF packet.
    pub fn server_status(&self) -> u16 {
        self.server_status
    }

    // ==================== Login ====================

    async fn handshake(&mut self, cx: &Cx) -> Outcome<(), Error> {
        let payload = try_outcome!(self.read_payload(cx).await);
        if payload.first() == Some(&ERR_HEADER) {
            let err = try_result!(self.decode(parse_err(&payload)));
            return Outcome::Err(connection_error(ConnectionErrorKind::Refused, err.message));
        }

        let handshake = try_result!(self.decode(Handshake::parse(&payload)));
        if handshake.capabilities & capabilities::CLIENT_PROTOCOL_41 == 0 {
            return Outcome::Err(connection_error(
                ConnectionErrorKind::Unsupported,
                "server does not speak protocol 4.1",
            ));
        }
        self.connection_id = handshake.connection_id;
        self.server_version = handshake.server_version.clone();

        let plugin =
            AuthPlugin::from_name(&handshake.auth_plugin).unwrap_or(AuthPlugin::NativePassword);
        let password = self.config.password.clone().unwrap_or_default();
        let auth_response = plugin.scramble(&password, &handshake.auth_data);
        let caps = self.config.capability_flags()
            & (handshake.capabilities | capabilities::CLIENT_CONNECT_WITH_DB);

        let response = HandshakeResponse {
            capabilities: caps,
            max_packet_size: self.config.max_packet_size,
            charset: self.config.charset,
            user: &self.config.user,
            auth_response: &auth_response,
            database: self.config.database.as_deref(),
            auth_plugin: plugin.name(),
        }
        .encode();
        try_outcome!(self.write_payload(cx, response.payload()).await);

        self.authenticate(cx, &password).await
    }

    async fn authenticate(&mut self, cx: &Cx, password: &str) -> Outcome<(), Error> {
        loop {
            let payload = try_outcome!(self.read_payload(cx).await);
            match payload.first().copied() {
                Some(OK_HEADER) => {
                    let ok = try_result!(self.decode(parse_ok(&payload)));
                    self.server_status = ok.server_status;
                    return Outcome::Ok(());
                }
                Some(ERR_HEADER) => {
                    let err = try_result!(self.decode(parse_err(&payload)));
                    return Outcome::Err(connection_error(
                        ConnectionErrorKind::Authentication,
                        format!("{} (ER {})", err.message, err.code),
                    ));
                }
                Some(EOF_HEADER) => {
                    // Auth switch request: plugin name, then a fresh seed.
                    let mut r = PacketReader::new(&payload[1..]);
                    let name = try_result!(self.decode(r.read_null_str()));
                    let name = String::from_utf8_lossy(name).into_owned();
                    let seed = r.read_rest();
                    let seed = seed.strip_suffix(&[0u8]).unwrap_or(seed);
                    let Some(plugin) = AuthPlugin::from_name(&name) else {
                        return Outcome::Err(connection_error(
                            ConnectionErrorKind::Unsupported,
                            format!("unsupported authentication plugin {}", name),
                        ));
                    };
                    tracing::debug!(plugin = plugin.name(), "Server requested auth switch");
                    let response = plugin.scramble(password, seed);
                    try_outcome!(self.write_payload(cx, &response).await);
                }
                Some(AUTH_MORE_DATA_HEADER) => match payload.get(1).copied() {
                    Some(FAST_AUTH_SUCCESS) => {}
                    Some(PERFORM_FULL_AUTHENTICATION) => {
                        return Outcome::Err(connection_error(
                            ConnectionErrorKind::Unsupported,
                            "server requested full caching_sha2_password authentication, \
                             which needs TLS; use mysql_native_password or log in once \
                             with another client to warm the server cache",
                        ));
                    }
                    _ => {
                        return Outcome::Err(self.broken_by(ProtocolError::Unexpected(
                            "malformed auth-more-data packet".to_string(),
                        )));
                    }
                },
                _ => {
                    return Outcome::Err(self.broken_by(ProtocolError::Unexpected(
                        "unexpected packet during authentication".to_string(),
                    )));
                }
            }
        }
    }

    // ==================== Commands ====================

    /// Run a statement with `COM_QUERY` and collect every result it produces.
    pub async fn query_text(&mut self, cx: &Cx, sql: &str) -> Outcome<StatementResult, Error> {
        if self.broken {
            return Outcome::Err(connection_error(
                ConnectionErrorKind::Disconnected,
                "connection is no longer usable",
            ));
        }

        let mut payload = Vec::with_capacity(sql.len() + 1);
        payload.push(command::COM_QUERY);
        payload.extend_from_slice(sql.as_bytes());
        self.seq = 0;
        try_outcome!(self.write_payload(cx, &payload).await);

        let mut result = StatementResult::default();
        loop {
            let first = try_outcome!(self.read_payload(cx).await);
            let more = match first.first().copied() {
                Some(OK_HEADER) => {
                    let ok = try_result!(self.decode(parse_ok(&first)));
                    self.server_status = ok.server_status;
                    let more = ok.server_status & status::SERVER_MORE_RESULTS_EXISTS != 0;
                    result.status = Some(ok);
                    more
                }
                Some(ERR_HEADER) => {
                    let err = try_result!(self.decode(parse_err(&first)));
                    return Outcome::Err(Error::Statement(err));
                }
                Some(LOCAL_INFILE_HEADER) => {
                    return Outcome::Err(self.broken_by(ProtocolError::Unexpected(
                        "LOCAL INFILE requests are not supported".to_string(),
                    )));
                }
                Some(_) => {
                    let (rows, status_flags) = try_outcome!(self.read_result_set(cx, &first).await);
                    self.server_status = status_flags;
                    result.sets.push(rows);
                    status_flags & status::SERVER_MORE_RESULTS_EXISTS != 0
                }
                None => {
                    return Outcome::Err(
                        self.broken_by(ProtocolError::Unexpected("empty packet".to_string())),
                    );
                }
            };
            if !more {
                return Outcome::Ok(result);
            }
        }
    }

    async fn read_result_set(
        &mut self,
        cx: &Cx,
        header: &[u8],
    ) -> Outcome<(Vec<Row>, u16), Error> {
        let count = try_result!(self.decode(PacketReader::new(header).read_lenenc_u64()));

        let mut definitions = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let payload = try_outcome!(self.read_payload(cx).await);
            definitions.push(try_result!(self.decode(ColumnDefinition::parse(&payload))));
        }
        let eof = try_outcome!(self.read_payload(cx).await);
        if !is_eof(&eof) {
            return Outcome::Err(self.broken_by(ProtocolError::Unexpected(
                "missing EOF after column definitions".to_string(),
            )));
        }

        let columns: std::sync::Arc<Vec<ColumnInfo>> = std::sync::Arc::new(
            definitions
                .iter()
                .map(ColumnDefinition::to_column_info)
                .collect(),
        );

        let mut rows = Vec::new();
        loop {
            let payload = try_outcome!(self.read_payload(cx).await);
            if is_eof(&payload) {
                let flags = try_result!(self.decode(eof_status(&payload)));
                return Outcome::Ok((rows, flags));
            }
            if payload.first() == Some(&ERR_HEADER) {
                let err = try_result!(self.decode(parse_err(&payload)));
                return Outcome::Err(Error::Statement(err));
            }
            let values = try_result!(self.decode(parse_text_row(&payload, &definitions)));
            rows.push(Row::new(std::sync::Arc::clone(&columns), values));
        }
    }

    /// `COM_PING`.
    pub async fn ping_server(&mut self, cx: &Cx) -> Outcome<(), Error> {
        self.seq = 0;
        try_outcome!(self.write_payload(cx, &[command::COM_PING]).await);
        let payload = try_outcome!(self.read_payload(cx).await);
        match payload.first().copied() {
            Some(OK_HEADER) => {
                let ok = try_result!(self.decode(parse_ok(&payload)));
                self.server_status = ok.server_status;
                Outcome::Ok(())
            }
            Some(ERR_HEADER) => {
                let err = try_result!(self.decode(parse_err(&payload)));
                Outcome::Err(Error::Statement(err))
            }
            _ => Outcome::Err(self.broken_by(ProtocolError::Unexpected(
                "unexpected reply to COM_PING".to_string(),
            ))),
        }
    }

    /// Send `COM_QUIT`. The server closes the socket without replying.
    pub async fn quit(mut self, cx: &Cx) -> Outcome<(), Error> {
        self.seq = 0;
        let outcome = self.write_payload(cx, &[command::COM_QUIT]).await;
        tracing::debug!(connection_id = self.connection_id, "MySQL connection closed");
        outcome
    }

    // ==================== I/O ====================

    fn decode<T>(&mut self, result: Result<T, ProtocolError>) -> Result<T, Error> {
        result.map_err(|e| self.broken_by(e))
    }

    fn broken_by(&mut self, err: impl Into<Error>) -> Error {
        self.broken = true;
        self.framer.clear();
        err.into()
    }

    async fn write_payload(&mut self, cx: &Cx, payload: &[u8]) -> Outcome<(), Error> {
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }

        let (data, next_seq) = frame(payload, self.seq);
        self.seq = next_seq;

        let mut written = 0;
        while written < data.len() {
            match std::future::poll_fn(|cx| {
                std::pin::Pin::new(&mut self.stream).poll_write(cx, &data[written..])
            })
            .await
            {
                Ok(0) => {
                    self.broken = true;
                    return Outcome::Err(connection_error(
                        ConnectionErrorKind::Disconnected,
                        "Connection closed while writing",
                    ));
                }
                Ok(n) => written += n,
                Err(e) => {
                    self.broken = true;
                    return Outcome::Err(Error::Connection(
                        ConnectionError::new(
                            ConnectionErrorKind::Disconnected,
                            format!("Failed to write to server: {}", e),
                        )
                        .with_source(e),
                    ));
                }
            }
        }

        match std::future::poll_fn(|cx| std::pin::Pin::new(&mut self.stream).poll_flush(cx)).await {
            Ok(()) => Outcome::Ok(()),
            Err(e) => {
                self.broken = true;
                Outcome::Err(Error::Connection(
                    ConnectionError::new(
                        ConnectionErrorKind::Disconnected,
                        format!("Failed to flush stream: {}", e),
                    )
                    .with_source(e),
                ))
            }
        }
    }

    async fn read_payload(&mut self, cx: &Cx) -> Outcome<Vec<u8>, Error> {
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }

        loop {
            match self.framer.next_message() {
                Ok(Some((seq, payload))) => {
                    self.seq = seq.wrapping_add(1);
                    return Outcome::Ok(payload);
                }
                Ok(None) => {}
                Err(e) => return Outcome::Err(self.broken_by(e)),
            }

            let mut read_buf = ReadBuf::new(&mut self.read_buf);
            match std::future::poll_fn(|cx| {
                std::pin::Pin::new(&mut self.stream).poll_read(cx, &mut read_buf)
            })
            .await
            {
                Ok(()) => {
                    let filled = read_buf.filled();
                    if filled.is_empty() {
                        self.broken = true;
                        return Outcome::Err(connection_error(
                            ConnectionErrorKind::Disconnected,
                            "Connection closed by server",
                        ));
                    }
                    self.framer.feed(filled);
                }
                Err(e) => {
                    self.broken = true;
                    return Outcome::Err(Error::Connection(
                        ConnectionError::new(
                            ConnectionErrorKind::Disconnected,
                            format!("Failed to read from server: {}", e),
                        )
                        .with_source(e),
                    ));
                }
            }
        }
    }
}

fn connection_error(kind: ConnectionErrorKind, message: impl Into<String>) -> Error {
    Error::Connection(ConnectionError::new(kind, message))
}

impl Connection for MySqlConnection {
    fn query(
        &mut self,
        cx: &Cx,
        sql: &str,
    ) -> impl Future<Output = Outcome<StatementResult, Error>> + Send {
        self.query_text(cx, sql)
    }

    fn ping(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.ping_server(cx)
    }

    fn is_broken(&self) -> bool {
        self.broken
    }

    fn close(self, cx: &Cx) -> impl Future<Output = galendary_core::Result<()>> + Send {
        async move {
            match self.quit(cx).await {
                Outcome::Err(e) => Err(e),
                _ => Ok(()),
            }
        }
    }
}
