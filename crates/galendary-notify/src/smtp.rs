//! Minimal SMTP submission client.
//!
//! Speaks just enough of RFC 5321 to hand one plain-text message to a relay:
//! `EHLO`, optional `AUTH PLAIN`, `MAIL FROM`, `RCPT TO`, `DATA`, `QUIT`. There
//! is no TLS; point it at a local relay or a submission port that accepts
//! plain connections.

use std::future::Future;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use asupersync::io::{AsyncRead, AsyncWrite, ReadBuf};
use asupersync::net::TcpStream;
use asupersync::{Cx, Outcome};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use galendary_core::{Error, try_outcome, try_result};

use crate::notifier::{Notifier, PasswordResetMessage};

/// SMTP relay configuration.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Name announced in `EHLO`.
    pub helo_name: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Envelope and header sender.
    pub from: String,
    pub connect_timeout: Duration,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25,
            helo_name: "localhost".to_string(),
            username: None,
            password: None,
            from: "noreply@localhost".to_string(),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("helo_name", &self.helo_name)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

impl SmtpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn helo_name(mut self, name: impl Into<String>) -> Self {
        self.helo_name = name.into();
        self
    }

    /// Log in with `AUTH PLAIN` before sending.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn sender(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn resolve(&self) -> Result<SocketAddr, Error> {
        let addr = self.socket_addr();
        addr.to_socket_addrs()
            .map_err(|e| Error::Notification(format!("Failed to resolve {}: {}", addr, e)))?
            .next()
            .ok_or_else(|| Error::Notification(format!("No address found for {}", addr)))
    }
}

/// One (possibly multi-line) server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl SmtpReply {
    /// Parse a complete reply from the front of `buf`, returning it with the
    /// number of bytes consumed. `None` means more input is needed.
    pub fn parse(buf: &[u8]) -> Result<Option<(Self, usize)>, Error> {
        let mut lines = Vec::new();
        let mut pos = 0;
        loop {
            let Some(end) = buf[pos..].iter().position(|&b| b == b'\n') else {
                return Ok(None);
            };
            let raw = &buf[pos..pos + end];
            pos += end + 1;
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let line = String::from_utf8_lossy(raw);
            let malformed = || Error::Notification(format!("malformed SMTP reply: {:?}", line));

            let code = line
                .get(..3)
                .and_then(|c| c.parse::<u16>().ok())
                .ok_or_else(malformed)?;
            lines.push(line.get(4..).unwrap_or_default().to_string());
            match raw.get(3) {
                Some(b'-') => {}
                None | Some(b' ') => return Ok(Some((Self { code, lines }, pos))),
                Some(_) => return Err(malformed()),
            }
        }
    }

    pub fn message(&self) -> String {
        self.lines.join(" ")
    }
}

/// Render the `DATA` section: headers, body with CRLF line endings and leading
/// dots doubled, then the terminating `.` line.
pub fn render_data(msg: &PasswordResetMessage) -> String {
    let mut out = String::with_capacity(msg.body.len() + 256);
    out.push_str(&format!("From: <{}>\r\n", msg.from));
    out.push_str(&format!("To: <{}>\r\n", msg.to));
    out.push_str(&format!("Subject: {}\r\n", msg.subject));
    out.push_str("MIME-Version: 1.0\r\n");
    out.push_str("Content-Type: text/plain; charset=utf-8\r\n");
    out.push_str("Content-Transfer-Encoding: 8bit\r\n");
    out.push_str("\r\n");
    for line in msg.body.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
        out.push_str("\r\n");
    }
    out.push_str(".\r\n");
    out
}

fn check_header_safe(field: &str, value: &str) -> Result<(), Error> {
    if value.contains(['\r', '\n']) {
        return Err(Error::Notification(format!(
            "{} must not contain line breaks",
            field
        )));
    }
    Ok(())
}

/// Delivers mail through one SMTP relay, one connection per message.
#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    config: SmtpConfig,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    /// Run one complete SMTP transaction for `msg`.
    pub async fn deliver(&self, cx: &Cx, msg: &PasswordResetMessage) -> Outcome<(), Error> {
        try_result!(check_header_safe("sender", &msg.from));
        try_result!(check_header_safe("recipient", &msg.to));
        try_result!(check_header_safe("subject", &msg.subject));

        let mut session = try_outcome!(SmtpSession::open(&self.config).await);
        try_outcome!(session.expect(cx, &[220], "greeting").await);
        try_outcome!(
            session
                .command(cx, &format!("EHLO {}", self.config.helo_name), &[250], "EHLO")
                .await
        );

        if let (Some(user), Some(pass)) = (&self.config.username, &self.config.password) {
            let token = STANDARD.encode(format!("\0{}\0{}", user, pass));
            try_outcome!(
                session
                    .command(cx, &format!("AUTH PLAIN {}", token), &[235], "AUTH")
                    .await
            );
        }

        try_outcome!(
            session
                .command(cx, &format!("MAIL FROM:<{}>", msg.from), &[250], "MAIL FROM")
                .await
        );
        try_outcome!(
            session
                .command(cx, &format!("RCPT TO:<{}>", msg.to), &[250, 251], "RCPT TO")
                .await
        );
        try_outcome!(session.command(cx, "DATA", &[354], "DATA").await);
        try_outcome!(session.write_all(cx, render_data(msg).as_bytes()).await);
        try_outcome!(session.expect(cx, &[250], "message body").await);

        // The message is accepted at this point; a failed QUIT changes nothing.
        if let Outcome::Err(e) = session.command(cx, "QUIT", &[221], "QUIT").await {
            tracing::debug!(error = %e, "SMTP QUIT failed after delivery");
        }
        tracing::info!(recipient = %msg.to, relay = %self.config.socket_addr(), "Mail delivered");
        Outcome::Ok(())
    }
}

impl Notifier for SmtpNotifier {
    fn send_temporary_password(
        &self,
        cx: &Cx,
        recipient: &str,
        credential: &str,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        let msg = PasswordResetMessage::compose(self.config.from.clone(), recipient, credential);
        async move { self.deliver(cx, &msg).await }
    }
}

struct SmtpSession {
    stream: TcpStream,
    pending: Vec<u8>,
    read_buf: Vec<u8>,
}

impl SmtpSession {
    async fn open(config: &SmtpConfig) -> Outcome<Self, Error> {
        let addr = try_result!(config.resolve());
        let stream = match TcpStream::connect_timeout(addr, config.connect_timeout).await {
            Ok(s) => s,
            Err(e) => {
                return Outcome::Err(Error::Notification(format!(
                    "Failed to connect to mail relay {}: {}",
                    config.socket_addr(),
                    e
                )));
            }
        };
        stream.set_nodelay(true).ok();
        Outcome::Ok(Self {
            stream,
            pending: Vec::new(),
            read_buf: vec![0u8; 1024],
        })
    }

    async fn command(
        &mut self,
        cx: &Cx,
        line: &str,
        expected: &[u16],
        step: &str,
    ) -> Outcome<SmtpReply, Error> {
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(b"\r\n");
        try_outcome!(self.write_all(cx, &data).await);
        self.expect(cx, expected, step).await
    }

    async fn expect(&mut self, cx: &Cx, expected: &[u16], step: &str) -> Outcome<SmtpReply, Error> {
        let reply = try_outcome!(self.read_reply(cx).await);
        if !expected.contains(&reply.code) {
            return Outcome::Err(Error::Notification(format!(
                "SMTP {} rejected: {} {}",
                step,
                reply.code,
                reply.message()
            )));
        }
        Outcome::Ok(reply)
    }

    async fn write_all(&mut self, cx: &Cx, data: &[u8]) -> Outcome<(), Error> {
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }

        let mut written = 0;
        while written < data.len() {
            match std::future::poll_fn(|cx| {
                std::pin::Pin::new(&mut self.stream).poll_write(cx, &data[written..])
            })
            .await
            {
                Ok(0) => {
                    return Outcome::Err(Error::Notification(
                        "mail relay closed the connection".to_string(),
                    ));
                }
                Ok(n) => written += n,
                Err(e) => {
                    return Outcome::Err(Error::Notification(format!(
                        "Failed to write to mail relay: {}",
                        e
                    )));
                }
            }
        }

        match std::future::poll_fn(|cx| std::pin::Pin::new(&mut self.stream).poll_flush(cx)).await {
            Ok(()) => Outcome::Ok(()),
            Err(e) => Outcome::Err(Error::Notification(format!(
                "Failed to flush mail relay stream: {}",
                e
            ))),
        }
    }

    async fn read_reply(&mut self, cx: &Cx) -> Outcome<SmtpReply, Error> {
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }

        loop {
            if let Some((reply, consumed)) = try_result!(SmtpReply::parse(&self.pending)) {
                self.pending.drain(..consumed);
                return Outcome::Ok(reply);
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
                        return Outcome::Err(Error::Notification(
                            "mail relay closed the connection".to_string(),
                        ));
                    }
                    self.pending.extend_from_slice(filled);
                }
                Err(e) => {
                    return Outcome::Err(Error::Notification(format!(
                        "Failed to read from mail relay: {}",
                        e
                    )));
                }
            }
        }
    }
}
