//! Wire-level tests against a scripted in-process server, plus an optional live
//! MySQL check.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::JoinHandle;
use std::time::Duration;

use asupersync::runtime::RuntimeBuilder;
use asupersync::{Cx, Outcome};

use galendary_core::{Connection, ConnectionErrorKind, Error, Value};
use galendary_mysql::protocol::{PacketWriter, capabilities, column_type, command, status};
use galendary_mysql::{MySqlConfig, MySqlConnection};

const MYSQL_URL_ENV: &str = "GALENDARY_TEST_MYSQL_URL";

fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

// ==================== Scripted server ====================

struct Peer {
    stream: TcpStream,
}

impl Peer {
    fn send(&mut self, seq: u8, payload: &[u8]) {
        let len = payload.len();
        let mut packet = vec![len as u8, (len >> 8) as u8, (len >> 16) as u8, seq];
        packet.extend_from_slice(payload);
        self.stream.write_all(&packet).expect("server write");
    }

    fn recv(&mut self) -> (u8, Vec<u8>) {
        let mut header = [0u8; 4];
        self.stream.read_exact(&mut header).expect("server read header");
        let len = usize::from(header[0]) | usize::from(header[1]) << 8 | usize::from(header[2]) << 16;
        let mut payload = vec![0u8; len];
        self.stream.read_exact(&mut payload).expect("server read payload");
        (header[3], payload)
    }

    fn greet(&mut self) {
        let caps = capabilities::CLIENT_LONG_PASSWORD
            | capabilities::CLIENT_FOUND_ROWS
            | capabilities::CLIENT_CONNECT_WITH_DB
            | capabilities::CLIENT_PROTOCOL_41
            | capabilities::CLIENT_SECURE_CONNECTION
            | capabilities::CLIENT_MULTI_RESULTS
            | capabilities::CLIENT_PLUGIN_AUTH
            | capabilities::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA;
        let mut w = PacketWriter::new();
        w.write_u8(10);
        w.write_null_str(b"8.0.36-scripted");
        w.write_u32_le(42);
        w.write_bytes(b"abcdefgh");
        w.write_u8(0);
        w.write_u16_le(caps as u16);
        w.write_u8(45);
        w.write_u16_le(status::SERVER_STATUS_AUTOCOMMIT);
        w.write_u16_le((caps >> 16) as u16);
        w.write_u8(21);
        w.write_zeros(10);
        w.write_bytes(b"ijklmnopqrst");
        w.write_u8(0);
        w.write_null_str(b"mysql_native_password");
        self.send(0, w.payload());
    }

    fn ok(&mut self, seq: u8, affected: u64, status_flags: u16, info: &str) {
        let mut w = PacketWriter::new();
        w.write_u8(0x00);
        w.write_lenenc_int(affected);
        w.write_lenenc_int(0);
        w.write_u16_le(status_flags);
        w.write_u16_le(0);
        w.write_bytes(info.as_bytes());
        self.send(seq, w.payload());
    }

    fn err(&mut self, seq: u8, code: u16, message: &str) {
        let mut w = PacketWriter::new();
        w.write_u8(0xff);
        w.write_u16_le(code);
        w.write_bytes(b"#45000");
        w.write_bytes(message.as_bytes());
        self.send(seq, w.payload());
    }

    fn eof(&mut self, seq: u8, status_flags: u16) {
        let mut w = PacketWriter::new();
        w.write_u8(0xfe);
        w.write_u16_le(0);
        w.write_u16_le(status_flags);
        self.send(seq, w.payload());
    }

    fn column(&mut self, seq: u8, name: &str, ty: u8) {
        let mut w = PacketWriter::new();
        w.write_lenenc_bytes(b"def");
        w.write_lenenc_bytes(b"");
        w.write_lenenc_bytes(b"");
        w.write_lenenc_bytes(b"");
        w.write_lenenc_bytes(name.as_bytes());
        w.write_lenenc_bytes(b"");
        w.write_lenenc_int(0x0c);
        w.write_u16_le(63);
        w.write_u32_le(20);
        w.write_u8(ty);
        w.write_u16_le(0x0001);
        w.write_u8(0);
        w.write_zeros(2);
        self.send(seq, w.payload());
    }

    fn login(&mut self) -> Vec<u8> {
        self.greet();
        let (seq, response) = self.recv();
        assert_eq!(seq, 1);
        self.ok(2, 0, status::SERVER_STATUS_AUTOCOMMIT, "");
        response
    }
}

fn serve(script: impl FnOnce(&mut Peer) + Send + 'static) -> (MySqlConfig, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind scripted server");
    let port = listener.local_addr().expect("local addr").port();
    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        let mut peer = Peer { stream };
        script(&mut peer);
    });
    let config = MySqlConfig::new()
        .host("127.0.0.1")
        .port(port)
        .user("galendary")
        .password("secret")
        .database("galendary")
        .connect_timeout(Duration::from_secs(5));
    (config, handle)
}

fn run<F: std::future::Future>(fut: F) -> F::Output {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    rt.block_on(fut)
}

// ==================== Tests ====================

#[test]
fn login_call_with_result_set_then_status() {
    let (config, server) = serve(|peer| {
        let response = peer.login();
        assert!(
            response
                .windows(b"galendary\0".len())
                .any(|w| w == b"galendary\0")
        );

        let (seq, query) = peer.recv();
        assert_eq!(seq, 0);
        assert_eq!(query[0], command::COM_QUERY);
        assert_eq!(&query[1..], b"CALL reset_password('ann', 'x')");

        let more = status::SERVER_STATUS_AUTOCOMMIT | status::SERVER_MORE_RESULTS_EXISTS;
        peer.send(1, &[1]);
        peer.column(2, "success", column_type::LONGLONG);
        peer.eof(3, more);
        let mut row = PacketWriter::new();
        row.write_lenenc_bytes(b"1");
        peer.send(4, row.payload());
        peer.eof(5, more);
        peer.ok(6, 1, status::SERVER_STATUS_AUTOCOMMIT, "");

        let (seq, ping) = peer.recv();
        assert_eq!((seq, ping.as_slice()), (0, &[command::COM_PING][..]));
        peer.ok(1, 0, status::SERVER_STATUS_AUTOCOMMIT, "");

        let (_, quit) = peer.recv();
        assert_eq!(quit, vec![command::COM_QUIT]);
    });

    run(async {
        let cx = Cx::for_testing();
        let mut conn = unwrap_outcome(MySqlConnection::connect(&cx, config).await);
        assert_eq!(conn.connection_id(), 42);
        assert_eq!(conn.server_version(), "8.0.36-scripted");

        let result =
            unwrap_outcome(conn.query(&cx, "CALL reset_password('ann', 'x')").await);
        assert_eq!(result.sets.len(), 1);
        let row = result.first_row().expect("one row");
        assert_eq!(row.get("success"), Some(&Value::Int(1)));
        assert_eq!(result.affected_rows(), 1);

        unwrap_outcome(conn.ping(&cx).await);
        assert!(!conn.is_broken());
        conn.close(&cx).await.expect("close");
    });

    server.join().expect("server thread");
}

#[test]
fn update_reports_changed_rows() {
    let (config, server) = serve(|peer| {
        peer.login();
        let _ = peer.recv();
        peer.ok(
            1,
            1,
            status::SERVER_STATUS_AUTOCOMMIT,
            "Rows matched: 1  Changed: 1  Warnings: 0",
        );
    });

    run(async {
        let cx = Cx::for_testing();
        let mut conn = unwrap_outcome(MySqlConnection::connect(&cx, config).await);
        let result = unwrap_outcome(conn.query(&cx, "UPDATE groups SET name = 'x'").await);
        assert!(result.sets.is_empty());
        assert_eq!(result.changed_rows(), 1);
    });

    server.join().expect("server thread");
}

#[test]
fn sql_error_keeps_connection_usable() {
    let (config, server) = serve(|peer| {
        peer.login();
        let _ = peer.recv();
        peer.err(1, 1644, "Not an admin");
        let _ = peer.recv();
        peer.ok(1, 0, status::SERVER_STATUS_AUTOCOMMIT, "");
    });

    run(async {
        let cx = Cx::for_testing();
        let mut conn = unwrap_outcome(MySqlConnection::connect(&cx, config).await);
        match conn.query(&cx, "CALL delete_group(1, 'a', 'b')").await {
            Outcome::Err(Error::Statement(e)) => {
                assert_eq!(e.code, 1644);
                assert_eq!(e.sql_state, "45000");
                assert_eq!(e.message, "Not an admin");
            }
            other => panic!("expected statement error, got {other:?}"),
        }
        assert!(!conn.is_broken());
        unwrap_outcome(conn.query(&cx, "DELETE FROM users WHERE id = 0").await);
    });

    server.join().expect("server thread");
}

#[test]
fn rejected_login_is_authentication_error() {
    let (config, server) = serve(|peer| {
        peer.greet();
        let _ = peer.recv();
        peer.err(2, 1045, "Access denied for user 'galendary'");
    });

    run(async {
        let cx = Cx::for_testing();
        match MySqlConnection::connect(&cx, config).await {
            Outcome::Err(Error::Connection(e)) => {
                assert_eq!(e.kind, ConnectionErrorKind::Authentication);
                assert!(e.message.contains("Access denied"));
            }
            other => panic!("expected authentication error, got {other:?}"),
        }
    });

    server.join().expect("server thread");
}

#[test]
fn dropped_link_marks_connection_broken() {
    let (config, server) = serve(|peer| {
        peer.login();
        let _ = peer.recv();
        peer.stream
            .shutdown(std::net::Shutdown::Both)
            .expect("shutdown");
    });

    run(async {
        let cx = Cx::for_testing();
        let mut conn = unwrap_outcome(MySqlConnection::connect(&cx, config).await);
        match conn.query(&cx, "SELECT 1").await {
            Outcome::Err(Error::Connection(e)) => {
                assert_eq!(e.kind, ConnectionErrorKind::Disconnected);
            }
            other => panic!("expected disconnect, got {other:?}"),
        }
        assert!(conn.is_broken());
        assert!(matches!(
            conn.query(&cx, "SELECT 1").await,
            Outcome::Err(Error::Connection(_))
        ));
    });

    server.join().expect("server thread");
}

#[test]
fn live_mysql_select_1() {
    let Some(config) = std::env::var(MYSQL_URL_ENV)
        .ok()
        .and_then(|url| MySqlConfig::from_url(&url).ok())
    else {
        eprintln!("skipping MySQL integration test: set {MYSQL_URL_ENV}");
        return;
    };

    run(async {
        let cx = Cx::for_testing();
        let mut conn = unwrap_outcome(MySqlConnection::connect(&cx, config).await);
        let result = unwrap_outcome(conn.query(&cx, "SELECT 1 AS ok").await);
        assert_eq!(result.first_row().and_then(|r| r.get("ok")).and_then(Value::as_i64), Some(1));
        unwrap_outcome(conn.ping(&cx).await);
        conn.close(&cx).await.expect("close");
    });
}
