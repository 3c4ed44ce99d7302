//! Stdio transport against a scripted in-memory database.

use std::collections::VecDeque;
use std::future::Future;
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use galendary::{
    Connection, Connector, ConnectorPoolFactory, Cx, Dispatcher, Error, ExecutionContext, Outcome,
    PoolConfig, Row, StatementResult, Value,
};
use galendary_core::{OkStatus, StatementError};
use galendary_server::mail::Mailer;
use galendary_server::service;
use serde_json::{Value as Json, json};

#[derive(Default)]
struct Database {
    log: Mutex<Vec<String>>,
    replies: Mutex<VecDeque<Result<StatementResult, StatementError>>>,
}

struct ScriptConn(Arc<Database>);

impl Connection for ScriptConn {
    fn query(
        &mut self,
        _cx: &Cx,
        sql: &str,
    ) -> impl Future<Output = Outcome<StatementResult, Error>> + Send {
        self.0.log.lock().unwrap().push(sql.to_string());
        let outcome = match self.0.replies.lock().unwrap().pop_front() {
            Some(Ok(result)) => Outcome::Ok(result),
            Some(Err(e)) => Outcome::Err(Error::Statement(e)),
            None => Outcome::Ok(StatementResult::ok(OkStatus {
                affected_rows: 1,
                ..OkStatus::default()
            })),
        };
        async move { outcome }
    }

    fn ping(&mut self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async { Outcome::Ok(()) }
    }

    fn close(self, _cx: &Cx) -> impl Future<Output = galendary_core::Result<()>> + Send {
        async { Ok(()) }
    }
}

struct ScriptConnector(Arc<Database>);

impl Connector for ScriptConnector {
    type Conn = ScriptConn;

    fn connect(&self, _cx: &Cx) -> impl Future<Output = Outcome<ScriptConn, Error>> + Send {
        let db = Arc::clone(&self.0);
        async move { Outcome::Ok(ScriptConn(db)) }
    }
}

fn serve(db: &Arc<Database>, input: &str) -> Vec<Json> {
    let context = ExecutionContext::new(ConnectorPoolFactory::new(
        ScriptConnector(Arc::clone(db)),
        PoolConfig::default(),
    ));
    let dispatcher = Dispatcher::new(Mailer::from_config(None));
    let mut output = Vec::new();
    let stats = service::run_with(&dispatcher, &context, Cursor::new(input), &mut output)
        .expect("session ends cleanly");

    let lines: Vec<Json> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(stats.requests as usize, lines.len());
    lines
}

fn one_cell_row(name: &str, value: impl Into<Value>) -> Row {
    Row::from_pairs(vec![(name.to_string(), value.into())])
}

#[test]
fn one_response_per_request_line() {
    let db = Arc::new(Database::default());
    db.replies
        .lock()
        .unwrap()
        .push_back(Ok(StatementResult::rows(vec![one_cell_row("ok", 1i64)])));

    let responses = serve(
        &db,
        "{\"c\": \"test\"}\n\n{\"c\": \"fly\"}\n{\"command\": \"\"}\n",
    );

    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0], json!({"database": "up"}));
    assert_eq!(responses[1], json!({"err": "invalid command: fly", "data": null}));
    assert_eq!(responses[2], json!({"err": "no command given", "data": null}));
    assert_eq!(db.log.lock().unwrap().len(), 1);
}

#[test]
fn malformed_line_does_not_end_the_session() {
    let db = Arc::new(Database::default());
    let responses = serve(
        &db,
        "not json\n{\"c\": \"delete_user\", \"username\": \"ann@x.io\", \"passhash\": \"h\"}\n",
    );

    assert_eq!(responses.len(), 2);
    assert!(responses[0]["err"].as_str().unwrap().contains("malformed request"));
    assert_eq!(responses[1]["affectedRows"], json!(1));
}

#[test]
fn missing_field_is_reported_without_touching_the_database() {
    let db = Arc::new(Database::default());
    let responses = serve(&db, "{\"c\": \"verify_login\", \"username\": \"ann@x.io\"}\n");

    assert_eq!(
        responses[0],
        json!({"err": "event requires property \"passhash\"", "data": null})
    );
    assert!(db.log.lock().unwrap().is_empty());
}

#[test]
fn reset_password_without_mail_relay_fails_at_delivery() {
    let db = Arc::new(Database::default());
    db.replies
        .lock()
        .unwrap()
        .push_back(Ok(StatementResult::rows(vec![one_cell_row("success", 1i64)])));

    let responses = serve(&db, "{\"c\": \"reset_password\", \"username\": \"ann@x.io\"}\n");

    let err = responses[0]["err"].as_str().unwrap();
    assert!(err.contains("mail delivery is not configured"), "{err}");
    assert_eq!(db.log.lock().unwrap().len(), 1);
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn elapsed_values(logs: &str) -> Vec<u64> {
    logs.split("elapsed_ms=")
        .skip(1)
        .map(|rest| {
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().unwrap()
        })
        .collect()
}

#[test]
fn statement_timing_starts_with_each_request() {
    let db = Arc::new(Database::default());
    let context = ExecutionContext::new(ConnectorPoolFactory::new(
        ScriptConnector(Arc::clone(&db)),
        PoolConfig::default(),
    ));
    let dispatcher = Dispatcher::new(Mailer::from_config(None));

    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    std::thread::sleep(Duration::from_millis(600));
    let mut output = Vec::new();
    tracing::subscriber::with_default(subscriber, || {
        service::run_with(
            &dispatcher,
            &context,
            Cursor::new("{\"c\": \"get_username\", \"user_id\": \"7\"}\n"),
            &mut output,
        )
        .expect("session ends cleanly");
    });

    let logs = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    let elapsed = elapsed_values(&logs);
    assert_eq!(elapsed.len(), 1, "{logs}");
    assert!(elapsed[0] < 300, "timing counted from service start: {logs}");
    assert_eq!(db.log.lock().unwrap().len(), 1);
}
