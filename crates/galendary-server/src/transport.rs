//! Line-delimited JSON over a reader/writer pair.
//!
//! One request object per input line, one response object per output line.
//! Failures are written as `{"err": "<message>", "data": null}`.

use std::io::{BufRead, Write};

use galendary::{Cx, Dispatcher, Error, ExecutionContext, Notifier, Outcome, PoolFactory, Request};
use serde_json::{Value as Json, json};

use crate::error::ServerError;

/// Counters for one transport session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub requests: u64,
    pub failures: u64,
}

/// Decode one input line.
pub fn decode_request(line: &str) -> Result<Request, Error> {
    match serde_json::from_str::<Json>(line) {
        Ok(Json::Object(object)) => Request::from_json(object),
        Ok(_) => Err(Error::Protocol("request must be a JSON object".to_string())),
        Err(e) => Err(Error::Protocol(format!("malformed request: {}", e))),
    }
}

/// The response line for a failed request.
pub fn error_response(err: &Error) -> Json {
    json!({ "err": err.to_string(), "data": Json::Null })
}

/// Serve requests from `input` until end of input.
///
/// Returns `Err` only when the output breaks or a handler panics; request
/// failures are reported in-band.
pub async fn serve<N, F, R, W>(
    cx: &Cx,
    dispatcher: &Dispatcher<N>,
    context: Option<&ExecutionContext<F>>,
    input: R,
    output: &mut W,
) -> Result<SessionStats, ServerError>
where
    N: Notifier,
    F: PoolFactory,
    R: BufRead,
    W: Write,
{
    let mut stats = SessionStats::default();
    for line in input.lines() {
        let line = line.map_err(|e| ServerError::io("reading request", e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        stats.requests += 1;

        let outcome = match decode_request(line) {
            Ok(request) => {
                let command = request.command_token().unwrap_or_default().to_string();
                // Shares the pool; the clock starts with this request.
                let request_context = context.map(ExecutionContext::for_request);
                let outcome = dispatcher
                    .dispatch(cx, request, request_context.as_ref())
                    .await;
                log_request(&command, &outcome);
                outcome
            }
            Err(e) => {
                tracing::info!(error = %e, "Unreadable request");
                Outcome::Err(e)
            }
        };

        let response = match outcome {
            Outcome::Ok(payload) => payload.to_json(),
            Outcome::Err(e) => {
                stats.failures += 1;
                error_response(&e)
            }
            Outcome::Cancelled(reason) => {
                return Err(ServerError::Runtime(format!("request cancelled: {:?}", reason)));
            }
            Outcome::Panicked(p) => return Err(ServerError::HandlerPanicked(format!("{:?}", p))),
        };

        writeln!(output, "{}", response).map_err(|e| ServerError::io("writing response", e))?;
        output
            .flush()
            .map_err(|e| ServerError::io("writing response", e))?;
    }
    Ok(stats)
}

fn log_request<T>(command: &str, outcome: &Outcome<T, Error>) {
    match outcome {
        Outcome::Ok(_) => tracing::info!(command, "Request handled"),
        Outcome::Err(e) => {
            tracing::info!(command, stage = %e.stage(), error = %e, "Request failed")
        }
        _ => tracing::warn!(command, "Request aborted"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_request() {
        let request = decode_request(r#"{"c": "get_user", "user_id": 7, "admin": true}"#).unwrap();
        assert_eq!(request.command_token(), Some("get_user"));
        assert_eq!(request.optional("user_id").as_str(), Some("7"));
    }

    #[test]
    fn test_decode_rejects_non_objects() {
        assert!(matches!(decode_request("[1,2]"), Err(Error::Protocol(_))));
        assert!(matches!(decode_request("{oops"), Err(Error::Protocol(_))));
        assert!(decode_request(r#"{"c": {"nested": 1}}"#).is_err());
    }

    #[test]
    fn test_error_response_shape() {
        let response = error_response(&Error::UnknownCommand("fly".to_string()));
        assert_eq!(response, json!({"err": "invalid command: fly", "data": null}));
    }
}
