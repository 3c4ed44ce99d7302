//! Command results as they leave the dispatcher.

use galendary_core::StatementResult;
use serde::Serialize;

/// A successful command result.
///
/// Most commands return the raw statement result; the rest reshape it into a
/// small object or a boolean.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// Rows, a status object, or both, exactly as the statement produced them.
    Result(StatementResult),
    /// `verify_login`.
    Flag(bool),
    /// `test`: `{"database": "up"}`.
    Health { database: &'static str },
    /// `reset_password`: `{"success": bool}`.
    Success { success: bool },
    /// `generate_enrollment_code`: `{"enrollment_code": "..."}`.
    EnrollmentCode { enrollment_code: String },
    /// `get_all_entries_and_groups`.
    EntriesAndGroups {
        entries: StatementResult,
        groups: StatementResult,
    },
}

impl Payload {
    /// The wrapped statement result, if this payload is one.
    pub fn as_result(&self) -> Option<&StatementResult> {
        match self {
            Payload::Result(result) => Some(result),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<StatementResult> for Payload {
    fn from(result: StatementResult) -> Self {
        Payload::Result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use galendary_core::{OkStatus, Row, Value};
    use serde_json::json;

    #[test]
    fn test_payload_shapes() {
        assert_eq!(Payload::Flag(true).to_json(), json!(true));
        assert_eq!(
            Payload::Health { database: "up" }.to_json(),
            json!({"database": "up"})
        );
        assert_eq!(
            Payload::Success { success: false }.to_json(),
            json!({"success": false})
        );
        assert_eq!(
            Payload::EnrollmentCode {
                enrollment_code: "a1b2c3d".to_string()
            }
            .to_json(),
            json!({"enrollment_code": "a1b2c3d"})
        );
    }

    #[test]
    fn test_entries_and_groups_shape() {
        let entries = StatementResult::rows(vec![Row::from_pairs([("gid", Value::Int(3))])]);
        let groups = StatementResult::rows(vec![]);
        let payload = Payload::EntriesAndGroups { entries, groups };
        assert_eq!(
            payload.to_json(),
            json!({"entries": [{"gid": 3}], "groups": []})
        );
    }

    #[test]
    fn test_statement_result_passthrough() {
        let status = OkStatus {
            affected_rows: 1,
            ..OkStatus::default()
        };
        let payload = Payload::from(StatementResult::ok(status));
        assert_eq!(payload.to_json()["affectedRows"], 1);
        assert!(payload.as_result().is_some());
    }
}
