//! Rendered statements.

use std::fmt;

use galendary_core::Value;

use crate::format::format;

/// Template family a statement was rendered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// Plain `SELECT`/`INSERT`/`UPDATE`/`DELETE` text.
    Query,
    /// A stored-procedure `CALL`, which answers with one or more result sets
    /// followed by a status.
    Call,
}

impl StatementKind {
    /// Classify a template by its leading keyword.
    pub fn of(template: &str) -> Self {
        let head = template.trim_start();
        if head
            .get(..5)
            .is_some_and(|word| word.eq_ignore_ascii_case("CALL "))
        {
            StatementKind::Call
        } else {
            StatementKind::Query
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            StatementKind::Query => "query",
            StatementKind::Call => "call",
        }
    }
}

/// A fully rendered statement ready to send to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    kind: StatementKind,
}

impl Statement {
    /// Render `template` with `params`.
    pub fn new(template: &str, params: &[Value]) -> Self {
        Self {
            sql: format(template, params),
            kind: StatementKind::of(template),
        }
    }

    /// Wrap SQL that needs no substitution.
    pub fn raw(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let kind = StatementKind::of(&sql);
        Self { sql, kind }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_detection() {
        assert_eq!(StatementKind::of("CALL create_group(?, ?, ?);"), StatementKind::Call);
        assert_eq!(StatementKind::of("  call x()"), StatementKind::Call);
        assert_eq!(StatementKind::of("SELECT 1"), StatementKind::Query);
        assert_eq!(StatementKind::of("CALLBACK"), StatementKind::Query);
        assert_eq!(StatementKind::of(""), StatementKind::Query);
    }

    #[test]
    fn test_new_renders_params() {
        let stmt = Statement::new(
            "CALL change_password(?, ?, ?);",
            &[Value::from("jeff"), Value::from("old"), Value::from("new")],
        );
        assert_eq!(stmt.sql(), "CALL change_password('jeff', 'old', 'new');");
        assert_eq!(stmt.kind(), StatementKind::Call);
        assert_eq!(stmt.to_string(), stmt.sql());
    }
}
