//! Runtime validation helpers.
//!
//! Handlers validate request fields before building statements; the only rule in
//! use today is the e-mail check that guards password reset.

use std::sync::OnceLock;

use regex::Regex;

/// Pattern an address must match to be treated as an e-mail.
pub const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// Whether `value` looks like an e-mail address.
///
/// The pattern is compiled once. If it ever fails to compile, every value is
/// rejected.
pub fn is_email(value: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| match Regex::new(EMAIL_PATTERN) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::error!(error = %e, "E-mail pattern failed to compile");
                None
            }
        })
        .as_ref()
        .is_some_and(|regex| regex.is_match(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_email() {
        assert!(is_email("jeff@example.com"));
        assert!(is_email("user.name+tag@domain.org"));
        assert!(!is_email("jeff"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("jeff@"));
        assert!(!is_email(""));
        assert!(!is_email("jeff@example.com; DROP TABLE users"));
    }

    #[test]
    fn test_pattern_compiles() {
        assert!(Regex::new(EMAIL_PATTERN).is_ok());
    }

    #[test]
    fn test_repeated_checks_agree() {
        for _ in 0..3 {
            assert!(is_email("ann@x.io"));
            assert!(!is_email("ann at x.io"));
        }
    }
}
