//! Error taxonomy for the toolkit.
//!
//! Assertion failures and query errors are the two cases test code is
//! expected to see; the rest surface setup problems.

use std::fmt::Display;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed path-query expression. Propagated, never recovered.
    #[error("invalid query expression `{expr}`: {reason}")]
    Query { expr: String, reason: String },

    /// Expectation mismatch raised by an assertion chain. Carries both
    /// sides so the failure message is self-contained.
    #[error("assertion failed: {description}: expected {expected}, got {actual}")]
    Assertion {
        description: String,
        expected: String,
        actual: String,
    },

    /// A query resolved to a value of the wrong shape (e.g. `get_dict`
    /// on an array).
    #[error("query `{expr}` resolved to {actual}, expected {expected}")]
    TypeMismatch {
        expr: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Settings or rule-file loading problems.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid JSON Schema passed to a schema assertion.
    #[error("invalid schema: {0}")]
    Schema(String),

    /// Mock server lifecycle failures (bind errors, stop without start).
    #[error("mock server error: {0}")]
    Server(String),

    /// HTTP transport failure from the client under test.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn query(expr: impl Into<String>, reason: impl Display) -> Self {
        Error::Query {
            expr: expr.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn assertion(
        description: impl Into<String>,
        expected: impl Display,
        actual: impl Display,
    ) -> Self {
        Error::Assertion {
            description: description.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assertion_message_carries_both_sides() {
        let err = Error::assertion("status code", 200, 404);
        let msg = err.to_string();
        assert!(msg.contains("200"));
        assert!(msg.contains("404"));
        assert!(msg.contains("status code"));
    }

    #[test]
    fn test_query_error_names_expression() {
        let err = Error::query("$.broken[", "unclosed bracket");
        assert!(err.to_string().contains("$.broken["));
    }
}
