//! Execution envelope construction.
//!
//! Wraps an accepted query in a bounded, read-only transaction so the
//! database enforces what the validator checked textually.

use std::fmt;

use crate::safety::scan;

/// Server-side statement timeout applied to every envelope, in seconds.
pub const STATEMENT_TIMEOUT_SECS: u64 = 10;

/// The complete SQL text sent to the execution channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionEnvelope {
    sql: String,
}

impl ExecutionEnvelope {
    /// Wraps a normalized query produced by the validator.
    ///
    /// The result is, in order: a statement timeout, `BEGIN READ ONLY`, the
    /// query terminated by exactly one semicolon, and `COMMIT`.
    pub fn wrap(normalized: &str) -> Self {
        let trimmed = normalized.trim_end();
        let body = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();

        // A terminator after a trailing line comment must start a new line
        let terminator = if scan(body).ends_in_line_comment {
            "\n;"
        } else {
            ";"
        };

        let sql = format!(
            "SET statement_timeout = '{STATEMENT_TIMEOUT_SECS}s';\n\
             BEGIN READ ONLY;\n\
             {body}{terminator}\n\
             COMMIT;"
        );
        Self { sql }
    }

    /// Returns the envelope SQL.
    pub fn as_str(&self) -> &str {
        &self.sql
    }

    /// Consumes the envelope, returning the SQL text.
    pub fn into_string(self) -> String {
        self.sql
    }
}

impl fmt::Display for ExecutionEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

impl AsRef<str> for ExecutionEnvelope {
    fn as_ref(&self) -> &str {
        &self.sql
    }
}
