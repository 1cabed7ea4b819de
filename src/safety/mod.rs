//! Read-only query guardrail.
//!
//! Decides, without executing anything, whether submitted SQL text is a
//! single read-only statement, and normalizes accepted queries with a row cap.

mod lexer;
mod validator;

pub use validator::{validate_query, QueryValidator};

pub(crate) use lexer::scan;

use std::fmt;

use crate::error::GuardError;

/// Maximum number of rows an accepted query may return.
pub const MAX_ROWS: u32 = 500;

/// Keywords rejected anywhere in a query, matched as whole words.
///
/// Entries with a space are matched as adjacent words.
pub const BLOCKED_KEYWORDS: &[&str] = &[
    "DROP",
    "ALTER",
    "TRUNCATE",
    "DELETE",
    "UPDATE",
    "INSERT",
    "CREATE",
    "GRANT",
    "REVOKE",
    "EXEC",
    "EXECUTE",
    "PG_READ_FILE",
    "PG_WRITE_FILE",
    "LO_IMPORT",
    "LO_EXPORT",
    "COPY",
    "SET ROLE",
    "SET SESSION",
];

/// Outcome of validating a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Safe to run; carries the normalized (row-capped) query.
    Accepted(String),
    /// Refused; carries the rule that failed.
    Rejected(Rejection),
}

impl Verdict {
    /// Returns true if the query was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// Returns the normalized query if accepted.
    pub fn accepted_query(&self) -> Option<&str> {
        match self {
            Self::Accepted(query) => Some(query),
            Self::Rejected(_) => None,
        }
    }

    /// Returns the rejection if refused.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }

    /// Converts the verdict into a `Result`, mapping rejections to validation errors.
    pub fn into_result(self) -> crate::error::Result<String> {
        match self {
            Self::Accepted(query) => Ok(query),
            Self::Rejected(rejection) => Err(rejection.into()),
        }
    }
}

/// Why a query was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Nothing but whitespace.
    Empty,
    /// Does not begin with SELECT or WITH.
    NotReadStatement,
    /// Contains a mutating or administrative keyword.
    BlockedKeyword(String),
    /// Contains a statement separator other than one trailing semicolon.
    MultipleStatements,
    /// Ends inside a quoted literal, quoted identifier or block comment.
    UnterminatedLiteral,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty query"),
            Self::NotReadStatement => write!(f, "Only SELECT or WITH queries allowed"),
            Self::BlockedKeyword(keyword) => write!(f, "Blocked keyword: {}", keyword),
            Self::MultipleStatements => write!(f, "Multiple statements not allowed"),
            Self::UnterminatedLiteral => write!(f, "Unterminated string literal or comment"),
        }
    }
}

impl From<Rejection> for GuardError {
    fn from(rejection: Rejection) -> Self {
        GuardError::validation(rejection.to_string())
    }
}
