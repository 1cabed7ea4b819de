//! Error types for supaguard.
//!
//! Defines the main error enum used throughout the service.

use thiserror::Error;

/// Main error type for supaguard operations.
#[derive(Error, Debug)]
pub enum GuardError {
    /// Query refused by the read-only validator (empty, blocked keyword, etc.)
    #[error("{0}")]
    Validation(String),

    /// Query execution errors reported by the database (syntax, timeout, permissions)
    #[error("{0}")]
    Query(String),

    /// Transport errors reaching the execution channel (host unreachable, TLS, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Admin authorization failures (missing token, not the admin, etc.)
    #[error("{0}")]
    Auth(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GuardError {
    /// Creates a validation error with the given reason.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates an authorization error with the given message.
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Validation Error",
            Self::Query(_) => "Query Error",
            Self::Connection(_) => "Connection Error",
            Self::Auth(_) => "Authorization Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using GuardError.
pub type Result<T> = std::result::Result<T, GuardError>;
