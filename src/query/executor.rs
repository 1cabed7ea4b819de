//! Guarded query execution.
//!
//! Runs the read-only validator, wraps accepted queries in an execution
//! envelope and performs the single channel round trip.

use std::time::{Duration, Instant};

use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::db::SqlChannel;
use crate::error::{GuardError, Result};
use crate::safety::{QueryValidator, Rejection, Verdict};

use super::envelope::ExecutionEnvelope;

/// Query executor that validates SQL before dispatching it.
pub struct QueryExecutor<'a> {
    channel: &'a dyn SqlChannel,
    validator: &'a QueryValidator,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new query executor.
    pub fn new(channel: &'a dyn SqlChannel, validator: &'a QueryValidator) -> Self {
        Self { channel, validator }
    }

    /// Validates and, if accepted, executes a query.
    ///
    /// Rejected queries never reach the channel. Execution errors are
    /// returned as reported by the channel and are not retried.
    pub async fn execute(&self, sql: &str) -> ExecutionResult {
        match self.validator.validate(sql) {
            Verdict::Rejected(rejection) => {
                debug!("Query rejected: {}", rejection);
                ExecutionResult::Rejected(rejection)
            }
            Verdict::Accepted(normalized) => match self.dispatch(normalized).await {
                Ok(outcome) => ExecutionResult::Success(outcome),
                Err(e) => ExecutionResult::Error(e),
            },
        }
    }

    async fn dispatch(&self, normalized: String) -> Result<QueryOutcome> {
        let envelope = ExecutionEnvelope::wrap(&normalized);
        debug!("Dispatching envelope via {}:\n{}", self.channel.name(), envelope);

        let start = Instant::now();
        let result = self.channel.execute(&envelope).await;
        let execution_time = start.elapsed();

        match result {
            Ok(rows) => {
                info!(
                    "Query executed via {} in {:?}",
                    self.channel.name(),
                    execution_time
                );
                Ok(QueryOutcome {
                    query: normalized,
                    rows,
                    execution_time,
                })
            }
            Err(e) => {
                warn!(
                    "Query failed via {} after {:?}: {}",
                    self.channel.name(),
                    execution_time,
                    e
                );
                Err(e)
            }
        }
    }
}

/// Result of a guarded execution attempt.
#[derive(Debug)]
pub enum ExecutionResult {
    /// Query executed successfully.
    Success(QueryOutcome),
    /// Query refused by the validator; the channel was not called.
    Rejected(Rejection),
    /// Query execution failed.
    Error(GuardError),
}

impl ExecutionResult {
    /// Converts into a `Result`, mapping rejections to validation errors.
    pub fn into_result(self) -> Result<QueryOutcome> {
        match self {
            Self::Success(outcome) => Ok(outcome),
            Self::Rejected(rejection) => Err(rejection.into()),
            Self::Error(e) => Err(e),
        }
    }
}

/// Successful query execution outcome.
#[derive(Debug)]
pub struct QueryOutcome {
    /// The normalized query that was executed.
    pub query: String,
    /// Raw result set as returned by the channel.
    pub rows: JsonValue,
    /// How long the channel call took.
    pub execution_time: Duration,
}
